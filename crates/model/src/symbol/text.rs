//! Lexical helpers over C# source fragments
//!
//! The syntax tree locates declarations and their parts; these helpers pick
//! apart the short fragments in between (headers, parameter lists, attribute
//! arguments) while respecting nesting and string literals.

/// Member and type modifiers that may lead a declaration header
pub const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "abstract", "virtual", "override",
    "sealed", "readonly", "async", "partial", "new", "extern", "unsafe", "required", "const",
    "volatile", "file",
];

/// Split on `sep` where it occurs outside brackets, generics and literals
pub fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match c {
            '"' => skip_string(s, i, &mut chars),
            '\'' => {
                while let Some((_, n)) = chars.next() {
                    if n == '\\' {
                        chars.next();
                    } else if n == '\'' {
                        break;
                    }
                }
            }
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn skip_string<I: Iterator<Item = (usize, char)>>(s: &str, quote_at: usize, chars: &mut std::iter::Peekable<I>) {
    let verbatim = s[..quote_at].ends_with('@');
    while let Some((_, n)) = chars.next() {
        if verbatim {
            if n == '"' {
                if chars.peek().map(|(_, c)| *c) == Some('"') {
                    chars.next();
                } else {
                    break;
                }
            }
        } else if n == '\\' {
            chars.next();
        } else if n == '"' {
            break;
        }
    }
}

/// Byte index of the bracket closing the one at `open`
pub fn matching_close(s: &str, open: usize) -> Option<usize> {
    let (open_c, close_c) = match s[open..].chars().next()? {
        '(' => ('(', ')'),
        '[' => ('[', ']'),
        '{' => ('{', '}'),
        '<' => ('<', '>'),
        _ => return None,
    };
    let mut depth = 0i32;
    let mut chars = s[open..].char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '"' {
            skip_string(&s[open..], i, &mut chars);
        } else if c == open_c {
            depth += 1;
        } else if c == close_c {
            depth -= 1;
            if depth == 0 {
                return Some(open + i);
            }
        }
    }
    None
}

/// Split `Type name` at the last whitespace outside generic brackets
pub fn split_type_and_name(s: &str) -> Option<(&str, &str)> {
    let s = s.trim();
    let mut depth = 0i32;
    let mut split = None;
    for (i, c) in s.char_indices() {
        match c {
            '<' | '(' | '[' => depth += 1,
            '>' | ')' | ']' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => split = Some(i),
            _ => {}
        }
    }
    let at = split?;
    let (ty, name) = (s[..at].trim(), s[at..].trim());
    if ty.is_empty() || name.is_empty() {
        None
    } else {
        Some((ty, name))
    }
}

/// Remove leading modifier keywords, returning them and the remainder
pub fn take_modifiers(s: &str) -> (Vec<String>, &str) {
    let mut modifiers = Vec::new();
    let mut rest = s.trim_start();
    loop {
        let word_len = rest
            .find(|c: char| !c.is_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        let word = &rest[..word_len];
        let followed_by_space = rest[word_len..].starts_with(char::is_whitespace);
        if word_len > 0 && followed_by_space && MODIFIERS.contains(&word) {
            modifiers.push(word.to_string());
            rest = rest[word_len..].trim_start();
        } else {
            return (modifiers, rest);
        }
    }
}

/// Remove leading `[...]` attribute sections, returning their inner text
pub fn take_attribute_sections(s: &str) -> (Vec<&str>, &str) {
    let mut sections = Vec::new();
    let mut rest = s.trim_start();
    while rest.starts_with('[') {
        match matching_close(rest, 0) {
            Some(close) => {
                sections.push(&rest[1..close]);
                rest = rest[close + 1..].trim_start();
            }
            None => break,
        }
    }
    (sections, rest)
}

/// Drop `//` and `/* */` comments outside string literals
pub fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices().peekable();
    let mut in_string = false;
    while let Some((i, c)) = chars.next() {
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some((_, escaped)) = chars.next() {
                    out.push(escaped);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
        } else if s[i..].starts_with("//") {
            while chars.peek().is_some_and(|(_, n)| *n != '\n') {
                chars.next();
            }
        } else if s[i..].starts_with("/*") {
            let stop = s[i + 2..].find("*/").map(|end| i + 2 + end + 2).unwrap_or(s.len());
            while chars.peek().is_some_and(|(j, _)| *j < stop) {
                chars.next();
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_top_level_respects_nesting_and_strings() {
        assert_eq!(
            split_top_level(r#"Dictionary<string, int> a, "x, y", f(1, 2)"#, ','),
            vec!["Dictionary<string, int> a", r#" "x, y""#, " f(1, 2)"]
        );
    }

    #[test]
    fn test_split_type_and_name() {
        assert_eq!(
            split_type_and_name("ICollection<bool?> Values"),
            Some(("ICollection<bool?>", "Values"))
        );
        assert_eq!(split_type_and_name("Dictionary<string, int>  Map"), Some(("Dictionary<string, int>", "Map")));
        assert_eq!(split_type_and_name("Lonely"), None);
    }

    #[test]
    fn test_take_modifiers_and_attributes() {
        let (mods, rest) = take_modifiers("public static Task<int> Count");
        assert_eq!(mods, vec!["public", "static"]);
        assert_eq!(rest, "Task<int> Count");

        let (attrs, rest) = take_attribute_sections("[Inject] [A(\"]\")] IWeatherService weather");
        assert_eq!(attrs, vec!["Inject", "A(\"]\")"]);
        assert_eq!(rest, "IWeatherService weather");
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("int /* x */ y // tail\nz").trim(), "int   y \nz");
        assert_eq!(strip_comments(r#""//not a comment""#), r#""//not a comment""#);
    }
}
