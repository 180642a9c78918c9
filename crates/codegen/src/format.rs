//! C# source normalization
//!
//! Generated C# is written without regard for indentation and then passed
//! through [`format_csharp`], which re-indents by brace depth, strips trailing
//! whitespace and collapses runs of blank lines. Braces inside string and
//! character literals and comments do not count.

const INDENT: &str = "    ";

/// Re-indent C# source by brace depth
pub fn format_csharp(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + source.len() / 4);
    let mut depth: usize = 0;
    let mut pending_blank = false;
    let mut previous_opened = true;
    let mut in_block_comment = false;

    for raw in source.lines() {
        let line = raw.trim();
        if line.is_empty() {
            pending_blank = true;
            continue;
        }

        let scan = scan_braces(line, in_block_comment);
        in_block_comment = scan.ends_in_block_comment;

        let line_depth = depth.saturating_sub(scan.leading_closes);
        if pending_blank && !previous_opened && scan.leading_closes == 0 {
            out.push('\n');
        }
        pending_blank = false;

        // continuation lines of a fluent chain sit one level deeper
        let extra = usize::from(line.starts_with('.') || line.starts_with("=>") || line.starts_with(": "));
        for _ in 0..line_depth + extra {
            out.push_str(INDENT);
        }
        out.push_str(line);
        out.push('\n');

        depth = (depth + scan.opens).saturating_sub(scan.closes);
        previous_opened = scan.opens > scan.closes || line.ends_with('{');
    }
    out
}

#[derive(Debug, Default)]
struct BraceScan {
    opens: usize,
    closes: usize,
    /// Closing braces before any other code on the line
    leading_closes: usize,
    ends_in_block_comment: bool,
}

fn scan_braces(line: &str, mut in_block_comment: bool) -> BraceScan {
    let mut scan = BraceScan::default();
    let mut leading = true;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_block_comment {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block_comment = false;
            }
            continue;
        }
        match c {
            '/' if chars.peek() == Some(&'/') => break,
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                in_block_comment = true;
            }
            '@' if chars.peek() == Some(&'"') => {
                chars.next();
                leading = false;
                // verbatim string: "" is an escaped quote
                while let Some(s) = chars.next() {
                    if s == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
            }
            '"' | '\'' => {
                leading = false;
                while let Some(s) = chars.next() {
                    if s == '\\' {
                        chars.next();
                    } else if s == c {
                        break;
                    }
                }
            }
            '{' => {
                leading = false;
                scan.opens += 1;
            }
            '}' => {
                if leading {
                    scan.leading_closes += 1;
                }
                scan.closes += 1;
            }
            c if c.is_whitespace() => {}
            _ => leading = false,
        }
    }
    scan.ends_in_block_comment = in_block_comment;
    scan
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_indents_by_depth() {
        let source = "namespace A\n{\npublic class B\n{\npublic int C { get; set; }\n}\n}\n";
        assert_eq!(
            format_csharp(source),
            "namespace A\n{\n    public class B\n    {\n        public int C { get; set; }\n    }\n}\n"
        );
    }

    #[test]
    fn test_collapses_blank_lines_and_trailing_whitespace() {
        let source = "class A   \n{\n\n\nint x;   \n\n\n\nint y;\n\n}\n";
        assert_eq!(format_csharp(source), "class A\n{\n    int x;\n\n    int y;\n}\n");
    }

    #[test]
    fn test_braces_in_literals_and_comments_ignored() {
        let source = "class A\n{\nstring s = \"{ not a block\";\nchar c = '{';\nstring v = @\"}\"\"\";\n// }\n/* { */\nint x;\n}\n";
        let formatted = format_csharp(source);
        assert!(formatted.contains("\n    int x;\n"));
        assert!(formatted.ends_with("}\n"));
    }

    #[test]
    fn test_fluent_continuations() {
        let source = "void M()\n{\nvar x = items\n.Where(i => i)\n.ToList();\n}\n";
        assert_eq!(
            format_csharp(source),
            "void M()\n{\n    var x = items\n        .Where(i => i)\n        .ToList();\n}\n"
        );
    }

    #[test]
    fn test_idempotent() {
        let source = "namespace A\n{\nclass B\n{\nvoid M()\n{\nif (x) { y(); }\n}\n}\n}\n";
        let once = format_csharp(source);
        assert_eq!(format_csharp(&once), once);
    }
}
