//! Declaration extraction from C# source
//!
//! tree-sitter locates namespaces, type declarations, members and attribute
//! sections; the fragments between them are read with the helpers in
//! [`super::text`].

use coalesce_core::{CoalesceError, CoalesceResult, TypeKind};
use tree_sitter::{Node, Parser};

use super::expr::ArgExpr;
use super::text::{
    matching_close, split_top_level, split_type_and_name, strip_comments, take_attribute_sections,
    take_modifiers,
};
use super::type_syntax::TypeSyntax;

// ============================================================================
// Declarations
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSyntax {
    pub name: String,
    pub args: Vec<ArgExpr>,
    pub named: Vec<(String, ArgExpr)>,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub name: String,
    pub ty: TypeSyntax,
    pub modifiers: Vec<String>,
    pub has_getter: bool,
    pub has_setter: bool,
    pub is_init_only: bool,
    pub attributes: Vec<AttributeSyntax>,
}

#[derive(Debug, Clone)]
pub struct ParameterDecl {
    pub name: String,
    pub ty: TypeSyntax,
    /// `out`, `ref`, `in`, `params`, `this`
    pub modifiers: Vec<String>,
    pub default_value: Option<ArgExpr>,
    pub attributes: Vec<AttributeSyntax>,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub return_type: TypeSyntax,
    pub modifiers: Vec<String>,
    pub type_parameters: Vec<String>,
    pub parameters: Vec<ParameterDecl>,
    pub attributes: Vec<AttributeSyntax>,
}

#[derive(Debug, Clone)]
pub struct EnumMemberDecl {
    pub name: String,
    pub value: Option<ArgExpr>,
    pub attributes: Vec<AttributeSyntax>,
}

/// One type declaration with the scope it was declared in
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub namespace: String,
    /// Names of enclosing types, outermost first
    pub containing_types: Vec<String>,
    pub name: String,
    pub kind: TypeKind,
    pub modifiers: Vec<String>,
    pub type_parameters: Vec<String>,
    pub bases: Vec<TypeSyntax>,
    pub attributes: Vec<AttributeSyntax>,
    pub properties: Vec<PropertyDecl>,
    pub methods: Vec<MethodDecl>,
    pub enum_members: Vec<EnumMemberDecl>,
    /// `using` namespaces in effect at the declaration
    pub usings: Vec<String>,
    pub path: String,
}

impl TypeDecl {
    pub fn full_name(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.namespace.is_empty() {
            parts.push(&self.namespace);
        }
        parts.extend(self.containing_types.iter().map(String::as_str));
        parts.push(&self.name);
        parts.join(".")
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.iter().any(|m| m == "abstract")
    }
}

/// Everything read from one source file
#[derive(Debug, Clone, Default)]
pub struct SourceFile {
    pub path: String,
    pub global_usings: Vec<String>,
    pub types: Vec<TypeDecl>,
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse one C# file into declarations
pub fn parse_source(path: &str, text: &str) -> CoalesceResult<SourceFile> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
        .map_err(|e| CoalesceError::internal(format!("C# grammar unavailable: {}", e)))?;
    let tree = parser
        .parse(text, None)
        .ok_or_else(|| CoalesceError::parse(path, "parser produced no tree"))?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error(root).map(|n| n.start_position().row + 1).unwrap_or(1);
        return Err(CoalesceError::parse(path, format!("syntax error near line {}", line)));
    }

    let mut walker = Walker {
        src: text,
        path,
        file: SourceFile {
            path: path.to_string(),
            ..SourceFile::default()
        },
    };
    walker.walk_container(root, Scope::default());
    Ok(walker.file)
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children.into_iter().filter(|c| c.has_error()).find_map(first_error)
}

#[derive(Debug, Clone, Default)]
struct Scope {
    namespace: String,
    usings: Vec<String>,
    containing_types: Vec<String>,
}

impl Scope {
    fn nested_namespace(&self, name: &str) -> Scope {
        let namespace = if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.namespace, name)
        };
        Scope {
            namespace,
            ..self.clone()
        }
    }
}

struct Walker<'a> {
    src: &'a str,
    path: &'a str,
    file: SourceFile,
}

const TYPE_DECLARATIONS: &[&str] = &[
    "class_declaration",
    "struct_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "record_struct_declaration",
];

const BODIES: &[&str] = &["declaration_list", "enum_member_declaration_list"];

impl<'a> Walker<'a> {
    fn text(&self, node: Node<'_>) -> &'a str {
        &self.src[node.start_byte()..node.end_byte()]
    }

    fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        node.children(&mut cursor).collect()
    }

    fn walk_container(&mut self, node: Node<'_>, mut scope: Scope) {
        for child in Self::children(node) {
            match child.kind() {
                "using_directive" => self.using_directive(child, &mut scope),
                "namespace_declaration" => {
                    let name = self.namespace_name(child);
                    let inner = scope.nested_namespace(&name);
                    if let Some(body) = child
                        .child_by_field_name("body")
                        .or_else(|| Self::children(child).into_iter().find(|c| c.kind() == "declaration_list"))
                    {
                        self.walk_container(body, inner);
                    }
                }
                "file_scoped_namespace_declaration" => {
                    let name = self.namespace_name(child);
                    scope = scope.nested_namespace(&name);
                    self.walk_container(child, scope.clone());
                }
                kind if TYPE_DECLARATIONS.contains(&kind) => self.type_declaration(child, &scope),
                _ => {}
            }
        }
    }

    fn using_directive(&mut self, node: Node<'_>, scope: &mut Scope) {
        let text = strip_comments(self.text(node));
        let mut rest = text.trim().trim_end_matches(';').trim();
        let global = rest.starts_with("global ");
        if global {
            rest = rest["global ".len()..].trim_start();
        }
        let Some(rest) = rest.strip_prefix("using") else {
            return;
        };
        let rest = rest.trim();
        if rest.starts_with("static ") || rest.contains('=') {
            return;
        }
        let namespace = rest.trim_start_matches("global::").to_string();
        if global {
            self.file.global_usings.push(namespace);
        } else {
            scope.usings.push(namespace);
        }
    }

    fn namespace_name(&self, node: Node<'_>) -> String {
        if let Some(name) = node.child_by_field_name("name") {
            return self.text(name).trim().to_string();
        }
        let text = self.text(node);
        let end = text.find(['{', ';']).unwrap_or(text.len());
        text[..end].trim().trim_start_matches("namespace").trim().to_string()
    }

    /// Attribute sections on a declaration node and the header text between
    /// them and the first child whose kind is in `stops`
    fn header(&self, node: Node<'_>, stops: &[&str]) -> (Vec<AttributeSyntax>, String) {
        let children = Self::children(node);
        let mut attributes = Vec::new();
        let mut start = node.start_byte();
        for child in &children {
            if child.kind() == "attribute_list" {
                attributes.extend(parse_attribute_section(self.text(*child)));
                start = child.end_byte();
            }
        }
        let end = children
            .iter()
            .find(|c| stops.contains(&c.kind()) && c.start_byte() >= start)
            .map(|c| c.start_byte())
            .unwrap_or(node.end_byte());
        (attributes, strip_comments(&self.src[start..end.max(start)]))
    }

    fn type_declaration(&mut self, node: Node<'_>, scope: &Scope) {
        let (attributes, header) = self.header(node, BODIES);
        let Some(head) = parse_type_header(&header) else {
            tracing::debug!(path = self.path, header = header.trim(), "Skipping unreadable type header");
            return;
        };

        let body = node
            .child_by_field_name("body")
            .filter(|b| BODIES.contains(&b.kind()))
            .or_else(|| Self::children(node).into_iter().find(|c| BODIES.contains(&c.kind())));

        let mut decl = TypeDecl {
            namespace: scope.namespace.clone(),
            containing_types: scope.containing_types.clone(),
            name: head.name.clone(),
            kind: head.kind,
            modifiers: head.modifiers,
            type_parameters: head.type_parameters,
            bases: head.bases,
            attributes,
            properties: Vec::new(),
            methods: Vec::new(),
            enum_members: Vec::new(),
            usings: scope.usings.clone(),
            path: self.path.to_string(),
        };

        let mut nested = Vec::new();
        if let Some(body) = body {
            let implicit_public = decl.kind == TypeKind::Interface;
            for member in Self::children(body) {
                match member.kind() {
                    "property_declaration" => {
                        if let Some(p) = self.property(member, implicit_public) {
                            decl.properties.push(p);
                        }
                    }
                    "method_declaration" => {
                        if let Some(m) = self.method(member, implicit_public) {
                            decl.methods.push(m);
                        }
                    }
                    "enum_member_declaration" => {
                        if let Some(e) = self.enum_member(member) {
                            decl.enum_members.push(e);
                        }
                    }
                    kind if TYPE_DECLARATIONS.contains(&kind) => nested.push(member),
                    _ => {}
                }
            }
        }

        let mut inner_scope = scope.clone();
        inner_scope.containing_types.push(head.name);
        self.file.types.push(decl);
        for member in nested {
            self.type_declaration(member, &inner_scope);
        }
    }

    fn property(&self, node: Node<'_>, implicit_public: bool) -> Option<PropertyDecl> {
        let (attributes, header) = self.header(node, &["accessor_list", "arrow_expression_clause"]);
        let (modifiers, rest) = take_modifiers(&header);
        if !is_public(&modifiers, implicit_public) {
            return None;
        }
        let (ty, name) = split_type_and_name(rest)?;
        let ty = TypeSyntax::parse(ty)?;

        let children = Self::children(node);
        let (has_getter, has_setter, is_init_only) =
            match children.iter().find(|c| c.kind() == "accessor_list") {
                Some(list) => read_accessors(self.text(*list)),
                None => (true, false, false),
            };

        Some(PropertyDecl {
            name: name.to_string(),
            ty,
            modifiers,
            has_getter,
            has_setter,
            is_init_only,
            attributes,
        })
    }

    fn method(&self, node: Node<'_>, implicit_public: bool) -> Option<MethodDecl> {
        let (attributes, header) = self.header(node, &["parameter_list"]);
        let (modifiers, rest) = take_modifiers(&header);
        if !is_public(&modifiers, implicit_public) {
            return None;
        }
        let (ty, name) = split_type_and_name(rest)?;
        let (name, type_parameters) = match name.find('<') {
            Some(open) => (
                &name[..open],
                split_top_level(name[open + 1..].trim_end_matches('>'), ',')
                    .into_iter()
                    .map(|p| p.trim().to_string())
                    .collect(),
            ),
            None => (name, Vec::new()),
        };
        if name.contains('.') {
            // explicit interface implementation
            return None;
        }
        let return_type = TypeSyntax::parse(ty)?;

        let list = Self::children(node)
            .into_iter()
            .find(|c| c.kind() == "parameter_list")?;
        let list_text = strip_comments(self.text(list));
        let inner = list_text.trim().trim_start_matches('(').trim_end_matches(')');
        let mut parameters = Vec::new();
        if !inner.trim().is_empty() {
            for raw in split_top_level(inner, ',') {
                parameters.push(parse_parameter(raw)?);
            }
        }

        Some(MethodDecl {
            name: name.to_string(),
            return_type,
            modifiers,
            type_parameters,
            parameters,
            attributes,
        })
    }

    fn enum_member(&self, node: Node<'_>) -> Option<EnumMemberDecl> {
        let (attributes, header) = self.header(node, &[]);
        let header = header.trim().trim_end_matches(',');
        let (name, value) = match header.split_once('=') {
            Some((name, value)) => (name.trim(), Some(ArgExpr::parse(value))),
            None => (header.trim(), None),
        };
        if name.is_empty() {
            return None;
        }
        Some(EnumMemberDecl {
            name: name.to_string(),
            value,
            attributes,
        })
    }
}

fn is_public(modifiers: &[String], implicit_public: bool) -> bool {
    if modifiers.iter().any(|m| m == "public") {
        return true;
    }
    implicit_public && !modifiers.iter().any(|m| m == "private" || m == "protected" || m == "internal")
}

/// `(has_getter, has_setter, is_init_only)` for public accessors
fn read_accessors(list: &str) -> (bool, bool, bool) {
    let list = strip_comments(list);
    let inner = list.trim().trim_start_matches('{').trim_end_matches('}');
    let mut getter = false;
    let mut setter = false;
    let mut init = false;
    let mut rest = inner;
    while !rest.trim().is_empty() {
        let (_, after_attrs) = take_attribute_sections(rest);
        let (modifiers, after_mods) = take_modifiers(after_attrs);
        let keyword_len = after_mods
            .find(|c: char| !c.is_alphanumeric())
            .unwrap_or(after_mods.len());
        let keyword = &after_mods[..keyword_len];
        let public = !modifiers
            .iter()
            .any(|m| m == "private" || m == "protected" || m == "internal");
        match keyword {
            "get" => getter |= public,
            "set" => setter |= public,
            "init" => {
                setter |= public;
                init |= public;
            }
            _ => break,
        }
        let after = after_mods[keyword_len..].trim_start();
        rest = if after.starts_with('{') {
            match matching_close(after, 0) {
                Some(close) => &after[close + 1..],
                None => "",
            }
        } else {
            match after.find(';') {
                Some(semi) => &after[semi + 1..],
                None => "",
            }
        };
    }
    (getter, setter, init)
}

fn parse_parameter(raw: &str) -> Option<ParameterDecl> {
    let (sections, rest) = take_attribute_sections(raw);
    let attributes = sections.into_iter().flat_map(parse_attribute_list_inner).collect();

    let mut modifiers = Vec::new();
    let mut rest = rest.trim_start();
    for keyword in ["this", "params", "scoped", "ref", "out", "in", "readonly"] {
        if let Some(after) = rest.strip_prefix(keyword) {
            if after.starts_with(char::is_whitespace) {
                modifiers.push(keyword.to_string());
                rest = after.trim_start();
            }
        }
    }

    let parts = split_top_level(rest, '=');
    let (decl, default_value) = match parts.as_slice() {
        [decl] => (*decl, None),
        [decl, value] => (*decl, Some(ArgExpr::parse(value))),
        _ => return None,
    };
    let (ty, name) = split_type_and_name(decl)?;
    Some(ParameterDecl {
        name: name.to_string(),
        ty: TypeSyntax::parse(ty)?,
        modifiers,
        default_value,
        attributes,
    })
}

// ============================================================================
// Headers & attributes
// ============================================================================

struct TypeHeader {
    kind: TypeKind,
    name: String,
    modifiers: Vec<String>,
    type_parameters: Vec<String>,
    bases: Vec<TypeSyntax>,
}

fn parse_type_header(header: &str) -> Option<TypeHeader> {
    let (modifiers, rest) = take_modifiers(header);
    let (keyword, mut rest) = rest.trim_start().split_once(char::is_whitespace)?;
    let kind = match keyword {
        "class" => TypeKind::Class,
        "interface" => TypeKind::Interface,
        "enum" => TypeKind::Enum,
        "struct" => TypeKind::Struct,
        "record" => {
            let trimmed = rest.trim_start();
            if let Some(after) = trimmed.strip_prefix("struct ") {
                rest = after;
                TypeKind::Struct
            } else {
                rest = trimmed.strip_prefix("class ").unwrap_or(trimmed);
                TypeKind::Class
            }
        }
        _ => return None,
    };

    let rest = rest.trim_start();
    let name_len = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let name = rest[..name_len].to_string();
    let mut rest = rest[name_len..].trim_start();

    let mut type_parameters = Vec::new();
    if rest.starts_with('<') {
        let close = matching_close(rest, 0)?;
        type_parameters = split_top_level(&rest[1..close], ',')
            .into_iter()
            .filter_map(|p| p.split_whitespace().last().map(str::to_string))
            .collect();
        rest = rest[close + 1..].trim_start();
    }
    if rest.starts_with('(') {
        let close = matching_close(rest, 0)?;
        rest = rest[close + 1..].trim_start();
    }

    let mut bases = Vec::new();
    if let Some(list) = rest.strip_prefix(':') {
        let list = match find_where_clause(list) {
            Some(at) => &list[..at],
            None => list,
        };
        for base in split_top_level(list, ',') {
            let base = base.trim();
            let base = match base.find('(') {
                Some(open) => &base[..open],
                None => base,
            };
            if kind != TypeKind::Enum {
                bases.push(TypeSyntax::parse(base)?);
            }
        }
    }

    Some(TypeHeader {
        kind,
        name,
        modifiers,
        type_parameters,
        bases,
    })
}

fn find_where_clause(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            _ if depth == 0 && s[i..].starts_with("where") => {
                let before = s[..i].chars().last();
                let after = s[i + 5..].chars().next();
                if before.is_some_and(char::is_whitespace) && after.is_some_and(char::is_whitespace) {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse one `[...]` section (outer brackets included)
pub fn parse_attribute_section(text: &str) -> Vec<AttributeSyntax> {
    let text = strip_comments(text);
    let (sections, _) = take_attribute_sections(&text);
    sections.into_iter().flat_map(parse_attribute_list_inner).collect()
}

fn parse_attribute_list_inner(inner: &str) -> Vec<AttributeSyntax> {
    let mut inner = inner.trim();
    // attribute target (`return:`, `property:`)
    if let Some((target, rest)) = inner.split_once(':') {
        let target = target.trim();
        if !rest.starts_with(':') && !target.is_empty() && target.chars().all(char::is_alphabetic) {
            inner = rest.trim();
        }
    }

    split_top_level(inner, ',')
        .into_iter()
        .filter_map(|attr| {
            let attr = attr.trim();
            if attr.is_empty() {
                return None;
            }
            let (name, args_text) = match attr.find(['(', '<']) {
                Some(open) if attr[open..].starts_with('(') => {
                    let close = matching_close(attr, open)?;
                    (&attr[..open], Some(&attr[open + 1..close]))
                }
                Some(open) => {
                    // generic attribute: `Restrict<T>` carries its type as `typeof(T)`
                    let close = matching_close(attr, open)?;
                    let mut syntax = AttributeSyntax {
                        name: attr[..open].trim().to_string(),
                        args: Vec::new(),
                        named: Vec::new(),
                    };
                    for ty in split_top_level(&attr[open + 1..close], ',') {
                        if let Some(ty) = TypeSyntax::parse(ty) {
                            syntax.args.push(ArgExpr::TypeOf(ty));
                        }
                    }
                    if let Some(args_open) = attr[close..].find('(') {
                        let args_open = close + args_open;
                        let args_close = matching_close(attr, args_open)?;
                        read_attribute_arguments(&attr[args_open + 1..args_close], &mut syntax);
                    }
                    return Some(syntax);
                }
                None => (attr, None),
            };
            let mut syntax = AttributeSyntax {
                name: name.trim().to_string(),
                args: Vec::new(),
                named: Vec::new(),
            };
            if let Some(args) = args_text {
                read_attribute_arguments(args, &mut syntax);
            }
            Some(syntax)
        })
        .collect()
}

fn read_attribute_arguments(args: &str, syntax: &mut AttributeSyntax) {
    if args.trim().is_empty() {
        return;
    }
    for arg in split_top_level(args, ',') {
        let arg = arg.trim();
        if let Some((key, value)) = named_argument(arg, '=') {
            syntax.named.push((key.to_string(), ArgExpr::parse(value)));
        } else if let Some((_, value)) = named_argument(arg, ':') {
            syntax.args.push(ArgExpr::parse(value));
        } else {
            syntax.args.push(ArgExpr::parse(arg));
        }
    }
}

/// `Key = value` or `key: value` where the key is a bare identifier
fn named_argument(arg: &str, sep: char) -> Option<(&str, &str)> {
    let (key, value) = arg.split_once(sep)?;
    let key = key.trim();
    let is_identifier = !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_');
    let is_operator = value.starts_with('=') || value.starts_with(':');
    (is_identifier && !is_operator).then_some((key, value))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"
using System;
using System.Collections.Generic;

namespace Demo.Models
{
    [Coalesce, Read(Roles = "Admin, User")]
    public abstract class Widget<T> : Base<T>, IThing where T : class
    {
        [Key]
        public int WidgetId { get; set; }

        [Search(SearchMethod = SearchAttribute.SearchMethods.Contains), MaxLength(50)]
        public string Name { get; private set; }

        public string Display => Name;

        public DateTime Created { get; init; }

        private int Hidden { get; set; }

        [Coalesce, Execute(Roles = "Admin")]
        public static ICollection<Widget<T>> Find(AppDbContext db, [Inject] IClock clock, out IncludeTree tree, int take = 10)
        {
            throw new NotImplementedException();
        }

        public class Nested
        {
            public int Value { get; set; }
        }
    }

    public enum Colors
    {
        Red,
        [Display(Name = "Greenish")] Green = 5,
    }

    public interface IThing
    {
        string Label { get; }
        int Count();
    }
}
"#;

    fn parsed() -> SourceFile {
        parse_source("Widget.cs", SOURCE).unwrap()
    }

    #[test]
    fn test_type_headers() {
        let file = parsed();
        let widget = file.types.iter().find(|t| t.name == "Widget").unwrap();
        assert_eq!(widget.full_name(), "Demo.Models.Widget");
        assert!(widget.is_abstract());
        assert_eq!(widget.type_parameters, vec!["T"]);
        assert_eq!(widget.bases.len(), 2);
        assert_eq!(widget.usings, vec!["System", "System.Collections.Generic"]);
        assert_eq!(widget.attributes.len(), 2);
        assert_eq!(widget.attributes[1].named[0].0, "Roles");

        let nested = file.types.iter().find(|t| t.name == "Nested").unwrap();
        assert_eq!(nested.full_name(), "Demo.Models.Widget.Nested");
    }

    #[test]
    fn test_properties_and_accessors() {
        let file = parsed();
        let widget = file.types.iter().find(|t| t.name == "Widget").unwrap();
        let names: Vec<&str> = widget.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["WidgetId", "Name", "Display", "Created"]);

        let name = &widget.properties[1];
        assert!(name.has_getter && !name.has_setter);
        assert_eq!(name.attributes[0].name, "Search");
        assert!(matches!(&name.attributes[1].args[0], ArgExpr::Int(50)));

        let display = &widget.properties[2];
        assert!(display.has_getter && !display.has_setter);

        let created = &widget.properties[3];
        assert!(created.has_setter && created.is_init_only);
    }

    #[test]
    fn test_method_parameters() {
        let file = parsed();
        let widget = file.types.iter().find(|t| t.name == "Widget").unwrap();
        let find = &widget.methods[0];
        assert_eq!(find.name, "Find");
        assert!(find.modifiers.contains(&"static".to_string()));
        assert_eq!(find.return_type.to_string(), "ICollection<Widget<T>>");
        assert_eq!(find.parameters.len(), 4);
        assert_eq!(find.parameters[1].attributes[0].name, "Inject");
        assert_eq!(find.parameters[2].modifiers, vec!["out"]);
        assert_eq!(find.parameters[3].default_value, Some(ArgExpr::Int(10)));
    }

    #[test]
    fn test_enums_and_interfaces() {
        let file = parsed();
        let colors = file.types.iter().find(|t| t.name == "Colors").unwrap();
        assert_eq!(colors.kind, TypeKind::Enum);
        assert_eq!(colors.enum_members.len(), 2);
        assert_eq!(colors.enum_members[1].value, Some(ArgExpr::Int(5)));
        assert_eq!(colors.enum_members[1].attributes[0].name, "Display");

        let thing = file.types.iter().find(|t| t.name == "IThing").unwrap();
        assert_eq!(thing.properties.len(), 1);
        assert_eq!(thing.methods.len(), 1);
    }

    #[test]
    fn test_file_scoped_namespace() {
        let file = parse_source(
            "A.cs",
            "namespace Flat.Models;\n\npublic class Thing { public int Id { get; set; } }\n",
        )
        .unwrap();
        assert_eq!(file.types[0].full_name(), "Flat.Models.Thing");
    }

    #[test]
    fn test_grammar_loads() {
        let language: tree_sitter::Language = tree_sitter_c_sharp::LANGUAGE.into();
        assert!(Parser::new().set_language(&language).is_ok());
        assert!(parse_source("Empty.cs", "namespace X { }").is_ok());
    }

    #[test]
    fn test_syntax_error_reports_line() {
        let err = parse_source("Bad.cs", "namespace X {\n public class {\n}").unwrap_err();
        assert!(err.is_modeling());
        assert!(err.to_string().contains("Bad.cs"));
    }

    #[test]
    fn test_attribute_targets_and_named_ctor_args() {
        let attrs = parse_attribute_section("[return: DefaultOrderBy(fieldOrder: 2, FieldName = nameof(Thing.Name))]");
        assert_eq!(attrs[0].name, "DefaultOrderBy");
        assert_eq!(attrs[0].args, vec![ArgExpr::Int(2)]);
        assert_eq!(attrs[0].named[0].1, ArgExpr::String("Name".into()));
    }
}
