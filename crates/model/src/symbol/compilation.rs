//! Binding parsed declarations into a symbol table

use std::collections::HashMap;
use std::sync::Arc;

use coalesce_core::{CoalesceError, CoalesceResult, PrimitiveKind, TypeKind};
use tracing::debug;

use super::expr::ArgExpr;
use super::syntax::{self, AttributeSyntax, MethodDecl, PropertyDecl, TypeDecl};
use super::type_syntax::TypeSyntax;
use super::SymbolTypeInfo;
use crate::type_view_model::TypeViewModel;
use crate::well_known::{self, names};

/// Namespaces an SDK-style project imports implicitly
const IMPLICIT_USINGS: &[&str] = &[
    "System",
    "System.Collections.Generic",
    "System.IO",
    "System.Linq",
    "System.Net.Http",
    "System.Threading",
    "System.Threading.Tasks",
];

// ============================================================================
// Bound symbols
// ============================================================================

/// A resolved type reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolType {
    Named { name: String, args: Vec<SymbolType> },
    Array(Box<SymbolType>),
    TypeParameter(String),
}

impl SymbolType {
    pub fn named(name: &str) -> Self {
        SymbolType::Named {
            name: name.to_string(),
            args: Vec::new(),
        }
    }

    pub fn substitute(&self, params: &[String], args: &[SymbolType]) -> SymbolType {
        match self {
            SymbolType::TypeParameter(name) => params
                .iter()
                .position(|p| p == name)
                .and_then(|i| args.get(i).cloned())
                .unwrap_or_else(|| self.clone()),
            SymbolType::Named { name, args: inner } => SymbolType::Named {
                name: name.clone(),
                args: inner.iter().map(|a| a.substitute(params, args)).collect(),
            },
            SymbolType::Array(element) => SymbolType::Array(Box::new(element.substitute(params, args))),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BoundValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Enum { type_name: String, member: String },
    Type(SymbolType),
    Array(Vec<BoundValue>),
}

#[derive(Debug, Clone)]
pub struct BoundAttribute {
    pub name: String,
    pub args: Vec<BoundValue>,
    pub named: Vec<(String, BoundValue)>,
}

#[derive(Debug, Clone)]
pub struct BoundProperty {
    pub name: String,
    pub ty: SymbolType,
    pub has_getter: bool,
    pub has_setter: bool,
    pub is_init_only: bool,
    pub is_static: bool,
    pub attributes: Vec<BoundAttribute>,
}

#[derive(Debug, Clone)]
pub struct BoundParameter {
    pub name: String,
    pub ty: SymbolType,
    pub is_out: bool,
    pub is_ref: bool,
    pub default_value: Option<BoundValue>,
    pub attributes: Vec<BoundAttribute>,
}

#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub name: String,
    pub return_type: SymbolType,
    pub parameters: Vec<BoundParameter>,
    pub is_static: bool,
    pub attributes: Vec<BoundAttribute>,
}

#[derive(Debug, Clone)]
pub struct BoundEnumMember {
    pub name: String,
    pub value: i64,
    pub attributes: Vec<BoundAttribute>,
}

/// A declared type after binding
#[derive(Debug, Clone)]
pub struct BoundType {
    pub full_name: String,
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    pub type_parameters: Vec<String>,
    pub is_abstract: bool,
    /// Base class and interfaces, as written
    pub bases: Vec<SymbolType>,
    pub attributes: Vec<BoundAttribute>,
    pub properties: Vec<BoundProperty>,
    pub methods: Vec<BoundMethod>,
    pub enum_members: Vec<BoundEnumMember>,
    pub path: String,
}

// ============================================================================
// Compilation
// ============================================================================

/// Every type declared by a set of C# source files, bound
#[derive(Debug, Default)]
pub struct Compilation {
    types: HashMap<String, BoundType>,
    order: Vec<String>,
}

impl Compilation {
    /// Parse and bind `(path, text)` sources. Fails on the first syntax error
    /// or unresolvable member type.
    pub fn from_sources<I, P, S>(sources: I) -> CoalesceResult<Arc<Compilation>>
    where
        I: IntoIterator<Item = (P, S)>,
        P: AsRef<str>,
        S: AsRef<str>,
    {
        let mut decls: Vec<TypeDecl> = Vec::new();
        let mut global_usings: Vec<String> = IMPLICIT_USINGS.iter().map(|s| s.to_string()).collect();
        for (path, text) in sources {
            let file = syntax::parse_source(path.as_ref(), text.as_ref())?;
            global_usings.extend(file.global_usings);
            decls.extend(file.types);
        }

        // partial declarations merge into the first one seen
        let mut merged: Vec<TypeDecl> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for decl in decls {
            let full_name = decl.full_name();
            match positions.get(&full_name) {
                Some(&at) => {
                    let existing = &mut merged[at];
                    existing.attributes.extend(decl.attributes);
                    existing.bases.extend(decl.bases);
                    existing.properties.extend(decl.properties);
                    existing.methods.extend(decl.methods);
                    existing.enum_members.extend(decl.enum_members);
                    existing.modifiers.extend(decl.modifiers);
                }
                None => {
                    positions.insert(full_name, merged.len());
                    merged.push(decl);
                }
            }
        }

        let declared: HashMap<String, TypeKind> =
            merged.iter().map(|d| (d.full_name(), d.kind)).collect();

        let mut compilation = Compilation::default();
        for decl in &merged {
            let bound = Binder::new(&declared, decl, &global_usings).bind_type(decl)?;
            compilation.order.push(bound.full_name.clone());
            compilation.types.insert(bound.full_name.clone(), bound);
        }
        debug!(types = compilation.order.len(), "Bound compilation");
        Ok(Arc::new(compilation))
    }

    pub fn get(&self, full_name: &str) -> Option<&BoundType> {
        self.types.get(full_name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Declared types in declaration order
    pub fn types(&self) -> impl Iterator<Item = &BoundType> {
        self.order.iter().filter_map(|n| self.types.get(n))
    }

    /// A view model for every declared type
    pub fn all_types(self: &Arc<Self>) -> Vec<TypeViewModel> {
        self.order
            .iter()
            .map(|n| TypeViewModel::new(SymbolTypeInfo::new(self, SymbolType::named(n))))
            .collect()
    }
}

// ============================================================================
// Binder
// ============================================================================

struct Binder<'a> {
    declared: &'a HashMap<String, TypeKind>,
    namespace: String,
    containing: Vec<String>,
    usings: Vec<String>,
    type_parameters: Vec<String>,
    path: String,
    context: String,
}

impl<'a> Binder<'a> {
    fn new(declared: &'a HashMap<String, TypeKind>, decl: &TypeDecl, global_usings: &[String]) -> Self {
        let mut containing = Vec::new();
        let mut prefix = decl.namespace.clone();
        for outer in &decl.containing_types {
            prefix = if prefix.is_empty() {
                outer.clone()
            } else {
                format!("{}.{}", prefix, outer)
            };
            containing.push(prefix.clone());
        }
        containing.push(decl.full_name());
        containing.reverse();

        let mut usings = decl.usings.clone();
        usings.extend(global_usings.iter().cloned());

        Self {
            declared,
            namespace: decl.namespace.clone(),
            containing,
            usings,
            type_parameters: decl.type_parameters.clone(),
            path: decl.path.clone(),
            context: decl.full_name(),
        }
    }

    fn exists(&self, full_name: &str) -> bool {
        self.declared.contains_key(full_name) || well_known::is_known(full_name)
    }

    fn is_value_type(&self, ty: &SymbolType) -> bool {
        match ty {
            SymbolType::Named { name, .. } => match self.declared.get(name) {
                Some(kind) => kind.is_value_type(),
                None => well_known::lookup(name).is_some_and(|w| w.kind.is_value_type()),
            },
            _ => false,
        }
    }

    fn resolve_name(&self, name: &str) -> Option<String> {
        if let Some(kind) = PrimitiveKind::all().iter().find(|k| k.keyword() == Some(name)) {
            return Some(kind.full_name().to_string());
        }
        let candidates = self
            .containing
            .iter()
            .map(|c| format!("{}.{}", c, name))
            .chain(namespace_chain(&self.namespace).map(|ns| {
                if ns.is_empty() {
                    name.to_string()
                } else {
                    format!("{}.{}", ns, name)
                }
            }))
            .chain(self.usings.iter().map(|u| format!("{}.{}", u, name)));
        for candidate in candidates {
            if self.exists(&candidate) {
                return Some(candidate);
            }
        }
        self.exists(name).then(|| name.to_string())
    }

    fn bind(&self, syntax: &TypeSyntax, member: &str) -> CoalesceResult<SymbolType> {
        self.try_bind(syntax).ok_or_else(|| CoalesceError::SymbolResolution {
            name: syntax.to_string(),
            context: format!("{} ({})", member, self.path),
        })
    }

    fn try_bind(&self, syntax: &TypeSyntax) -> Option<SymbolType> {
        match syntax {
            TypeSyntax::Named { name, args } => {
                if args.is_empty() && self.type_parameters.contains(name) {
                    return Some(SymbolType::TypeParameter(name.clone()));
                }
                let resolved = self.resolve_name(name)?;
                let args = args.iter().map(|a| self.try_bind(a)).collect::<Option<Vec<_>>>()?;
                Some(SymbolType::Named { name: resolved, args })
            }
            TypeSyntax::Nullable(inner) => {
                let inner = self.try_bind(inner)?;
                if self.is_value_type(&inner) {
                    Some(SymbolType::Named {
                        name: names::NULLABLE.to_string(),
                        args: vec![inner],
                    })
                } else {
                    Some(inner)
                }
            }
            TypeSyntax::Array(inner) => Some(SymbolType::Array(Box::new(self.try_bind(inner)?))),
        }
    }

    fn bind_value(&self, expr: &ArgExpr) -> BoundValue {
        match expr {
            ArgExpr::Null => BoundValue::Null,
            ArgExpr::Bool(b) => BoundValue::Bool(*b),
            ArgExpr::Int(i) => BoundValue::Int(*i),
            ArgExpr::Float(f) => BoundValue::Float(*f),
            ArgExpr::String(s) => BoundValue::String(s.clone()),
            ArgExpr::TypeOf(ty) => BoundValue::Type(self.try_bind(ty).unwrap_or_else(|| {
                debug!(ty = %ty, context = %self.context, "typeof argument names an unknown type");
                SymbolType::named(&ty.to_string())
            })),
            ArgExpr::Member { type_name, member } => BoundValue::Enum {
                type_name: type_name.clone(),
                member: member.clone(),
            },
            ArgExpr::Array(items) => BoundValue::Array(items.iter().map(|i| self.bind_value(i)).collect()),
            ArgExpr::Unsupported(text) => {
                debug!(expr = %text, context = %self.context, "Unsupported constant expression");
                BoundValue::Null
            }
        }
    }

    fn bind_attributes(&self, attributes: &[AttributeSyntax]) -> Vec<BoundAttribute> {
        attributes
            .iter()
            .map(|a| BoundAttribute {
                name: a.name.clone(),
                args: a.args.iter().map(|v| self.bind_value(v)).collect(),
                named: a
                    .named
                    .iter()
                    .map(|(k, v)| (k.clone(), self.bind_value(v)))
                    .collect(),
            })
            .collect()
    }

    fn bind_type(&self, decl: &TypeDecl) -> CoalesceResult<BoundType> {
        let bases = decl
            .bases
            .iter()
            .map(|b| self.bind(b, "base list"))
            .collect::<CoalesceResult<Vec<_>>>()?;

        let properties = decl
            .properties
            .iter()
            .map(|p| self.bind_property(decl, p))
            .collect::<CoalesceResult<Vec<_>>>()?;

        let methods = decl
            .methods
            .iter()
            .map(|m| self.bind_method(decl, m))
            .collect::<CoalesceResult<Vec<_>>>()?;

        let mut next_value = 0i64;
        let enum_members = decl
            .enum_members
            .iter()
            .map(|e| {
                let value = match &e.value {
                    Some(ArgExpr::Int(v)) => *v,
                    _ => next_value,
                };
                next_value = value + 1;
                BoundEnumMember {
                    name: e.name.clone(),
                    value,
                    attributes: self.bind_attributes(&e.attributes),
                }
            })
            .collect();

        Ok(BoundType {
            full_name: decl.full_name(),
            namespace: decl.namespace.clone(),
            name: decl.name.clone(),
            kind: decl.kind,
            type_parameters: decl.type_parameters.clone(),
            is_abstract: decl.is_abstract(),
            bases,
            attributes: self.bind_attributes(&decl.attributes),
            properties,
            methods,
            enum_members,
            path: decl.path.clone(),
        })
    }

    fn bind_property(&self, decl: &TypeDecl, p: &PropertyDecl) -> CoalesceResult<BoundProperty> {
        Ok(BoundProperty {
            name: p.name.clone(),
            ty: self.bind(&p.ty, &format!("{}.{}", decl.name, p.name))?,
            has_getter: p.has_getter,
            has_setter: p.has_setter,
            is_init_only: p.is_init_only,
            is_static: p.modifiers.iter().any(|m| m == "static"),
            attributes: self.bind_attributes(&p.attributes),
        })
    }

    fn bind_method(&self, decl: &TypeDecl, m: &MethodDecl) -> CoalesceResult<BoundMethod> {
        let mut scoped = Binder {
            declared: self.declared,
            namespace: self.namespace.clone(),
            containing: self.containing.clone(),
            usings: self.usings.clone(),
            type_parameters: self.type_parameters.clone(),
            path: self.path.clone(),
            context: format!("{}.{}", decl.name, m.name),
        };
        scoped.type_parameters.extend(m.type_parameters.iter().cloned());

        let member = scoped.context.clone();
        let parameters = m
            .parameters
            .iter()
            .map(|p| -> CoalesceResult<BoundParameter> {
                Ok(BoundParameter {
                    name: p.name.clone(),
                    ty: scoped.bind(&p.ty, &member)?,
                    is_out: p.modifiers.iter().any(|x| x == "out"),
                    is_ref: p.modifiers.iter().any(|x| x == "ref"),
                    default_value: p.default_value.as_ref().map(|v| scoped.bind_value(v)),
                    attributes: scoped.bind_attributes(&p.attributes),
                })
            })
            .collect::<CoalesceResult<Vec<_>>>()?;

        Ok(BoundMethod {
            name: m.name.clone(),
            return_type: scoped.bind(&m.return_type, &member)?,
            parameters,
            is_static: m.modifiers.iter().any(|x| x == "static"),
            attributes: scoped.bind_attributes(&m.attributes),
        })
    }
}

/// `A.B.C`, `A.B`, `A`, then the global namespace
fn namespace_chain(namespace: &str) -> impl Iterator<Item = String> + '_ {
    let mut current = Some(namespace.to_string());
    std::iter::from_fn(move || {
        let this = current.take()?;
        current = if this.is_empty() {
            None
        } else {
            Some(this.rsplit_once('.').map(|(head, _)| head.to_string()).unwrap_or_default())
        };
        Some(this)
    })
}

// ============================================================================
// Tests
// ============================================================================
