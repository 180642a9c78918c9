//! Symbol backend
//!
//! Answers [`TypeInfo`] questions from C# source. Files are parsed with
//! tree-sitter ([`syntax`]), bound against each other and the well-known
//! framework types ([`compilation`]), and exposed through [`SymbolTypeInfo`].

pub mod compilation;
pub mod expr;
pub mod syntax;
pub mod text;
pub mod type_syntax;

use std::sync::Arc;

use coalesce_core::TypeKind;

use crate::attributes::{AttributeData, AttributeValue};
use crate::type_info::{
    Backend, EnumMember, MethodInfo, ParameterInfo, PropertyInfo, TypeInfo, TypeRef,
};
use crate::type_view_model::TypeViewModel;
use crate::well_known;

pub use compilation::{BoundAttribute, BoundType, BoundValue, Compilation, SymbolType};

/// One type occurrence bound in a [`Compilation`]
pub struct SymbolTypeInfo {
    compilation: Arc<Compilation>,
    ty: SymbolType,
}

impl SymbolTypeInfo {
    pub fn new(compilation: &Arc<Compilation>, ty: SymbolType) -> TypeRef {
        Arc::new(Self {
            compilation: Arc::clone(compilation),
            ty,
        })
    }

    fn wrap(&self, ty: SymbolType) -> TypeRef {
        Self::new(&self.compilation, ty)
    }

    fn declaration(&self) -> Option<(&BoundType, &[SymbolType])> {
        match &self.ty {
            SymbolType::Named { name, args } => {
                self.compilation.get(name).map(|t| (t, args.as_slice()))
            }
            _ => None,
        }
    }

    /// The declaration and its declared bases of the same kind, most
    /// derived first
    fn hierarchy(&self) -> Vec<(&BoundType, Vec<SymbolType>)> {
        let mut chain: Vec<(&BoundType, Vec<SymbolType>)> = Vec::new();
        let Some((decl, args)) = self.declaration() else {
            return chain;
        };
        chain.push((decl, args.to_vec()));
        let mut i = 0;
        while i < chain.len() {
            let (current, current_args) = (chain[i].0, chain[i].1.clone());
            for base in &current.bases {
                let SymbolType::Named { name, args } = base.substitute(&current.type_parameters, &current_args)
                else {
                    continue;
                };
                let Some(base_decl) = self.compilation.get(&name) else {
                    continue;
                };
                if base_decl.kind != decl.kind || chain.iter().any(|(t, _)| t.full_name == base_decl.full_name) {
                    continue;
                }
                chain.push((base_decl, args));
            }
            i += 1;
        }
        chain
    }

    fn convert_attributes(&self, attributes: &[BoundAttribute]) -> Vec<AttributeData> {
        attributes
            .iter()
            .map(|a| {
                let mut data = AttributeData::new(&a.name);
                data.args = a.args.iter().map(|v| self.convert_value(v)).collect();
                data.named = a
                    .named
                    .iter()
                    .map(|(k, v)| (k.clone(), self.convert_value(v)))
                    .collect();
                data
            })
            .collect()
    }

    fn convert_value(&self, value: &BoundValue) -> AttributeValue {
        match value {
            BoundValue::Null => AttributeValue::Null,
            BoundValue::Bool(b) => AttributeValue::Bool(*b),
            BoundValue::Int(i) => AttributeValue::Int(*i),
            BoundValue::Float(f) => AttributeValue::Float(*f),
            BoundValue::String(s) => AttributeValue::String(s.clone()),
            BoundValue::Enum { type_name, member } => AttributeValue::Enum {
                type_name: type_name.clone(),
                member: member.clone(),
            },
            BoundValue::Type(t) => AttributeValue::Type(TypeViewModel::new(self.wrap(t.clone()))),
            BoundValue::Array(items) => {
                AttributeValue::Array(items.iter().map(|i| self.convert_value(i)).collect())
            }
        }
    }
}

impl TypeInfo for SymbolTypeInfo {
    fn backend(&self) -> Backend {
        Backend::Symbol
    }

    fn name(&self) -> String {
        match &self.ty {
            SymbolType::Named { name, .. } => match self.compilation.get(name) {
                Some(decl) => decl.name.clone(),
                None => name.rsplit('.').next().unwrap_or(name).to_string(),
            },
            SymbolType::Array(element) => format!("{}[]", self.wrap((**element).clone()).name()),
            SymbolType::TypeParameter(name) => name.clone(),
        }
    }

    fn namespace(&self) -> Option<String> {
        match &self.ty {
            SymbolType::Named { name, .. } => match self.compilation.get(name) {
                Some(decl) if decl.namespace.is_empty() => None,
                Some(decl) => Some(decl.namespace.clone()),
                None => name.rsplit_once('.').map(|(ns, _)| ns.to_string()),
            },
            SymbolType::Array(element) => self.wrap((**element).clone()).namespace(),
            SymbolType::TypeParameter(_) => None,
        }
    }

    fn qualified_name(&self) -> String {
        match &self.ty {
            SymbolType::Named { name, .. } => name.clone(),
            SymbolType::Array(element) => format!("{}[]", self.wrap((**element).clone()).qualified_name()),
            SymbolType::TypeParameter(name) => name.clone(),
        }
    }

    fn kind(&self) -> TypeKind {
        match &self.ty {
            SymbolType::Named { name, .. } => self
                .compilation
                .get(name)
                .map(|d| d.kind)
                .or_else(|| well_known::lookup(name).map(|w| w.kind))
                .unwrap_or(TypeKind::Class),
            SymbolType::Array(_) => TypeKind::Array,
            SymbolType::TypeParameter(_) => TypeKind::TypeParameter,
        }
    }

    fn array_element(&self) -> Option<TypeRef> {
        match &self.ty {
            SymbolType::Array(element) => Some(self.wrap((**element).clone())),
            _ => None,
        }
    }

    fn generic_arguments(&self) -> Vec<TypeRef> {
        match &self.ty {
            SymbolType::Named { args, .. } => args.iter().map(|a| self.wrap(a.clone())).collect(),
            _ => Vec::new(),
        }
    }

    fn generic_arguments_for(&self, definition: &str) -> Option<Vec<TypeRef>> {
        match &self.ty {
            SymbolType::Named { name, args } => {
                if name == definition {
                    return Some(args.iter().map(|a| self.wrap(a.clone())).collect());
                }
                if let Some(decl) = self.compilation.get(name) {
                    return decl
                        .bases
                        .iter()
                        .map(|b| b.substitute(&decl.type_parameters, args))
                        .find_map(|b| self.wrap(b).generic_arguments_for(definition));
                }
                well_known::implemented_arguments(name, definition, args)
                    .map(|found| found.into_iter().map(|a| self.wrap(a)).collect())
            }
            SymbolType::Array(element) => well_known::array_implements(definition)
                .then(|| vec![self.wrap((**element).clone())]),
            SymbolType::TypeParameter(_) => None,
        }
    }

    fn is_user_defined(&self) -> bool {
        self.declaration().is_some()
    }

    fn is_abstract(&self) -> bool {
        self.declaration().map(|(d, _)| d.is_abstract).unwrap_or(false)
    }

    fn attributes(&self) -> Vec<AttributeData> {
        self.declaration()
            .map(|(d, _)| self.convert_attributes(&d.attributes))
            .unwrap_or_default()
    }

    fn enum_members(&self) -> Vec<EnumMember> {
        self.declaration()
            .map(|(d, _)| {
                d.enum_members
                    .iter()
                    .map(|m| EnumMember {
                        name: m.name.clone(),
                        value: m.value,
                        attributes: self.convert_attributes(&m.attributes),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn properties(&self) -> Vec<Arc<dyn PropertyInfo>> {
        let mut seen: Vec<String> = Vec::new();
        let mut out: Vec<Arc<dyn PropertyInfo>> = Vec::new();
        for (decl, args) in self.hierarchy() {
            for prop in &decl.properties {
                if seen.contains(&prop.name) {
                    continue;
                }
                seen.push(prop.name.clone());
                out.push(Arc::new(SymbolPropertyInfo {
                    name: prop.name.clone(),
                    property_type: self.wrap(prop.ty.substitute(&decl.type_parameters, &args)),
                    has_getter: prop.has_getter,
                    has_setter: prop.has_setter,
                    is_init_only: prop.is_init_only,
                    is_static: prop.is_static,
                    attributes: self.convert_attributes(&prop.attributes),
                }));
            }
        }
        out
    }

    fn methods(&self) -> Vec<Arc<dyn MethodInfo>> {
        let mut seen: Vec<String> = Vec::new();
        let mut out: Vec<Arc<dyn MethodInfo>> = Vec::new();
        for (decl, args) in self.hierarchy() {
            for method in &decl.methods {
                if seen.contains(&method.name) {
                    continue;
                }
                seen.push(method.name.clone());
                let substitute = |t: &SymbolType| self.wrap(t.substitute(&decl.type_parameters, &args));
                out.push(Arc::new(SymbolMethodInfo {
                    name: method.name.clone(),
                    return_type: substitute(&method.return_type),
                    parameters: method
                        .parameters
                        .iter()
                        .map(|p| ParameterInfo {
                            name: p.name.clone(),
                            parameter_type: substitute(&p.ty),
                            is_out: p.is_out,
                            is_ref: p.is_ref,
                            default_value: p.default_value.as_ref().map(|v| self.convert_value(v)),
                            attributes: self.convert_attributes(&p.attributes),
                        })
                        .collect(),
                    is_static: method.is_static,
                    attributes: self.convert_attributes(&method.attributes),
                }));
            }
        }
        out
    }
}

struct SymbolPropertyInfo {
    name: String,
    property_type: TypeRef,
    has_getter: bool,
    has_setter: bool,
    is_init_only: bool,
    is_static: bool,
    attributes: Vec<AttributeData>,
}

impl PropertyInfo for SymbolPropertyInfo {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn property_type(&self) -> TypeRef {
        Arc::clone(&self.property_type)
    }

    fn has_getter(&self) -> bool {
        self.has_getter
    }

    fn has_setter(&self) -> bool {
        self.has_setter
    }

    fn is_init_only(&self) -> bool {
        self.is_init_only
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn attributes(&self) -> Vec<AttributeData> {
        self.attributes.clone()
    }
}

struct SymbolMethodInfo {
    name: String,
    return_type: TypeRef,
    parameters: Vec<ParameterInfo>,
    is_static: bool,
    attributes: Vec<AttributeData>,
}

impl MethodInfo for SymbolMethodInfo {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn return_type(&self) -> TypeRef {
        Arc::clone(&self.return_type)
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        self.parameters.clone()
    }

    fn is_static(&self) -> bool {
        self.is_static
    }

    fn attributes(&self) -> Vec<AttributeData> {
        self.attributes.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::well_known::names;

    fn compilation() -> Arc<Compilation> {
        Compilation::from_sources([(
            "Sources.cs",
            r#"
using IntelliTect.Coalesce;
namespace App
{
    public class Base { public int Id { get; set; } }
    public class Derived : Base { public string Name { get; set; } }
    public class Db : Microsoft.EntityFrameworkCore.DbContext { }
    [Coalesce]
    public class DerivedSource : StandardDataSource<Derived, Db> { }
}
"#,
        )])
        .unwrap()
    }

    #[test]
    fn test_inherited_properties() {
        let t = SymbolTypeInfo::new(&compilation(), SymbolType::named("App.Derived"));
        let names: Vec<String> = t.properties().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Name", "Id"]);
        assert!(t.is_a("App.Base"));
    }

    #[test]
    fn test_generic_base_arguments() {
        let t = SymbolTypeInfo::new(&compilation(), SymbolType::named("App.DerivedSource"));
        let args = t.generic_arguments_for(names::STANDARD_DATA_SOURCE).unwrap();
        assert_eq!(args[0].qualified_name(), "App.Derived");
        assert!(t.is_a(names::IDATA_SOURCE));
        assert_eq!(t.attributes()[0].name, "Coalesce");
    }

    #[test]
    fn test_db_context_resolves_fully_qualified() {
        let t = SymbolTypeInfo::new(&compilation(), SymbolType::named("App.Db"));
        assert!(t.is_a(names::DB_CONTEXT));
        assert_eq!(t.namespace().as_deref(), Some("App"));
    }
}
