//! Reflection backend
//!
//! Answers [`TypeInfo`] questions from [`AssemblyMetadata`]. Types declared in
//! the assembly resolve through a [`MetadataIndex`]; framework types resolve
//! through the well-known table; anything else is an opaque class.

pub mod metadata;

use std::collections::HashMap;
use std::sync::Arc;

use coalesce_core::TypeKind;

use crate::attributes::{AttributeData, AttributeValue};
use crate::type_info::{
    Backend, EnumMember, MethodInfo, ParameterInfo, PropertyInfo, TypeInfo, TypeRef,
};
use crate::type_view_model::TypeViewModel;
use crate::well_known;

pub use metadata::{
    AssemblyMetadata, AttributeArg, AttributeMetadata, ClrType, EnumMemberMetadata,
    MethodMetadata, ParameterMetadata, PropertyMetadata, TypeMetadata,
};

/// Declared types of one assembly, by full name
#[derive(Debug, Default)]
pub struct MetadataIndex {
    assembly: String,
    types: HashMap<String, TypeMetadata>,
}

impl MetadataIndex {
    pub fn new(assembly: &AssemblyMetadata) -> Arc<Self> {
        Arc::new(Self {
            assembly: assembly.name.clone(),
            types: assembly
                .types
                .iter()
                .map(|t| (t.full_name(), t.clone()))
                .collect(),
        })
    }

    pub fn assembly_name(&self) -> &str {
        &self.assembly
    }

    pub fn get(&self, full_name: &str) -> Option<&TypeMetadata> {
        self.types.get(full_name)
    }

    /// A view model for every declared type
    pub fn all_types(self: &Arc<Self>) -> Vec<TypeViewModel> {
        let mut names: Vec<&String> = self.types.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|n| ReflectionTypeInfo::view_model(self, ClrType::named(n.clone())))
            .collect()
    }
}

// ============================================================================
// ReflectionTypeInfo
// ============================================================================

/// One type occurrence read from metadata
pub struct ReflectionTypeInfo {
    index: Arc<MetadataIndex>,
    ty: ClrType,
}

impl ReflectionTypeInfo {
    pub fn new(index: &Arc<MetadataIndex>, ty: ClrType) -> TypeRef {
        Arc::new(Self {
            index: Arc::clone(index),
            ty,
        })
    }

    pub fn view_model(index: &Arc<MetadataIndex>, ty: ClrType) -> TypeViewModel {
        TypeViewModel::new(Self::new(index, ty))
    }

    fn wrap(&self, ty: ClrType) -> TypeRef {
        Self::new(&self.index, ty)
    }

    /// Declaration metadata plus the type arguments it was constructed with
    fn declaration(&self) -> Option<(&TypeMetadata, &[ClrType])> {
        match &self.ty {
            ClrType::Named { name, args } => self.index.get(name).map(|m| (m, args.as_slice())),
            _ => None,
        }
    }

    /// Declared type and its user-declared base classes, most derived first
    fn hierarchy(&self) -> Vec<(&TypeMetadata, Vec<ClrType>)> {
        let mut chain = Vec::new();
        let Some((meta, args)) = self.declaration() else {
            return chain;
        };
        chain.push((meta, args.to_vec()));
        let mut current = meta
            .base_type
            .as_ref()
            .map(|b| b.substitute(&meta.generic_parameters, args));
        while let Some(ClrType::Named { name, args }) = current {
            let Some(base) = self.index.get(&name) else {
                break;
            };
            if chain.iter().any(|(m, _)| std::ptr::eq(*m, base)) {
                break;
            }
            current = base
                .base_type
                .as_ref()
                .map(|b| b.substitute(&base.generic_parameters, &args));
            chain.push((base, args));
        }
        chain
    }

    fn convert_attributes(&self, attributes: &[AttributeMetadata]) -> Vec<AttributeData> {
        attributes
            .iter()
            .map(|a| {
                let mut data = AttributeData::new(&a.name);
                data.args = a.args.iter().map(|v| self.convert_arg(v)).collect();
                data.named = a
                    .named
                    .iter()
                    .map(|(k, v)| (k.clone(), self.convert_arg(v)))
                    .collect();
                data
            })
            .collect()
    }

    fn convert_arg(&self, arg: &AttributeArg) -> AttributeValue {
        match arg {
            AttributeArg::Null => AttributeValue::Null,
            AttributeArg::Bool(b) => AttributeValue::Bool(*b),
            AttributeArg::Int(i) => AttributeValue::Int(*i),
            AttributeArg::Float(f) => AttributeValue::Float(*f),
            AttributeArg::String(s) => AttributeValue::String(s.clone()),
            AttributeArg::Enum { type_name, member } => AttributeValue::Enum {
                type_name: type_name.clone(),
                member: member.clone(),
            },
            AttributeArg::Type(t) => AttributeValue::Type(TypeViewModel::new(self.wrap(t.clone()))),
            AttributeArg::Array(items) => {
                AttributeValue::Array(items.iter().map(|i| self.convert_arg(i)).collect())
            }
        }
    }
}

impl TypeInfo for ReflectionTypeInfo {
    fn backend(&self) -> Backend {
        Backend::Reflection
    }

    fn name(&self) -> String {
        match &self.ty {
            ClrType::Named { name, .. } => name.rsplit('.').next().unwrap_or(name).to_string(),
            ClrType::Array { element } => format!("{}[]", self.wrap((**element).clone()).name()),
            ClrType::GenericParameter { name } => name.clone(),
        }
    }

    fn namespace(&self) -> Option<String> {
        match &self.ty {
            ClrType::Named { name, .. } => match self.index.get(name) {
                Some(meta) if meta.namespace.is_empty() => None,
                Some(meta) => Some(meta.namespace.clone()),
                None => name.rsplit_once('.').map(|(ns, _)| ns.to_string()),
            },
            ClrType::Array { element } => self.wrap((**element).clone()).namespace(),
            ClrType::GenericParameter { .. } => None,
        }
    }

    fn qualified_name(&self) -> String {
        match &self.ty {
            ClrType::Named { name, .. } => name.clone(),
            ClrType::Array { element } => format!("{}[]", self.wrap((**element).clone()).qualified_name()),
            ClrType::GenericParameter { name } => name.clone(),
        }
    }

    fn kind(&self) -> TypeKind {
        match &self.ty {
            ClrType::Named { name, .. } => self
                .index
                .get(name)
                .map(|m| m.kind)
                .or_else(|| well_known::lookup(name).map(|w| w.kind))
                .unwrap_or(TypeKind::Class),
            ClrType::Array { .. } => TypeKind::Array,
            ClrType::GenericParameter { .. } => TypeKind::TypeParameter,
        }
    }

    fn array_element(&self) -> Option<TypeRef> {
        match &self.ty {
            ClrType::Array { element } => Some(self.wrap((**element).clone())),
            _ => None,
        }
    }

    fn generic_arguments(&self) -> Vec<TypeRef> {
        match &self.ty {
            ClrType::Named { args, .. } => args.iter().map(|a| self.wrap(a.clone())).collect(),
            _ => Vec::new(),
        }
    }

    fn generic_arguments_for(&self, definition: &str) -> Option<Vec<TypeRef>> {
        match &self.ty {
            ClrType::Named { name, args } => {
                if name == definition {
                    return Some(args.iter().map(|a| self.wrap(a.clone())).collect());
                }
                if let Some(meta) = self.index.get(name) {
                    let supertypes = meta
                        .base_type
                        .iter()
                        .chain(meta.interfaces.iter())
                        .map(|t| t.substitute(&meta.generic_parameters, args));
                    for supertype in supertypes {
                        if let Some(found) = self.wrap(supertype).generic_arguments_for(definition) {
                            return Some(found);
                        }
                    }
                    return None;
                }
                well_known::implemented_arguments(name, definition, args)
                    .map(|found| found.into_iter().map(|a| self.wrap(a)).collect())
            }
            ClrType::Array { element } => {
                if well_known::array_implements(definition) {
                    Some(vec![self.wrap((**element).clone())])
                } else {
                    None
                }
            }
            ClrType::GenericParameter { .. } => None,
        }
    }

    fn is_user_defined(&self) -> bool {
        self.declaration().is_some()
    }

    fn is_abstract(&self) -> bool {
        self.declaration().map(|(m, _)| m.is_abstract).unwrap_or(false)
    }

    fn attributes(&self) -> Vec<AttributeData> {
        self.declaration()
            .map(|(m, _)| self.convert_attributes(&m.attributes))
            .unwrap_or_default()
    }

    fn enum_members(&self) -> Vec<EnumMember> {
        self.declaration()
            .map(|(m, _)| {
                m.enum_members
                    .iter()
                    .map(|e| EnumMember {
                        name: e.name.clone(),
                        value: e.value,
                        attributes: self.convert_attributes(&e.attributes),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn properties(&self) -> Vec<Arc<dyn PropertyInfo>> {
        let mut seen: Vec<&str> = Vec::new();
        let mut out: Vec<Arc<dyn PropertyInfo>> = Vec::new();
        for (meta, args) in self.hierarchy() {
            for prop in &meta.properties {
                if seen.contains(&prop.name.as_str()) {
                    continue;
                }
                seen.push(&prop.name);
                out.push(Arc::new(ReflectionPropertyInfo {
                    property_type: self.wrap(prop.ty.substitute(&meta.generic_parameters, &args)),
                    attributes: self.convert_attributes(&prop.attributes),
                    meta: prop.clone(),
                }));
            }
        }
        out
    }

    fn methods(&self) -> Vec<Arc<dyn MethodInfo>> {
        let mut seen: Vec<&str> = Vec::new();
        let mut out: Vec<Arc<dyn MethodInfo>> = Vec::new();
        for (meta, args) in self.hierarchy() {
            for method in &meta.methods {
                if seen.contains(&method.name.as_str()) {
                    continue;
                }
                seen.push(&method.name);
                let substitute = |t: &ClrType| self.wrap(t.substitute(&meta.generic_parameters, &args));
                out.push(Arc::new(ReflectionMethodInfo {
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
                            default_value: p.default_value.as_ref().map(|v| self.convert_arg(v)),
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

// ============================================================================
// Members
// ============================================================================

struct ReflectionPropertyInfo {
    meta: PropertyMetadata,
    property_type: TypeRef,
    attributes: Vec<AttributeData>,
}

impl PropertyInfo for ReflectionPropertyInfo {
    fn name(&self) -> String {
        self.meta.name.clone()
    }

    fn property_type(&self) -> TypeRef {
        Arc::clone(&self.property_type)
    }

    fn has_getter(&self) -> bool {
        self.meta.has_getter
    }

    fn has_setter(&self) -> bool {
        self.meta.has_setter || self.meta.is_init_only
    }

    fn is_init_only(&self) -> bool {
        self.meta.is_init_only
    }

    fn is_static(&self) -> bool {
        self.meta.is_static
    }

    fn attributes(&self) -> Vec<AttributeData> {
        self.attributes.clone()
    }
}

struct ReflectionMethodInfo {
    name: String,
    return_type: TypeRef,
    parameters: Vec<ParameterInfo>,
    is_static: bool,
    attributes: Vec<AttributeData>,
}

impl MethodInfo for ReflectionMethodInfo {
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

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::well_known::names;

    fn index() -> Arc<MetadataIndex> {
        let assembly = AssemblyMetadata::new("Test")
            .with_type(
                TypeMetadata::class("App", "Base")
                    .with_property(PropertyMetadata::new("Id", ClrType::int()))
                    .with_property(PropertyMetadata::new("Name", ClrType::string()).read_only()),
            )
            .with_type(
                TypeMetadata::class("App", "Derived")
                    .with_base(ClrType::named("App.Base"))
                    .with_property(PropertyMetadata::new("Name", ClrType::string())),
            )
            .with_type(
                TypeMetadata::class("App", "PersonSource").with_base(ClrType::generic(
                    names::STANDARD_DATA_SOURCE,
                    vec![ClrType::named("App.Derived"), ClrType::named("App.Db")],
                )),
            );
        MetadataIndex::new(&assembly)
    }

    #[test]
    fn test_inherited_properties_prefer_most_derived() {
        let t = ReflectionTypeInfo::new(&index(), ClrType::named("App.Derived"));
        let props = t.properties();
        let names: Vec<String> = props.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["Name", "Id"]);
        assert!(props[0].has_setter());
    }

    #[test]
    fn test_generic_arguments_through_base() {
        let t = ReflectionTypeInfo::new(&index(), ClrType::named("App.PersonSource"));
        let args = t.generic_arguments_for(names::STANDARD_DATA_SOURCE).unwrap();
        assert_eq!(args[0].qualified_name(), "App.Derived");
        assert!(t.is_a(names::IDATA_SOURCE));
        assert!(!t.is_a(names::IBEHAVIORS));
    }

    #[test]
    fn test_framework_types_resolve_through_well_known() {
        let index = index();
        let list = ReflectionTypeInfo::new(&index, ClrType::list(ClrType::string()));
        assert_eq!(list.kind(), TypeKind::Class);
        assert!(!list.is_user_defined());
        let element = list.generic_arguments_for(names::IENUMERABLE).unwrap();
        assert_eq!(element[0].qualified_name(), "System.String");

        let array = ReflectionTypeInfo::new(&index, ClrType::array(ClrType::int()));
        assert_eq!(array.qualified_name(), "System.Int32[]");
        assert_eq!(array.name(), "Int32[]");
        assert!(array.is_a(names::IENUMERABLE));
    }

    #[test]
    fn test_unknown_types_are_opaque_classes() {
        let t = ReflectionTypeInfo::new(&index(), ClrType::named("Vendor.Widget"));
        assert_eq!(t.kind(), TypeKind::Class);
        assert_eq!(t.namespace().as_deref(), Some("Vendor"));
        assert!(t.properties().is_empty());
    }
}
