//! `metadata.g.ts`: the runtime description of every client-visible type
//!
//! `coalesce-vue` drives serialization, validation and display from this
//! file, so it mirrors the model closely: property roles and relations,
//! validation rules, method signatures and data source parameters.

use std::sync::Arc;

use heck::ToTitleCase;

use coalesce_core::{CoalesceResult, SecurityPermissionLevel, ValidationRule};
use coalesce_model::{
    ClassViewModel, MethodViewModel, PropertyViewModel, ReflectionRepository, TypeViewModel,
};

use crate::config::CommonSettings;
use crate::context::GenerationContext;
use crate::generator::Configurable;
use crate::template::Template;
use crate::typescript::{enum_types, metadata_key, model_classes, service_classes, ts_literal};

/// `BehaviorFlags` bits
const CREATE: u8 = 1;
const EDIT: u8 = 2;
const DELETE: u8 = 4;

pub struct TsMetadata {
    ctx: Arc<GenerationContext>,
}

impl Configurable for TsMetadata {
    const ID: &'static str = "Coalesce.Generators.TsMetadata";
    type Settings = CommonSettings;
}

impl TsMetadata {
    pub fn new(ctx: Arc<GenerationContext>) -> Self {
        Self { ctx }
    }
}

impl Template for TsMetadata {
    fn name(&self) -> String {
        "TsMetadata".to_string()
    }

    fn render(&self) -> CoalesceResult<String> {
        let repo = self.ctx.repository();
        let writer = MetaWriter { repo };
        let enums = enum_types(repo);
        let classes = model_classes(repo);
        let services = service_classes(repo);

        let mut out = String::with_capacity(16 * 1024);
        out.push_str("import {\n");
        out.push_str("  Domain, getEnumMeta, solidify, ModelType, ObjectType, HiddenAreas, BehaviorFlags,\n");
        out.push_str("  PrimitiveProperty, ForeignKeyProperty, PrimaryKeyProperty,\n");
        out.push_str("  ModelCollectionNavigationProperty, ModelReferenceNavigationProperty,\n");
        out.push_str("} from 'coalesce-vue/lib/metadata'\n\n\n");
        out.push_str("const domain: Domain = { enums: {}, types: {}, services: {} }\n");

        for ty in &enums {
            writer.write_enum(&mut out, ty);
        }
        for class in &classes {
            writer.write_class(&mut out, class);
        }
        for service in &services {
            writer.write_service(&mut out, service);
        }

        out.push_str("\ninterface AppDomain extends Domain {\n");
        out.push_str("  enums: {\n");
        for ty in &enums {
            out.push_str(&format!("    {name}: typeof {name}\n", name = ty.name()));
        }
        out.push_str("  }\n  types: {\n");
        for class in &classes {
            out.push_str(&format!("    {name}: typeof {name}\n", name = class.name));
        }
        out.push_str("  }\n  services: {\n");
        for service in &services {
            out.push_str(&format!("    {name}: typeof {name}\n", name = service.client_type_name()));
        }
        out.push_str("  }\n}\n\n");
        out.push_str("solidify(domain)\n\n");
        out.push_str("export default domain as unknown as AppDomain\n");
        Ok(out)
    }
}

// ============================================================================
// Writer
// ============================================================================

struct MetaWriter<'a> {
    repo: &'a ReflectionRepository,
}

impl MetaWriter<'_> {
    fn write_enum(&self, out: &mut String, ty: &TypeViewModel) {
        let name = ty.name();
        let members = ty.enum_members();
        let union = members
            .iter()
            .map(|m| ts_literal(&m.name))
            .collect::<Vec<_>>()
            .join("|");

        out.push_str(&format!("export const {name} = domain.enums.{name} = {{\n"));
        out.push_str(&format!("  name: {} as const,\n", ts_literal(&name)));
        out.push_str(&format!("  displayName: {},\n", ts_literal(&name.to_title_case())));
        out.push_str("  type: \"enum\",\n");
        out.push_str(&format!("  ...getEnumMeta<{}>([\n", union));
        for member in &members {
            out.push_str(&format!(
                "    {{\n      value: {},\n      strValue: {},\n      displayName: {},\n    }},\n",
                member.value,
                ts_literal(&member.name),
                ts_literal(&member.name.to_title_case()),
            ));
        }
        out.push_str("  ]),\n}\n");
    }

    fn write_class(&self, out: &mut String, class: &ClassViewModel) {
        let name = &class.name;
        let is_model = class.is_crud_model();
        let type_name = if is_model { "ModelType" } else { "ObjectType" };

        out.push_str(&format!("export const {name} = domain.types.{name} = {{\n"));
        out.push_str(&format!("  name: {} as const,\n", ts_literal(name)));
        out.push_str(&format!("  displayName: {},\n", ts_literal(&class.display_name)));
        if let Some(display) = class.list_text_property().filter(|p| p.is_client_property()) {
            out.push_str(&format!("  get displayProp() {{ return this.props.{} }},\n", display.json_name));
        }
        out.push_str(&format!("  type: {},\n", ts_literal(if is_model { "model" } else { "object" })));

        if is_model {
            out.push_str(&format!("  controllerRoute: {},\n", ts_literal(&class.api_route_name())));
            if let Some(pk) = class.primary_key() {
                out.push_str(&format!("  get keyProp() {{ return this.props.{} }},\n", pk.json_name));
            }
            out.push_str(&format!("  behaviorFlags: {} as BehaviorFlags,\n", behavior_flags(class)));
        }

        out.push_str("  props: {\n");
        for prop in class.client_properties() {
            self.write_property(out, prop, "    ");
        }
        out.push_str("  },\n");

        if is_model {
            out.push_str("  methods: {\n");
            for method in class.client_methods() {
                self.write_method(out, method, Some(class));
            }
            out.push_str("  },\n");
            out.push_str("  dataSources: {\n");
            for source in self.repo.data_sources_for(class) {
                out.push_str(&format!("    {}: {{\n", metadata_key(&source.name)));
                out.push_str("      type: \"dataSource\",\n");
                out.push_str(&format!("      name: {} as const,\n", ts_literal(&source.name)));
                out.push_str(&format!("      displayName: {},\n", ts_literal(&source.display_name)));
                if source.is_default_data_source {
                    out.push_str("      isDefault: true,\n");
                }
                out.push_str("      props: {\n");
                for param in source.data_source_parameters() {
                    self.write_property(out, param, "        ");
                }
                out.push_str("      },\n    },\n");
            }
            out.push_str("  },\n");
        }
        out.push_str(&format!("}} satisfies {} & {{ name: {} }}\n", type_name, ts_literal(name)));
    }

    fn write_service(&self, out: &mut String, service: &ClassViewModel) {
        let name = service.client_type_name();
        out.push_str(&format!("export const {name} = domain.services.{name} = {{\n"));
        out.push_str(&format!("  name: {},\n", ts_literal(&name)));
        out.push_str(&format!("  displayName: {},\n", ts_literal(&name.to_title_case())));
        out.push_str("  type: \"service\",\n");
        out.push_str(&format!("  controllerRoute: {},\n", ts_literal(&service.api_route_name())));
        out.push_str("  methods: {\n");
        for method in service.client_methods() {
            self.write_method(out, method, None);
        }
        out.push_str("  },\n}\n");
    }

    // ====================================================================
    // Members
    // ====================================================================

    fn write_property(&self, out: &mut String, prop: &PropertyViewModel, indent: &str) {
        out.push_str(&format!("{indent}{}: {{\n", prop.json_name));
        let inner = format!("{indent}  ");
        out.push_str(&format!("{inner}name: {},\n", ts_literal(&prop.json_name)));
        out.push_str(&format!("{inner}displayName: {},\n", ts_literal(&prop.display_name)));
        if let Some(description) = &prop.description {
            out.push_str(&format!("{inner}description: {},\n", ts_literal(description)));
        }
        self.write_type(out, &prop.type_vm, &inner);
        out.push_str(&format!("{inner}role: {},\n", ts_literal(&prop.role.to_string())));

        match prop.role {
            coalesce_core::PropertyRole::PrimaryKey => {
                out.push_str(&format!("{inner}hidden: 3 as HiddenAreas,\n"));
            }
            coalesce_core::PropertyRole::ForeignKey => {
                if let Some(principal) = prop
                    .foreign_key_principal_type
                    .as_ref()
                    .and_then(|key| self.repo.get(key))
                {
                    out.push_str(&format!(
                        "{inner}get principalType() {{ return domain.types.{} }},\n",
                        principal.name
                    ));
                    if let Some(pk) = principal.primary_key() {
                        out.push_str(&format!(
                            "{inner}get principalKey() {{ return domain.types.{}.props.{} }},\n",
                            principal.name, pk.json_name
                        ));
                    }
                }
                if let Some(nav) = &prop.reference_navigation {
                    out.push_str(&format!(
                        "{inner}get navigationProp() {{ return domain.types.{}.props.{} }},\n",
                        prop.parent_name,
                        metadata_key(nav)
                    ));
                }
                out.push_str(&format!("{inner}hidden: 3 as HiddenAreas,\n"));
            }
            coalesce_core::PropertyRole::ReferenceNavigation => {
                if let Some(fk) = &prop.foreign_key_property {
                    out.push_str(&format!(
                        "{inner}get foreignKey() {{ return domain.types.{}.props.{} }},\n",
                        prop.parent_name,
                        metadata_key(fk)
                    ));
                }
                out.push_str(&format!("{inner}dontSerialize: true,\n"));
            }
            coalesce_core::PropertyRole::CollectionNavigation => {
                let target = prop.pure_type().name();
                if let Some(fk) = &prop.foreign_key_on_target {
                    out.push_str(&format!(
                        "{inner}get foreignKey() {{ return domain.types.{}.props.{} }},\n",
                        target,
                        metadata_key(fk)
                    ));
                }
                if let Some(inverse) = &prop.inverse_property {
                    out.push_str(&format!(
                        "{inner}get inverseNavigation() {{ return domain.types.{}.props.{} }},\n",
                        target,
                        metadata_key(inverse)
                    ));
                }
                if let Some(many) = &prop.many_to_many {
                    out.push_str(&format!("{inner}manyToMany: {{\n"));
                    out.push_str(&format!("{inner}  name: {},\n", ts_literal(&metadata_key(&many.name))));
                    if let Some(far) = &many.far_navigation {
                        out.push_str(&format!("{inner}  farNavigationProp: {},\n", ts_literal(&metadata_key(far))));
                    }
                    out.push_str(&format!("{inner}}},\n"));
                }
                out.push_str(&format!("{inner}dontSerialize: true,\n"));
            }
            coalesce_core::PropertyRole::Value => {
                if !prop.has_setter || prop.security.is_read_only {
                    out.push_str(&format!("{inner}dontSerialize: true,\n"));
                }
            }
        }

        let rules: Vec<String> = prop
            .validation
            .iter()
            .map(|rule| rule_function(rule, &prop.display_name))
            .collect();
        if !rules.is_empty() {
            out.push_str(&format!("{inner}rules: {{\n"));
            for rule in rules {
                out.push_str(&format!("{inner}  {},\n", rule));
            }
            out.push_str(&format!("{inner}}},\n"));
        }
        out.push_str(&format!("{indent}}},\n"));
    }

    fn write_method(&self, out: &mut String, method: &MethodViewModel, owner: Option<&ClassViewModel>) {
        let transport = if method.returns_list_result() { "list" } else { "item" };
        out.push_str(&format!("    {}: {{\n", method.json_name));
        out.push_str(&format!("      name: {},\n", ts_literal(&method.json_name)));
        out.push_str(&format!("      displayName: {},\n", ts_literal(&method.display_name)));
        out.push_str(&format!("      transportType: {},\n", ts_literal(transport)));
        out.push_str(&format!("      httpMethod: {},\n", ts_literal(method.http_method.as_str())));
        if method.is_static {
            out.push_str("      isStatic: true,\n");
        }
        out.push_str("      params: {\n");
        if let (Some(class), false) = (owner, method.is_static) {
            if let Some(pk) = class.primary_key() {
                out.push_str("        id: {\n");
                out.push_str("          name: \"id\",\n");
                out.push_str("          displayName: \"Primary Key\",\n");
                self.write_type(out, &pk.type_vm, "          ");
                out.push_str("          role: \"value\",\n");
                out.push_str(&format!(
                    "          get source() {{ return domain.types.{}.props.{} }},\n",
                    class.name, pk.json_name
                ));
                out.push_str("        },\n");
            }
        }
        for param in method.client_parameters() {
            out.push_str(&format!("        {}: {{\n", param.json_name));
            out.push_str(&format!("          name: {},\n", ts_literal(&param.json_name)));
            out.push_str(&format!("          displayName: {},\n", ts_literal(&param.display_name)));
            self.write_type(out, &param.type_vm, "          ");
            out.push_str("          role: \"value\",\n");
            if !param.validation.is_empty() {
                out.push_str("          rules: {\n");
                for rule in &param.validation {
                    out.push_str(&format!("            {},\n", rule_function(rule, &param.display_name)));
                }
                out.push_str("          },\n");
            }
            out.push_str("        },\n");
        }
        out.push_str("      },\n");
        out.push_str("      return: {\n");
        out.push_str("        name: \"$return\",\n");
        out.push_str("        displayName: \"Result\",\n");
        match method.result_type() {
            Some(result) => self.write_type(out, &result, "        "),
            None => out.push_str("        type: \"void\",\n"),
        }
        out.push_str("        role: \"value\",\n");
        out.push_str("      },\n");
        out.push_str("    },\n");
    }

    /// `type` and the fields that go with it
    fn write_type(&self, out: &mut String, ty: &TypeViewModel, indent: &str) {
        let ty = ty.nullable_stripped();
        if ty.is_byte_array() {
            out.push_str(&format!("{indent}type: \"binary\",\n"));
            out.push_str(&format!("{indent}base64: true,\n"));
            return;
        }
        if ty.is_collection() {
            out.push_str(&format!("{indent}type: \"collection\",\n"));
            if let Some(element) = ty.collection_element_type() {
                out.push_str(&format!("{indent}itemType: {{\n"));
                out.push_str(&format!("{indent}  name: \"$collectionItem\",\n"));
                out.push_str(&format!("{indent}  displayName: \"\",\n"));
                out.push_str(&format!("{indent}  role: \"value\",\n"));
                self.write_type(out, &element, &format!("{indent}  "));
                out.push_str(&format!("{indent}}},\n"));
            }
            return;
        }
        if ty.is_enum() {
            out.push_str(&format!("{indent}type: \"enum\",\n"));
            out.push_str(&format!("{indent}get typeDef() {{ return domain.enums.{} }},\n", ty.name()));
            return;
        }
        if let Some(class) = ty.class_view_model(self.repo).filter(|c| c.has_dto()) {
            let kind = if class.is_crud_model() { "model" } else { "object" };
            out.push_str(&format!("{indent}type: {},\n", ts_literal(kind)));
            out.push_str(&format!("{indent}get typeDef() {{ return domain.types.{} }},\n", class.name));
            return;
        }
        match ty.primitive_kind() {
            Some(kind) => {
                out.push_str(&format!("{indent}type: {},\n", ts_literal(kind.metadata_kind())));
                if ty.is_date() {
                    let date_kind = if ty.is_date_only() { "date" } else { "datetime" };
                    out.push_str(&format!("{indent}dateKind: {},\n", ts_literal(date_kind)));
                } else if ty.is_time_only() {
                    out.push_str(&format!("{indent}dateKind: \"time\",\n"));
                }
            }
            None => out.push_str(&format!("{indent}type: \"unknown\",\n")),
        }
    }
}

fn behavior_flags(class: &ClassViewModel) -> u8 {
    let allowed = |level: SecurityPermissionLevel| level != SecurityPermissionLevel::DenyAll;
    let mut flags = 0;
    if allowed(class.security.create.level) {
        flags |= CREATE;
    }
    if allowed(class.security.edit.level) {
        flags |= EDIT;
    }
    if allowed(class.security.delete.level) {
        flags |= DELETE;
    }
    flags
}

/// A `coalesce-vue` rule function returning `true` or the failure message
fn rule_function(rule: &ValidationRule, display_name: &str) -> String {
    let message = ts_literal(&rule.error_message(display_name));
    match rule {
        ValidationRule::Required => {
            format!("required: val => (val != null && val !== '') || {}", message)
        }
        ValidationRule::MinLength(n) => {
            format!("minLength: val => !val || val.length >= {} || {}", n, message)
        }
        ValidationRule::MaxLength(n) => {
            format!("maxLength: val => !val || val.length <= {} || {}", n, message)
        }
        ValidationRule::Range { min, max } => format!(
            "range: val => val == null || (val >= {} && val <= {}) || {}",
            min, max, message
        ),
        ValidationRule::Pattern { regex, .. } => format!(
            "pattern: val => !val || new RegExp({}).test(val) || {}",
            ts_literal(regex),
            message
        ),
        ValidationRule::Email => format!(
            "email: val => !val || /^[^\\s@]+@[^\\s@]+$/.test(val.trim()) || {}",
            message
        ),
        ValidationRule::Url => format!(
            "url: val => !val || /^[a-z]+:\\/\\/.+$/i.test(val.trim()) || {}",
            message
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
