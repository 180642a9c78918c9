//! # DTO Generator
//!
//! Emits one `<Name>DtoGen` partial class per class that has a DTO:
//!
//! - a nullable mirror of every client property, recording which members were
//!   set
//! - `MapFrom(entity, context, tree)`: entity → DTO, honoring read roles,
//!   restrictions, content views and the include tree for navigations
//! - `MapTo(entity, context)`: DTO → existing entity, honoring edit roles and
//!   restrictions; navigations and read-only members are never written
//! - `MapToNew(context)`: a new entity, with init-only members set in the
//!   object initializer

use std::sync::Arc;

use coalesce_core::CoalesceResult;
use coalesce_model::{ClassViewModel, PropertyViewModel, ReflectionRepository};

use crate::config::CommonSettings;
use crate::context::GenerationContext;
use crate::csharp::{dto_member_type, includes_condition, role_condition};
use crate::generator::Configurable;
use crate::template::Template;

pub struct ClassDto {
    class: Arc<ClassViewModel>,
    ctx: Arc<GenerationContext>,
}

impl Configurable for ClassDto {
    const ID: &'static str = "Coalesce.Generators.ClassDto";
    type Settings = CommonSettings;
}

impl ClassDto {
    pub fn new(class: Arc<ClassViewModel>, ctx: Arc<GenerationContext>) -> Self {
        Self { class, ctx }
    }

    pub fn file_name(class: &ClassViewModel) -> String {
        format!("{}.g.cs", class.dto_name())
    }

    fn repo(&self) -> &ReflectionRepository {
        self.ctx.repository()
    }

    fn member_type(&self, prop: &PropertyViewModel) -> String {
        dto_member_type(&prop.type_vm, self.ctx.dto_namespace(), self.repo())
    }

    // ====================================================================
    // Members
    // ====================================================================

    fn write_members(&self, out: &mut String) {
        for prop in self.class.client_properties() {
            let ty = self.member_type(prop);
            out.push_str(&format!("private {} _{};\n", ty, prop.name));
        }
        out.push('\n');
        for prop in self.class.client_properties() {
            let ty = self.member_type(prop);
            out.push_str(&format!("public {} {}\n", ty, prop.name));
            out.push_str("{\n");
            out.push_str(&format!("get => _{};\n", prop.name));
            out.push_str(&format!(
                "set {{ _{name} = value; Changed(nameof({name})); }}\n",
                name = prop.name
            ));
            out.push_str("}\n");
        }
    }

    // ====================================================================
    // MapFrom
    // ====================================================================

    fn write_map_from(&self, out: &mut String) {
        let entity = &self.class.full_name;
        out.push_str("/// <summary>\n");
        out.push_str("/// Map from the domain object to the properties of the current DTO instance.\n");
        out.push_str("/// </summary>\n");
        out.push_str(&format!(
            "public override void MapFrom({} obj, IMappingContext context, IncludeTree tree = null)\n",
            entity
        ));
        out.push_str("{\n");
        out.push_str("if (obj == null) return;\n");
        out.push_str("var includes = context.Includes;\n\n");

        for prop in self.class.client_properties() {
            let mut conditions = Vec::new();
            if let Some(roles) = role_condition(&prop.security.read) {
                conditions.push(roles);
            }
            for restriction in &prop.security.restrictions {
                conditions.push(format!(
                    "context.GetPropertyRestriction<{}>().UserCanRead(context, nameof({}), obj)",
                    restriction, prop.name
                ));
            }
            if let Some(views) = includes_condition(prop) {
                conditions.push(views);
            }

            let body = self.map_from_statement(prop);
            if conditions.is_empty() {
                out.push_str(&body);
            } else {
                out.push_str(&format!("if ({})\n{{\n{}}}\n", conditions.join(" && "), body));
            }
        }
        out.push_str("}\n\n");
    }

    fn map_from_statement(&self, prop: &PropertyViewModel) -> String {
        let repo = self.repo();
        let dto_ns = self.ctx.dto_namespace();
        let name = &prop.name;
        let pure = prop.pure_type();
        let target = pure.class_view_model(repo).filter(|c| c.has_dto());

        let Some(target) = target else {
            return format!("this.{name} = obj.{name};\n");
        };
        let element_dto = pure.dto_full_name(dto_ns, repo);
        let map_call = |var: &str, tree: &str| {
            format!(
                "{var}.MapToDto<{entity}, {dto}>(context, {tree})",
                entity = target.full_name,
                dto = element_dto,
            )
        };

        let mut out = String::new();
        if prop.type_vm.is_collection() {
            let order = target
                .primary_key()
                .map(|pk| format!(".OrderBy(f => f.{})\n", pk.name))
                .unwrap_or_default();
            out.push_str(&format!("var propVal{name} = obj.{name};\n"));
            if prop.is_navigation() {
                out.push_str(&format!(
                    "if (propVal{name} != null && (tree == null || tree[nameof(this.{name})] != null))\n"
                ));
            } else {
                out.push_str(&format!("if (propVal{name} != null)\n"));
            }
            out.push_str("{\n");
            out.push_str(&format!("this.{name} = propVal{name}\n"));
            out.push_str(&order);
            out.push_str(&format!(
                ".Select(f => {}).ToList();\n",
                map_call("f", &format!("tree?[nameof(this.{name})]"))
            ));
            out.push_str("}\n");
            if prop.is_navigation() {
                out.push_str(&format!(
                    "else if (propVal{name} == null && tree?[nameof(this.{name})] != null)\n{{\nthis.{name} = new {element_dto}[0];\n}}\n"
                ));
            }
            out.push('\n');
        } else if prop.is_navigation() {
            out.push_str(&format!(
                "if (tree == null || tree[nameof(this.{name})] != null)\n{{\nthis.{name} = {};\n}}\n\n",
                map_call(&format!("obj.{name}"), &format!("tree?[nameof(this.{name})]"))
            ));
        } else {
            out.push_str(&format!(
                "this.{name} = {};\n",
                map_call(&format!("obj.{name}"), &format!("tree?[nameof(this.{name})]"))
            ));
        }
        out
    }

    // ====================================================================
    // MapTo / MapToNew
    // ====================================================================

    /// Members written back to entities
    fn writable(&self) -> impl Iterator<Item = &PropertyViewModel> {
        let repo = self.repo();
        self.class.client_properties().filter(move |p| {
            p.has_setter
                && !p.security.is_read_only
                && !p.is_navigation()
                && !p
                    .pure_type()
                    .class_view_model(repo)
                    .is_some_and(|c| c.has_dto())
        })
    }

    fn assignment(&self, prop: &PropertyViewModel) -> String {
        let name = &prop.name;
        let value = if prop.type_vm.is_reference_or_nullable_value() {
            name.clone()
        } else {
            format!("({name} ?? entity.{name})")
        };

        let mut conditions = Vec::new();
        if let Some(roles) = role_condition(&prop.security.edit) {
            conditions.push(roles);
        }
        conditions.push(format!("ShouldMapTo(nameof({name}))"));
        for restriction in &prop.security.restrictions {
            conditions.push(format!(
                "context.GetPropertyRestriction<{}>().UserCanWrite(context, nameof({}), entity, {})",
                restriction, name, name
            ));
        }
        format!("if ({}) entity.{} = {};\n", conditions.join(" && "), name, value)
    }

    fn write_map_to(&self, out: &mut String) {
        out.push_str("/// <summary>\n");
        out.push_str("/// Map from the current DTO instance to the domain object.\n");
        out.push_str("/// </summary>\n");
        out.push_str(&format!(
            "public override void MapTo({} entity, IMappingContext context)\n",
            self.class.full_name
        ));
        out.push_str("{\n");
        out.push_str("var includes = context.Includes;\n\n");
        out.push_str("if (OnUpdate(entity, context)) return;\n\n");
        for prop in self.writable().filter(|p| !p.is_init_only) {
            out.push_str(&self.assignment(prop));
        }
        out.push_str("}\n\n");
    }

    fn write_map_to_new(&self, out: &mut String) {
        let entity = &self.class.full_name;
        out.push_str("/// <summary>\n");
        out.push_str("/// Map from the current DTO instance to a new instance of the domain object.\n");
        out.push_str("/// </summary>\n");
        out.push_str(&format!("public override {} MapToNew(IMappingContext context)\n", entity));
        out.push_str("{\n");

        if self.class.is_abstract {
            out.push_str(&format!(
                "throw new NotSupportedException(\"{} is abstract and cannot be instantiated.\");\n",
                self.class.name
            ));
            out.push_str("}\n");
            return;
        }

        let init_only: Vec<&PropertyViewModel> = self.writable().filter(|p| p.is_init_only).collect();
        if init_only.is_empty() {
            out.push_str(&format!("var entity = new {}();\n", entity));
            out.push_str("MapTo(entity, context);\n");
            out.push_str("return entity;\n");
            out.push_str("}\n");
            return;
        }

        out.push_str("var includes = context.Includes;\n\n");
        out.push_str(&format!("var entity = new {}()\n", entity));
        out.push_str("{\n");
        for prop in &init_only {
            out.push_str(&format!("{name} = {name},\n", name = prop.name));
        }
        out.push_str("};\n\n");
        out.push_str("if (OnUpdate(entity, context)) return entity;\n");
        for prop in self.writable().filter(|p| !p.is_init_only) {
            out.push_str(&self.assignment(prop));
        }
        out.push_str("\nreturn entity;\n");
        out.push_str("}\n");
    }
}

impl Template for ClassDto {
    fn name(&self) -> String {
        format!("ClassDto ({})", self.class.name)
    }

    fn render(&self) -> CoalesceResult<String> {
        let mut out = String::with_capacity(4096);

        out.push_str("using IntelliTect.Coalesce;\n");
        out.push_str("using IntelliTect.Coalesce.Mapping;\n");
        out.push_str("using IntelliTect.Coalesce.Models;\n");
        out.push_str("using System;\n");
        out.push_str("using System.Linq;\n");
        out.push_str("using System.Collections.Generic;\n");
        out.push_str("using System.Security.Claims;\n\n");

        out.push_str(&format!("namespace {}\n", self.ctx.dto_namespace()));
        out.push_str("{\n");
        out.push_str(&format!(
            "public partial class {} : GeneratedDto<{}>\n",
            self.class.dto_name(),
            self.class.full_name
        ));
        out.push_str("{\n");
        out.push_str(&format!("public {}() {{ }}\n\n", self.class.dto_name()));

        self.write_members(&mut out);
        out.push('\n');
        self.write_map_from(&mut out);
        self.write_map_to(&mut out);
        self.write_map_to_new(&mut out);

        out.push_str("}\n");
        out.push_str("}\n");
        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================
