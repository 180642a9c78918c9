//! `models.g.ts`: enums, model interfaces and data source parameter classes

use std::sync::Arc;

use coalesce_core::CoalesceResult;
use coalesce_model::{ClassViewModel, TypeViewModel};

use crate::config::CommonSettings;
use crate::context::GenerationContext;
use crate::generator::Configurable;
use crate::template::Template;
use crate::typescript::{enum_types, metadata_key, model_classes};

pub struct TsModels {
    ctx: Arc<GenerationContext>,
}

impl Configurable for TsModels {
    const ID: &'static str = "Coalesce.Generators.TsModels";
    type Settings = CommonSettings;
}

impl TsModels {
    pub fn new(ctx: Arc<GenerationContext>) -> Self {
        Self { ctx }
    }
}

impl Template for TsModels {
    fn name(&self) -> String {
        "TsModels".to_string()
    }

    fn render(&self) -> CoalesceResult<String> {
        let repo = self.ctx.repository();
        let mut out = String::with_capacity(8 * 1024);
        out.push_str("import * as metadata from './metadata.g'\n");
        out.push_str("import { Model, DataSource, convertToModel, mapToModel } from 'coalesce-vue/lib/model'\n\n");

        for ty in enum_types(repo) {
            write_enum(&mut out, &ty);
        }

        for class in model_classes(repo) {
            write_model(&mut out, &class);
            let sources = repo.data_sources_for(&class);
            if sources.is_empty() {
                continue;
            }
            out.push_str(&format!("export namespace {} {{\n", class.name));
            out.push_str("  export namespace DataSources {\n");
            for source in sources {
                out.push_str(&format!(
                    "    export class {} implements DataSource<typeof metadata.{}.dataSources.{}> {{\n",
                    source.name,
                    class.name,
                    metadata_key(&source.name)
                ));
                out.push_str(&format!(
                    "      readonly $metadata = metadata.{}.dataSources.{}\n",
                    class.name,
                    metadata_key(&source.name)
                ));
                for param in source.data_source_parameters() {
                    out.push_str(&format!(
                        "      {}: {} = null\n",
                        param.json_name,
                        nullable(&param.type_vm)
                    ));
                }
                out.push_str("    }\n");
            }
            out.push_str("  }\n}\n\n");
        }
        Ok(out)
    }
}

fn nullable(ty: &TypeViewModel) -> String {
    format!("{} | null", ty.ts_type_name())
}

fn write_enum(out: &mut String, ty: &TypeViewModel) {
    out.push_str(&format!("export enum {} {{\n", ty.name()));
    for member in ty.enum_members() {
        out.push_str(&format!("  {} = {},\n", member.name, member.value));
    }
    out.push_str("}\n\n\n");
}

fn write_model(out: &mut String, class: &ClassViewModel) {
    let name = &class.name;
    out.push_str(&format!(
        "export interface {name} extends Model<typeof metadata.{name}> {{\n"
    ));
    for prop in class.client_properties() {
        if let Some(description) = &prop.description {
            out.push_str(&format!("\n  /** {} */\n", description));
        }
        out.push_str(&format!("  {}: {}\n", prop.json_name, nullable(&prop.type_vm)));
    }
    out.push_str("}\n");

    out.push_str(&format!("export class {name} {{\n\n"));
    out.push_str(&format!(
        "  /** Mutates the input object and its descendents into a valid {name} implementation. */\n"
    ));
    out.push_str(&format!("  static convert(data?: Partial<{name}>): {name} {{\n"));
    out.push_str(&format!("    return convertToModel(data || {{}}, metadata.{name})\n  }}\n\n"));
    out.push_str(&format!(
        "  /** Maps the input object and its descendents to a new, valid {name} implementation. */\n"
    ));
    out.push_str(&format!("  static map(data?: Partial<{name}>): {name} {{\n"));
    out.push_str(&format!("    return mapToModel(data || {{}}, metadata.{name})\n  }}\n\n"));
    out.push_str(&format!(
        "  static [Symbol.hasInstance](x: any) {{ return x?.$metadata === metadata.{name}; }}\n\n"
    ));
    out.push_str(&format!("  /** Instantiate a new {name}, optionally basing it on the given data. */\n"));
    out.push_str(&format!("  constructor(data?: Partial<{name}> | {{[k: string]: any}}) {{\n"));
    out.push_str(&format!("    Object.assign(this, {name}.map(data || {{}}));\n  }}\n}}\n\n\n"));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoalesceConfig;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;

    fn render(fixture: &testing::ModelFixture) -> String {
        let ctx = Arc::new(GenerationContext::new(
            fixture.repo.clone(),
            CoalesceConfig::new("MyProject.Web"),
            ".",
        ));
        TsModels::new(ctx).render().unwrap()
    }

    #[test]
    fn test_backends_render_identically() {
        let [reflection, symbol] = testing::both();
        assert_eq!(render(reflection), render(symbol));
    }

    #[test]
    fn test_model_interfaces() {
        let text = render(&testing::both()[0]);
        assert!(text.contains("export enum Statuses {\n  Open = 0,\n  InProgress = 1,"));
        assert!(text.contains("  Cancelled = 99,\n}"));
        assert!(text.contains("export interface Person extends Model<typeof metadata.Person> {\n  personId: number | null\n"));
        assert!(text.contains("  company: Company | null\n"));
        assert!(text.contains("  casesAssigned: Case[] | null\n"));
        assert!(text.contains("  openedAt: Date | null\n"));
        assert!(text.contains("  status: Statuses | null\n"));
        assert!(text.contains("static convert(data?: Partial<Case>): Case {"));
    }

    #[test]
    fn test_data_source_parameters() {
        let text = render(&testing::both()[1]);
        assert!(text.contains("export namespace Person {\n  export namespace DataSources {"));
        assert!(text.contains(
            "    export class BorCPeople implements DataSource<typeof metadata.Person.dataSources.borCPeople> {"
        ));
        assert!(text.contains("      letter: string | null = null\n"));
    }
}
