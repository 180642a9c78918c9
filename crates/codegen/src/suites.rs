//! # Generator Suites
//!
//! The composites `coalesce.json` can name as `rootGenerator`:
//!
//! ```text
//! RootGenerator
//! ├── CSharpSuite
//! │   ├── ClassDto × dto class             Models/Generated/*.g.cs
//! │   ├── ModelApiController × crud model  Api/Generated/*.g.cs
//! │   └── ServiceApiController × service   Api/Generated/*.g.cs
//! └── Vue3Suite
//!     ├── TsMetadata                       metadata.g.ts
//!     ├── TsModels                         models.g.ts
//!     ├── TsApiClients                     api-clients.g.ts
//!     └── TsViewModels                     viewmodels.g.ts
//! ```
//!
//! Each composite owns cleaners for the directories its children write to.

use std::sync::Arc;

use coalesce_core::{CoalesceError, CoalesceResult};

use crate::config::{CommonSettings, ROOT_GENERATORS};
use crate::context::GenerationContext;
use crate::csharp::{self, ClassDto, ModelApiController, ServiceApiController};
use crate::generator::{Cleaner, CompositeGenerator, Configurable, DirectoryCleaner, GeneratorNode};
use crate::template::{Template, TemplateFile};
use crate::typescript::{self, TsApiClients, TsMetadata, TsModels, TsViewModels};

/// The root composite named by `rootGenerator`
pub fn root_generator(ctx: Arc<GenerationContext>) -> CoalesceResult<Box<dyn CompositeGenerator>> {
    let name = ctx.config().root_generator.clone();
    if name.eq_ignore_ascii_case("RootGenerator") {
        Ok(Box::new(RootGenerator::new(ctx)?))
    } else if name.eq_ignore_ascii_case("CSharpSuite") {
        Ok(Box::new(CSharpSuite::new(ctx)?))
    } else if name.eq_ignore_ascii_case("Vue3Suite") {
        Ok(Box::new(Vue3Suite::new(ctx)?))
    } else {
        Err(CoalesceError::InvalidConfig(format!(
            "rootGenerator '{}' is not one of {}",
            name,
            ROOT_GENERATORS.join(", ")
        )))
    }
}

// ============================================================================
// CSharpSuite
// ============================================================================

pub struct CSharpSuite {
    ctx: Arc<GenerationContext>,
    disabled: bool,
}

impl Configurable for CSharpSuite {
    const ID: &'static str = "Coalesce.Generators.CSharpSuite";
    type Settings = CommonSettings;
}

impl CSharpSuite {
    pub fn new(ctx: Arc<GenerationContext>) -> CoalesceResult<Self> {
        let disabled = Self::settings(&ctx)?.disabled;
        Ok(Self { ctx, disabled })
    }
}

impl CompositeGenerator for CSharpSuite {
    fn id(&self) -> &str {
        Self::ID
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn children(&self) -> CoalesceResult<Vec<GeneratorNode>> {
        let ctx = &self.ctx;
        let repo = ctx.repository();
        let mut children = Vec::new();

        let dto = ClassDto::settings(ctx)?;
        for class in repo.dto_classes() {
            let path = ctx.web_path(
                dto.target_directory.as_deref(),
                csharp::DTO_DIRECTORY,
                &ClassDto::file_name(class),
            );
            let template = ClassDto::new(Arc::clone(class), Arc::clone(ctx));
            children.push(GeneratorNode::file(
                TemplateFile::new(ClassDto::ID, path, template).with_disabled(dto.disabled),
            ));
        }

        let models = ModelApiController::settings(ctx)?;
        for class in repo.crud_models().filter(|c| !c.is_abstract) {
            let path = ctx.web_path(
                models.common.target_directory.as_deref(),
                csharp::API_DIRECTORY,
                &ModelApiController::file_name(class),
            );
            let template = ModelApiController::new(Arc::clone(class), Arc::clone(ctx), &models);
            children.push(GeneratorNode::file(
                TemplateFile::new(ModelApiController::ID, path, template)
                    .with_disabled(models.common.disabled),
            ));
        }

        let services = ServiceApiController::settings(ctx)?;
        for class in repo.services() {
            let path = ctx.web_path(
                services.common.target_directory.as_deref(),
                csharp::API_DIRECTORY,
                &ServiceApiController::file_name(class),
            );
            let template = ServiceApiController::new(Arc::clone(class), Arc::clone(ctx), &services);
            children.push(GeneratorNode::file(
                TemplateFile::new(ServiceApiController::ID, path, template)
                    .with_disabled(services.common.disabled),
            ));
        }

        Ok(children)
    }

    fn cleaners(&self) -> Vec<Arc<dyn Cleaner>> {
        let ctx = &self.ctx;
        let dto = ClassDto::settings(ctx).unwrap_or_default();
        let models = ModelApiController::settings(ctx).unwrap_or_default();
        let services = ServiceApiController::settings(ctx).unwrap_or_default();

        let mut dirs = vec![
            ctx.web_dir(dto.target_directory.as_deref(), csharp::DTO_DIRECTORY),
            ctx.web_dir(models.common.target_directory.as_deref(), csharp::API_DIRECTORY),
            ctx.web_dir(services.common.target_directory.as_deref(), csharp::API_DIRECTORY),
        ];
        dirs.sort();
        dirs.dedup();
        dirs.into_iter()
            .map(|dir| Arc::new(DirectoryCleaner::new(dir, csharp::GENERATED_SUFFIX)) as Arc<dyn Cleaner>)
            .collect()
    }
}

// ============================================================================
// Vue3Suite
// ============================================================================

pub struct Vue3Suite {
    ctx: Arc<GenerationContext>,
    disabled: bool,
}

impl Configurable for Vue3Suite {
    const ID: &'static str = "Coalesce.Generators.Vue3Suite";
    type Settings = CommonSettings;
}

impl Vue3Suite {
    pub fn new(ctx: Arc<GenerationContext>) -> CoalesceResult<Self> {
        let disabled = Self::settings(&ctx)?.disabled;
        Ok(Self { ctx, disabled })
    }

    fn file<G: Configurable<Settings = CommonSettings>>(
        &self,
        file_name: &str,
        template: impl Template + 'static,
    ) -> CoalesceResult<GeneratorNode> {
        let settings = G::settings(&self.ctx)?;
        let path = self.ctx.client_path(settings.target_directory.as_deref(), file_name);
        Ok(GeneratorNode::file(
            TemplateFile::new(G::ID, path, template).with_disabled(settings.disabled),
        ))
    }
}

impl CompositeGenerator for Vue3Suite {
    fn id(&self) -> &str {
        Self::ID
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn children(&self) -> CoalesceResult<Vec<GeneratorNode>> {
        let ctx = &self.ctx;
        Ok(vec![
            self.file::<TsMetadata>(typescript::METADATA_FILE, TsMetadata::new(Arc::clone(ctx)))?,
            self.file::<TsModels>(typescript::MODELS_FILE, TsModels::new(Arc::clone(ctx)))?,
            self.file::<TsApiClients>(typescript::API_CLIENTS_FILE, TsApiClients::new(Arc::clone(ctx)))?,
            self.file::<TsViewModels>(typescript::VIEWMODELS_FILE, TsViewModels::new(Arc::clone(ctx)))?,
        ])
    }

    fn cleaners(&self) -> Vec<Arc<dyn Cleaner>> {
        vec![Arc::new(
            DirectoryCleaner::new(self.ctx.paths().client_root.clone(), typescript::GENERATED_SUFFIX).shallow(),
        )]
    }
}

// ============================================================================
// RootGenerator
// ============================================================================

/// Both suites
pub struct RootGenerator {
    ctx: Arc<GenerationContext>,
    disabled: bool,
}

impl Configurable for RootGenerator {
    const ID: &'static str = "Coalesce.Generators.RootGenerator";
    type Settings = CommonSettings;
}

impl RootGenerator {
    pub fn new(ctx: Arc<GenerationContext>) -> CoalesceResult<Self> {
        let disabled = Self::settings(&ctx)?.disabled;
        Ok(Self { ctx, disabled })
    }
}

impl CompositeGenerator for RootGenerator {
    fn id(&self) -> &str {
        Self::ID
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn children(&self) -> CoalesceResult<Vec<GeneratorNode>> {
        Ok(vec![
            GeneratorNode::composite(CSharpSuite::new(Arc::clone(&self.ctx))?),
            GeneratorNode::composite(Vue3Suite::new(Arc::clone(&self.ctx))?),
        ])
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoalesceConfig;
    use crate::generator::{GenerationPlan, Generator};
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::Path;

    fn context(base: &Path, config: CoalesceConfig) -> Arc<GenerationContext> {
        Arc::new(GenerationContext::new(testing::both()[1].repo.clone(), config, base))
    }

    fn web_config() -> CoalesceConfig {
        CoalesceConfig::new("MyProject.Web").with_web_root("web")
    }

    // ── planning ─────────────────────────────────────────────────────────

    #[test]
    fn test_root_generator_plans_both_suites() {
        let ctx = context(Path::new("/repo"), web_config());
        let root = root_generator(ctx).unwrap();
        let plan = GenerationPlan::flatten(root.as_ref()).unwrap();
        let paths = plan.output_paths();

        assert!(paths.contains(Path::new("/repo/web/Models/Generated/PersonDtoGen.g.cs")));
        assert!(paths.contains(Path::new("/repo/web/Models/Generated/WeatherDataDtoGen.g.cs")));
        assert!(paths.contains(Path::new("/repo/web/Api/Generated/PersonController.g.cs")));
        assert!(paths.contains(Path::new("/repo/web/Api/Generated/WeatherServiceController.g.cs")));
        assert!(paths.contains(Path::new("/repo/web/src/metadata.g.ts")));
        assert!(paths.contains(Path::new("/repo/web/src/viewmodels.g.ts")));
        assert!(!paths.contains(Path::new("/repo/web/Api/Generated/WeatherDataController.g.cs")));
        assert_eq!(plan.cleaners.len(), 3);
    }

    #[test]
    fn test_root_generator_selection() {
        let ctx = context(Path::new("/repo"), web_config().with_root_generator("csharpsuite"));
        let root = root_generator(ctx).unwrap();
        assert_eq!(root.id(), "Coalesce.Generators.CSharpSuite");
        let plan = GenerationPlan::flatten(root.as_ref()).unwrap();
        assert!(plan.files.iter().all(|f| f.output_path().extension().unwrap() == "cs"));

        let ctx = context(Path::new("/repo"), web_config().with_root_generator("AngularSuite"));
        let err = root_generator(ctx).err().unwrap();
        assert!(matches!(err, CoalesceError::InvalidConfig(_)));
    }

    #[test]
    fn test_generator_config_applies() {
        let config = web_config()
            .with_generator_config("Vue3Suite", json!({"disabled": true}))
            .with_generator_config(
                "Coalesce.Generators.ModelApiController",
                json!({"targetDirectory": "Controllers", "routePrefix": "v1"}),
            );
        let ctx = context(Path::new("/repo"), config);
        let generator = Generator::new(root_generator(ctx).unwrap());
        let files = generator.render().unwrap();

        assert!(files.iter().all(|f| f.extension() == "cs"));
        let person = files
            .iter()
            .find(|f| f.path == Path::new("/repo/web/Controllers/PersonController.g.cs"))
            .unwrap();
        assert!(person.content.contains("[Route(\"v1/Person\")]"));
        // services keep their default location
        assert!(files
            .iter()
            .any(|f| f.path == Path::new("/repo/web/Api/Generated/WeatherServiceController.g.cs")));
    }

    #[test]
    fn test_settings_type_mismatch_is_reported() {
        let config = web_config().with_generator_config("ClassDto", json!({"disabled": "yes"}));
        let ctx = context(Path::new("/repo"), config);
        let suite = CSharpSuite::new(ctx).unwrap();
        let err = suite.children().err().unwrap();
        assert!(err.to_string().contains("ClassDto"), "{}", err);
    }

    // ── end to end ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_generate_clean_and_regenerate() {
        let dir = tempfile::tempdir().unwrap();
        let generated = dir.path().join("web/Models/Generated");
        std::fs::create_dir_all(&generated).unwrap();
        std::fs::write(generated.join("OldDtoGen.g.cs"), "// stale").unwrap();
        std::fs::write(generated.join("Notes.cs"), "// handwritten").unwrap();
        std::fs::create_dir_all(dir.path().join("web/src")).unwrap();
        std::fs::write(dir.path().join("web/src/legacy.g.ts"), "// stale").unwrap();

        let ctx = context(dir.path(), web_config());
        let first = Generator::new(root_generator(Arc::clone(&ctx)).unwrap())
            .run()
            .await
            .unwrap();

        assert!(first.written.contains(&generated.join("PersonDtoGen.g.cs")));
        assert!(first.written.contains(&dir.path().join("web/src/models.g.ts")));
        assert_eq!(
            first.deleted,
            vec![generated.join("OldDtoGen.g.cs"), dir.path().join("web/src/legacy.g.ts")]
        );
        assert!(generated.join("Notes.cs").exists());

        let dto = std::fs::read_to_string(generated.join("PersonDtoGen.g.cs")).unwrap();
        assert!(dto.starts_with("// <auto-generated>"));
        assert!(dto.contains("    public partial class PersonDtoGen"));

        let second = Generator::new(root_generator(ctx).unwrap()).run().await.unwrap();
        assert!(second.written.is_empty());
        assert!(second.deleted.is_empty());
        assert_eq!(second.unchanged.len(), first.written.len());
        assert!(!second.has_changes());
    }

    #[tokio::test]
    async fn test_disabled_generator_keeps_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path(), web_config());
        Generator::new(root_generator(ctx).unwrap()).run().await.unwrap();

        let config = web_config().with_generator_config("TsModels", json!({"disabled": true}));
        let ctx = context(dir.path(), config);
        let report = Generator::new(root_generator(ctx).unwrap()).run().await.unwrap();

        let models = dir.path().join("web/src/models.g.ts");
        assert_eq!(report.skipped, vec![models.clone()]);
        assert!(report.deleted.is_empty());
        assert!(models.exists());
    }
}
