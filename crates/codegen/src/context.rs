//! # Generation Context
//!
//! The `GenerationContext` holds everything generators read during a run:
//!
//! - the built [`ReflectionRepository`]
//! - the `coalesce.json` document and its resolved directories
//! - the namespaces generated C# lives in
//!
//! It is built once and shared by `Arc` with every generator, so leaf
//! generators can be moved into concurrent tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;

use coalesce_core::CoalesceResult;
use coalesce_model::ReflectionRepository;

use crate::config::{CoalesceConfig, CommonSettings, ProjectPaths};

// ============================================================================
// GenerationContext
// ============================================================================

#[derive(Debug, Clone)]
pub struct GenerationContext {
    repository: Arc<ReflectionRepository>,
    config: Arc<CoalesceConfig>,
    paths: ProjectPaths,

    // ── derived ──────────────────────────────────────────────────────────
    dto_namespace: String,
    api_namespace: String,
}

impl GenerationContext {
    // ====================================================================
    // Construction
    // ====================================================================

    /// Build a context; relative paths in `config` resolve against `base_dir`
    pub fn new(
        repository: Arc<ReflectionRepository>,
        config: CoalesceConfig,
        base_dir: impl AsRef<Path>,
    ) -> Self {
        let paths = config.paths(base_dir.as_ref());
        Self {
            dto_namespace: config.dto_namespace(),
            api_namespace: config.api_namespace(),
            config: Arc::new(config),
            repository,
            paths,
        }
    }

    // ====================================================================
    // Accessors
    // ====================================================================

    pub fn repository(&self) -> &Arc<ReflectionRepository> {
        &self.repository
    }

    pub fn config(&self) -> &CoalesceConfig {
        &self.config
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn root_namespace(&self) -> &str {
        self.config.root_namespace()
    }

    pub fn dto_namespace(&self) -> &str {
        &self.dto_namespace
    }

    pub fn api_namespace(&self) -> &str {
        &self.api_namespace
    }

    // ====================================================================
    // Settings
    // ====================================================================

    pub fn settings<S: DeserializeOwned + Default>(&self, id: &str) -> CoalesceResult<S> {
        self.config.settings(id)
    }

    /// Whether `generatorConfig` disables the generator `id`
    pub fn is_disabled(&self, id: &str) -> CoalesceResult<bool> {
        Ok(self.settings::<CommonSettings>(id)?.disabled)
    }

    // ====================================================================
    // Output locations
    // ====================================================================

    /// `default_dir` of the web project, or the configured target directory
    /// when one is set
    pub fn web_dir(&self, target: Option<&Path>, default_dir: &str) -> PathBuf {
        match target {
            Some(dir) => self.paths.web_root.join(dir),
            None => self.paths.web_root.join(default_dir),
        }
    }

    /// `file_name` inside [`web_dir`](Self::web_dir)
    pub fn web_path(&self, target: Option<&Path>, default_dir: &str, file_name: &str) -> PathBuf {
        self.web_dir(target, default_dir).join(file_name)
    }

    /// `file_name` under the client directory, or under the configured target
    /// directory when one is set
    pub fn client_path(&self, target: Option<&Path>, file_name: &str) -> PathBuf {
        match target {
            Some(dir) => self.paths.client_root.join(dir).join(file_name),
            None => self.paths.client_root.join(file_name),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn context() -> GenerationContext {
        let config = CoalesceConfig::new("MyProject.Web")
            .with_web_root("web")
            .with_generator_config("ClassDto", json!({"disabled": true, "targetDirectory": "Dtos"}));
        GenerationContext::new(testing::both()[0].repo.clone(), config, "/repo")
    }

    #[test]
    fn test_namespaces() {
        let ctx = context();
        assert_eq!(ctx.dto_namespace(), "MyProject.Web.Models");
        assert_eq!(ctx.api_namespace(), "MyProject.Web.Api");
    }

    #[test]
    fn test_disabled_and_paths() {
        let ctx = context();
        assert!(ctx.is_disabled("Coalesce.Generators.ClassDto").unwrap());
        assert!(!ctx.is_disabled("Coalesce.Generators.TsModels").unwrap());

        let settings: CommonSettings = ctx.settings("ClassDto").unwrap();
        assert_eq!(
            ctx.web_path(settings.target_directory.as_deref(), "Models/Generated", "A.g.cs"),
            PathBuf::from("/repo/web/Dtos/A.g.cs")
        );
        assert_eq!(
            ctx.web_path(None, "Models/Generated", "A.g.cs"),
            PathBuf::from("/repo/web/Models/Generated/A.g.cs")
        );
        assert_eq!(ctx.client_path(None, "models.g.ts"), PathBuf::from("/repo/web/src/models.g.ts"));
    }
}
