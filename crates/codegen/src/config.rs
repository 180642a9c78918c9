//! # `coalesce.json`
//!
//! The configuration document read by the generator driver:
//!
//! ```json
//! {
//!   "rootGenerator": "RootGenerator",
//!   "webProject": { "rootDirectory": "src/Web", "rootNamespace": "MyProject.Web" },
//!   "dataProject": { "rootDirectory": "src/Data" },
//!   "generatorConfig": {
//!     "Coalesce.Generators.ClassDto": { "disabled": false },
//!     "TsViewModels": { "targetDirectory": "src/generated" }
//!   }
//! }
//! ```
//!
//! Relative paths resolve against the directory holding the file. Each
//! generator reads its own section of `generatorConfig` into a typed settings
//! struct, looked up by full id, then short id.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use coalesce_core::{CoalesceError, CoalesceResult, Persistable, Validatable};

/// Root generator used when `rootGenerator` is absent
pub const DEFAULT_ROOT_GENERATOR: &str = "RootGenerator";

/// Names accepted for `rootGenerator`
pub const ROOT_GENERATORS: &[&str] = &["RootGenerator", "CSharpSuite", "Vue3Suite"];

fn default_root_generator() -> String {
    DEFAULT_ROOT_GENERATOR.to_string()
}

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoalesceConfig {
    #[serde(default = "default_root_generator")]
    pub root_generator: String,

    pub web_project: WebProjectConfig,

    pub data_project: DataProjectConfig,

    /// Reflection metadata snapshot used instead of parsing C# sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_file: Option<PathBuf>,

    /// Where TypeScript output goes; defaults to `<webProject>/src`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_directory: Option<PathBuf>,

    /// Per-generator settings keyed by generator id
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub generator_config: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebProjectConfig {
    pub root_directory: PathBuf,
    pub root_namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dto_namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataProjectConfig {
    pub root_directory: PathBuf,
}

impl Persistable for CoalesceConfig {}

impl CoalesceConfig {
    pub fn new(root_namespace: impl Into<String>) -> Self {
        Self {
            root_generator: default_root_generator(),
            web_project: WebProjectConfig {
                root_directory: PathBuf::from("."),
                root_namespace: root_namespace.into(),
                dto_namespace: None,
            },
            data_project: DataProjectConfig {
                root_directory: PathBuf::from("."),
            },
            metadata_file: None,
            client_directory: None,
            generator_config: Map::new(),
        }
    }

    /// Read and validate a `coalesce.json` file
    pub fn load(path: &Path) -> CoalesceResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| CoalesceError::FileRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| CoalesceError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_root_generator(mut self, name: impl Into<String>) -> Self {
        self.root_generator = name.into();
        self
    }

    pub fn with_web_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.web_project.root_directory = dir.into();
        self
    }

    pub fn with_data_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_project.root_directory = dir.into();
        self
    }

    pub fn with_dto_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.web_project.dto_namespace = Some(namespace.into());
        self
    }

    pub fn with_client_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.client_directory = Some(dir.into());
        self
    }

    pub fn with_metadata_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_file = Some(path.into());
        self
    }

    /// Set the settings section of one generator
    pub fn with_generator_config(mut self, id: impl Into<String>, settings: Value) -> Self {
        self.generator_config.insert(id.into(), settings);
        self
    }

    pub fn root_namespace(&self) -> &str {
        &self.web_project.root_namespace
    }

    /// Namespace of generated DTOs; `<rootNamespace>.Models` unless configured
    pub fn dto_namespace(&self) -> String {
        self.web_project
            .dto_namespace
            .clone()
            .unwrap_or_else(|| format!("{}.Models", self.web_project.root_namespace))
    }

    /// Namespace of generated API controllers
    pub fn api_namespace(&self) -> String {
        format!("{}.Api", self.web_project.root_namespace)
    }

    /// Raw settings section for `id`, by full id, then short id, ignoring case
    pub fn generator_section(&self, id: &str) -> Option<&Value> {
        let short = short_id(id);
        self.generator_config
            .get(id)
            .or_else(|| self.generator_config.get(short))
            .or_else(|| {
                self.generator_config
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(id) || k.eq_ignore_ascii_case(short))
                    .map(|(_, v)| v)
            })
    }

    /// Typed settings for `id`; absent sections and unknown keys fall back to
    /// the defaults
    pub fn settings<S: DeserializeOwned + Default>(&self, id: &str) -> CoalesceResult<S> {
        match self.generator_section(id) {
            None | Some(Value::Null) => Ok(S::default()),
            Some(section) => serde_json::from_value(section.clone()).map_err(|e| {
                CoalesceError::InvalidConfig(format!("generatorConfig.{}: {}", short_id(id), e))
            }),
        }
    }

    /// Paths resolved against `base_dir`
    pub fn paths(&self, base_dir: &Path) -> ProjectPaths {
        let web_root = base_dir.join(&self.web_project.root_directory);
        let client_root = match &self.client_directory {
            Some(dir) => base_dir.join(dir),
            None => web_root.join("src"),
        };
        ProjectPaths {
            data_root: base_dir.join(&self.data_project.root_directory),
            metadata_file: self.metadata_file.as_ref().map(|f| base_dir.join(f)),
            client_root,
            web_root,
        }
    }
}

impl Validatable for CoalesceConfig {
    fn validate(&self) -> CoalesceResult<()> {
        let ns = self.web_project.root_namespace.trim();
        if ns.is_empty() {
            return Err(CoalesceError::MissingConfig("webProject.rootNamespace".into()));
        }
        if !ns
            .split('.')
            .all(|seg| seg.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_'))
        {
            return Err(CoalesceError::InvalidConfig(format!(
                "webProject.rootNamespace '{}' is not a valid namespace",
                ns
            )));
        }
        if !ROOT_GENERATORS
            .iter()
            .any(|g| g.eq_ignore_ascii_case(&self.root_generator))
        {
            return Err(CoalesceError::InvalidConfig(format!(
                "rootGenerator '{}' is not one of {}",
                self.root_generator,
                ROOT_GENERATORS.join(", ")
            )));
        }
        if let Some((id, _)) = self
            .generator_config
            .iter()
            .find(|(_, v)| !matches!(v, Value::Object(_) | Value::Null))
        {
            return Err(CoalesceError::InvalidConfig(format!(
                "generatorConfig.{} must be an object",
                id
            )));
        }
        Ok(())
    }
}

/// Directories a run reads from and writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub web_root: PathBuf,
    pub data_root: PathBuf,
    pub client_root: PathBuf,
    pub metadata_file: Option<PathBuf>,
}

/// Last segment of a dotted generator id
pub fn short_id(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

// ============================================================================
// Settings
// ============================================================================

/// Settings every generator understands
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommonSettings {
    pub disabled: bool,
    /// Output directory relative to the generator's root
    pub target_directory: Option<PathBuf>,
}

/// Settings of the C# API controller generators
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerSettings {
    #[serde(flatten)]
    pub common: CommonSettings,
    /// First route segment (`api/Person`)
    pub route_prefix: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            common: CommonSettings::default(),
            route_prefix: "api".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
