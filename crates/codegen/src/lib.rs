//! # Coalesce Codegen
//!
//! The generator pipeline that turns a
//! [`ReflectionRepository`](coalesce_model::ReflectionRepository) into source
//! files.
//!
//! ## Features
//!
//! - **Generator framework**: [`FileGenerator`] leaves composed by
//!   [`CompositeGenerator`]s, with [`Cleaner`]s for stale output
//! - **Runner**: every file generator runs concurrently; files are only
//!   rewritten when their content changes
//! - **C# generation**: `<Name>DtoGen` classes and API controllers
//! - **TypeScript generation**: metadata, models, API clients and view models
//!   for Vue 3 clients
//! - **Configuration**: `coalesce.json` with typed per-generator settings
//!

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod context;
pub mod csharp;
pub mod format;
pub mod generator;
pub mod suites;
pub mod template;
pub mod typescript;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{CoalesceConfig, CommonSettings, ControllerSettings, ProjectPaths};
pub use context::GenerationContext;
pub use format::format_csharp;
pub use generator::{
    Cleaner, CompositeGenerator, Configurable, DirectoryCleaner, FileGenerator, GenerationPlan,
    GenerationReport, Generator, GeneratorNode,
};
pub use suites::{CSharpSuite, RootGenerator, Vue3Suite, root_generator};
pub use template::{Template, TemplateFile};

use std::path::{Path, PathBuf};

// ============================================================================
// GeneratedFile
// ============================================================================

/// A rendered file that has not been written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
    pub file_type: FileType,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>, file_type: FileType) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            file_type,
        }
    }

    pub fn extension(&self) -> &str {
        self.file_type.extension()
    }
}

/// Type of generated file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    CSharp,
    TypeScript,
    Json,
    Other,
}

impl FileType {
    pub fn extension(&self) -> &str {
        match self {
            FileType::CSharp => "cs",
            FileType::TypeScript => "ts",
            FileType::Json => "json",
            FileType::Other => "txt",
        }
    }

    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("cs") => FileType::CSharp,
            Some("ts") => FileType::TypeScript,
            Some("json") => FileType::Json,
            _ => FileType::Other,
        }
    }

    /// Comment block placed at the top of every generated file of this type
    pub fn header(&self) -> &'static str {
        match self {
            FileType::CSharp => {
                "// <auto-generated>\n// Generated by Coalesce. Changes to this file will be lost when it is regenerated.\n// </auto-generated>\n"
            }
            FileType::TypeScript => {
                "// Generated by Coalesce. Changes to this file will be lost when it is regenerated.\n"
            }
            FileType::Json | FileType::Other => "",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_from_path() {
        assert_eq!(FileType::from_path(Path::new("Models/PersonDtoGen.g.cs")), FileType::CSharp);
        assert_eq!(FileType::from_path(Path::new("src/models.g.ts")), FileType::TypeScript);
        assert_eq!(FileType::from_path(Path::new("README")), FileType::Other);
    }

    #[test]
    fn test_generated_file() {
        let file = GeneratedFile::new("a.g.cs", "class A {}", FileType::CSharp);
        assert_eq!(file.extension(), "cs");
        assert!(FileType::CSharp.header().contains("<auto-generated>"));
        assert!(FileType::Json.header().is_empty());
    }
}
