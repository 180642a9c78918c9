//! Templates and the file generator that renders them
//!
//! A [`Template`] turns model data into text. [`TemplateFile`] binds a
//! template to an output path; C# output is normalized by
//! [`format_csharp`](crate::format::format_csharp) and every file gets the
//! generated-file header of its type.

use std::path::{Path, PathBuf};

use coalesce_core::{CoalesceError, CoalesceResult};

use crate::FileType;
use crate::format::format_csharp;
use crate::generator::FileGenerator;

pub trait Template: Send + Sync {
    /// Name used in render errors
    fn name(&self) -> String;

    fn render(&self) -> CoalesceResult<String>;
}

/// A [`FileGenerator`] over a [`Template`]
pub struct TemplateFile {
    id: &'static str,
    path: PathBuf,
    file_type: FileType,
    disabled: bool,
    template: Box<dyn Template>,
}

impl TemplateFile {
    pub fn new(id: &'static str, path: impl Into<PathBuf>, template: impl Template + 'static) -> Self {
        let path = path.into();
        Self {
            file_type: FileType::from_path(&path),
            id,
            path,
            disabled: false,
            template: Box::new(template),
        }
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

impl FileGenerator for TemplateFile {
    fn id(&self) -> &str {
        self.id
    }

    fn output_path(&self) -> &Path {
        &self.path
    }

    fn is_disabled(&self) -> bool {
        self.disabled
    }

    fn build_output(&self) -> CoalesceResult<Vec<u8>> {
        let body = self.template.render().map_err(|e| CoalesceError::TemplateRender {
            template: self.template.name(),
            message: e.to_string(),
        })?;
        let body = match self.file_type {
            FileType::CSharp => format_csharp(&body),
            _ => body,
        };
        let header = self.file_type.header();
        let mut out = String::with_capacity(header.len() + body.len() + 1);
        out.push_str(header);
        if !header.is_empty() {
            out.push('\n');
        }
        out.push_str(&body);
        Ok(out.into_bytes())
    }

    fn file_type(&self) -> FileType {
        self.file_type
    }
}

// ============================================================================
// Tests
// ============================================================================
