//! Core traits for Coalesce
//!
//! This module defines the traits that configuration documents and model
//! snapshots implement for validation and persistence.

use crate::error::{CoalesceError, CoalesceResult};
use serde::{Serialize, de::DeserializeOwned};

// ============================================================================
// Validatable Trait
// ============================================================================

/// Trait for types that can be validated
///
/// Types implementing this trait can check their internal consistency
/// and return validation errors if the state is invalid.
///
/// # Example
///
/// ```rust,ignore
/// use coalesce_core::{Validatable, CoalesceResult, CoalesceError};
///
/// struct WebProject {
///     root_namespace: String,
/// }
///
/// impl Validatable for WebProject {
///     fn validate(&self) -> CoalesceResult<()> {
///         if self.root_namespace.is_empty() {
///             return Err(CoalesceError::validation("rootNamespace cannot be empty"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Validatable {
    /// Validate the current state of the object
    ///
    /// Returns `Ok(())` if valid, or a `CoalesceError` describing the problem.
    fn validate(&self) -> CoalesceResult<()>;

    /// Check if the object is valid without returning error details
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Get all validation errors (for types that can have multiple errors)
    fn validation_errors(&self) -> Vec<String> {
        match self.validate() {
            Ok(()) => vec![],
            Err(e) => vec![e.to_string()],
        }
    }
}

// ============================================================================
// Persistable Trait
// ============================================================================

/// Trait for documents that are stored as JSON files
///
/// Implemented by `coalesce.json` configuration and by reflection metadata
/// snapshots.
pub trait Persistable: Serialize + DeserializeOwned + Sized {
    /// Get the file extension for this type (without the dot)
    fn file_extension() -> &'static str {
        "json"
    }

    /// Save to a JSON string
    fn to_json(&self) -> CoalesceResult<String> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    /// Load from a JSON string
    fn from_json(json: &str) -> CoalesceResult<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Save to a file
    fn save_to_file(&self, path: &std::path::Path) -> CoalesceResult<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).map_err(|e| CoalesceError::FileWrite {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from a file
    fn load_from_file(path: &std::path::Path) -> CoalesceResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CoalesceError::FileRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_json(&json).map_err(|e| CoalesceError::FileRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
