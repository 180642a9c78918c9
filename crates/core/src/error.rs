//! Error types for Coalesce
//!
//! This module provides unified error handling across discovery, generation
//! and the runtime CRUD engine.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Coalesce
#[derive(Debug, Error)]
pub enum CoalesceError {
    // ========================================================================
    // Modeling Errors
    // ========================================================================
    /// A type was requested from the repository but never discovered
    #[error("Type not found in reflection repository: {0}")]
    TypeNotFound(String),

    /// Discovery of a type graph failed
    #[error("Discovery failed for '{type_name}': {message}")]
    Discovery { type_name: String, message: String },

    /// A type reference in source could not be bound to a symbol
    #[error("Unable to resolve symbol '{name}' referenced from '{context}'")]
    SymbolResolution { name: String, context: String },

    /// Source text could not be parsed
    #[error("Parse error in '{path}': {message}")]
    Parse { path: String, message: String },

    /// A property or member lookup failed
    #[error("Member '{member}' not found on type '{type_name}'")]
    MemberNotFound { type_name: String, member: String },

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// A keyed lookup (data source, behaviors, service) failed
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// An entity lookup by primary key failed
    #[error("Item with ID {id} was not found.")]
    ItemNotFound { id: String },

    /// General validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// An error surfaced by the data store
    #[error("Database error: {0}")]
    Database(String),

    /// Operation cancelled through a cancellation token
    #[error("Operation cancelled")]
    Cancelled,

    // ========================================================================
    // Code Generation Errors
    // ========================================================================
    /// Code generation failed
    #[error("Code generation failed: {0}")]
    CodeGeneration(String),

    /// Template rendering failed
    #[error("Template rendering failed for '{template}': {message}")]
    TemplateRender { template: String, message: String },

    // ========================================================================
    // IO Errors
    // ========================================================================
    /// File IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File read error
    #[error("Failed to read file '{path}': {message}")]
    FileRead { path: PathBuf, message: String },

    /// File write error
    #[error("Failed to write file '{path}': {message}")]
    FileWrite { path: PathBuf, message: String },

    /// File delete error
    #[error("Failed to delete file '{path}': {message}")]
    FileDelete { path: PathBuf, message: String },

    /// Directory creation failed
    #[error("Failed to create directory '{path}': {message}")]
    DirectoryCreate { path: PathBuf, message: String },

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },
}

impl CoalesceError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        CoalesceError::Validation(msg.into())
    }

    /// Create a discovery error
    pub fn discovery(type_name: impl Into<String>, msg: impl Into<String>) -> Self {
        CoalesceError::Discovery {
            type_name: type_name.into(),
            message: msg.into(),
        }
    }

    /// Create a parse error
    pub fn parse(path: impl Into<String>, msg: impl Into<String>) -> Self {
        CoalesceError::Parse {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Create a code generation error
    pub fn codegen(msg: impl Into<String>) -> Self {
        CoalesceError::CodeGeneration(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        CoalesceError::Database(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        CoalesceError::Internal(msg.into())
    }

    /// Create an error with context
    pub fn with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        CoalesceError::WithContext {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Check if this error is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, CoalesceError::Validation(_))
    }

    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoalesceError::TypeNotFound(_)
                | CoalesceError::MemberNotFound { .. }
                | CoalesceError::KeyNotFound(_)
                | CoalesceError::ItemNotFound { .. }
        )
    }

    /// Check if this error is a modeling error raised during discovery
    pub fn is_modeling(&self) -> bool {
        matches!(
            self,
            CoalesceError::TypeNotFound(_)
                | CoalesceError::Discovery { .. }
                | CoalesceError::SymbolResolution { .. }
                | CoalesceError::Parse { .. }
                | CoalesceError::MemberNotFound { .. }
        )
    }

    /// Check if this error is an IO error
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            CoalesceError::Io(_)
                | CoalesceError::FileRead { .. }
                | CoalesceError::FileWrite { .. }
                | CoalesceError::FileDelete { .. }
                | CoalesceError::DirectoryCreate { .. }
        )
    }
}

/// Result type alias using CoalesceError
pub type CoalesceResult<T> = Result<T, CoalesceError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> CoalesceResult<T>;
}

impl<T, E: Into<CoalesceError>> ResultExt<T> for Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> CoalesceResult<T> {
        self.map_err(|e| {
            let err: CoalesceError = e.into();
            CoalesceError::WithContext {
                context: context.into(),
                message: err.to_string(),
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
