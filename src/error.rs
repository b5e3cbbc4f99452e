//! Unified error hierarchy for sportsrs
//!
//! Importers, exporters and the persistence boundary each have their own error
//! enum; `SportsError` wraps them for callers that drive the whole pipeline.

use thiserror::Error;

/// Top-level error type for all sportsrs operations
#[derive(Debug, Error)]
pub enum SportsError {
    /// Import (parsing) errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Export (serialization) errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Persistence boundary errors
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors raised while turning a raw document into an `Event`
#[derive(Debug, Error)]
pub enum ImportError {
    /// Malformed or structurally invalid input
    #[error("Invalid {format} document: {reason}")]
    Format { format: String, reason: String },

    /// A structurally required element or field is absent
    #[error("Missing required element in {format}: {element}")]
    MissingElement { format: String, element: String },

    /// A measurement type name that is not part of the registry
    #[error("Unknown measurement type: {type_name}")]
    UnknownType { type_name: String },

    /// The input does not match any supported dialect
    #[error("Unsupported document: {0}")]
    UnsupportedDocument(String),

    /// JSON syntax or shape errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML syntax errors
    #[error("XML error: {0}")]
    Xml(String),

    /// Binary decoder errors
    #[error("FIT decoding error: {0}")]
    Fit(String),

    /// The background decode task failed to complete
    #[error("Decode task failed: {0}")]
    Task(String),
}

impl ImportError {
    pub fn format(format: &str, reason: impl Into<String>) -> Self {
        ImportError::Format {
            format: format.to_string(),
            reason: reason.into(),
        }
    }

    pub fn missing(format: &str, element: impl Into<String>) -> Self {
        ImportError::MissingElement {
            format: format.to_string(),
            element: element.into(),
        }
    }
}

/// Export errors
#[derive(Debug, Error)]
pub enum ExportError {
    /// A dependent aggregate was never computed
    #[error("Missing required data: {field}")]
    MissingData { field: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for ExportError {
    fn from(err: quick_xml::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Serialization(err.to_string())
    }
}

/// Errors at the persisted-size boundary
#[derive(Debug, Error)]
pub enum PersistError {
    /// Even the compressed stream exceeds the ceiling
    #[error("Cannot compress stream under limit: {size} bytes compressed, limit is {limit} bytes")]
    CannotCompress { size: usize, limit: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for sportsrs operations
pub type Result<T> = std::result::Result<T, SportsError>;

impl SportsError {
    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            SportsError::Import(ImportError::UnsupportedDocument(_)) => ErrorSeverity::Warning,
            SportsError::Import(ImportError::UnknownType { .. }) => ErrorSeverity::Critical,
            SportsError::Persist(PersistError::CannotCompress { .. }) => ErrorSeverity::Critical,
            SportsError::Configuration(_) => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            SportsError::Import(ImportError::UnsupportedDocument(reason)) => {
                format!("This file is not a supported activity recording ({})", reason)
            }
            SportsError::Import(ImportError::UnknownType { type_name }) => {
                format!(
                    "The document contains an unknown measurement '{}'. It may come from a newer version.",
                    type_name
                )
            }
            SportsError::Export(ExportError::MissingData { field }) => {
                format!("Cannot export: '{}' has not been computed. Regenerate stats first.", field)
            }
            SportsError::Persist(PersistError::CannotCompress { size, limit }) => {
                format!(
                    "Activity is too large to store ({} bytes after compression, limit {})",
                    size, limit
                )
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Data corruption or an unrecoverable boundary violation
    Critical,
    /// Error that prevents the operation
    Error,
    /// Warning that doesn't prevent other operations
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
