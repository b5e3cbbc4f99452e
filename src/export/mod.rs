//! Exporters for the canonical model

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ExportError;
use crate::models::Event;

pub mod json;
pub mod tcx;

pub use tcx::TcxExporter;

/// Export format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Tcx,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Result<Self, ExportError> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "tcx" => Ok(ExportFormat::Tcx),
            _ => Err(ExportError::Serialization(format!("Unsupported export format: {}", s))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Tcx => "tcx",
        }
    }
}

/// Write an event to `path` in the given format
pub fn export_event(event: &Event, format: ExportFormat, path: &Path) -> Result<(), ExportError> {
    match format {
        ExportFormat::Json => json::export_event(event, path),
        ExportFormat::Tcx => TcxExporter::export_event(event, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format_parsing() {
        assert_eq!(ExportFormat::from_str("JSON").unwrap(), ExportFormat::Json);
        assert_eq!(ExportFormat::from_str("tcx").unwrap().extension(), "tcx");
        assert!(ExportFormat::from_str("pdf").is_err());
    }
}
