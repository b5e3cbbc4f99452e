// Library interface for sportsrs modules
// This allows integration tests and the CLI to share the core functionality

pub mod activity_type;
pub mod config;
pub mod error;
pub mod export;
pub mod geodesy;
pub mod ibi;
pub mod import;
pub mod interpolation;
pub mod logging;
pub mod measurement;
pub mod models;
pub mod persistence;
pub mod summary;

// Re-export commonly used types for convenience
pub use activity_type::ActivityType;
pub use config::AppConfig;
pub use error::{ExportError, ImportError, PersistError, Result, SportsError};
pub use geodesy::{DistanceAlgorithm, DistanceCalculator};
pub use ibi::IbiSeries;
pub use import::{detect_and_parse, detect_and_parse_async, Importer, SourceFormat};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use measurement::{Measurement, MeasurementKind, MeasurementValue};
pub use models::*;
pub use persistence::{EncodedStream, PersistedEvent, MAX_STREAM_BYTES};
pub use summary::SummaryGenerator;
