//! Importers: raw documents to the canonical `Event`
//!
//! Each dialect lives in its own module and exposes a pure function from the
//! raw input to an `Event`. [`detect_and_parse`] probes the input in a fixed
//! order and dispatches; callers that already know the dialect use
//! [`parse_as`]. The free functions run with default settings, an
//! [`Importer`] carries the configured ones.

use anyhow::Context;
use chrono::{DateTime, NaiveDateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use serde::de::IgnoredAny;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::{ImportError, SportsError};
use crate::models::{Event, Lap};
use crate::summary::SummaryGenerator;
use self::devices::DeviceRegistry;

pub mod devices;
pub mod device_log;
pub mod fit;
pub mod gpx;
pub mod json;
pub mod multisport;
pub mod tcx;
pub mod telemetry;
pub mod xml;

/// Supported source dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    /// Canonical JSON persisted document
    Canonical,
    /// Lap/track XML
    Tcx,
    /// Track-point XML with namespaced extensions
    Gpx,
    /// Header + samples JSON, one activity
    DeviceLog,
    /// Continuous multi-activity sample stream
    MultisportStream,
    /// Entries with embedded attribute documents
    Telemetry,
    /// Binary device format
    Fit,
}

impl SourceFormat {
    pub const ALL: [SourceFormat; 7] = [
        SourceFormat::Canonical,
        SourceFormat::Tcx,
        SourceFormat::Gpx,
        SourceFormat::DeviceLog,
        SourceFormat::MultisportStream,
        SourceFormat::Telemetry,
        SourceFormat::Fit,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SourceFormat::Canonical => "canonical",
            SourceFormat::Tcx => "tcx",
            SourceFormat::Gpx => "gpx",
            SourceFormat::DeviceLog => "device-log",
            SourceFormat::MultisportStream => "multisport",
            SourceFormat::Telemetry => "telemetry",
            SourceFormat::Fit => "fit",
        }
    }

    /// File extensions worth probing when scanning a directory
    fn matches_extension(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                matches!(
                    ext.to_lowercase().as_str(),
                    "json" | "tcx" | "gpx" | "xml" | "fit"
                )
            })
            .unwrap_or(false)
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.name() == wanted)
            .or(match wanted.as_str() {
                "json" => Some(SourceFormat::Canonical),
                "devicelog" | "device_log" => Some(SourceFormat::DeviceLog),
                "stream" => Some(SourceFormat::MultisportStream),
                _ => None,
            })
            .ok_or_else(|| format!("Unknown source format: {}", s))
    }
}

/// Binary recordings carry ".FIT" at byte offset 8 of the header
fn is_fit(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[8..12] == b".FIT"
}

/// Determines the dialect of a raw input.
///
/// Order: binary header, then XML root element, then top-level JSON key.
pub fn detect_format(bytes: &[u8]) -> Result<SourceFormat, ImportError> {
    if is_fit(bytes) {
        return Ok(SourceFormat::Fit);
    }

    let text = std::str::from_utf8(bytes)
        .map_err(|_| ImportError::UnsupportedDocument("not a text document".to_string()))?;
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();

    if trimmed.starts_with('<') {
        return match xml_root_name(trimmed)?.as_str() {
            "TrainingCenterDatabase" => Ok(SourceFormat::Tcx),
            "gpx" => Ok(SourceFormat::Gpx),
            other => Err(ImportError::UnsupportedDocument(format!(
                "unknown XML root element '{}'",
                other
            ))),
        };
    }

    if trimmed.starts_with('{') {
        // Values are skipped unparsed, only the key set is kept
        let object: HashMap<String, IgnoredAny> = serde_json::from_str(trimmed)?;
        let probes = [
            ("activities", SourceFormat::Canonical),
            ("DeviceLog", SourceFormat::DeviceLog),
            ("Samples", SourceFormat::MultisportStream),
            ("Entries", SourceFormat::Telemetry),
        ];
        return probes
            .into_iter()
            .find(|(key, _)| object.contains_key(*key))
            .map(|(_, format)| format)
            .ok_or_else(|| {
                ImportError::UnsupportedDocument("no recognized top-level JSON key".to_string())
            });
    }

    Err(ImportError::UnsupportedDocument(
        "input is neither FIT, XML nor JSON".to_string(),
    ))
}

/// Local name of the first element, read without building the document
fn xml_root_name(text: &str) -> Result<String, ImportError> {
    let mut reader = Reader::from_str(text);
    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(start)) | Ok(XmlEvent::Empty(start)) => {
                return Ok(String::from_utf8_lossy(start.local_name().as_ref()).into_owned());
            }
            Ok(XmlEvent::Eof) => {
                return Err(ImportError::Xml("document has no root element".to_string()))
            }
            Ok(_) => {}
            Err(e) => return Err(ImportError::Xml(e.to_string())),
        }
    }
}

/// Detects the dialect and parses synchronously. Binary recordings have to go
/// through [`detect_and_parse_async`] or [`fit::import_fit`].
pub fn detect_and_parse(bytes: &[u8]) -> Result<Event, ImportError> {
    Importer::default().detect_and_parse(bytes)
}

/// Parses the input as a known dialect
pub fn parse_as(format: SourceFormat, bytes: &[u8]) -> Result<Event, ImportError> {
    Importer::default().parse_as(format, bytes)
}

fn binary_needs_async() -> ImportError {
    ImportError::UnsupportedDocument("binary FIT recordings must be decoded with import_fit".to_string())
}

/// Detects and parses any supported input, awaiting the binary decoder when needed
pub async fn detect_and_parse_async(bytes: Vec<u8>) -> Result<Event, ImportError> {
    Importer::default().detect_and_parse_async(bytes).await
}

/// Reads and imports one file, optionally forcing the dialect
pub async fn import_file(path: &Path, format: Option<SourceFormat>) -> Result<Event, SportsError> {
    Importer::default().import_file(path, format).await
}

/// Imports every recognizable file of a directory, reporting failures per file
pub async fn import_directory(dir_path: &Path) -> anyhow::Result<Vec<(PathBuf, Event)>> {
    Importer::default().import_directory(dir_path).await
}

/// Import entry points bound to one set of settings: the summary generator
/// that completes computed stats and the device names for binary recordings
#[derive(Debug, Clone, Default)]
pub struct Importer {
    generator: SummaryGenerator,
    devices: Arc<DeviceRegistry>,
}

impl Importer {
    pub fn new(generator: SummaryGenerator, devices: DeviceRegistry) -> Self {
        Self {
            generator,
            devices: Arc::new(devices),
        }
    }

    /// Generator from `[stats]`; built-in device names extended by the
    /// `[devices]` registry file when one is configured
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let mut devices = DeviceRegistry::with_defaults();
        if let Some(path) = &config.devices.registry_path {
            devices.extend(DeviceRegistry::load_from_file(path)?);
            tracing::info!(path = %path.display(), "Loaded device registry");
        }
        Ok(Self::new(SummaryGenerator::new(config.stats.clone()), devices))
    }

    pub fn generator(&self) -> &SummaryGenerator {
        &self.generator
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    #[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
    pub fn detect_and_parse(&self, bytes: &[u8]) -> Result<Event, ImportError> {
        let format = detect_format(bytes)?;
        tracing::debug!(%format, "Detected source format");
        self.parse_as(format, bytes)
    }

    pub fn parse_as(&self, format: SourceFormat, bytes: &[u8]) -> Result<Event, ImportError> {
        if format == SourceFormat::Fit {
            return Err(binary_needs_async());
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|e| ImportError::format(format.name(), format!("invalid UTF-8: {}", e)))?;
        let text = text.trim_start_matches('\u{feff}');
        let generator = &self.generator;

        match format {
            SourceFormat::Canonical => json::import_str(text),
            SourceFormat::Tcx => tcx::import_with(text, generator),
            SourceFormat::Gpx => gpx::import_with(text, generator),
            SourceFormat::DeviceLog => device_log::import_with(text, generator),
            SourceFormat::MultisportStream => multisport::import_with(text, generator),
            SourceFormat::Telemetry => telemetry::import_with(text, generator),
            SourceFormat::Fit => Err(binary_needs_async()),
        }
    }

    pub async fn import_fit(&self, bytes: Vec<u8>) -> Result<Event, ImportError> {
        fit::import_fit_with(bytes, self.generator.clone(), Arc::clone(&self.devices)).await
    }

    pub async fn detect_and_parse_async(&self, bytes: Vec<u8>) -> Result<Event, ImportError> {
        match detect_format(&bytes)? {
            SourceFormat::Fit => self.import_fit(bytes).await,
            format => self.parse_as(format, &bytes),
        }
    }

    pub async fn import_file(
        &self,
        path: &Path,
        format: Option<SourceFormat>,
    ) -> Result<Event, SportsError> {
        let bytes = tokio::fs::read(path).await?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Read input file");

        let event = match format {
            Some(SourceFormat::Fit) => self.import_fit(bytes).await?,
            Some(format) => self.parse_as(format, &bytes)?,
            None => self.detect_and_parse_async(bytes).await?,
        };
        Ok(event)
    }

    pub async fn import_directory(&self, dir_path: &Path) -> anyhow::Result<Vec<(PathBuf, Event)>> {
        if !dir_path.is_dir() {
            anyhow::bail!("Path is not a directory: {}", dir_path.display());
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir_path)
            .with_context(|| format!("Failed to read directory: {}", dir_path.display()))?
        {
            let path = entry?.path();
            if path.is_file() && SourceFormat::matches_extension(&path) {
                files.push(path);
            }
        }
        files.sort();

        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({msg})")?
                .progress_chars("#>-"),
        );

        let mut events = Vec::new();
        for file_path in files {
            let file_name = file_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned();
            pb.set_message(format!("Processing {}", file_name));

            match self.import_file(&file_path, None).await {
                Ok(event) => {
                    pb.println(format!(
                        "✓ Imported {} activities from {}",
                        event.activities.len(),
                        file_name
                    ));
                    events.push((file_path, event));
                }
                Err(e) => {
                    tracing::warn!(file = %file_name, error = %e, "Import failed");
                    pb.println(format!("✗ Failed to import {}: {}", file_name, e));
                }
            }
            pb.inc(1);
        }

        pb.finish_with_message("Import complete");
        Ok(events)
    }
}

/// Accepts RFC 3339 timestamps and zone-less ISO 8601, which is taken as UTC
pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(text) {
        return Some(time.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn require_timestamp(
    format: &str,
    element: &str,
    text: Option<&str>,
) -> Result<DateTime<Utc>, ImportError> {
    let text = text.ok_or_else(|| ImportError::missing(format, element))?;
    parse_timestamp(text)
        .ok_or_else(|| ImportError::format(format, format!("invalid timestamp '{}' in {}", text, element)))
}

/// Zero-duration laps, and laps that report zero distance, carry no signal
pub(crate) fn is_usable_lap(lap: &Lap, format: &str) -> bool {
    use crate::measurement::MeasurementKind;

    let zero_duration = lap.end <= lap.start
        || lap.stats.value(MeasurementKind::Duration) == Some(0.0);
    let zero_distance = lap.stats.value(MeasurementKind::Distance) == Some(0.0);

    if zero_duration || zero_distance {
        tracing::warn!(
            format,
            start = %lap.start,
            zero_duration,
            zero_distance,
            "Skipping empty lap"
        );
        return false;
    }
    true
}

pub(crate) fn default_event_name(start: Option<DateTime<Utc>>) -> String {
    start
        .map(|s| s.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "Imported event".to_string())
}

/// Fills computed stats without touching values copied from the source
pub(crate) fn complete_import(
    mut event: Event,
    format: SourceFormat,
    generator: &SummaryGenerator,
) -> Event {
    generator.complete_event_stats(&mut event);
    tracing::info!(
        %format,
        activities = event.activities.len(),
        points = event.activities.iter().map(|a| a.point_count()).sum::<usize>(),
        laps = event.activities.iter().map(|a| a.laps().len()).sum::<usize>(),
        "Import complete"
    );
    event
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_order() {
        let mut fit = vec![14u8, 0x10, 0, 0, 0, 0, 0, 0];
        fit.extend_from_slice(b".FIT");
        assert_eq!(detect_format(&fit).unwrap(), SourceFormat::Fit);

        assert_eq!(
            detect_format(b"<TrainingCenterDatabase/>").unwrap(),
            SourceFormat::Tcx
        );
        assert_eq!(detect_format(b"  <gpx version=\"1.1\"/>").unwrap(), SourceFormat::Gpx);
        assert_eq!(detect_format(b"{\"activities\": []}").unwrap(), SourceFormat::Canonical);
        assert_eq!(detect_format(b"{\"DeviceLog\": {}}").unwrap(), SourceFormat::DeviceLog);
        assert_eq!(
            detect_format(b"{\"Samples\": [], \"Header\": {}}").unwrap(),
            SourceFormat::MultisportStream
        );
        assert_eq!(detect_format(b"{\"Entries\": []}").unwrap(), SourceFormat::Telemetry);
    }

    #[test]
    fn test_unsupported_inputs() {
        assert!(matches!(
            detect_format(b"<kml/>"),
            Err(ImportError::UnsupportedDocument(_))
        ));
        assert!(matches!(
            detect_format(b"{\"foo\": 1}"),
            Err(ImportError::UnsupportedDocument(_))
        ));
        assert!(matches!(
            detect_format(b"plain text"),
            Err(ImportError::UnsupportedDocument(_))
        ));
    }

    #[test]
    fn test_detection_reads_only_the_root() {
        // Unbalanced past the root start tag; only the root name matters here
        assert_eq!(
            detect_format(b"<?xml version=\"1.0\"?>\n<!-- export -->\n<gpx><trk><unclosed>").unwrap(),
            SourceFormat::Gpx
        );
        assert_eq!(
            detect_format(b"<ns:TrainingCenterDatabase xmlns:ns=\"urn:x\"><Activities>").unwrap(),
            SourceFormat::Tcx
        );
        assert_eq!(
            detect_format(b"{\"Header\": {\"Nested\": [1, {\"Samples\": []}]}, \"Samples\": [{\"a\": null}]}")
                .unwrap(),
            SourceFormat::MultisportStream
        );
        // A key nested below the top level does not count
        assert!(matches!(
            detect_format(b"{\"Header\": {\"Entries\": []}}"),
            Err(ImportError::UnsupportedDocument(_))
        ));
    }

    #[test]
    fn test_sync_dispatcher_rejects_binary() {
        let mut fit = vec![14u8, 0x10, 0, 0, 0, 0, 0, 0];
        fit.extend_from_slice(b".FIT");
        assert!(matches!(
            detect_and_parse(&fit),
            Err(ImportError::UnsupportedDocument(_))
        ));
    }

    #[test]
    fn test_parse_timestamp() {
        let utc = parse_timestamp("2024-05-01T10:00:00Z").unwrap();
        let offset = parse_timestamp("2024-05-01T12:00:00+02:00").unwrap();
        let naive = parse_timestamp("2024-05-01T10:00:00.000").unwrap();
        assert_eq!(utc, offset);
        assert_eq!(utc, naive);
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_source_format_names() {
        for format in SourceFormat::ALL {
            assert_eq!(format.name().parse::<SourceFormat>().unwrap(), format);
        }
        assert_eq!("json".parse::<SourceFormat>().unwrap(), SourceFormat::Canonical);
    }
}
