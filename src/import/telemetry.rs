//! Phone-app telemetry importer
//!
//! Each entry carries its measurements as a JSON document embedded in a
//! string, so entries go through a second parse pass.

use serde::Deserialize;

use super::{complete_import, default_event_name, require_timestamp, SourceFormat};
use crate::activity_type::ActivityType;
use crate::error::ImportError;
use crate::measurement::MeasurementKind;
use crate::models::{Activity, Creator, Event, Point};
use crate::summary::{average, SummaryGenerator};

const FORMAT: &str = "telemetry";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Document {
    device: Option<Device>,
    activity_type: Option<String>,
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Device {
    name: Option<String>,
    serial_number: Option<String>,
    #[serde(rename = "SW")]
    sw: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "TimeISO8601")]
    time: Option<String>,
    #[serde(rename = "Attributes", default)]
    attributes: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Attributes {
    #[serde(rename = "HR")]
    hr: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: Option<f64>,
    speed: Option<f64>,
    cadence: Option<f64>,
    power: Option<f64>,
    temperature: Option<f64>,
    respiration_rate: Option<f64>,
    #[serde(rename = "R-R", default)]
    rr: Vec<f64>,
}

impl Entry {
    /// Second pass over the embedded document; an object is accepted as is
    fn attributes(&self, index: usize) -> Result<Attributes, ImportError> {
        let parsed = match &self.attributes {
            serde_json::Value::Null => return Ok(Attributes::default()),
            serde_json::Value::String(embedded) => serde_json::from_str(embedded),
            other => serde_json::from_value(other.clone()),
        };
        parsed.map_err(|e| ImportError::format(FORMAT, format!("entry {}: bad attributes: {}", index, e)))
    }
}

impl Attributes {
    fn heart_rate(&self) -> Option<f64> {
        self.hr.or_else(|| {
            average(&self.rr)
                .filter(|mean| *mean > 0.0)
                .map(|mean| (60_000.0 / mean).round())
        })
    }

    fn to_point(&self, point: &mut Point) {
        let fields = [
            (MeasurementKind::HeartRate, self.heart_rate()),
            (MeasurementKind::Latitude, self.latitude),
            (MeasurementKind::Longitude, self.longitude),
            (MeasurementKind::Altitude, self.altitude),
            (MeasurementKind::Speed, self.speed),
            (MeasurementKind::Cadence, self.cadence),
            (MeasurementKind::Power, self.power),
            (MeasurementKind::Temperature, self.temperature),
            (MeasurementKind::RespirationRate, self.respiration_rate),
        ];
        for (kind, value) in fields {
            if let Some(value) = value {
                point.set(kind, value);
            }
        }
    }
}

/// Imports a telemetry document as a single-activity event
pub fn import_str(text: &str) -> Result<Event, ImportError> {
    import_with(text, &SummaryGenerator::default())
}

/// Same as [`import_str`], completing stats with the given generator
#[tracing::instrument(skip_all)]
pub fn import_with(text: &str, generator: &SummaryGenerator) -> Result<Event, ImportError> {
    let document: Document = serde_json::from_str(text)?;

    let mut points = Vec::with_capacity(document.entries.len());
    let mut intervals = Vec::new();
    for (index, entry) in document.entries.iter().enumerate() {
        let time = require_timestamp(FORMAT, "Entries/TimeISO8601", entry.time.as_deref())?;
        let attributes = entry.attributes(index)?;
        intervals.extend_from_slice(&attributes.rr);

        let mut point = Point::new(time);
        attributes.to_point(&mut point);
        if !point.is_empty() {
            points.push(point);
        }
    }

    let start = points
        .iter()
        .map(Point::time)
        .min()
        .ok_or_else(|| ImportError::missing(FORMAT, "Entries"))?;
    let end = points.iter().map(Point::time).max().unwrap_or(start);

    let creator = match &document.device {
        Some(device) => Creator {
            name: device.name.clone().unwrap_or_else(|| "Unknown".to_string()),
            sw_info: device.sw.clone(),
            hw_info: None,
            serial_number: device.serial_number.clone(),
        },
        None => Creator::default(),
    };
    let activity_type = document
        .activity_type
        .as_deref()
        .map(ActivityType::from_name)
        .unwrap_or(ActivityType::Unknown);

    let mut activity = Activity::new(start, end, activity_type, creator);
    activity.add_points(points);
    activity.sort_points_by_date();
    for interval in intervals {
        activity.ibi.push_interval(interval);
    }

    tracing::debug!(
        points = activity.point_count(),
        ibi = activity.ibi.len(),
        "Parsed telemetry entries"
    );

    Ok(complete_import(
        Event::with_activities(default_event_name(Some(start)), vec![activity]),
        SourceFormat::Telemetry,
        generator,
    ))
}
