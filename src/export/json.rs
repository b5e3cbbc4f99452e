//! Canonical JSON document
//!
//! The document shapes below are shared with the canonical importer so both
//! directions stay in lockstep.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

use crate::error::ExportError;
use crate::ibi::IbiSeries;
use crate::measurement::MeasurementValue;
use crate::models::{
    Activity, Creator, Event, GeoLocationInfo, IntensityZones, Lap, Point, Stats, Weather,
};

pub(crate) type ValueMap = BTreeMap<String, MeasurementValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EventDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stats: ValueMap,
    pub activities: Vec<ActivityDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ActivityDocument {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(rename = "type", default)]
    pub activity_type: String,
    #[serde(default)]
    pub creator: Creator,
    #[serde(default)]
    pub stats: ValueMap,
    #[serde(default)]
    pub laps: Vec<LapDocument>,
    #[serde(default)]
    pub points: Vec<PointDocument>,
    #[serde(default)]
    pub ibi_data: IbiSeries,
    #[serde(default)]
    pub intensity_zones: Vec<IntensityZonesDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_location_info: Option<GeoLocationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LapDocument {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub lap_type: String,
    #[serde(default)]
    pub stats: ValueMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct PointDocument {
    /// Epoch milliseconds
    pub time: i64,
    pub data: ValueMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IntensityZonesDocument {
    #[serde(rename = "type")]
    pub kind: String,
    pub zone1_duration: f64,
    pub zone2_duration: f64,
    pub zone3_duration: f64,
    pub zone4_duration: f64,
    pub zone5_duration: f64,
    pub zone2_lower_limit: f64,
    pub zone3_lower_limit: f64,
    pub zone4_lower_limit: f64,
    pub zone5_lower_limit: f64,
}

pub(crate) fn stats_to_map(stats: &Stats) -> ValueMap {
    stats
        .iter()
        .map(|m| (m.kind.type_name().to_string(), m.value.clone()))
        .collect()
}

fn point_to_document(point: &Point) -> PointDocument {
    PointDocument {
        time: point.timestamp_millis(),
        data: point
            .measurements()
            .map(|m| (m.kind.type_name().to_string(), m.value.clone()))
            .collect(),
    }
}

fn lap_to_document(lap: &Lap) -> LapDocument {
    LapDocument {
        start_date: lap.start,
        end_date: lap.end,
        lap_type: lap.lap_type.display_name().to_string(),
        stats: stats_to_map(&lap.stats),
    }
}

fn zones_to_document(zones: &IntensityZones) -> IntensityZonesDocument {
    let [zone1_duration, zone2_duration, zone3_duration, zone4_duration, zone5_duration] =
        zones.durations;
    let [zone2_lower_limit, zone3_lower_limit, zone4_lower_limit, zone5_lower_limit] =
        zones.lower_limits;
    IntensityZonesDocument {
        kind: zones.kind.type_name().to_string(),
        zone1_duration,
        zone2_duration,
        zone3_duration,
        zone4_duration,
        zone5_duration,
        zone2_lower_limit,
        zone3_lower_limit,
        zone4_lower_limit,
        zone5_lower_limit,
    }
}

pub(crate) fn activity_to_document(activity: &Activity) -> ActivityDocument {
    ActivityDocument {
        id: activity.id,
        start_date: activity.start,
        end_date: activity.end,
        activity_type: activity.activity_type.display_name().to_string(),
        creator: activity.creator.clone(),
        stats: stats_to_map(&activity.stats),
        laps: activity.laps().iter().map(lap_to_document).collect(),
        points: activity.points().iter().map(point_to_document).collect(),
        ibi_data: activity.ibi.clone(),
        intensity_zones: activity.intensity_zones.iter().map(zones_to_document).collect(),
        geo_location_info: activity.geo_location.clone(),
        weather: activity.weather.clone(),
    }
}

pub(crate) fn event_to_document(event: &Event) -> EventDocument {
    EventDocument {
        name: event.name.clone(),
        stats: stats_to_map(&event.stats),
        activities: event.activities.iter().map(activity_to_document).collect(),
    }
}

pub(crate) fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Serialize an event to the canonical JSON document
pub fn to_json_string(event: &Event) -> Result<String, ExportError> {
    let document = event_to_document(event);
    Ok(serde_json::to_string_pretty(&document)?)
}

/// Compact form used at the persistence boundary
pub fn to_json_bytes(event: &Event) -> Result<Vec<u8>, ExportError> {
    let document = event_to_document(event);
    Ok(serde_json::to_vec(&document)?)
}

/// Export an event to a canonical JSON file
pub fn export_event<P: AsRef<Path>>(event: &Event, output_path: P) -> Result<(), ExportError> {
    let json_data = to_json_string(event)?;

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;

    tracing::info!(
        activities = event.activities.len(),
        bytes = json_data.len(),
        "Exported canonical JSON"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity_type::ActivityType;
    use crate::measurement::MeasurementKind;
    use crate::models::LapType;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn sample_event() -> Event {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut activity = Activity::new(
            start,
            start + Duration::seconds(60),
            ActivityType::TrailRunning,
            Creator::new("Watch"),
        );
        activity.add_point(
            Point::new(start + Duration::milliseconds(1500))
                .with(MeasurementKind::HeartRate, 140.0)
                .with(MeasurementKind::Latitude, 60.1),
            false,
        );
        activity.add_lap(Lap::new(start, start + Duration::seconds(60), LapType::AutoLap));
        activity.ibi = IbiSeries::new(&[800.0, 820.0]);
        activity.stats.set(MeasurementKind::Description, "Morning run");

        let mut event = Event::new("Morning");
        event.add_activity(activity);
        event
    }

    #[test]
    fn test_document_shape() {
        let json = to_json_string(&sample_event()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let activity = &value["activities"][0];

        assert_eq!(activity["type"], "Trail Running");
        assert_eq!(activity["creator"]["name"], "Watch");
        assert_eq!(activity["points"][0]["time"], 1_700_000_001_500i64);
        assert_eq!(activity["points"][0]["data"]["Heart Rate"], 140.0);
        assert_eq!(activity["laps"][0]["type"], "Autolap");
        assert_eq!(activity["ibiData"], serde_json::json!([800.0, 820.0]));
        assert_eq!(activity["stats"]["Description"], "Morning run");
        assert!(activity.get("weather").is_none());
    }

    #[test]
    fn test_export_to_file() {
        let temp_file = NamedTempFile::new().unwrap();
        export_event(&sample_event(), temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("\"name\": \"Morning\""));
        assert!(content.contains("\"startDate\""));
    }
}
