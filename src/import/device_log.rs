//! Wrist-device log importer
//!
//! The device stores most values in SI base units: heart rate and cadence in
//! Hz, temperatures in Kelvin, energy in Joules, pressures in Pascal and
//! coordinates in radians. Everything is converted on the way in.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use super::{complete_import, default_event_name, is_usable_lap, parse_timestamp, SourceFormat};
use crate::activity_type::ActivityType;
use crate::error::ImportError;
use crate::ibi::IbiSeries;
use crate::measurement::MeasurementKind;
use crate::models::{Activity, Creator, Event, Lap, LapType, Point, Stats};
use crate::summary::SummaryGenerator;

const FORMAT: &str = "device log";

pub(crate) fn hz_to_per_minute(hz: f64) -> f64 {
    hz * 60.0
}

pub(crate) fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - 273.15
}

pub(crate) fn joules_to_kcal(joules: f64) -> f64 {
    joules / 4184.0
}

pub(crate) fn pascal_to_hpa(pascal: f64) -> f64 {
    pascal / 100.0
}

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(rename = "DeviceLog")]
    device_log: DeviceLog,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeviceLog {
    #[serde(default)]
    header: Header,
    #[serde(default)]
    samples: Vec<Sample>,
    #[serde(default)]
    windows: Vec<WindowEntry>,
    #[serde(rename = "R-R")]
    rr: Option<RrData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Header {
    activity_type: Option<i64>,
    date_time: Option<String>,
    duration: Option<f64>,
    pause_duration: Option<f64>,
    distance: Option<f64>,
    energy: Option<f64>,
    ascent: Option<f64>,
    descent: Option<f64>,
    recovery_time: Option<f64>,
    peak_training_effect: Option<f64>,
    #[serde(rename = "EPOC")]
    epoc: Option<f64>,
    #[serde(rename = "HR", default)]
    hr: Vec<Aggregate>,
    #[serde(default)]
    cadence: Vec<Aggregate>,
    #[serde(default)]
    speed: Vec<Aggregate>,
    #[serde(default)]
    power: Vec<Aggregate>,
    #[serde(default)]
    temperature: Vec<Aggregate>,
    #[serde(default)]
    altitude: Vec<Aggregate>,
    device: Option<DeviceInfo>,
}

/// `{"Avg", "Max", "Min"}` block; the device wraps each one in a single-item array
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Aggregate {
    pub avg: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

impl Aggregate {
    fn first(list: &[Aggregate]) -> Aggregate {
        list.first().cloned().unwrap_or_default()
    }

    fn map(self, convert: fn(f64) -> f64) -> Aggregate {
        Aggregate {
            avg: self.avg.map(convert),
            max: self.max.map(convert),
            min: self.min.map(convert),
        }
    }

    /// Writes the aggregate stats of `base` that are present
    fn apply(&self, stats: &mut Stats, base: MeasurementKind) {
        if let Some(kinds) = base.aggregates() {
            stats.set_opt(kinds.avg, self.avg);
            stats.set_opt(kinds.max, self.max);
            stats.set_opt(kinds.min, self.min);
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DeviceInfo {
    pub name: Option<String>,
    pub serial_number: Option<serde_json::Value>,
    pub info: Option<DeviceSoftware>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub(crate) struct DeviceSoftware {
    #[serde(rename = "SW")]
    pub sw: Option<String>,
    #[serde(rename = "HW")]
    pub hw: Option<String>,
}

impl DeviceInfo {
    pub(crate) fn to_creator(&self) -> Creator {
        let mut creator = Creator::new(self.name.clone().unwrap_or_else(|| "Unknown".to_string()));
        creator.serial_number = self.serial_number.as_ref().map(|serial| match serial {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        });
        if let Some(info) = &self.info {
            creator.sw_info = info.sw.clone();
            creator.hw_info = info.hw.clone();
        }
        creator
    }
}

/// One entry of the sample stream, shared with the multisport stream dialect
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Sample {
    #[serde(rename = "TimeISO8601")]
    pub time: Option<String>,
    #[serde(rename = "HR")]
    pub hr: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    #[serde(rename = "GPSAltitude")]
    pub gps_altitude: Option<f64>,
    pub cadence: Option<f64>,
    pub speed: Option<f64>,
    pub vertical_speed: Option<f64>,
    pub power: Option<f64>,
    pub temperature: Option<f64>,
    pub abs_pressure: Option<f64>,
    pub sea_level_pressure: Option<f64>,
    pub distance: Option<f64>,
    pub number_of_satellites: Option<f64>,
    #[serde(rename = "EHPE")]
    pub ehpe: Option<f64>,
    #[serde(default)]
    pub events: Vec<SampleEvent>,
}

/// Marker embedded in the sample stream
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct SampleEvent {
    pub activity: Option<ActivityMarker>,
    pub lap: Option<LapMarker>,
    pub stop: Option<serde_json::Value>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ActivityMarker {
    pub activity_type: Option<i64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LapMarker {
    #[serde(rename = "Type")]
    pub lap_type: Option<String>,
}

impl Sample {
    pub(crate) fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.time.as_deref().and_then(parse_timestamp)
    }

    /// Converts the measured values to a point, `None` for marker-only samples
    pub(crate) fn to_point(&self, time: DateTime<Utc>) -> Option<Point> {
        let fields = [
            (MeasurementKind::HeartRate, self.hr.map(hz_to_per_minute)),
            (MeasurementKind::Latitude, self.latitude.map(f64::to_degrees)),
            (MeasurementKind::Longitude, self.longitude.map(f64::to_degrees)),
            (MeasurementKind::Altitude, self.altitude),
            (MeasurementKind::GpsAltitude, self.gps_altitude),
            (MeasurementKind::Cadence, self.cadence.map(hz_to_per_minute)),
            (MeasurementKind::Speed, self.speed),
            (MeasurementKind::VerticalSpeed, self.vertical_speed),
            (MeasurementKind::Power, self.power),
            (MeasurementKind::Temperature, self.temperature.map(kelvin_to_celsius)),
            (MeasurementKind::AbsolutePressure, self.abs_pressure.map(pascal_to_hpa)),
            (MeasurementKind::SeaLevelPressure, self.sea_level_pressure.map(pascal_to_hpa)),
            (MeasurementKind::Distance, self.distance),
            (MeasurementKind::SatelliteCount, self.number_of_satellites),
            (MeasurementKind::PositionAccuracy, self.ehpe),
        ];

        let mut point = Point::new(time);
        for (kind, value) in fields {
            if let Some(value) = value.filter(|v| v.is_finite()) {
                point.set(kind, value);
            }
        }
        (!point.is_empty()).then_some(point)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RrData {
    #[serde(default)]
    pub data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WindowEntry {
    window: Window,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Window {
    #[serde(rename = "Type")]
    window_type: String,
    #[serde(rename = "TimeISO8601")]
    time: Option<String>,
    duration: Option<f64>,
    distance: Option<f64>,
    #[serde(rename = "HR", default)]
    hr: Vec<Aggregate>,
    #[serde(default)]
    speed: Vec<Aggregate>,
}

impl Window {
    fn lap_type(&self) -> Option<LapType> {
        match self.window_type.as_str() {
            "Lap" | "Manual" => Some(LapType::Manual),
            "Autolap" => Some(LapType::AutoLap),
            "Interval" => Some(LapType::Interval),
            _ => None,
        }
    }

    /// Windows are stamped at their end; the lap starts `Duration` earlier
    fn to_lap(&self) -> Result<Option<Lap>, ImportError> {
        let Some(lap_type) = self.lap_type() else {
            tracing::trace!(window_type = %self.window_type, "Ignoring window");
            return Ok(None);
        };
        let end = super::require_timestamp(FORMAT, "Window/TimeISO8601", self.time.as_deref())?;
        let duration = self.duration.unwrap_or(0.0);
        let start = end - Duration::milliseconds((duration * 1000.0).round() as i64);

        let mut lap = Lap::new(start, end, lap_type);
        lap.stats.set_opt(MeasurementKind::Duration, self.duration);
        lap.stats.set_opt(MeasurementKind::Distance, self.distance);
        Aggregate::first(&self.hr)
            .map(hz_to_per_minute)
            .apply(&mut lap.stats, MeasurementKind::HeartRate);
        Aggregate::first(&self.speed).apply(&mut lap.stats, MeasurementKind::Speed);
        Ok(Some(lap))
    }
}

fn header_stats(header: &Header) -> Stats {
    let mut stats = Stats::new();
    stats.set_opt(MeasurementKind::Duration, header.duration);
    stats.set_opt(MeasurementKind::Pause, header.pause_duration);
    stats.set_opt(MeasurementKind::Distance, header.distance);
    stats.set_opt(MeasurementKind::Energy, header.energy.map(joules_to_kcal));
    stats.set_opt(MeasurementKind::Ascent, header.ascent);
    stats.set_opt(MeasurementKind::Descent, header.descent);
    stats.set_opt(MeasurementKind::RecoveryTime, header.recovery_time);
    stats.set_opt(MeasurementKind::PeakTrainingEffect, header.peak_training_effect);
    stats.set_opt(MeasurementKind::Epoc, header.epoc);

    Aggregate::first(&header.hr)
        .map(hz_to_per_minute)
        .apply(&mut stats, MeasurementKind::HeartRate);
    Aggregate::first(&header.cadence)
        .map(hz_to_per_minute)
        .apply(&mut stats, MeasurementKind::Cadence);
    Aggregate::first(&header.speed).apply(&mut stats, MeasurementKind::Speed);
    Aggregate::first(&header.power).apply(&mut stats, MeasurementKind::Power);
    Aggregate::first(&header.temperature)
        .map(kelvin_to_celsius)
        .apply(&mut stats, MeasurementKind::Temperature);

    let altitude = Aggregate::first(&header.altitude);
    stats.set_opt(MeasurementKind::MaxAltitude, altitude.max);
    stats.set_opt(MeasurementKind::MinAltitude, altitude.min);
    stats
}

/// Imports a device log document as a single-activity event
pub fn import_str(text: &str) -> Result<Event, ImportError> {
    import_with(text, &SummaryGenerator::default())
}

/// Same as [`import_str`], completing stats with the given generator
#[tracing::instrument(skip_all)]
pub fn import_with(text: &str, generator: &SummaryGenerator) -> Result<Event, ImportError> {
    let document: Document = serde_json::from_str(text)?;
    let log = document.device_log;

    let mut points = Vec::new();
    for sample in &log.samples {
        let Some(time) = sample.timestamp() else {
            continue;
        };
        if let Some(point) = sample.to_point(time) {
            points.push(point);
        }
    }

    let header_start = log.header.date_time.as_deref().and_then(parse_timestamp);
    let start = header_start
        .or_else(|| points.iter().map(Point::time).min())
        .ok_or_else(|| ImportError::missing(FORMAT, "Header/DateTime"))?;
    let end = match log.header.duration {
        Some(duration) => start + Duration::milliseconds((duration * 1000.0).round() as i64),
        None => points.iter().map(Point::time).max().unwrap_or(start),
    };

    let activity_type = log
        .header
        .activity_type
        .map(ActivityType::from_device_code)
        .unwrap_or(ActivityType::Unknown);
    let creator = log
        .header
        .device
        .as_ref()
        .map(DeviceInfo::to_creator)
        .unwrap_or_default();

    let mut activity = Activity::new(start, end, activity_type, creator);
    activity.add_points(points);
    activity.sort_points_by_date();
    activity.stats = header_stats(&log.header);

    for entry in &log.windows {
        if let Some(lap) = entry.window.to_lap()? {
            if is_usable_lap(&lap, FORMAT) {
                activity.add_lap(lap);
            }
        }
    }
    activity.sort_laps_by_date();

    if let Some(rr) = &log.rr {
        activity.ibi = IbiSeries::new(&rr.data);
    }

    tracing::debug!(
        points = activity.point_count(),
        laps = activity.laps().len(),
        ibi = activity.ibi.len(),
        "Parsed device log"
    );

    let name = default_event_name(Some(start));
    Ok(complete_import(
        Event::with_activities(name, vec![activity]),
        SourceFormat::DeviceLog,
        generator,
    ))
}
