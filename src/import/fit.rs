//! Binary FIT recordings
//!
//! Decoding is CPU bound, so the async entry point hands it to the blocking
//! pool. Sessions become activities; laps and records are assigned to the
//! session whose window contains them.

use chrono::{DateTime, Duration, Utc};
use fitparser::profile::MesgNum;
use fitparser::{FitDataRecord, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::devices::DeviceRegistry;
use super::{complete_import, default_event_name, is_usable_lap, SourceFormat};
use crate::activity_type::ActivityType;
use crate::error::ImportError;
use crate::measurement::MeasurementKind;
use crate::models::{Activity, Creator, Event, Lap, LapType, Point, Stats};
use crate::summary::SummaryGenerator;

const FORMAT: &str = "FIT";

/// Largest HRV interval the format can hold; anything at or above is invalid
const MAX_HRV_SECONDS: f64 = 65.0;

const SEMICIRCLES_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

/// Record field names, in priority order, per measurement
const RECORD_FIELDS: [(&[&str], MeasurementKind); 11] = [
    (&["heart_rate"], MeasurementKind::HeartRate),
    (&["enhanced_altitude", "altitude"], MeasurementKind::Altitude),
    (&["cadence"], MeasurementKind::Cadence),
    (&["enhanced_speed", "speed"], MeasurementKind::Speed),
    (&["vertical_speed"], MeasurementKind::VerticalSpeed),
    (&["power"], MeasurementKind::Power),
    (&["temperature"], MeasurementKind::Temperature),
    (&["distance"], MeasurementKind::Distance),
    (&["enhanced_respiration_rate", "respiration_rate"], MeasurementKind::RespirationRate),
    (&["absolute_pressure"], MeasurementKind::AbsolutePressure),
    (&["gps_accuracy"], MeasurementKind::PositionAccuracy),
];

/// Session and lap summary fields shared by both messages
const SUMMARY_FIELDS: [(&[&str], MeasurementKind); 19] = [
    (&["total_distance"], MeasurementKind::Distance),
    (&["total_calories"], MeasurementKind::Energy),
    (&["total_ascent"], MeasurementKind::Ascent),
    (&["total_descent"], MeasurementKind::Descent),
    (&["avg_heart_rate"], MeasurementKind::AvgHeartRate),
    (&["max_heart_rate"], MeasurementKind::MaxHeartRate),
    (&["min_heart_rate"], MeasurementKind::MinHeartRate),
    (&["avg_cadence", "avg_running_cadence"], MeasurementKind::AvgCadence),
    (&["max_cadence", "max_running_cadence"], MeasurementKind::MaxCadence),
    (&["enhanced_avg_speed", "avg_speed"], MeasurementKind::AvgSpeed),
    (&["enhanced_max_speed", "max_speed"], MeasurementKind::MaxSpeed),
    (&["avg_power"], MeasurementKind::AvgPower),
    (&["max_power"], MeasurementKind::MaxPower),
    (&["avg_temperature"], MeasurementKind::AvgTemperature),
    (&["max_temperature"], MeasurementKind::MaxTemperature),
    (&["min_temperature"], MeasurementKind::MinTemperature),
    (&["enhanced_max_altitude", "max_altitude"], MeasurementKind::MaxAltitude),
    (&["enhanced_min_altitude", "min_altitude"], MeasurementKind::MinAltitude),
    (&["total_training_effect"], MeasurementKind::PeakTrainingEffect),
];

fn fit_value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        Value::SInt16(v) => Some(*v as f64),
        Value::UInt16(v) => Some(*v as f64),
        Value::SInt32(v) => Some(*v as f64),
        Value::UInt32(v) => Some(*v as f64),
        Value::SInt64(v) => Some(*v as f64),
        Value::UInt64(v) => Some(*v as f64),
        Value::UInt16z(v) => Some(*v as f64),
        Value::UInt32z(v) => Some(*v as f64),
        Value::UInt64z(v) => Some(*v as f64),
        Value::Byte(v) => Some(*v as f64),
        Value::UInt8(v) => Some(*v as f64),
        Value::UInt8z(v) => Some(*v as f64),
        Value::SInt8(v) => Some(*v as f64),
        Value::Array(values) => values.iter().find_map(fit_value_to_f64),
        _ => None,
    }
}

/// Field lookup for one decoded message
struct Fields<'a>(HashMap<&'a str, &'a Value>);

impl<'a> Fields<'a> {
    fn of(record: &'a FitDataRecord) -> Self {
        Fields(
            record
                .fields()
                .iter()
                .map(|field| (field.name(), field.value()))
                .collect(),
        )
    }

    fn number(&self, names: &[&str]) -> Option<f64> {
        names
            .iter()
            .find_map(|name| self.0.get(name).and_then(|v| fit_value_to_f64(v)))
            .filter(|v| v.is_finite())
    }

    fn time(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.0.get(name) {
            Some(Value::Timestamp(ts)) => Some(ts.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Enum fields decode to their profile names; unknown values stay numeric
    fn text(&self, name: &str) -> Option<String> {
        match self.0.get(name)? {
            Value::String(s) => Some(s.clone()),
            other => fit_value_to_f64(other).map(|v| format!("{}", v as i64)),
        }
    }

    fn summary_stats(&self) -> Stats {
        let mut stats = Stats::new();
        for (names, kind) in SUMMARY_FIELDS {
            stats.set_opt(kind, self.number(names));
        }
        stats
    }
}

#[derive(Debug)]
struct Session {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    activity_type: ActivityType,
    stats: Stats,
}

impl Session {
    fn from_fields(fields: &Fields<'_>) -> Option<Self> {
        let start = fields.time("start_time")?;
        let elapsed = fields.number(&["total_elapsed_time"]);
        let timer = fields.number(&["total_timer_time"]);
        let end = match elapsed {
            Some(seconds) => start + millis(seconds),
            None => fields.time("timestamp").unwrap_or(start),
        };

        let activity_type = match fields.text("sport") {
            Some(sport) => ActivityType::from_fit(&sport, fields.text("sub_sport").as_deref()),
            None => ActivityType::Unknown,
        };

        let mut stats = fields.summary_stats();
        stats.set_opt(MeasurementKind::Duration, elapsed);
        if let (Some(elapsed), Some(timer)) = (elapsed, timer) {
            stats.set(MeasurementKind::Pause, (elapsed - timer).abs());
        }

        Some(Session {
            start,
            end,
            activity_type,
            stats,
        })
    }
}

fn millis(seconds: f64) -> Duration {
    Duration::milliseconds((seconds * 1000.0).round() as i64)
}

fn lap_from_fields(fields: &Fields<'_>) -> Option<Lap> {
    let start = fields.time("start_time")?;
    let elapsed = fields.number(&["total_elapsed_time"]);
    let end = match elapsed {
        Some(seconds) => start + millis(seconds),
        None => fields.time("timestamp")?,
    };
    let lap_type = fields
        .text("lap_trigger")
        .and_then(|trigger| LapType::from_name(&trigger))
        .unwrap_or(LapType::Manual);

    let mut lap = Lap::new(start, end, lap_type);
    lap.stats = fields.summary_stats();
    lap.stats.set_opt(MeasurementKind::Duration, elapsed);
    Some(lap)
}

fn point_from_fields(fields: &Fields<'_>) -> Option<Point> {
    let mut point = Point::new(fields.time("timestamp")?);

    let latitude = fields.number(&["position_lat"]);
    let longitude = fields.number(&["position_long"]);
    if let (Some(lat), Some(lon)) = (latitude, longitude) {
        point.set(MeasurementKind::Latitude, lat * SEMICIRCLES_TO_DEGREES);
        point.set(MeasurementKind::Longitude, lon * SEMICIRCLES_TO_DEGREES);
    }
    for (names, kind) in RECORD_FIELDS {
        if let Some(value) = fields.number(names) {
            point.set(kind, value);
        }
    }

    (!point.is_empty()).then_some(point)
}

/// HRV messages carry up to five beat intervals in seconds. The decoder
/// only applies the profile scale to single values, arrays stay in raw
/// thousandths.
fn hrv_intervals(fields: &Fields<'_>) -> Vec<f64> {
    let values: Vec<f64> = match fields.0.get("time") {
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(fit_value_to_f64)
            .map(|raw| raw / 1000.0)
            .collect(),
        Some(value) => fit_value_to_f64(value).into_iter().collect(),
        None => Vec::new(),
    };
    values
        .into_iter()
        .filter(|seconds| *seconds > 0.0 && *seconds < MAX_HRV_SECONDS)
        .map(|seconds| (seconds * 1000.0).round())
        .collect()
}

#[derive(Debug, Default)]
struct DeviceFields {
    manufacturer: Option<String>,
    product: Option<String>,
    serial_number: Option<String>,
    software_version: Option<String>,
}

impl DeviceFields {
    fn absorb(&mut self, fields: &Fields<'_>) {
        let product = ["garmin_product", "favero_product", "product"]
            .iter()
            .find_map(|name| fields.text(name));

        self.manufacturer = self.manufacturer.take().or_else(|| fields.text("manufacturer"));
        self.product = self.product.take().or(product);
        self.serial_number = self.serial_number.take().or_else(|| fields.text("serial_number"));
        self.software_version = self
            .software_version
            .take()
            .or_else(|| fields.number(&["software_version"]).map(|v| format!("{:.2}", v)));
    }

    fn creator(self, registry: &DeviceRegistry) -> Creator {
        registry.creator(
            self.manufacturer.as_deref(),
            self.product.as_deref(),
            self.serial_number,
            self.software_version,
        )
    }
}

/// Index of the session whose start is the last one at or before `time`
fn session_index(sessions: &[Session], time: DateTime<Utc>) -> usize {
    sessions
        .partition_point(|session| session.start <= time)
        .saturating_sub(1)
}

/// Records and laps may run past the session's elapsed time, e.g. samples
/// logged after the timer stopped. The activity grows to cover them.
fn cover_contents(activity: &mut Activity) {
    let point_times = activity.points().iter().map(Point::time);
    let lap_times = activity.laps().iter().flat_map(|lap| [lap.start, lap.end]);
    let (mut start, mut end) = (activity.start, activity.end);
    for time in point_times.chain(lap_times) {
        start = start.min(time);
        end = end.max(time);
    }

    if (start, end) != (activity.start, activity.end) {
        tracing::debug!(
            session_start = %activity.start,
            session_end = %activity.end,
            %start,
            %end,
            "Widening activity over out-of-session data"
        );
        activity.start = start;
        activity.end = end;
    }
}

/// Decodes a FIT recording on the blocking pool with default settings
pub async fn import_fit(bytes: Vec<u8>) -> Result<Event, ImportError> {
    import_fit_with(
        bytes,
        SummaryGenerator::default(),
        Arc::new(DeviceRegistry::with_defaults()),
    )
    .await
}

/// Decodes a FIT recording on the blocking pool
pub async fn import_fit_with(
    bytes: Vec<u8>,
    generator: SummaryGenerator,
    devices: Arc<DeviceRegistry>,
) -> Result<Event, ImportError> {
    tokio::task::spawn_blocking(move || import_bytes_with(&bytes, &generator, &devices))
        .await
        .map_err(|e| ImportError::Task(e.to_string()))?
}

/// Synchronous decode with default settings
pub fn import_bytes(bytes: &[u8]) -> Result<Event, ImportError> {
    import_bytes_with(bytes, &SummaryGenerator::default(), &DeviceRegistry::with_defaults())
}

/// Synchronous decode, used by [`import_fit_with`]
#[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
pub fn import_bytes_with(
    bytes: &[u8],
    generator: &SummaryGenerator,
    devices: &DeviceRegistry,
) -> Result<Event, ImportError> {
    let records = fitparser::de::from_bytes(bytes).map_err(|e| ImportError::Fit(e.to_string()))?;
    tracing::debug!(messages = records.len(), "Decoded FIT messages");

    let mut sessions = Vec::new();
    let mut laps = Vec::new();
    let mut points = Vec::new();
    let mut hrv = Vec::new();
    let mut device = DeviceFields::default();

    for record in &records {
        let fields = Fields::of(record);
        match record.kind() {
            MesgNum::Session => sessions.extend(Session::from_fields(&fields)),
            MesgNum::Lap => laps.extend(lap_from_fields(&fields)),
            MesgNum::Record => points.extend(point_from_fields(&fields)),
            MesgNum::Hrv => hrv.extend(hrv_intervals(&fields)),
            MesgNum::FileId | MesgNum::DeviceInfo => device.absorb(&fields),
            _ => {}
        }
    }

    if sessions.is_empty() {
        let start = points.iter().map(Point::time).min();
        let end = points.iter().map(Point::time).max();
        match (start, end) {
            (Some(start), Some(end)) => {
                tracing::warn!("No session messages, spanning one activity over all records");
                sessions.push(Session {
                    start,
                    end,
                    activity_type: ActivityType::Unknown,
                    stats: Stats::new(),
                });
            }
            _ => return Err(ImportError::missing(FORMAT, "session")),
        }
    }
    sessions.sort_by_key(|session| session.start);

    let creator = device.creator(devices);
    let mut activities: Vec<Activity> = sessions
        .iter()
        .map(|session| {
            let mut activity =
                Activity::new(session.start, session.end, session.activity_type, creator.clone());
            activity.stats = session.stats.clone();
            activity
        })
        .collect();

    for point in points {
        let index = session_index(&sessions, point.time());
        activities[index].add_point(point, false);
    }
    for lap in laps.into_iter().filter(|lap| is_usable_lap(lap, FORMAT)) {
        let index = session_index(&sessions, lap.start);
        activities[index].add_lap(lap);
    }
    // The format has no per-session HRV; beats follow the recording from its first session
    for interval in hrv {
        activities[0].ibi.push_interval(interval);
    }

    for activity in &mut activities {
        activity.sort_points_by_date();
        activity.sort_laps_by_date();
        cover_contents(activity);
    }

    let name = default_event_name(activities.first().map(|a| a.start));
    Ok(complete_import(
        Event::with_activities(name, activities),
        SourceFormat::Fit,
        generator,
    ))
}
