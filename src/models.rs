use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

use crate::activity_type::ActivityType;
use crate::ibi::IbiSeries;
use crate::measurement::{Measurement, MeasurementKind, MeasurementValue};

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One timestamped sample. Identity is the millisecond timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    time: DateTime<Utc>,
    measurements: BTreeMap<MeasurementKind, Measurement>,
}

impl Point {
    /// Creates an empty point. Sub-millisecond precision is discarded.
    pub fn new(time: DateTime<Utc>) -> Self {
        let time = DateTime::from_timestamp_millis(time.timestamp_millis()).unwrap_or(time);
        Self {
            time,
            measurements: BTreeMap::new(),
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.time.timestamp_millis()
    }

    /// Stores a measurement, replacing any previous value of the same kind
    pub fn set(&mut self, kind: MeasurementKind, value: impl Into<MeasurementValue>) {
        self.measurements.insert(kind, Measurement::new(kind, value));
    }

    pub fn insert(&mut self, measurement: Measurement) {
        self.measurements.insert(measurement.kind, measurement);
    }

    pub fn with(mut self, kind: MeasurementKind, value: impl Into<MeasurementValue>) -> Self {
        self.set(kind, value);
        self
    }

    pub fn get(&self, kind: MeasurementKind) -> Option<&Measurement> {
        self.measurements.get(&kind)
    }

    /// Numeric value of a measurement, if present and numeric
    pub fn value(&self, kind: MeasurementKind) -> Option<f64> {
        self.measurements.get(&kind).and_then(Measurement::number)
    }

    pub fn contains(&self, kind: MeasurementKind) -> bool {
        self.measurements.contains_key(&kind)
    }

    pub fn remove(&mut self, kind: MeasurementKind) -> Option<Measurement> {
        self.measurements.remove(&kind)
    }

    pub fn measurements(&self) -> impl Iterator<Item = &Measurement> {
        self.measurements.values()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    /// Copies every measurement of `other` whose kind is missing here.
    /// Latitude and longitude only move as a complete pair, into a point
    /// that holds neither.
    pub fn fill_missing_from(&mut self, other: &Point) {
        let takes_position = other.has_position()
            && !self.measurements.keys().any(MeasurementKind::is_positional);
        for (kind, measurement) in &other.measurements {
            if kind.is_positional() && !takes_position {
                continue;
            }
            self.measurements
                .entry(*kind)
                .or_insert_with(|| measurement.clone());
        }
    }

    /// Position when both latitude and longitude are present
    pub fn position(&self) -> Option<Position> {
        let latitude = self.value(MeasurementKind::Latitude)?;
        let longitude = self.value(MeasurementKind::Longitude)?;
        Some(Position::new(latitude, longitude))
    }

    pub fn has_position(&self) -> bool {
        self.position().is_some()
    }

    /// Same point moved to a new timestamp
    pub(crate) fn retimed(&self, time: DateTime<Utc>) -> Point {
        let mut point = Point::new(time);
        point.measurements = self.measurements.clone();
        point
    }
}

/// Stat-type keyed measurements of an activity, lap or event
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    entries: BTreeMap<MeasurementKind, Measurement>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: MeasurementKind) -> Option<&Measurement> {
        self.entries.get(&kind)
    }

    pub fn value(&self, kind: MeasurementKind) -> Option<f64> {
        self.entries.get(&kind).and_then(Measurement::number)
    }

    pub fn set(&mut self, kind: MeasurementKind, value: impl Into<MeasurementValue>) {
        self.entries.insert(kind, Measurement::new(kind, value));
    }

    /// Stores the value only when present; `None` removes a stale entry
    pub fn set_opt(&mut self, kind: MeasurementKind, value: Option<f64>) {
        match value {
            Some(value) => self.set(kind, value),
            None => {
                self.entries.remove(&kind);
            }
        }
    }

    /// Stores the value only if the kind has no entry yet
    pub fn set_if_absent(&mut self, kind: MeasurementKind, value: Option<f64>) {
        if let Some(value) = value {
            self.entries
                .entry(kind)
                .or_insert_with(|| Measurement::new(kind, value));
        }
    }

    pub fn insert(&mut self, measurement: Measurement) {
        self.entries.insert(measurement.kind, measurement);
    }

    pub fn remove(&mut self, kind: MeasurementKind) -> Option<Measurement> {
        self.entries.remove(&kind)
    }

    pub fn contains(&self, kind: MeasurementKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Measurement> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What closed a lap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LapType {
    Manual,
    Distance,
    Location,
    Time,
    HeartRate,
    AutoLap,
    Interval,
    SessionEnd,
    FitnessEquipment,
    /// Synthetic lap spanning the whole activity
    Total,
}

impl LapType {
    pub fn display_name(&self) -> &'static str {
        match self {
            LapType::Manual => "Manual",
            LapType::Distance => "Distance",
            LapType::Location => "Location",
            LapType::Time => "Time",
            LapType::HeartRate => "Heart Rate",
            LapType::AutoLap => "Autolap",
            LapType::Interval => "Interval",
            LapType::SessionEnd => "Session End",
            LapType::FitnessEquipment => "Fitness Equipment",
            LapType::Total => "Total",
        }
    }

    /// Accepts display names as well as the binary format's lap trigger names
    pub fn from_name(name: &str) -> Option<Self> {
        let lap_type = match name {
            "Manual" | "manual" => LapType::Manual,
            "Distance" | "distance" => LapType::Distance,
            "Location" | "position_start" | "position_lap" | "position_waypoint"
            | "position_marked" => LapType::Location,
            "Time" | "time" => LapType::Time,
            "Heart Rate" | "heart_rate" | "HeartRate" => LapType::HeartRate,
            "Autolap" | "AutoLap" | "autolap" => LapType::AutoLap,
            "Interval" | "interval" => LapType::Interval,
            "Session End" | "session_end" => LapType::SessionEnd,
            "Fitness Equipment" | "fitness_equipment" => LapType::FitnessEquipment,
            "Total" => LapType::Total,
            _ => return None,
        };
        Some(lap_type)
    }
}

impl fmt::Display for LapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A named sub-window of an activity
#[derive(Debug, Clone, PartialEq)]
pub struct Lap {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub lap_type: LapType,
    pub stats: Stats,
}

impl Lap {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, lap_type: LapType) -> Self {
        Self {
            start,
            end,
            lap_type,
            stats: Stats::new(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Recording device descriptor
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub name: String,
    pub sw_info: Option<String>,
    pub hw_info: Option<String>,
    pub serial_number: Option<String>,
}

impl Creator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Time spent in five intensity zones of one measurement kind
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityZones {
    pub kind: MeasurementKind,
    /// Seconds per zone, zone 1 first
    pub durations: [f64; 5],
    /// Lower limits of zones 2-5
    pub lower_limits: [f64; 4],
}

impl IntensityZones {
    pub fn new(kind: MeasurementKind, lower_limits: [f64; 4]) -> Self {
        Self {
            kind,
            durations: [0.0; 5],
            lower_limits,
        }
    }

    /// Zone index (0-based) for a value
    pub fn zone_of(&self, value: f64) -> usize {
        self.lower_limits
            .iter()
            .take_while(|limit| value >= **limit)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocationInfo {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherItem {
    pub date: DateTime<Utc>,
    pub conditions: String,
    pub temperature: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Weather {
    pub items: Vec<WeatherItem>,
}

/// One recorded activity: a time-indexed point set plus laps, IBI data and stats
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub activity_type: ActivityType,
    pub creator: Creator,
    points: Vec<Point>,
    index: HashMap<i64, usize>,
    laps: Vec<Lap>,
    pub ibi: IbiSeries,
    pub intensity_zones: Vec<IntensityZones>,
    pub stats: Stats,
    pub geo_location: Option<GeoLocationInfo>,
    pub weather: Option<Weather>,
}

impl Activity {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        activity_type: ActivityType,
        creator: Creator,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            start,
            end,
            activity_type,
            creator,
            points: Vec::new(),
            index: HashMap::new(),
            laps: Vec::new(),
            ibi: IbiSeries::default(),
            intensity_zones: Vec::new(),
            stats: Stats::new(),
            geo_location: None,
            weather: None,
        }
    }

    /// Inserts a point, merging with an existing point at the same millisecond.
    ///
    /// Without `override_on_collision` the incoming measurements win and the
    /// existing ones fill the gaps. With it the incoming point replaces the
    /// stored one outright.
    pub fn add_point(&mut self, mut point: Point, override_on_collision: bool) {
        let key = point.timestamp_millis();
        match self.index.get(&key) {
            Some(&slot) => {
                if !override_on_collision {
                    point.fill_missing_from(&self.points[slot]);
                }
                self.points[slot] = point;
            }
            None => {
                self.index.insert(key, self.points.len());
                self.points.push(point);
            }
        }
    }

    pub fn add_points(&mut self, points: impl IntoIterator<Item = Point>) {
        for point in points {
            self.add_point(point, false);
        }
    }

    /// Points within `[start, end]`, both bounds optional and inclusive
    pub fn get_points(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<&Point> {
        self.points
            .iter()
            .filter(|p| start.map_or(true, |s| p.time() >= s))
            .filter(|p| end.map_or(true, |e| p.time() <= e))
            .collect()
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn point_at(&self, time: DateTime<Utc>) -> Option<&Point> {
        self.index
            .get(&time.timestamp_millis())
            .map(|&slot| &self.points[slot])
    }

    /// Removes the point with exactly this timestamp
    pub fn remove_point(&mut self, time: DateTime<Utc>) -> Option<Point> {
        let slot = self.index.remove(&time.timestamp_millis())?;
        let removed = self.points.remove(slot);
        self.reindex();
        Some(removed)
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Reorders the point store chronologically
    pub fn sort_points_by_date(&mut self) {
        self.points.sort_by_key(Point::timestamp_millis);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.index = self
            .points
            .iter()
            .enumerate()
            .map(|(slot, point)| (point.timestamp_millis(), slot))
            .collect();
    }

    pub fn add_lap(&mut self, lap: Lap) {
        self.laps.push(lap);
    }

    pub fn laps(&self) -> &[Lap] {
        &self.laps
    }

    pub fn laps_mut(&mut self) -> &mut [Lap] {
        &mut self.laps
    }

    pub fn sort_laps_by_date(&mut self) {
        self.laps.sort_by_key(|lap| lap.start);
    }

    /// Ordered positions of the points in `[start, end]`
    pub fn positions(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<Position> {
        self.get_points(start, end)
            .into_iter()
            .filter_map(Point::position)
            .collect()
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Heart-rate points derived from the IBI series, keyed from the activity start
    pub fn heart_rate_points_from_ibi(&self) -> Vec<Point> {
        self.ibi
            .get_as_bpm()
            .into_iter()
            .map(|(elapsed_ms, bpm)| {
                let offset = Duration::milliseconds(elapsed_ms as i64);
                Point::new(self.start + offset).with(MeasurementKind::HeartRate, bpm)
            })
            .collect()
    }

    pub fn intensity_zones_for(&self, kind: MeasurementKind) -> Option<&IntensityZones> {
        self.intensity_zones.iter().find(|zones| zones.kind == kind)
    }
}

/// A recording made of one or more activities
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub activities: Vec<Activity>,
    pub stats: Stats,
}

impl Event {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activities: Vec::new(),
            stats: Stats::new(),
        }
    }

    pub fn with_activities(name: impl Into<String>, activities: Vec<Activity>) -> Self {
        Self {
            name: name.into(),
            activities,
            stats: Stats::new(),
        }
    }

    pub fn add_activity(&mut self, activity: Activity) {
        self.activities.push(activity);
    }

    /// Removes a whole activity by id
    pub fn remove_activity(&mut self, id: Uuid) -> Option<Activity> {
        let slot = self.activities.iter().position(|a| a.id == id)?;
        Some(self.activities.remove(slot))
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.activities.iter().map(|a| a.start).min()
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.activities.iter().map(|a| a.end).max()
    }

    /// Joins several events into one. Activities are ordered by start and get
    /// fresh ids; the caller regenerates stats afterwards.
    pub fn merge(name: impl Into<String>, events: impl IntoIterator<Item = Event>) -> Event {
        let mut activities: Vec<Activity> = events
            .into_iter()
            .flat_map(|event| event.activities)
            .collect();
        activities.sort_by_key(|a| a.start);
        for activity in &mut activities {
            activity.id = Uuid::new_v4();
        }
        Event::with_activities(name, activities)
    }
}
