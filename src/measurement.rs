//! Measurement registry
//!
//! Every value stored on a point or in a stats map is tagged with a
//! `MeasurementKind`. The set of kinds is closed: documents are decoded through
//! [`MeasurementKind::from_type_name`], and a name that does not resolve is a
//! hard error for the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// All measurement and statistic types known to the canonical model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeasurementKind {
    // Sample streams
    HeartRate,
    Altitude,
    GpsAltitude,
    Cadence,
    Speed,
    VerticalSpeed,
    Power,
    Temperature,
    AbsolutePressure,
    SeaLevelPressure,
    SatelliteCount,
    PositionAccuracy,
    Latitude,
    Longitude,
    Distance,
    RespirationRate,

    // Totals
    Energy,
    Duration,
    Pause,
    Ascent,
    Descent,
    RecoveryTime,
    PeakTrainingEffect,
    Epoc,
    AvgPace,
    Description,

    // Aggregates
    AvgHeartRate,
    MaxHeartRate,
    MinHeartRate,
    AvgCadence,
    MaxCadence,
    MinCadence,
    AvgSpeed,
    MaxSpeed,
    MinSpeed,
    AvgPower,
    MaxPower,
    MinPower,
    AvgTemperature,
    MaxTemperature,
    MinTemperature,
    AvgAltitude,
    MaxAltitude,
    MinAltitude,
    AvgVerticalSpeed,
    MaxVerticalSpeed,
    MinVerticalSpeed,
}

/// Aggregate kinds derived from one sample stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateKinds {
    pub avg: MeasurementKind,
    pub max: MeasurementKind,
    pub min: MeasurementKind,
}

impl MeasurementKind {
    pub const ALL: [MeasurementKind; 47] = [
        MeasurementKind::HeartRate,
        MeasurementKind::Altitude,
        MeasurementKind::GpsAltitude,
        MeasurementKind::Cadence,
        MeasurementKind::Speed,
        MeasurementKind::VerticalSpeed,
        MeasurementKind::Power,
        MeasurementKind::Temperature,
        MeasurementKind::AbsolutePressure,
        MeasurementKind::SeaLevelPressure,
        MeasurementKind::SatelliteCount,
        MeasurementKind::PositionAccuracy,
        MeasurementKind::Latitude,
        MeasurementKind::Longitude,
        MeasurementKind::Distance,
        MeasurementKind::RespirationRate,
        MeasurementKind::Energy,
        MeasurementKind::Duration,
        MeasurementKind::Pause,
        MeasurementKind::Ascent,
        MeasurementKind::Descent,
        MeasurementKind::RecoveryTime,
        MeasurementKind::PeakTrainingEffect,
        MeasurementKind::Epoc,
        MeasurementKind::AvgPace,
        MeasurementKind::Description,
        MeasurementKind::AvgHeartRate,
        MeasurementKind::MaxHeartRate,
        MeasurementKind::MinHeartRate,
        MeasurementKind::AvgCadence,
        MeasurementKind::MaxCadence,
        MeasurementKind::MinCadence,
        MeasurementKind::AvgSpeed,
        MeasurementKind::MaxSpeed,
        MeasurementKind::MinSpeed,
        MeasurementKind::AvgPower,
        MeasurementKind::MaxPower,
        MeasurementKind::MinPower,
        MeasurementKind::AvgTemperature,
        MeasurementKind::MaxTemperature,
        MeasurementKind::MinTemperature,
        MeasurementKind::AvgAltitude,
        MeasurementKind::MaxAltitude,
        MeasurementKind::MinAltitude,
        MeasurementKind::AvgVerticalSpeed,
        MeasurementKind::MaxVerticalSpeed,
        MeasurementKind::MinVerticalSpeed,
    ];

    /// Sample streams that get avg/max/min statistics
    pub const AGGREGATED: [MeasurementKind; 7] = [
        MeasurementKind::HeartRate,
        MeasurementKind::Cadence,
        MeasurementKind::Speed,
        MeasurementKind::Power,
        MeasurementKind::Temperature,
        MeasurementKind::Altitude,
        MeasurementKind::VerticalSpeed,
    ];

    /// Name used as the discriminant in persisted documents
    pub fn type_name(&self) -> &'static str {
        match self {
            MeasurementKind::HeartRate => "Heart Rate",
            MeasurementKind::Altitude => "Altitude",
            MeasurementKind::GpsAltitude => "Altitude GPS",
            MeasurementKind::Cadence => "Cadence",
            MeasurementKind::Speed => "Speed",
            MeasurementKind::VerticalSpeed => "Vertical Speed",
            MeasurementKind::Power => "Power",
            MeasurementKind::Temperature => "Temperature",
            MeasurementKind::AbsolutePressure => "Absolute Pressure",
            MeasurementKind::SeaLevelPressure => "Sea Level Pressure",
            MeasurementKind::SatelliteCount => "Number of Satellites",
            MeasurementKind::PositionAccuracy => "EHPE",
            MeasurementKind::Latitude => "Latitude",
            MeasurementKind::Longitude => "Longitude",
            MeasurementKind::Distance => "Distance",
            MeasurementKind::RespirationRate => "Respiration Rate",
            MeasurementKind::Energy => "Energy",
            MeasurementKind::Duration => "Duration",
            MeasurementKind::Pause => "Pause Time",
            MeasurementKind::Ascent => "Ascent",
            MeasurementKind::Descent => "Descent",
            MeasurementKind::RecoveryTime => "Recovery Time",
            MeasurementKind::PeakTrainingEffect => "Peak Training Effect",
            MeasurementKind::Epoc => "EPOC",
            MeasurementKind::AvgPace => "Average Pace",
            MeasurementKind::Description => "Description",
            MeasurementKind::AvgHeartRate => "Average Heart Rate",
            MeasurementKind::MaxHeartRate => "Maximum Heart Rate",
            MeasurementKind::MinHeartRate => "Minimum Heart Rate",
            MeasurementKind::AvgCadence => "Average Cadence",
            MeasurementKind::MaxCadence => "Maximum Cadence",
            MeasurementKind::MinCadence => "Minimum Cadence",
            MeasurementKind::AvgSpeed => "Average Speed",
            MeasurementKind::MaxSpeed => "Maximum Speed",
            MeasurementKind::MinSpeed => "Minimum Speed",
            MeasurementKind::AvgPower => "Average Power",
            MeasurementKind::MaxPower => "Maximum Power",
            MeasurementKind::MinPower => "Minimum Power",
            MeasurementKind::AvgTemperature => "Average Temperature",
            MeasurementKind::MaxTemperature => "Maximum Temperature",
            MeasurementKind::MinTemperature => "Minimum Temperature",
            MeasurementKind::AvgAltitude => "Average Altitude",
            MeasurementKind::MaxAltitude => "Maximum Altitude",
            MeasurementKind::MinAltitude => "Minimum Altitude",
            MeasurementKind::AvgVerticalSpeed => "Average Vertical Speed",
            MeasurementKind::MaxVerticalSpeed => "Maximum Vertical Speed",
            MeasurementKind::MinVerticalSpeed => "Minimum Vertical Speed",
        }
    }

    /// Resolve a persisted discriminant. Returns `None` for names outside the registry.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "Heart Rate" => MeasurementKind::HeartRate,
            "Altitude" => MeasurementKind::Altitude,
            "Altitude GPS" => MeasurementKind::GpsAltitude,
            "Cadence" => MeasurementKind::Cadence,
            "Speed" => MeasurementKind::Speed,
            "Vertical Speed" => MeasurementKind::VerticalSpeed,
            "Power" => MeasurementKind::Power,
            "Temperature" => MeasurementKind::Temperature,
            "Absolute Pressure" => MeasurementKind::AbsolutePressure,
            "Sea Level Pressure" => MeasurementKind::SeaLevelPressure,
            "Number of Satellites" => MeasurementKind::SatelliteCount,
            "EHPE" => MeasurementKind::PositionAccuracy,
            "Latitude" => MeasurementKind::Latitude,
            "Longitude" => MeasurementKind::Longitude,
            "Distance" => MeasurementKind::Distance,
            "Respiration Rate" => MeasurementKind::RespirationRate,
            "Energy" => MeasurementKind::Energy,
            "Duration" => MeasurementKind::Duration,
            "Pause Time" => MeasurementKind::Pause,
            "Ascent" => MeasurementKind::Ascent,
            "Descent" => MeasurementKind::Descent,
            "Recovery Time" => MeasurementKind::RecoveryTime,
            "Peak Training Effect" => MeasurementKind::PeakTrainingEffect,
            "EPOC" => MeasurementKind::Epoc,
            "Average Pace" => MeasurementKind::AvgPace,
            "Description" => MeasurementKind::Description,
            "Average Heart Rate" => MeasurementKind::AvgHeartRate,
            "Maximum Heart Rate" => MeasurementKind::MaxHeartRate,
            "Minimum Heart Rate" => MeasurementKind::MinHeartRate,
            "Average Cadence" => MeasurementKind::AvgCadence,
            "Maximum Cadence" => MeasurementKind::MaxCadence,
            "Minimum Cadence" => MeasurementKind::MinCadence,
            "Average Speed" => MeasurementKind::AvgSpeed,
            "Maximum Speed" => MeasurementKind::MaxSpeed,
            "Minimum Speed" => MeasurementKind::MinSpeed,
            "Average Power" => MeasurementKind::AvgPower,
            "Maximum Power" => MeasurementKind::MaxPower,
            "Minimum Power" => MeasurementKind::MinPower,
            "Average Temperature" => MeasurementKind::AvgTemperature,
            "Maximum Temperature" => MeasurementKind::MaxTemperature,
            "Minimum Temperature" => MeasurementKind::MinTemperature,
            "Average Altitude" => MeasurementKind::AvgAltitude,
            "Maximum Altitude" => MeasurementKind::MaxAltitude,
            "Minimum Altitude" => MeasurementKind::MinAltitude,
            "Average Vertical Speed" => MeasurementKind::AvgVerticalSpeed,
            "Maximum Vertical Speed" => MeasurementKind::MaxVerticalSpeed,
            "Minimum Vertical Speed" => MeasurementKind::MinVerticalSpeed,
            _ => return None,
        };
        Some(kind)
    }

    /// Declared unit of the kind
    pub fn unit(&self) -> &'static str {
        match self {
            MeasurementKind::HeartRate
            | MeasurementKind::AvgHeartRate
            | MeasurementKind::MaxHeartRate
            | MeasurementKind::MinHeartRate => "bpm",
            MeasurementKind::Cadence
            | MeasurementKind::AvgCadence
            | MeasurementKind::MaxCadence
            | MeasurementKind::MinCadence => "rpm",
            MeasurementKind::Speed
            | MeasurementKind::AvgSpeed
            | MeasurementKind::MaxSpeed
            | MeasurementKind::MinSpeed
            | MeasurementKind::VerticalSpeed
            | MeasurementKind::AvgVerticalSpeed
            | MeasurementKind::MaxVerticalSpeed
            | MeasurementKind::MinVerticalSpeed => "m/s",
            MeasurementKind::Power
            | MeasurementKind::AvgPower
            | MeasurementKind::MaxPower
            | MeasurementKind::MinPower => "W",
            MeasurementKind::Temperature
            | MeasurementKind::AvgTemperature
            | MeasurementKind::MaxTemperature
            | MeasurementKind::MinTemperature => "°C",
            MeasurementKind::Altitude
            | MeasurementKind::GpsAltitude
            | MeasurementKind::AvgAltitude
            | MeasurementKind::MaxAltitude
            | MeasurementKind::MinAltitude
            | MeasurementKind::Distance
            | MeasurementKind::Ascent
            | MeasurementKind::Descent
            | MeasurementKind::PositionAccuracy => "m",
            MeasurementKind::AbsolutePressure | MeasurementKind::SeaLevelPressure => "hPa",
            MeasurementKind::Latitude | MeasurementKind::Longitude => "degrees",
            MeasurementKind::RespirationRate => "brpm",
            MeasurementKind::Energy => "kcal",
            MeasurementKind::Duration
            | MeasurementKind::Pause
            | MeasurementKind::RecoveryTime => "s",
            MeasurementKind::AvgPace => "s/km",
            MeasurementKind::Epoc => "ml/kg",
            MeasurementKind::SatelliteCount
            | MeasurementKind::PeakTrainingEffect
            | MeasurementKind::Description => "",
        }
    }

    /// Avg/max/min kinds for a sample stream, if it is aggregated
    pub fn aggregates(&self) -> Option<AggregateKinds> {
        use MeasurementKind::*;
        let (avg, max, min) = match self {
            HeartRate => (AvgHeartRate, MaxHeartRate, MinHeartRate),
            Cadence => (AvgCadence, MaxCadence, MinCadence),
            Speed => (AvgSpeed, MaxSpeed, MinSpeed),
            Power => (AvgPower, MaxPower, MinPower),
            Temperature => (AvgTemperature, MaxTemperature, MinTemperature),
            Altitude => (AvgAltitude, MaxAltitude, MinAltitude),
            VerticalSpeed => (AvgVerticalSpeed, MaxVerticalSpeed, MinVerticalSpeed),
            _ => return None,
        };
        Some(AggregateKinds { avg, max, min })
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, MeasurementKind::Latitude | MeasurementKind::Longitude)
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Raw value of a measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Text(String),
}

impl MeasurementValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MeasurementValue::Number(value) => Some(*value),
            MeasurementValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MeasurementValue::Text(text) => Some(text),
            MeasurementValue::Number(_) => None,
        }
    }
}

impl From<f64> for MeasurementValue {
    fn from(value: f64) -> Self {
        MeasurementValue::Number(value)
    }
}

impl From<&str> for MeasurementValue {
    fn from(value: &str) -> Self {
        MeasurementValue::Text(value.to_string())
    }
}

impl From<String> for MeasurementValue {
    fn from(value: String) -> Self {
        MeasurementValue::Text(value)
    }
}

impl fmt::Display for MeasurementValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementValue::Number(value) => write!(f, "{}", value),
            MeasurementValue::Text(text) => f.write_str(text),
        }
    }
}

/// One typed, unit-tagged value
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub kind: MeasurementKind,
    pub value: MeasurementValue,
}

impl Measurement {
    pub fn new(kind: MeasurementKind, value: impl Into<MeasurementValue>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn number(&self) -> Option<f64> {
        self.value.as_f64()
    }

    pub fn unit(&self) -> &'static str {
        self.kind.unit()
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = self.unit();
        if unit.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, unit)
        }
    }
}
