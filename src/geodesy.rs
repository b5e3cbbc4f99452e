//! Track distance over an ordered position sequence

use geo::{point, GeodesicDistance};
use serde::{Deserialize, Serialize};

use crate::models::Position;

/// Equatorial radius used by the fast algorithm, in meters
const EARTH_RADIUS: f64 = 6_378_137.0;

/// Distance algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceAlgorithm {
    /// Spherical haversine
    Fast,
    /// Ellipsoidal (WGS84) geodesic
    #[default]
    Accurate,
}

impl std::str::FromStr for DistanceAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fast" | "haversine" => Ok(DistanceAlgorithm::Fast),
            "accurate" | "geodesic" | "vincenty" => Ok(DistanceAlgorithm::Accurate),
            _ => Err(format!("Invalid distance algorithm: {}", s)),
        }
    }
}

/// Sums pairwise distances between consecutive positions.
///
/// Each pair distance is first rounded to `precision` decimals and then to the
/// nearest multiple of `accuracy` meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceCalculator {
    pub algorithm: DistanceAlgorithm,
    pub accuracy: f64,
    pub precision: u32,
}

impl Default for DistanceCalculator {
    fn default() -> Self {
        Self::new(DistanceAlgorithm::Accurate)
    }
}

impl DistanceCalculator {
    pub fn new(algorithm: DistanceAlgorithm) -> Self {
        Self {
            algorithm,
            accuracy: 1.0,
            precision: 0,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    /// Total distance in meters; zero for fewer than two positions
    pub fn distance(&self, positions: &[Position]) -> f64 {
        positions
            .windows(2)
            .map(|pair| self.pair_distance(&pair[0], &pair[1]))
            .sum()
    }

    pub fn pair_distance(&self, from: &Position, to: &Position) -> f64 {
        let raw = match self.algorithm {
            DistanceAlgorithm::Fast => haversine_distance(from, to),
            DistanceAlgorithm::Accurate => geodesic_distance(from, to),
        };
        round_distance(raw, self.accuracy, self.precision)
    }
}

fn round_distance(meters: f64, accuracy: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let rounded = (meters * factor).round() / factor;
    if accuracy > 0.0 {
        (rounded / accuracy).round() * accuracy
    } else {
        rounded
    }
}

/// Great-circle distance on a sphere of the equatorial radius
pub fn haversine_distance(from: &Position, to: &Position) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS * c
}

/// Geodesic distance on the WGS84 ellipsoid
pub fn geodesic_distance(from: &Position, to: &Position) -> f64 {
    let p1 = point!(x: from.longitude, y: from.latitude);
    let p2 = point!(x: to.longitude, y: to.latitude);
    p1.geodesic_distance(&p2)
}
