//! One-point-per-second view of an activity

use chrono::{DateTime, Timelike, Utc};
use std::collections::HashMap;

use crate::models::{Activity, Point};

impl Activity {
    /// Buckets the points of `[start, end]` by whole second.
    ///
    /// Later points in the same second take precedence; measurements only
    /// present on earlier points of that second are carried into the bucket.
    /// Seconds without source samples produce nothing.
    pub fn get_points_interpolated(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<Point> {
        let mut grid: Vec<Point> = Vec::new();
        let mut buckets: HashMap<i64, usize> = HashMap::new();

        for point in self.get_points(start, end) {
            let second = floor_to_second(point.time());
            let mut bucket = point.retimed(second);

            match buckets.get(&second.timestamp()) {
                Some(&slot) => {
                    bucket.fill_missing_from(&grid[slot]);
                    grid[slot] = bucket;
                }
                None => {
                    buckets.insert(second.timestamp(), grid.len());
                    grid.push(bucket);
                }
            }
        }

        grid
    }
}

fn floor_to_second(time: DateTime<Utc>) -> DateTime<Utc> {
    time.with_nanosecond(0).unwrap_or(time)
}

#[cfg(test)]
mod tests {
    use crate::activity_type::ActivityType;
    use crate::measurement::MeasurementKind;
    use crate::models::{Activity, Creator, Point};
    use chrono::{Duration, TimeZone, Utc};

    #[test]
    fn test_same_second_merges() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut activity = Activity::new(start, start + Duration::seconds(10), ActivityType::Cycling, Creator::default());

        activity.add_point(
            Point::new(start + Duration::milliseconds(100))
                .with(MeasurementKind::HeartRate, 120.0)
                .with(MeasurementKind::Altitude, 5.0),
            false,
        );
        activity.add_point(
            Point::new(start + Duration::milliseconds(700)).with(MeasurementKind::HeartRate, 125.0),
            false,
        );
        activity.add_point(
            Point::new(start + Duration::seconds(3)).with(MeasurementKind::Power, 250.0),
            false,
        );

        let grid = activity.get_points_interpolated(None, None);
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0].time(), start);
        assert_eq!(grid[0].value(MeasurementKind::HeartRate), Some(125.0));
        assert_eq!(grid[0].value(MeasurementKind::Altitude), Some(5.0));
        assert_eq!(grid[1].time(), start + Duration::seconds(3));
    }

    #[test]
    fn test_window_is_respected() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut activity = Activity::new(start, start + Duration::seconds(10), ActivityType::Running, Creator::default());
        for s in 0..10 {
            activity.add_point(Point::new(start + Duration::seconds(s)).with(MeasurementKind::Speed, 3.0), false);
        }

        let grid = activity.get_points_interpolated(
            Some(start + Duration::seconds(2)),
            Some(start + Duration::seconds(4)),
        );
        assert_eq!(grid.len(), 3);
    }
}
