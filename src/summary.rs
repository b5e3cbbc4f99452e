//! Summary statistics for activities, laps and events
//!
//! Stats are never recomputed implicitly. Callers pick one of two modes after
//! mutating points:
//! - `regenerate_*` overwrites every computed key and drops computed keys that no
//!   longer have data, keeping imported-only keys (energy, recovery time, ...)
//! - `complete_*` only fills keys that are still missing, so header values copied
//!   by an importer survive

use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;

use crate::config::StatsConfig;
use crate::geodesy::DistanceCalculator;
use crate::measurement::MeasurementKind;
use crate::models::{Activity, Event, IntensityZones, Stats};

/// Kinds that get intensity zone tables
pub const ZONE_KINDS: [MeasurementKind; 3] = [
    MeasurementKind::HeartRate,
    MeasurementKind::Power,
    MeasurementKind::Speed,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Regenerate,
    Complete,
}

/// Maximum of the values, `None` when empty
pub fn maximum(values: &[f64]) -> Option<f64> {
    values.iter().copied().fold(None, |acc, v| match acc {
        Some(current) if current >= v => Some(current),
        _ => Some(v),
    })
}

/// Minimum of the values, `None` when empty
pub fn minimum(values: &[f64]) -> Option<f64> {
    values.iter().copied().fold(None, |acc, v| match acc {
        Some(current) if current <= v => Some(current),
        _ => Some(v),
    })
}

/// Mean over the values that are present
pub fn average(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().mean())
    }
}

/// Total climb (`gain`) or drop over a series.
///
/// Values are rounded to `precision` decimals. A change is only counted once it
/// reaches `threshold` relative to the last counted value; moving the other
/// way resets the reference so the next run starts from the turning point.
pub fn gain_or_loss(values: &[f64], gain: bool, threshold: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let mut rounded = values.iter().map(|v| (v * factor).round() / factor);

    let Some(mut reference) = rounded.next() else {
        return 0.0;
    };
    let mut total = 0.0;

    for value in rounded {
        let delta = if gain {
            value - reference
        } else {
            reference - value
        };
        if delta >= threshold {
            total += delta;
            reference = value;
        } else if delta < 0.0 {
            reference = value;
        }
    }

    total
}

/// Computes and stores stats on the canonical model
#[derive(Debug, Clone, Default)]
pub struct SummaryGenerator {
    config: StatsConfig,
}

impl SummaryGenerator {
    pub fn new(config: StatsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    fn distance_calculator(&self) -> DistanceCalculator {
        DistanceCalculator::new(self.config.distance_algorithm)
    }

    /// Kinds produced by [`SummaryGenerator::window_stats`]
    pub fn computed_kinds() -> Vec<MeasurementKind> {
        let mut kinds = vec![
            MeasurementKind::Duration,
            MeasurementKind::Distance,
            MeasurementKind::Ascent,
            MeasurementKind::Descent,
            MeasurementKind::AvgPace,
        ];
        for kind in MeasurementKind::AGGREGATED {
            if let Some(aggregates) = kind.aggregates() {
                kinds.extend([aggregates.avg, aggregates.max, aggregates.min]);
            }
        }
        kinds
    }

    /// Stats of the points inside `[start, end]`
    pub fn window_stats(
        &self,
        activity: &Activity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Stats {
        let points = activity.get_points(Some(start), Some(end));
        let mut stats = Stats::new();

        let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
        stats.set(MeasurementKind::Duration, seconds.max(0.0));

        let values_of = |kind: MeasurementKind| -> Vec<f64> {
            points.iter().filter_map(|p| p.value(kind)).collect()
        };

        let positions = activity.positions(Some(start), Some(end));
        let distance = if positions.len() >= 2 {
            Some(self.distance_calculator().distance(&positions))
        } else {
            let recorded = values_of(MeasurementKind::Distance);
            match (recorded.first(), recorded.last()) {
                (Some(first), Some(last)) if recorded.len() >= 2 => Some((last - first).max(0.0)),
                _ => None,
            }
        };
        stats.set_opt(MeasurementKind::Distance, distance);

        for kind in MeasurementKind::AGGREGATED {
            let Some(aggregates) = kind.aggregates() else {
                continue;
            };
            let values = values_of(kind);
            stats.set_opt(aggregates.avg, average(&values));
            stats.set_opt(aggregates.max, maximum(&values));
            stats.set_opt(aggregates.min, minimum(&values));
        }

        let mut altitudes = values_of(MeasurementKind::Altitude);
        if altitudes.is_empty() {
            altitudes = values_of(MeasurementKind::GpsAltitude);
        }
        if altitudes.len() >= 2 {
            let threshold = self.config.gain_threshold;
            let precision = self.config.gain_precision;
            stats.set(
                MeasurementKind::Ascent,
                gain_or_loss(&altitudes, true, threshold, precision),
            );
            stats.set(
                MeasurementKind::Descent,
                gain_or_loss(&altitudes, false, threshold, precision),
            );
        }

        let pace = stats
            .value(MeasurementKind::AvgSpeed)
            .filter(|speed| *speed > 0.0)
            .map(|speed| 1000.0 / speed);
        stats.set_opt(MeasurementKind::AvgPace, pace);

        stats
    }

    /// Five-zone tables on the 1-second grid
    pub fn intensity_zones(&self, activity: &Activity) -> Vec<IntensityZones> {
        let grid = activity.get_points_interpolated(Some(activity.start), Some(activity.end));
        let percentages = self.config.zone_percentages;

        ZONE_KINDS
            .iter()
            .filter_map(|&kind| {
                let values: Vec<f64> = grid.iter().filter_map(|p| p.value(kind)).collect();
                let max = maximum(&values).filter(|max| *max > 0.0)?;
                let limits = percentages.map(|fraction| fraction * max);
                let mut zones = IntensityZones::new(kind, limits);
                for value in values {
                    zones.durations[zones.zone_of(value)] += 1.0;
                }
                Some(zones)
            })
            .collect()
    }

    pub fn regenerate_activity_stats(&self, activity: &mut Activity) {
        self.apply_activity(activity, Mode::Regenerate);
    }

    pub fn complete_activity_stats(&self, activity: &mut Activity) {
        self.apply_activity(activity, Mode::Complete);
    }

    fn apply_activity(&self, activity: &mut Activity, mode: Mode) {
        let kinds = Self::computed_kinds();

        let computed = self.window_stats(activity, activity.start, activity.end);
        merge_stats(&mut activity.stats, &computed, &kinds, mode);

        let lap_stats: Vec<Stats> = activity
            .laps()
            .iter()
            .map(|lap| self.window_stats(activity, lap.start, lap.end))
            .collect();
        for (lap, computed) in activity.laps_mut().iter_mut().zip(lap_stats) {
            merge_stats(&mut lap.stats, &computed, &kinds, mode);
        }

        if mode == Mode::Regenerate || activity.intensity_zones.is_empty() {
            activity.intensity_zones = self.intensity_zones(activity);
        }

        tracing::debug!(
            activity = %activity.id,
            points = activity.point_count(),
            laps = activity.laps().len(),
            stats = activity.stats.len(),
            "Activity stats updated"
        );
    }

    /// Regenerates every activity and the event aggregate
    pub fn regenerate_event_stats(&self, event: &mut Event) {
        for activity in &mut event.activities {
            self.regenerate_activity_stats(activity);
        }
        let aggregate = aggregate_event_stats(event);
        merge_stats(&mut event.stats, &aggregate, &event_kinds(), Mode::Regenerate);
    }

    /// Fills missing stats on every activity and the event
    pub fn complete_event_stats(&self, event: &mut Event) {
        for activity in &mut event.activities {
            self.complete_activity_stats(activity);
        }
        let aggregate = aggregate_event_stats(event);
        merge_stats(&mut event.stats, &aggregate, &event_kinds(), Mode::Complete);
    }
}

fn merge_stats(target: &mut Stats, computed: &Stats, kinds: &[MeasurementKind], mode: Mode) {
    for &kind in kinds {
        match (computed.get(kind), mode) {
            (Some(measurement), Mode::Regenerate) => target.insert(measurement.clone()),
            (None, Mode::Regenerate) => {
                target.remove(kind);
            }
            (Some(measurement), Mode::Complete) if !target.contains(kind) => {
                target.insert(measurement.clone())
            }
            _ => {}
        }
    }
}

const SUMMED_KINDS: [MeasurementKind; 6] = [
    MeasurementKind::Duration,
    MeasurementKind::Distance,
    MeasurementKind::Ascent,
    MeasurementKind::Descent,
    MeasurementKind::Energy,
    MeasurementKind::Pause,
];

fn event_kinds() -> Vec<MeasurementKind> {
    let mut kinds = SummaryGenerator::computed_kinds();
    kinds.extend([MeasurementKind::Energy, MeasurementKind::Pause]);
    kinds
}

/// Event level stats across all activities: totals are summed, maxima and
/// minima taken across activities, averages weighted by activity duration
pub fn aggregate_event_stats(event: &Event) -> Stats {
    let mut stats = Stats::new();
    let activities = &event.activities;

    for kind in SUMMED_KINDS {
        let values: Vec<f64> = activities.iter().filter_map(|a| a.stats.value(kind)).collect();
        if !values.is_empty() {
            stats.set(kind, values.iter().sum::<f64>());
        }
    }

    for kind in MeasurementKind::AGGREGATED {
        let Some(aggregates) = kind.aggregates() else {
            continue;
        };

        let maxima: Vec<f64> = activities
            .iter()
            .filter_map(|a| a.stats.value(aggregates.max))
            .collect();
        stats.set_opt(aggregates.max, maximum(&maxima));

        let minima: Vec<f64> = activities
            .iter()
            .filter_map(|a| a.stats.value(aggregates.min))
            .collect();
        stats.set_opt(aggregates.min, minimum(&minima));

        let weighted: Vec<(f64, f64)> = activities
            .iter()
            .filter_map(|a| {
                let avg = a.stats.value(aggregates.avg)?;
                let duration = a.stats.value(MeasurementKind::Duration).unwrap_or(0.0);
                Some((avg, duration))
            })
            .collect();
        stats.set_opt(aggregates.avg, weighted_average(&weighted));
    }

    let pace = stats
        .value(MeasurementKind::AvgSpeed)
        .filter(|speed| *speed > 0.0)
        .map(|speed| 1000.0 / speed);
    stats.set_opt(MeasurementKind::AvgPace, pace);

    stats
}

fn weighted_average(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.is_empty() {
        return None;
    }
    let total_weight: f64 = pairs.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        let values: Vec<f64> = pairs.iter().map(|(v, _)| *v).collect();
        return average(&values);
    }
    Some(pairs.iter().map(|(v, w)| v * w).sum::<f64>() / total_weight)
}
