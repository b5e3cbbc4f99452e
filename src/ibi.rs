//! Inter-beat interval series and its filter pipeline
//!
//! Raw intervals are keyed by cumulative elapsed time, so every filter keeps the
//! time axis of the surviving beats intact. Filters mutate in place and return
//! `&mut Self` for chaining.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::collections::BTreeMap;

use crate::config::IbiConfig;

/// Elapsed-time (ms) keyed inter-beat intervals (ms)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f64>", into = "Vec<f64>")]
pub struct IbiSeries {
    data: BTreeMap<u64, f64>,
    /// Unrounded sum of every pushed interval
    elapsed_ms: f64,
}

impl IbiSeries {
    /// Builds the series from raw intervals. Non-positive intervals carry no
    /// beat and are skipped.
    pub fn new(intervals: &[f64]) -> Self {
        let mut series = Self::default();
        for &interval in intervals {
            series.push_interval(interval);
        }
        series
    }

    /// Appends one interval after the last beat
    pub fn push_interval(&mut self, interval: f64) {
        if interval <= 0.0 || !interval.is_finite() {
            return;
        }
        self.elapsed_ms += interval;
        let mut key = self.elapsed_ms.round() as u64;
        // Sub-millisecond beats must not land on the previous key
        if let Some(&last) = self.data.keys().next_back() {
            key = key.max(last + 1);
        }
        self.data.insert(key, interval);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, elapsed_ms: u64) -> Option<f64> {
        self.data.get(&elapsed_ms).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.data.iter().map(|(k, v)| (*k, *v))
    }

    /// Flat ordered intervals, the persisted representation
    pub fn to_intervals(&self) -> Vec<f64> {
        self.data.values().copied().collect()
    }

    /// Drops every interval on the wrong side of `threshold`.
    /// `keep_below` keeps intervals `<= threshold`, otherwise `>= threshold`.
    pub fn limit_filter(&mut self, threshold: f64, keep_below: bool) -> &mut Self {
        self.data.retain(|_, ibi| {
            if keep_below {
                *ibi <= threshold
            } else {
                *ibi >= threshold
            }
        });
        self
    }

    /// Caps heart rate from above: keeps beats at or below `bpm`
    pub fn high_limit_bpm_filter(&mut self, bpm: f64) -> &mut Self {
        self.limit_filter(60_000.0 / bpm, false)
    }

    /// Caps heart rate from below: keeps beats at or above `bpm`
    pub fn low_limit_bpm_filter(&mut self, bpm: f64) -> &mut Self {
        self.limit_filter(60_000.0 / bpm, true)
    }

    /// Replaces each interval with the median of a centered window,
    /// truncated at both ends of the series
    pub fn moving_median_filter(&mut self, window: usize) -> &mut Self {
        let values = self.to_intervals();
        let half = window.max(1) / 2;
        let filtered: Vec<f64> = (0..values.len())
            .map(|i| {
                let from = i.saturating_sub(half);
                let to = (i + half).min(values.len() - 1);
                Data::new(values[from..=to].to_vec()).median()
            })
            .collect();
        self.replace_values(filtered);
        self
    }

    /// Trailing simple moving average over `window` intervals
    pub fn low_pass_filter(&mut self, window: usize) -> &mut Self {
        let values = self.to_intervals();
        let window = window.max(1);
        let filtered: Vec<f64> = (0..values.len())
            .map(|i| {
                let from = (i + 1).saturating_sub(window);
                values[from..=i].iter().mean()
            })
            .collect();
        self.replace_values(filtered);
        self
    }

    /// Replaces each group of `step` consecutive intervals with the group mean
    pub fn step_average_filter(&mut self, step: usize) -> &mut Self {
        let values = self.to_intervals();
        let filtered: Vec<f64> = values
            .chunks(step.max(1))
            .flat_map(|chunk| {
                let mean = chunk.iter().mean();
                std::iter::repeat(mean).take(chunk.len())
            })
            .collect();
        self.replace_values(filtered);
        self
    }

    fn replace_values(&mut self, values: Vec<f64>) {
        for (slot, value) in self.data.values_mut().zip(values) {
            *slot = value;
        }
    }

    /// Default cleaning: low limit, high limit, moving median, low pass
    pub fn apply_filters(&mut self, config: &IbiConfig) -> &mut Self {
        tracing::debug!(beats = self.len(), "Applying IBI filters");
        self.low_limit_bpm_filter(config.low_limit_bpm)
            .high_limit_bpm_filter(config.high_limit_bpm)
            .moving_median_filter(config.median_window)
            .low_pass_filter(config.low_pass_window)
    }

    pub fn apply_default_filters(&mut self) -> &mut Self {
        self.apply_filters(&IbiConfig::default())
    }

    /// Heart rate per beat, rounded to whole bpm
    pub fn get_as_bpm(&self) -> BTreeMap<u64, f64> {
        self.data
            .iter()
            .map(|(k, ibi)| (*k, (60_000.0 / ibi).round()))
            .collect()
    }
}

impl From<Vec<f64>> for IbiSeries {
    fn from(intervals: Vec<f64>) -> Self {
        IbiSeries::new(&intervals)
    }
}

impl From<IbiSeries> for Vec<f64> {
    fn from(series: IbiSeries) -> Self {
        series.to_intervals()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> IbiSeries {
        IbiSeries::new(&[600.0, 700.0, 800.0, 900.0])
    }

    fn keys(series: &IbiSeries) -> Vec<u64> {
        series.iter().map(|(k, _)| k).collect()
    }

    #[test]
    fn test_cumulative_keys() {
        let series = fixture();
        assert_eq!(keys(&series), vec![600, 1300, 2100, 3000]);
        assert_eq!(series.get(1300), Some(700.0));
    }

    #[test]
    fn test_bpm_conversion() {
        let bpm = fixture().get_as_bpm();
        let values: Vec<f64> = bpm.values().copied().collect();
        assert_eq!(values, vec![100.0, 86.0, 75.0, 67.0]);
        assert!(bpm.contains_key(&2100));
    }

    #[test]
    fn test_bpm_limits() {
        let mut high = fixture();
        high.high_limit_bpm_filter(80.0);
        assert_eq!(keys(&high), vec![2100, 3000]);

        let mut low = fixture();
        low.low_limit_bpm_filter(80.0);
        assert_eq!(keys(&low), vec![600, 1300]);
    }

    #[test]
    fn test_moving_median_removes_spike() {
        let mut series = IbiSeries::new(&[800.0, 810.0, 2000.0, 805.0, 795.0]);
        series.moving_median_filter(3);
        assert_eq!(series.to_intervals(), vec![805.0, 810.0, 810.0, 805.0, 800.0]);
        assert_eq!(series.len(), 5);
    }

    #[test]
    fn test_low_pass_trailing_average() {
        let mut series = IbiSeries::new(&[600.0, 800.0, 1000.0]);
        series.low_pass_filter(2);
        assert_eq!(series.to_intervals(), vec![600.0, 700.0, 900.0]);
    }

    #[test]
    fn test_step_average() {
        let mut series = IbiSeries::new(&[600.0, 800.0, 1000.0, 1200.0, 500.0]);
        series.step_average_filter(2);
        assert_eq!(series.to_intervals(), vec![700.0, 700.0, 1100.0, 1100.0, 500.0]);
    }

    #[test]
    fn test_default_pipeline_drops_out_of_range_beats() {
        // 100 ms is 600 bpm and 2000 ms is 30 bpm
        let mut series = IbiSeries::new(&[800.0, 100.0, 820.0, 2000.0, 810.0]);
        series.apply_default_filters();
        assert_eq!(series.len(), 3);
        assert!(series.iter().all(|(_, ibi)| ibi > 700.0 && ibi < 900.0));
    }

    #[test]
    fn test_json_is_flat_interval_list() {
        let series = fixture();
        let json = serde_json::to_string(&series).unwrap();
        assert_eq!(json, "[600.0,700.0,800.0,900.0]");

        let parsed: IbiSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, series);
    }

    #[test]
    fn test_non_positive_intervals_skipped() {
        let series = IbiSeries::new(&[0.0, 500.0, -3.0]);
        assert_eq!(keys(&series), vec![500]);
    }

    #[test]
    fn test_fractional_intervals_do_not_drift() {
        let series = IbiSeries::new(&[800.4; 10]);
        assert_eq!(series.len(), 10);
        // Summing rounded keys would give 8000
        assert_eq!(series.iter().last().map(|(k, _)| k), Some(8004));
    }

    #[test]
    fn test_sub_millisecond_intervals_keep_their_beats() {
        let series = IbiSeries::new(&[800.0, 0.4, 0.4, 700.0]);
        assert_eq!(series.len(), 4);
        assert_eq!(series.to_intervals(), vec![800.0, 0.4, 0.4, 700.0]);
        assert_eq!(keys(&series), vec![800, 801, 802, 1501]);
    }
}
