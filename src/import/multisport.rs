//! Multisport stream importer
//!
//! A single continuous sample stream covers every sport of the session.
//! Marker samples split it: `Activity` markers open a new sub-activity, `Lap`
//! markers close the running lap and `Stop` ends the recording.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::device_log::{DeviceInfo, RrData, Sample};
use super::{complete_import, default_event_name, parse_timestamp, SourceFormat};
use crate::activity_type::ActivityType;
use crate::error::ImportError;
use crate::models::{Activity, Creator, Event, Lap, LapType};
use crate::summary::SummaryGenerator;

const FORMAT: &str = "multisport";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Document {
    #[serde(default)]
    header: Header,
    samples: Vec<Sample>,
    #[serde(rename = "R-R")]
    rr: Option<RrData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Header {
    device: Option<DeviceInfo>,
    date_time: Option<String>,
}

/// Markers extracted from the stream, in time order
#[derive(Debug, Default)]
struct Markers {
    activities: Vec<(DateTime<Utc>, ActivityType)>,
    laps: Vec<(DateTime<Utc>, LapType)>,
    stop: Option<DateTime<Utc>>,
}

impl Markers {
    fn collect(samples: &[(DateTime<Utc>, &Sample)]) -> Self {
        let mut markers = Markers::default();
        for (time, sample) in samples {
            for event in &sample.events {
                if let Some(activity) = &event.activity {
                    let activity_type = activity
                        .activity_type
                        .map(ActivityType::from_device_code)
                        .unwrap_or(ActivityType::Unknown);
                    markers.activities.push((*time, activity_type));
                }
                if let Some(lap) = &event.lap {
                    let lap_type = lap
                        .lap_type
                        .as_deref()
                        .and_then(LapType::from_name)
                        .unwrap_or(LapType::Manual);
                    markers.laps.push((*time, lap_type));
                }
                if event.stop.is_some() {
                    markers.stop = Some(*time);
                }
            }
        }
        markers
    }
}

/// Index of the window whose start is the last one at or before `time`.
/// Times before the first start land in the first window.
fn window_index(starts: &[DateTime<Utc>], time: DateTime<Utc>) -> usize {
    starts.partition_point(|start| *start <= time).saturating_sub(1)
}

/// Consecutive boundary pairs, each typed by the boundary that closes it
fn lap_windows(
    starts: &[DateTime<Utc>],
    lap_markers: &[(DateTime<Utc>, LapType)],
    end: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>, LapType)> {
    let mut boundaries: Vec<(DateTime<Utc>, LapType)> = starts
        .iter()
        .map(|start| (*start, LapType::SessionEnd))
        .chain(lap_markers.iter().copied())
        .chain(std::iter::once((end, LapType::SessionEnd)))
        .filter(|(time, _)| *time <= end)
        .collect();
    // Lap markers sort after activity starts at the same instant and win the dedup
    boundaries.sort_by_key(|(time, lap_type)| (*time, *lap_type != LapType::SessionEnd));
    boundaries.dedup_by(|later, earlier| {
        if later.0 == earlier.0 {
            earlier.1 = later.1;
            true
        } else {
            false
        }
    });

    boundaries
        .windows(2)
        .map(|pair| (pair[0].0, pair[1].0, pair[1].1))
        .collect()
}

/// Imports a multisport stream, one activity per sport segment
pub fn import_str(text: &str) -> Result<Event, ImportError> {
    import_with(text, &SummaryGenerator::default())
}

/// Same as [`import_str`], completing stats with the given generator
#[tracing::instrument(skip_all)]
pub fn import_with(text: &str, generator: &SummaryGenerator) -> Result<Event, ImportError> {
    let document: Document = serde_json::from_str(text)?;

    let mut samples: Vec<(DateTime<Utc>, &Sample)> = document
        .samples
        .iter()
        .filter_map(|sample| sample.timestamp().map(|time| (time, sample)))
        .collect();
    samples.sort_by_key(|(time, _)| *time);

    let first_sample = samples.first().map(|(time, _)| *time);
    let last_sample = samples.last().map(|(time, _)| *time);
    let recording_start = first_sample
        .or_else(|| document.header.date_time.as_deref().and_then(parse_timestamp))
        .ok_or_else(|| ImportError::missing(FORMAT, "Samples/TimeISO8601"))?;

    let markers = Markers::collect(&samples);
    let mut segments = markers.activities.clone();
    if segments.is_empty() {
        tracing::warn!("No activity markers, importing the stream as one activity");
        segments.push((recording_start, ActivityType::Unknown));
    }
    // Samples ahead of the first marker belong to the first activity
    if segments[0].0 > recording_start {
        segments[0].0 = recording_start;
    }

    // Samples recorded after Stop stretch the last activity
    let end = markers
        .stop
        .max(last_sample)
        .unwrap_or(recording_start)
        .max(segments[segments.len() - 1].0);
    if let (Some(stop), Some(last)) = (markers.stop, last_sample) {
        if last > stop {
            tracing::debug!(%stop, %last, "Samples continue after the stop marker");
        }
    }
    let starts: Vec<DateTime<Utc>> = segments.iter().map(|(start, _)| *start).collect();

    let creator = document
        .header
        .device
        .as_ref()
        .map(DeviceInfo::to_creator)
        .unwrap_or_else(Creator::default);

    let mut activities: Vec<Activity> = segments
        .iter()
        .enumerate()
        .map(|(i, (start, activity_type))| {
            let activity_end = starts.get(i + 1).copied().unwrap_or(end);
            Activity::new(*start, activity_end, *activity_type, creator.clone())
        })
        .collect();

    for (time, sample) in &samples {
        if let Some(point) = sample.to_point(*time) {
            activities[window_index(&starts, *time)].add_point(point, false);
        }
    }

    for (lap_start, lap_end, lap_type) in lap_windows(&starts, &markers.laps, end) {
        if lap_end <= lap_start {
            continue;
        }
        activities[window_index(&starts, lap_start)].add_lap(Lap::new(lap_start, lap_end, lap_type));
    }

    if let Some(rr) = &document.rr {
        let mut elapsed_ms = 0.0;
        for interval in &rr.data {
            elapsed_ms += interval;
            let at = recording_start + chrono::Duration::milliseconds(elapsed_ms.round() as i64);
            activities[window_index(&starts, at)].ibi.push_interval(*interval);
        }
    }

    for activity in &mut activities {
        activity.sort_points_by_date();
        activity.sort_laps_by_date();
        retag_total_lap(activity);
    }

    Ok(complete_import(
        Event::with_activities(default_event_name(Some(recording_start)), activities),
        SourceFormat::MultisportStream,
        generator,
    ))
}

/// A sole lap spanning the activity becomes its Total lap; a lapless activity gets one
fn retag_total_lap(activity: &mut Activity) {
    let (start, end) = (activity.start, activity.end);
    if activity.laps().is_empty() {
        if end > start {
            activity.add_lap(Lap::new(start, end, LapType::Total));
        }
        return;
    }
    if let [only] = activity.laps_mut() {
        if only.start == start && only.end == end {
            only.lap_type = LapType::Total;
        }
    }
}
