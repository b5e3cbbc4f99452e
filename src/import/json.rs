//! Canonical JSON importer
//!
//! Structural 1:1 mapping of the document written by `export::json`. Every
//! measurement name must resolve through the closed registry.

use crate::activity_type::ActivityType;
use crate::error::ImportError;
use crate::export::json::{
    millis_to_datetime, ActivityDocument, EventDocument, IntensityZonesDocument, LapDocument,
    ValueMap,
};
use crate::measurement::{Measurement, MeasurementKind};
use crate::models::{Activity, Event, IntensityZones, Lap, LapType, Point, Stats};

const FORMAT: &str = "canonical";

#[tracing::instrument(skip_all)]
pub fn import_str(text: &str) -> Result<Event, ImportError> {
    let document: EventDocument = serde_json::from_str(text)?;
    let event = event_from_document(document)?;
    tracing::info!(activities = event.activities.len(), "Imported canonical document");
    Ok(event)
}

fn resolve_kind(name: &str) -> Result<MeasurementKind, ImportError> {
    MeasurementKind::from_type_name(name).ok_or_else(|| ImportError::UnknownType {
        type_name: name.to_string(),
    })
}

pub(crate) fn stats_from_map(map: ValueMap) -> Result<Stats, ImportError> {
    let mut stats = Stats::new();
    for (name, value) in map {
        let kind = resolve_kind(&name)?;
        stats.insert(Measurement { kind, value });
    }
    Ok(stats)
}

fn lap_from_document(document: LapDocument) -> Result<Lap, ImportError> {
    let lap_type = LapType::from_name(&document.lap_type).unwrap_or_else(|| {
        tracing::warn!(lap_type = %document.lap_type, "Unknown lap type, using Manual");
        LapType::Manual
    });
    let mut lap = Lap::new(document.start_date, document.end_date, lap_type);
    lap.stats = stats_from_map(document.stats)?;
    Ok(lap)
}

fn zones_from_document(document: IntensityZonesDocument) -> Result<IntensityZones, ImportError> {
    Ok(IntensityZones {
        kind: resolve_kind(&document.kind)?,
        durations: [
            document.zone1_duration,
            document.zone2_duration,
            document.zone3_duration,
            document.zone4_duration,
            document.zone5_duration,
        ],
        lower_limits: [
            document.zone2_lower_limit,
            document.zone3_lower_limit,
            document.zone4_lower_limit,
            document.zone5_lower_limit,
        ],
    })
}

pub(crate) fn activity_from_document(document: ActivityDocument) -> Result<Activity, ImportError> {
    let mut activity = Activity::new(
        document.start_date,
        document.end_date,
        ActivityType::from_name(&document.activity_type),
        document.creator,
    );
    activity.id = document.id;

    for point_document in document.points {
        let time = millis_to_datetime(point_document.time).ok_or_else(|| {
            ImportError::format(FORMAT, format!("point time {} out of range", point_document.time))
        })?;
        let mut point = Point::new(time);
        for (name, value) in point_document.data {
            let kind = resolve_kind(&name)?;
            point.insert(Measurement { kind, value });
        }
        activity.add_point(point, false);
    }

    for lap_document in document.laps {
        activity.add_lap(lap_from_document(lap_document)?);
    }

    activity.stats = stats_from_map(document.stats)?;
    activity.ibi = document.ibi_data;
    activity.intensity_zones = document
        .intensity_zones
        .into_iter()
        .map(zones_from_document)
        .collect::<Result<_, _>>()?;
    activity.geo_location = document.geo_location_info;
    activity.weather = document.weather;

    Ok(activity)
}

pub(crate) fn event_from_document(document: EventDocument) -> Result<Event, ImportError> {
    let activities = document
        .activities
        .into_iter()
        .map(activity_from_document)
        .collect::<Result<Vec<_>, _>>()?;

    let mut event = Event::with_activities(document.name, activities);
    event.stats = stats_from_map(document.stats)?;
    Ok(event)
}
