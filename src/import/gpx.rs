use chrono::Duration;

use super::xml::{self, XmlNode};
use super::{complete_import, default_event_name, is_usable_lap, require_timestamp, SourceFormat};
use crate::activity_type::ActivityType;
use crate::error::ImportError;
use crate::measurement::MeasurementKind;
use crate::models::{Activity, Creator, Event, Lap, LapType, Point};
use crate::summary::SummaryGenerator;

const FORMAT: &str = "GPX";

/// Extension element names and the kinds they land on
const EXTENSION_FIELDS: [(&str, MeasurementKind); 5] = [
    ("hr", MeasurementKind::HeartRate),
    ("cad", MeasurementKind::Cadence),
    ("atemp", MeasurementKind::Temperature),
    ("power", MeasurementKind::Power),
    ("speed", MeasurementKind::Speed),
];

/// Imports a track-point XML document, one activity per track
pub fn import_str(text: &str) -> Result<Event, ImportError> {
    import_with(text, &SummaryGenerator::default())
}

/// Same as [`import_str`], completing stats with the given generator
#[tracing::instrument(skip_all)]
pub fn import_with(text: &str, generator: &SummaryGenerator) -> Result<Event, ImportError> {
    let root = XmlNode::parse(text)?;
    if root.name != "gpx" {
        return Err(ImportError::format(
            FORMAT,
            format!("unexpected root element '{}'", root.name),
        ));
    }

    let creator = Creator::new(root.attribute("creator").unwrap_or("Unknown"));

    let mut activities = root
        .children_named("trk")
        .map(|track| parse_track(track, &creator))
        .collect::<Result<Vec<_>, _>>()?;
    if activities.is_empty() {
        return Err(ImportError::missing(FORMAT, "trk"));
    }

    let laps = match root.child("extensions") {
        Some(extensions) => extensions
            .children_named("lap")
            .map(parse_lap)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    for lap in laps.into_iter().filter(|lap| is_usable_lap(lap, FORMAT)) {
        let owner = activities
            .iter_mut()
            .find(|a| lap.start >= a.start && lap.start <= a.end);
        match owner {
            Some(activity) => activity.add_lap(lap),
            None => tracing::warn!(start = %lap.start, "Lap outside every track, dropped"),
        }
    }

    let name = root
        .path_text(&["metadata", "name"])
        .map(str::to_string)
        .unwrap_or_else(|| default_event_name(activities.iter().map(|a| a.start).min()));

    Ok(complete_import(
        Event::with_activities(name, activities),
        SourceFormat::Gpx,
        generator,
    ))
}

fn parse_track(track: &XmlNode, creator: &Creator) -> Result<Activity, ImportError> {
    let mut points = Vec::new();
    for segment in track.children_named("trkseg") {
        for trackpoint in segment.children_named("trkpt") {
            points.push(parse_trackpoint(trackpoint)?);
        }
    }

    let start = points
        .iter()
        .map(Point::time)
        .min()
        .ok_or_else(|| ImportError::missing(FORMAT, "trkpt"))?;
    let end = points.iter().map(Point::time).max().unwrap_or(start);

    let activity_type = track
        .child_text("type")
        .map(ActivityType::from_name)
        .unwrap_or(ActivityType::Unknown);

    let mut activity = Activity::new(start, end, activity_type, creator.clone());
    activity.add_points(points);
    activity.sort_points_by_date();
    if let Some(name) = track.child_text("name") {
        activity.stats.set(MeasurementKind::Description, name);
    }

    tracing::debug!(points = activity.point_count(), "Parsed GPX track");
    Ok(activity)
}

fn parse_trackpoint(node: &XmlNode) -> Result<Point, ImportError> {
    let time = require_timestamp(FORMAT, "trkpt/time", node.child_text("time"))?;
    let mut point = Point::new(time);

    for (attribute, kind) in [
        ("lat", MeasurementKind::Latitude),
        ("lon", MeasurementKind::Longitude),
    ] {
        let raw = node
            .attribute(attribute)
            .ok_or_else(|| ImportError::missing(FORMAT, format!("trkpt@{}", attribute)))?;
        let value = xml::parse_number(raw).ok_or_else(|| {
            ImportError::format(FORMAT, format!("invalid {} '{}'", attribute, raw))
        })?;
        point.set(kind, value);
    }

    if let Some(elevation) = node.child_f64("ele") {
        point.set(MeasurementKind::Altitude, elevation);
    }

    if let Some(extensions) = node.child("extensions") {
        for (name, kind) in EXTENSION_FIELDS {
            if let Some(value) = extensions.descendant_f64(name) {
                point.set(kind, value);
            }
        }
    }

    Ok(point)
}

fn parse_lap(node: &XmlNode) -> Result<Lap, ImportError> {
    let start = require_timestamp(FORMAT, "lap/startTime", node.child_text("startTime"))?;
    let elapsed = node.child_f64("elapsedTime").unwrap_or(0.0);
    let end = start + Duration::milliseconds((elapsed * 1000.0).round() as i64);

    let lap_type = node
        .child("trigger")
        .and_then(|trigger| trigger.attribute("kind"))
        .and_then(LapType::from_name)
        .unwrap_or(LapType::Manual);

    let mut lap = Lap::new(start, end, lap_type);
    lap.stats.set(MeasurementKind::Duration, elapsed);
    lap.stats
        .set_opt(MeasurementKind::Distance, node.child_f64("distance"));
    Ok(lap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="Edge 530" xmlns="http://www.topografix.com/GPX/1/1"
     xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <metadata><name>Evening loop</name><time>2024-05-01T18:00:00Z</time></metadata>
  <trk>
    <name>Loop</name>
    <type>cycling</type>
    <trkseg>
      <trkpt lat="60.0" lon="24.0">
        <ele>12.5</ele>
        <time>2024-05-01T18:00:00Z</time>
        <extensions>
          <gpxtpx:TrackPointExtension><gpxtpx:hr>120</gpxtpx:hr><gpxtpx:cad>85</gpxtpx:cad><gpxtpx:atemp>18</gpxtpx:atemp></gpxtpx:TrackPointExtension>
          <power>210</power>
        </extensions>
      </trkpt>
      <trkpt lat="60.001" lon="24.0">
        <ele>13.0</ele>
        <time>2024-05-01T18:00:10Z</time>
      </trkpt>
    </trkseg>
  </trk>
  <extensions>
    <lap><startTime>2024-05-01T18:00:00Z</startTime><elapsedTime>10</elapsedTime><distance>111</distance><trigger kind="manual"/></lap>
    <lap><startTime>2024-05-01T18:00:10Z</startTime><elapsedTime>0</elapsedTime><distance>0</distance></lap>
  </extensions>
</gpx>"#;

    #[test]
    fn test_import_ride() {
        let event = import_str(RIDE).unwrap();
        assert_eq!(event.name, "Evening loop");

        let activity = &event.activities[0];
        assert_eq!(activity.activity_type, ActivityType::Cycling);
        assert_eq!(activity.creator.name, "Edge 530");
        assert_eq!(activity.point_count(), 2);

        let first = &activity.points()[0];
        assert_eq!(first.value(MeasurementKind::HeartRate), Some(120.0));
        assert_eq!(first.value(MeasurementKind::Temperature), Some(18.0));
        assert_eq!(first.value(MeasurementKind::Power), Some(210.0));
        assert_eq!(first.value(MeasurementKind::Altitude), Some(12.5));

        assert_eq!(activity.laps().len(), 1);
        assert_eq!(activity.laps()[0].stats.value(MeasurementKind::Distance), Some(111.0));
        assert!(activity.stats.value(MeasurementKind::Distance).unwrap() > 100.0);
    }

    #[test]
    fn test_bad_latitude() {
        let doc = r#"<gpx><trk><trkseg><trkpt lat="north" lon="24"><time>2024-05-01T18:00:00Z</time></trkpt></trkseg></trk></gpx>"#;
        assert!(matches!(import_str(doc), Err(ImportError::Format { .. })));
    }

    #[test]
    fn test_no_tracks() {
        assert!(matches!(
            import_str("<gpx/>"),
            Err(ImportError::MissingElement { .. })
        ));
    }
}
