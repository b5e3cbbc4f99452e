use chrono::Duration;

use super::xml::XmlNode;
use super::{complete_import, default_event_name, is_usable_lap, require_timestamp, SourceFormat};
use crate::activity_type::ActivityType;
use crate::error::ImportError;
use crate::measurement::MeasurementKind;
use crate::models::{Activity, Creator, Event, Lap, LapType, Point};
use crate::summary::SummaryGenerator;

const FORMAT: &str = "TCX";

/// Imports a lap/track XML document
pub fn import_str(text: &str) -> Result<Event, ImportError> {
    import_with(text, &SummaryGenerator::default())
}

/// Same as [`import_str`], completing stats with the given generator
#[tracing::instrument(skip_all)]
pub fn import_with(text: &str, generator: &SummaryGenerator) -> Result<Event, ImportError> {
    let root = XmlNode::parse(text)?;
    if root.name != "TrainingCenterDatabase" {
        return Err(ImportError::format(
            FORMAT,
            format!("unexpected root element '{}'", root.name),
        ));
    }

    let activities_node = root
        .child("Activities")
        .ok_or_else(|| ImportError::missing(FORMAT, "Activities"))?;

    let activities = activities_node
        .children_named("Activity")
        .map(parse_activity)
        .collect::<Result<Vec<_>, _>>()?;
    if activities.is_empty() {
        return Err(ImportError::missing(FORMAT, "Activity"));
    }

    let name = default_event_name(activities.iter().map(|a| a.start).min());
    Ok(complete_import(
        Event::with_activities(name, activities),
        SourceFormat::Tcx,
        generator,
    ))
}

fn parse_activity(node: &XmlNode) -> Result<Activity, ImportError> {
    let lap_nodes: Vec<&XmlNode> = node.children_named("Lap").collect();
    if lap_nodes.is_empty() {
        return Err(ImportError::missing(FORMAT, "Lap"));
    }
    if !lap_nodes.iter().any(|lap| lap.child("Track").is_some()) {
        return Err(ImportError::missing(FORMAT, "Track"));
    }

    let activity_type = ActivityType::from_tcx_sport(node.attribute("Sport").unwrap_or("Other"));
    let creator = node.child("Creator").map(parse_creator).unwrap_or_default();

    let mut laps = Vec::new();
    let mut points = Vec::new();
    for lap_node in lap_nodes {
        laps.push(parse_lap(lap_node)?);
        for track in lap_node.children_named("Track") {
            for trackpoint in track.children_named("Trackpoint") {
                let point = parse_trackpoint(trackpoint)?;
                if !point.is_empty() {
                    points.push(point);
                }
            }
        }
    }

    let id_time = node
        .child_text("Id")
        .and_then(super::parse_timestamp);
    let start = laps
        .iter()
        .map(|lap| lap.start)
        .chain(points.iter().map(Point::time))
        .min()
        .or(id_time)
        .ok_or_else(|| ImportError::missing(FORMAT, "Lap@StartTime"))?;
    let end = laps
        .iter()
        .map(|lap| lap.end)
        .chain(points.iter().map(Point::time))
        .max()
        .unwrap_or(start);

    let mut activity = Activity::new(start, end, activity_type, creator);
    activity.add_points(points);
    activity.sort_points_by_date();

    for lap in laps.into_iter().filter(|lap| is_usable_lap(lap, FORMAT)) {
        activity.add_lap(lap);
    }
    if activity.laps().is_empty() {
        activity.add_lap(Lap::new(start, end, LapType::Total));
    }

    tracing::debug!(
        points = activity.point_count(),
        laps = activity.laps().len(),
        sport = %activity.activity_type,
        "Parsed TCX activity"
    );
    Ok(activity)
}

fn parse_lap(node: &XmlNode) -> Result<Lap, ImportError> {
    let start = require_timestamp(FORMAT, "Lap@StartTime", node.attribute("StartTime"))?;
    let total_seconds = node.child_f64("TotalTimeSeconds").unwrap_or(0.0);
    let end = start + seconds(total_seconds);

    let lap_type = match node.child_text("TriggerMethod") {
        Some("Distance") => LapType::Distance,
        Some("Location") => LapType::Location,
        Some("Time") => LapType::Time,
        Some("HeartRate") => LapType::HeartRate,
        _ => LapType::Manual,
    };

    let mut lap = Lap::new(start, end, lap_type);
    let stats = &mut lap.stats;
    stats.set(MeasurementKind::Duration, total_seconds);
    stats.set_opt(MeasurementKind::Distance, node.child_f64("DistanceMeters"));
    stats.set_opt(MeasurementKind::MaxSpeed, node.child_f64("MaximumSpeed"));
    stats.set_opt(MeasurementKind::Energy, node.child_f64("Calories"));
    stats.set_opt(
        MeasurementKind::AvgHeartRate,
        node.path_f64(&["AverageHeartRateBpm", "Value"]),
    );
    stats.set_opt(
        MeasurementKind::MaxHeartRate,
        node.path_f64(&["MaximumHeartRateBpm", "Value"]),
    );
    stats.set_opt(MeasurementKind::AvgCadence, node.child_f64("Cadence"));

    if let Some(lx) = node.path(&["Extensions", "LX"]) {
        stats.set_if_absent(MeasurementKind::AvgSpeed, lx.child_f64("AvgSpeed"));
        stats.set_if_absent(MeasurementKind::AvgPower, lx.child_f64("AvgWatts"));
        stats.set_if_absent(MeasurementKind::MaxPower, lx.child_f64("MaxWatts"));
        stats.set_if_absent(MeasurementKind::AvgCadence, lx.child_f64("AvgRunCadence"));
        stats.set_if_absent(MeasurementKind::MaxCadence, lx.child_f64("MaxBikeCadence"));
        stats.set_if_absent(MeasurementKind::MaxCadence, lx.child_f64("MaxRunCadence"));
    }

    Ok(lap)
}

fn parse_trackpoint(node: &XmlNode) -> Result<Point, ImportError> {
    let time = require_timestamp(FORMAT, "Trackpoint/Time", node.child_text("Time"))?;
    let mut point = Point::new(time);

    if let Some(position) = node.child("Position") {
        if let (Some(lat), Some(lon)) = (
            position.child_f64("LatitudeDegrees"),
            position.child_f64("LongitudeDegrees"),
        ) {
            point.set(MeasurementKind::Latitude, lat);
            point.set(MeasurementKind::Longitude, lon);
        }
    }

    let fields = [
        (MeasurementKind::Altitude, node.child_f64("AltitudeMeters")),
        (MeasurementKind::Distance, node.child_f64("DistanceMeters")),
        (MeasurementKind::HeartRate, node.path_f64(&["HeartRateBpm", "Value"])),
        (MeasurementKind::Cadence, node.child_f64("Cadence")),
    ];
    for (kind, value) in fields {
        if let Some(value) = value {
            point.set(kind, value);
        }
    }

    if let Some(extensions) = node.child("Extensions") {
        let fields = [
            (MeasurementKind::Speed, extensions.descendant_f64("Speed")),
            (MeasurementKind::Power, extensions.descendant_f64("Watts")),
            (MeasurementKind::Cadence, extensions.descendant_f64("RunCadence")),
        ];
        for (kind, value) in fields {
            if let Some(value) = value {
                point.set(kind, value);
            }
        }
    }

    Ok(point)
}

fn parse_creator(node: &XmlNode) -> Creator {
    let version = node.child("Version").and_then(|version| {
        let major = version.child_text("VersionMajor")?;
        let minor = version.child_text("VersionMinor").unwrap_or("0");
        Some(format!("{}.{}", major, minor))
    });

    Creator {
        name: node.child_text("Name").unwrap_or("Unknown").to_string(),
        sw_info: version,
        hw_info: node.child_text("ProductID").map(str::to_string),
        serial_number: node.child_text("UnitId").map(str::to_string),
    }
}

fn seconds(value: f64) -> Duration {
    Duration::milliseconds((value * 1000.0).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2"
    xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2">
  <Activities>
    <Activity Sport="Running">
      <Id>2024-05-01T10:00:00Z</Id>
      <Lap StartTime="2024-05-01T10:00:00Z">
        <TotalTimeSeconds>3</TotalTimeSeconds>
        <DistanceMeters>12</DistanceMeters>
        <Calories>5</Calories>
        <AverageHeartRateBpm><Value>140</Value></AverageHeartRateBpm>
        <TriggerMethod>Distance</TriggerMethod>
        <Track>
          <Trackpoint>
            <Time>2024-05-01T10:00:00Z</Time>
            <Position><LatitudeDegrees>60.0</LatitudeDegrees><LongitudeDegrees>24.0</LongitudeDegrees></Position>
            <AltitudeMeters>10</AltitudeMeters>
            <HeartRateBpm><Value>138</Value></HeartRateBpm>
            <Extensions><ns3:TPX><ns3:Speed>4.0</ns3:Speed><ns3:RunCadence>88</ns3:RunCadence></ns3:TPX></Extensions>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-05-01T10:00:03Z</Time>
            <HeartRateBpm><Value>142</Value></HeartRateBpm>
          </Trackpoint>
        </Track>
      </Lap>
      <Lap StartTime="2024-05-01T10:00:03Z">
        <TotalTimeSeconds>0</TotalTimeSeconds>
        <DistanceMeters>0</DistanceMeters>
        <Track/>
      </Lap>
      <Creator><Name>Forerunner</Name><UnitId>123</UnitId><Version><VersionMajor>5</VersionMajor><VersionMinor>2</VersionMinor></Version></Creator>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#;

    #[test]
    fn test_import_run() {
        let event = import_str(RUN).unwrap();
        let activity = &event.activities[0];

        assert_eq!(activity.activity_type, ActivityType::Running);
        assert_eq!(activity.creator.name, "Forerunner");
        assert_eq!(activity.creator.sw_info.as_deref(), Some("5.2"));
        assert_eq!(activity.point_count(), 2);

        let first = &activity.points()[0];
        assert_eq!(first.value(MeasurementKind::Speed), Some(4.0));
        assert_eq!(first.value(MeasurementKind::Cadence), Some(88.0));
        assert!(first.position().is_some());

        // The zero-duration lap is dropped
        assert_eq!(activity.laps().len(), 1);
        let lap = &activity.laps()[0];
        assert_eq!(lap.lap_type, LapType::Distance);
        assert_eq!(lap.stats.value(MeasurementKind::AvgHeartRate), Some(140.0));
        assert_eq!(lap.stats.value(MeasurementKind::Energy), Some(5.0));
        // Completed from the points, not overwritten
        assert_eq!(lap.stats.value(MeasurementKind::MaxHeartRate), Some(142.0));
    }

    #[test]
    fn test_missing_track_is_fatal() {
        let doc = r#"<TrainingCenterDatabase><Activities><Activity Sport="Biking">
            <Lap StartTime="2024-05-01T10:00:00Z"><TotalTimeSeconds>60</TotalTimeSeconds></Lap>
        </Activity></Activities></TrainingCenterDatabase>"#;
        match import_str(doc) {
            Err(ImportError::MissingElement { element, .. }) => assert_eq!(element, "Track"),
            other => panic!("expected missing Track, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_trackpoint_time_is_fatal() {
        let doc = r#"<TrainingCenterDatabase><Activities><Activity Sport="Biking">
            <Lap StartTime="2024-05-01T10:00:00Z"><TotalTimeSeconds>60</TotalTimeSeconds>
              <Track><Trackpoint><AltitudeMeters>3</AltitudeMeters></Trackpoint></Track></Lap>
        </Activity></Activities></TrainingCenterDatabase>"#;
        assert!(matches!(
            import_str(doc),
            Err(ImportError::MissingElement { .. })
        ));
    }

    #[test]
    fn test_lap_synthesized_when_all_laps_empty() {
        let doc = r#"<TrainingCenterDatabase><Activities><Activity Sport="Other">
            <Lap StartTime="2024-05-01T10:00:00Z"><TotalTimeSeconds>0</TotalTimeSeconds>
              <Track>
                <Trackpoint><Time>2024-05-01T10:00:00Z</Time><HeartRateBpm><Value>90</Value></HeartRateBpm></Trackpoint>
                <Trackpoint><Time>2024-05-01T10:00:05Z</Time><HeartRateBpm><Value>95</Value></HeartRateBpm></Trackpoint>
              </Track></Lap>
        </Activity></Activities></TrainingCenterDatabase>"#;
        let event = import_str(doc).unwrap();
        let laps = event.activities[0].laps();

        assert_eq!(laps.len(), 1);
        assert_eq!(laps[0].lap_type, LapType::Total);
        assert_eq!(laps[0].stats.value(MeasurementKind::Duration), Some(5.0));
    }
}
