use chrono::{Duration, TimeZone, Utc};
use sportsrs::export::{self, json, ExportFormat, TcxExporter};
use sportsrs::import::{self, Importer, SourceFormat};
use sportsrs::persistence::{persist_event, restore_event};
use sportsrs::{
    Activity, ActivityType, AppConfig, Creator, DistanceAlgorithm, DistanceCalculator, Event,
    LapType, MeasurementKind, Point, SummaryGenerator, MAX_STREAM_BYTES,
};
use tempfile::tempdir;

/// Integration tests that run whole import/export workflows

const TCX_RIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TrainingCenterDatabase xmlns="http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2"
    xmlns:ns3="http://www.garmin.com/xmlschemas/ActivityExtension/v2">
  <Activities>
    <Activity Sport="Biking">
      <Id>2024-04-02T16:00:00Z</Id>
      <Lap StartTime="2024-04-02T16:00:00Z">
        <TotalTimeSeconds>20</TotalTimeSeconds>
        <DistanceMeters>150</DistanceMeters>
        <Calories>12</Calories>
        <Cadence>82</Cadence>
        <TriggerMethod>Manual</TriggerMethod>
        <Track>
          <Trackpoint>
            <Time>2024-04-02T16:00:00Z</Time>
            <Position><LatitudeDegrees>48.2000</LatitudeDegrees><LongitudeDegrees>16.3700</LongitudeDegrees></Position>
            <AltitudeMeters>170</AltitudeMeters>
            <HeartRateBpm><Value>110</Value></HeartRateBpm>
            <Cadence>80</Cadence>
            <Extensions><ns3:TPX><ns3:Watts>180</ns3:Watts></ns3:TPX></Extensions>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-04-02T16:00:10Z</Time>
            <Position><LatitudeDegrees>48.2006</LatitudeDegrees><LongitudeDegrees>16.3700</LongitudeDegrees></Position>
            <AltitudeMeters>174</AltitudeMeters>
            <HeartRateBpm><Value>125</Value></HeartRateBpm>
            <Cadence>84</Cadence>
          </Trackpoint>
          <Trackpoint>
            <Time>2024-04-02T16:00:20Z</Time>
            <Position><LatitudeDegrees>48.2012</LatitudeDegrees><LongitudeDegrees>16.3701</LongitudeDegrees></Position>
            <AltitudeMeters>169</AltitudeMeters>
            <HeartRateBpm><Value>131</Value></HeartRateBpm>
          </Trackpoint>
        </Track>
      </Lap>
      <Creator><Name>Edge</Name></Creator>
    </Activity>
  </Activities>
</TrainingCenterDatabase>"#;

const GPX_WALK: &str = r#"<?xml version="1.0"?>
<gpx version="1.1" creator="Phone" xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
  <trk><type>walking</type><trkseg>
    <trkpt lat="51.5000" lon="-0.1200"><ele>20</ele><time>2024-02-11T12:00:00Z</time>
      <extensions><gpxtpx:TrackPointExtension><gpxtpx:hr>90</gpxtpx:hr></gpxtpx:TrackPointExtension></extensions></trkpt>
    <trkpt lat="51.5003" lon="-0.1200"><ele>21</ele><time>2024-02-11T12:00:30Z</time>
      <extensions><gpxtpx:TrackPointExtension><gpxtpx:hr>95</gpxtpx:hr></gpxtpx:TrackPointExtension></extensions></trkpt>
  </trkseg></trk>
</gpx>"#;

const DEVICE_LOG: &str = r#"{"DeviceLog": {
  "Header": {"ActivityType": 3, "DateTime": "2024-03-10T08:00:00", "Duration": 10, "Energy": 8368,
             "Device": {"Name": "Ambit", "SerialNumber": "42"}},
  "Samples": [
    {"TimeISO8601": "2024-03-10T08:00:00.000", "HR": 2.0, "Altitude": 100, "Latitude": 1.0, "Longitude": 0.4},
    {"TimeISO8601": "2024-03-10T08:00:05.000", "HR": 2.5, "Altitude": 103, "Latitude": 1.00001, "Longitude": 0.4},
    {"TimeISO8601": "2024-03-10T08:00:10.000", "HR": 2.2, "Altitude": 101, "Latitude": 1.00002, "Longitude": 0.4}
  ],
  "R-R": {"Data": [480, 500, 520, 400, 410]}
}}"#;

const MULTISPORT: &str = r#"{
  "Header": {"Device": {"Name": "Spartan"}},
  "Samples": [
    {"TimeISO8601": "2024-06-01T09:00:00.000", "Events": [{"Activity": {"ActivityType": 6}}]},
    {"TimeISO8601": "2024-06-01T09:00:02.000", "HR": 2.0},
    {"TimeISO8601": "2024-06-01T09:00:08.000", "HR": 2.3},
    {"TimeISO8601": "2024-06-01T09:00:10.000", "Events": [{"Activity": {"ActivityType": 2}}]},
    {"TimeISO8601": "2024-06-01T09:00:12.000", "HR": 2.4, "Speed": 9.0},
    {"TimeISO8601": "2024-06-01T09:00:15.000", "Events": [{"Lap": {"Type": "Distance"}}]},
    {"TimeISO8601": "2024-06-01T09:00:18.000", "HR": 2.5, "Speed": 9.5},
    {"TimeISO8601": "2024-06-01T09:00:20.000", "Events": [{"Activity": {"ActivityType": 1}}]},
    {"TimeISO8601": "2024-06-01T09:00:25.000", "HR": 2.6, "Speed": 3.5},
    {"TimeISO8601": "2024-06-01T09:00:30.000", "Events": [{"Stop": {}}]}
  ]
}"#;

const TELEMETRY: &str = r#"{
  "Device": {"Name": "Phone"},
  "ActivityType": "Running",
  "Entries": [
    {"TimeISO8601": "2024-07-01T07:00:00Z", "Attributes": "{\"HR\": 140}"},
    {"TimeISO8601": "2024-07-01T07:00:05Z", "Attributes": "{\"R-R\": [500, 500]}"}
  ]
}"#;

fn canonical_round_trip(event: &Event) -> Event {
    let text = json::to_json_string(event).unwrap();
    import::json::import_str(&text).unwrap()
}

#[test]
fn test_every_dialect_round_trips_through_canonical_json() {
    let fixtures: [(SourceFormat, &str); 5] = [
        (SourceFormat::Tcx, TCX_RIDE),
        (SourceFormat::Gpx, GPX_WALK),
        (SourceFormat::DeviceLog, DEVICE_LOG),
        (SourceFormat::MultisportStream, MULTISPORT),
        (SourceFormat::Telemetry, TELEMETRY),
    ];

    for (format, text) in fixtures {
        assert_eq!(import::detect_format(text.as_bytes()).unwrap(), format);

        let event = import::detect_and_parse(text.as_bytes()).unwrap();
        assert!(!event.activities.is_empty(), "{} produced no activities", format);
        assert_eq!(canonical_round_trip(&event), event, "{} did not round-trip", format);
    }
}

#[test]
fn test_multisport_segmentation() {
    let event = import::parse_as(SourceFormat::MultisportStream, MULTISPORT.as_bytes()).unwrap();
    assert_eq!(event.activities.len(), 3);

    let counts: Vec<usize> = event.activities.iter().map(|a| a.point_count()).collect();
    assert_eq!(counts, vec![2, 2, 1]);

    // Second activity is split by the lap marker, the others carry one Total lap each
    let bike = &event.activities[1];
    assert_eq!(bike.laps().len(), 2);
    assert_eq!(bike.laps()[0].lap_type, LapType::Distance);
    assert_eq!(event.activities[0].laps()[0].lap_type, LapType::Total);
    assert_eq!(event.activities[2].laps()[0].lap_type, LapType::Total);

    // Event duration sums the activity durations
    assert_eq!(event.stats.value(MeasurementKind::Duration), Some(30.0));
    assert_eq!(event.stats.value(MeasurementKind::MaxHeartRate), Some(156.0));
}

#[test]
fn test_tcx_export_reimports() {
    let original = import::detect_and_parse(TCX_RIDE.as_bytes()).unwrap();
    let xml = TcxExporter::generate_tcx_xml(&original).unwrap();
    let reimported = import::tcx::import_str(&xml).unwrap();

    let before = &original.activities[0];
    let after = &reimported.activities[0];
    assert_eq!(after.activity_type, before.activity_type);
    assert_eq!(after.point_count(), before.point_count());
    assert_eq!(after.laps().len(), 1);

    for (a, b) in before.points().iter().zip(after.points()) {
        assert_eq!(a.time(), b.time());
        assert_eq!(
            a.value(MeasurementKind::HeartRate),
            b.value(MeasurementKind::HeartRate)
        );
        assert_eq!(a.value(MeasurementKind::Power), b.value(MeasurementKind::Power));
    }
    assert_eq!(
        after.laps()[0].stats.value(MeasurementKind::Distance),
        Some(150.0)
    );
}

#[test]
fn test_gpx_export_requires_lap_distance() {
    let mut event = import::detect_and_parse(GPX_WALK.as_bytes()).unwrap();
    assert!(TcxExporter::generate_tcx_xml(&event).is_ok());

    event.activities[0].stats.remove(MeasurementKind::Distance);
    assert!(TcxExporter::generate_tcx_xml(&event).is_err());
}

#[test]
fn test_persist_and_restore() {
    let event = import::detect_and_parse(MULTISPORT.as_bytes()).unwrap();
    let persisted = persist_event(&event, MAX_STREAM_BYTES).unwrap();

    assert_eq!(persisted.activities.len(), event.activities.len());
    assert!(persisted.activities.iter().all(|s| !s.is_compressed()));
    assert_eq!(restore_event(&persisted).unwrap(), event);
}

#[test]
fn test_persist_compresses_large_activities() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
    let end = start + Duration::seconds(3_000);
    let mut activity = Activity::new(start, end, ActivityType::Running, Creator::new("Watch"));
    for second in 0..3_000 {
        let point = Point::new(start + Duration::seconds(second))
            .with(MeasurementKind::HeartRate, (120 + second % 40) as f64)
            .with(MeasurementKind::Cadence, 170.0);
        activity.add_point(point, false);
    }
    let mut event = Event::with_activities("Long run", vec![activity]);
    SummaryGenerator::default().regenerate_event_stats(&mut event);

    // Repetitive point data compresses far below a third of its size
    let plain = json::to_json_bytes(&event).unwrap();
    let limit = plain.len() / 3;

    let persisted = persist_event(&event, limit).unwrap();
    assert!(!persisted.meta.is_compressed());
    assert!(persisted.activities[0].is_compressed());
    assert_eq!(restore_event(&persisted).unwrap(), event);
}

#[test]
fn test_merge_and_regenerate() {
    let walk = import::detect_and_parse(GPX_WALK.as_bytes()).unwrap();
    let ride = import::detect_and_parse(TCX_RIDE.as_bytes()).unwrap();

    let mut merged = Event::merge("Weekend", vec![ride, walk]);
    SummaryGenerator::default().regenerate_event_stats(&mut merged);

    assert_eq!(merged.name, "Weekend");
    assert_eq!(merged.activities.len(), 2);
    assert!(merged.activities[0].start < merged.activities[1].start);
    assert_eq!(merged.stats.value(MeasurementKind::Duration), Some(50.0));
}

#[test]
fn test_ibi_filters_on_imported_series() {
    let mut event = import::detect_and_parse(DEVICE_LOG.as_bytes()).unwrap();
    let ibi = &mut event.activities[0].ibi;
    assert_eq!(ibi.len(), 5);

    ibi.apply_default_filters();
    assert!(!ibi.is_empty());
    for bpm in ibi.get_as_bpm().values() {
        assert!((40.0..=220.0).contains(bpm));
    }
}

#[test]
fn test_importer_applies_configured_stats() {
    // Eleven kilometres north, far enough for the two algorithms to disagree
    let gpx = r#"<gpx><trk><type>cycling</type><trkseg>
        <trkpt lat="60.0" lon="24.0"><time>2024-06-01T06:00:00Z</time></trkpt>
        <trkpt lat="60.1" lon="24.0"><time>2024-06-01T06:20:00Z</time></trkpt>
    </trkseg></trk></gpx>"#;

    let mut config = AppConfig::default();
    config.stats.distance_algorithm = DistanceAlgorithm::Fast;
    let importer = Importer::from_config(&config).unwrap();

    let fast = importer.detect_and_parse(gpx.as_bytes()).unwrap();
    let accurate = import::detect_and_parse(gpx.as_bytes()).unwrap();

    let positions = accurate.activities[0].positions(None, None);
    let distance = |event: &Event| event.activities[0].stats.value(MeasurementKind::Distance);
    assert_eq!(
        distance(&fast),
        Some(DistanceCalculator::new(DistanceAlgorithm::Fast).distance(&positions))
    );
    assert_eq!(
        distance(&accurate),
        Some(DistanceCalculator::new(DistanceAlgorithm::Accurate).distance(&positions))
    );
    assert_ne!(distance(&fast), distance(&accurate));
}

#[test]
fn test_unsupported_documents() {
    assert!(import::detect_and_parse(b"").is_err());
    assert!(import::detect_and_parse(br#"{"something": []}"#).is_err());
    assert!(import::detect_and_parse(b"<kml></kml>").is_err());
}

#[tokio::test]
async fn test_file_export_and_import() {
    let dir = tempdir().unwrap();
    let event = import::detect_and_parse(DEVICE_LOG.as_bytes()).unwrap();

    let json_path = dir.path().join("log.json");
    export::export_event(&event, ExportFormat::Json, &json_path).unwrap();
    let restored = import::import_file(&json_path, None).await.unwrap();
    assert_eq!(restored, event);

    let tcx_path = dir.path().join("log.tcx");
    export::export_event(&event, ExportFormat::Tcx, &tcx_path).unwrap();
    let from_tcx = import::import_file(&tcx_path, Some(SourceFormat::Tcx)).await.unwrap();
    assert_eq!(from_tcx.activities[0].point_count(), event.activities[0].point_count());
}

#[tokio::test]
async fn test_directory_import() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("a.gpx"), GPX_WALK).unwrap();
    std::fs::write(dir.path().join("b.tcx"), TCX_RIDE).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a recording").unwrap();
    std::fs::write(dir.path().join("broken.json"), "{").unwrap();

    let events = import::import_directory(dir.path()).await.unwrap();
    assert_eq!(events.len(), 2);
}
