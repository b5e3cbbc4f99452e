use chrono::{DateTime, Duration, TimeZone, Utc};
use sportsrs::export::json;
use sportsrs::import::{self, SourceFormat};
use sportsrs::{ActivityType, AppConfig, Importer, LapType, MeasurementKind};
use tempfile::tempdir;

/// Binary recording tests on a small hand-encoded FIT file

const FIT_EPOCH: i64 = 631_065_600;

const ENUM: u8 = 0x00;
const UINT8: u8 = 0x02;
const UINT16: u8 = 0x84;
const SINT32: u8 = 0x85;
const UINT32: u8 = 0x86;
const UINT32Z: u8 = 0x8C;

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800, 0xB401,
    0x5000, 0x9C01, 0x8801, 0x4400,
];

fn crc_nibble(crc: u16, nibble: u8) -> u16 {
    let tmp = CRC_TABLE[(crc & 0xF) as usize];
    let crc = (crc >> 4) & 0x0FFF;
    crc ^ tmp ^ CRC_TABLE[nibble as usize]
}

fn crc(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0, |crc, &byte| crc_nibble(crc_nibble(crc, byte & 0x0F), byte >> 4))
}

/// Little-endian FIT writer with a 14-byte header whose own CRC is left at
/// zero, so the trailing CRC covers header and records
#[derive(Default)]
struct FitBuilder {
    records: Vec<u8>,
}

impl FitBuilder {
    /// Fields are (definition number, size, base type)
    fn define(&mut self, local: u8, global: u16, fields: &[(u8, u8, u8)]) -> &mut Self {
        self.records.extend_from_slice(&[0x40 | local, 0, 0]);
        self.records.extend_from_slice(&global.to_le_bytes());
        self.records.push(fields.len() as u8);
        for &(number, size, base_type) in fields {
            self.records.extend_from_slice(&[number, size, base_type]);
        }
        self
    }

    fn message(&mut self, local: u8, values: &[&[u8]]) -> &mut Self {
        self.records.push(local);
        for value in values {
            self.records.extend_from_slice(value);
        }
        self
    }

    fn finish(&self) -> Vec<u8> {
        let mut file = vec![14, 0x10];
        file.extend_from_slice(&2132u16.to_le_bytes());
        file.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        file.extend_from_slice(b".FIT");
        file.extend_from_slice(&[0, 0]);
        file.extend_from_slice(&self.records);
        let checksum = crc(&file);
        file.extend_from_slice(&checksum.to_le_bytes());
        file
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

fn fit_time(offset: i64) -> [u8; 4] {
    ((start().timestamp() + offset - FIT_EPOCH) as u32).to_le_bytes()
}

/// Two cycling sessions of ten seconds each, twenty seconds apart. Two
/// records fall outside their session: one in the gap, one after the end.
fn two_session_ride() -> Vec<u8> {
    let mut fit = FitBuilder::default();

    fit.define(
        0,
        0,
        &[(0, 1, ENUM), (1, 2, UINT16), (2, 2, UINT16), (3, 4, UINT32Z), (4, 4, UINT32)],
    )
    .message(
        0,
        &[&[4], &23u16.to_le_bytes(), &34u16.to_le_bytes(), &123_456u32.to_le_bytes(), &fit_time(0)],
    );

    fit.define(
        1,
        20,
        &[(253, 4, UINT32), (0, 4, SINT32), (1, 4, SINT32), (3, 1, UINT8), (5, 4, UINT32)],
    );
    for (i, offset) in [0i64, 5, 12, 20, 25, 33].into_iter().enumerate() {
        let latitude = 715_827_883i32 + 1_000 * i as i32;
        let longitude = 286_331_153i32;
        let heart_rate = 100 + 10 * i as u8;
        let distance_cm = (offset as u32) * 1_000;
        fit.message(
            1,
            &[
                &fit_time(offset),
                &latitude.to_le_bytes(),
                &longitude.to_le_bytes(),
                &[heart_rate],
                &distance_cm.to_le_bytes(),
            ],
        );
    }

    let summary_fields = [
        (253, 4, UINT32),
        (2, 4, UINT32),
        (7, 4, UINT32),
        (8, 4, UINT32),
        (9, 4, UINT32),
    ];
    let mut lap_fields = summary_fields.to_vec();
    lap_fields.push((24, 1, ENUM));
    fit.define(2, 19, &lap_fields);
    for (offset, trigger, distance_cm) in [(0i64, 0u8, 10_000u32), (20, 7, 8_000)] {
        fit.message(
            2,
            &[
                &fit_time(offset + 10),
                &fit_time(offset),
                &10_000u32.to_le_bytes(),
                &10_000u32.to_le_bytes(),
                &distance_cm.to_le_bytes(),
                &[trigger],
            ],
        );
    }

    let mut session_fields = summary_fields.to_vec();
    session_fields.push((5, 1, ENUM));
    fit.define(3, 18, &session_fields);
    for (offset, distance_cm) in [(0i64, 10_000u32), (20, 8_000)] {
        fit.message(
            3,
            &[
                &fit_time(offset + 10),
                &fit_time(offset),
                &10_000u32.to_le_bytes(),
                &10_000u32.to_le_bytes(),
                &distance_cm.to_le_bytes(),
                &[2],
            ],
        );
    }

    let beats = [800u16.to_le_bytes(), 750u16.to_le_bytes()].concat();
    fit.define(4, 78, &[(0, 4, UINT16)]).message(4, &[beats.as_slice()]);

    fit.finish()
}

#[test]
fn test_fixture_is_detected_as_fit() {
    assert_eq!(import::detect_format(&two_session_ride()).unwrap(), SourceFormat::Fit);
}

#[tokio::test]
async fn test_sessions_become_activities() {
    let event = import::detect_and_parse_async(two_session_ride()).await.unwrap();

    assert_eq!(event.activities.len(), 2);
    let counts: Vec<usize> = event.activities.iter().map(|a| a.point_count()).collect();
    assert_eq!(counts, vec![3, 3]);

    for activity in &event.activities {
        assert_eq!(activity.activity_type, ActivityType::Cycling);
        assert_eq!(activity.creator.name, "Suunto 9");
        assert_eq!(activity.creator.serial_number.as_deref(), Some("123456"));
        assert_eq!(activity.laps().len(), 1);
        assert_eq!(activity.stats.value(MeasurementKind::Duration), Some(10.0));
    }

    let first = &event.activities[0];
    assert_eq!(first.start, start());
    assert_eq!(first.laps()[0].lap_type, LapType::Manual);
    assert_eq!(first.stats.value(MeasurementKind::Distance), Some(100.0));
    assert_eq!(first.points()[1].value(MeasurementKind::HeartRate), Some(110.0));
    assert_eq!(first.points()[1].value(MeasurementKind::Distance), Some(50.0));
    let latitude = first.points()[0].value(MeasurementKind::Latitude).unwrap();
    assert!((latitude - 60.0).abs() < 1e-6);
    assert_eq!(first.ibi.to_intervals(), vec![800.0, 750.0]);

    let second = &event.activities[1];
    assert_eq!(second.start, start() + Duration::seconds(20));
    assert_eq!(second.laps()[0].lap_type, LapType::SessionEnd);
    assert!(second.ibi.is_empty());
}

#[tokio::test]
async fn test_every_record_inside_its_activity() {
    let event = import::detect_and_parse_async(two_session_ride()).await.unwrap();

    for activity in &event.activities {
        let inside = activity.get_points(Some(activity.start), Some(activity.end));
        assert_eq!(inside.len(), activity.point_count());
        for lap in activity.laps() {
            assert!(lap.start >= activity.start && lap.end <= activity.end);
        }
    }

    // The gap record stretches the first session, the late one the second
    assert_eq!(event.activities[0].end, start() + Duration::seconds(12));
    assert_eq!(event.activities[1].end, start() + Duration::seconds(33));
}

#[tokio::test]
async fn test_fit_round_trips_through_canonical_json() {
    let event = import::fit::import_fit(two_session_ride()).await.unwrap();

    let text = json::to_json_string(&event).unwrap();
    let restored = import::detect_and_parse(text.as_bytes()).unwrap();
    assert_eq!(restored, event);

    let again = json::to_json_string(&restored).unwrap();
    assert_eq!(again, text);
}

#[test]
fn test_corrupted_checksum_is_rejected() {
    let mut bytes = two_session_ride();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(import::fit::import_bytes(&bytes).is_err());
}

#[tokio::test]
async fn test_configured_device_registry_names_the_creator() {
    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("devices.toml");
    std::fs::write(&registry_path, "[products.suunto]\n34 = \"9 Peak Pro\"\n").unwrap();

    let config_path = dir.path().join("config.toml");
    let mut config = AppConfig::default();
    config.devices.registry_path = Some(registry_path);
    config.save_to_file(&config_path).unwrap();

    let config = AppConfig::load_from_file(&config_path).unwrap();
    let importer = Importer::from_config(&config).unwrap();
    let event = importer.import_fit(two_session_ride()).await.unwrap();
    assert_eq!(event.activities[0].creator.name, "Suunto 9 Peak Pro");

    let default = import::fit::import_fit(two_session_ride()).await.unwrap();
    assert_eq!(default.activities[0].creator.name, "Suunto 9");
}

#[test]
fn test_missing_registry_file_is_an_error() {
    let mut config = AppConfig::default();
    config.devices.registry_path = Some("/nonexistent/devices.toml".into());
    assert!(Importer::from_config(&config).is_err());
}
