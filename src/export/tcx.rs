use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent};
use quick_xml::Writer;

use crate::activity_type::ActivityType;
use crate::error::ExportError;
use crate::measurement::MeasurementKind;
use crate::models::{Activity, Event, Lap, LapType, Point, Stats};

const TCX_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/TrainingCenterDatabase/v2";
const ACTIVITY_EXTENSION_NAMESPACE: &str = "http://www.garmin.com/xmlschemas/ActivityExtension/v2";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub struct TcxExporter;

impl TcxExporter {
    pub fn export_event(event: &Event, path: &Path) -> Result<(), ExportError> {
        let xml = Self::generate_tcx_xml(event)?;
        fs::write(path, &xml)?;
        tracing::info!(
            activities = event.activities.len(),
            bytes = xml.len(),
            path = %path.display(),
            "Exported TCX"
        );
        Ok(())
    }

    pub fn generate_tcx_xml(event: &Event) -> Result<String, ExportError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer.write_event(XmlEvent::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(XmlEvent::Text(BytesText::new("\n")))?;

        let mut root = BytesStart::new("TrainingCenterDatabase");
        root.push_attribute(("xmlns", TCX_NAMESPACE));
        root.push_attribute(("xmlns:ns3", ACTIVITY_EXTENSION_NAMESPACE));
        root.push_attribute(("xmlns:xsi", XSI_NAMESPACE));
        writer.write_event(XmlEvent::Start(root))?;

        writer.write_event(XmlEvent::Start(BytesStart::new("Activities")))?;
        for activity in &event.activities {
            Self::write_activity(&mut writer, activity)?;
        }
        writer.write_event(XmlEvent::End(BytesEnd::new("Activities")))?;

        writer.write_event(XmlEvent::End(BytesEnd::new("TrainingCenterDatabase")))?;

        let bytes = writer.into_inner();
        String::from_utf8(bytes).map_err(|err| ExportError::Serialization(err.to_string()))
    }

    fn write_activity<W: Write>(
        writer: &mut Writer<W>,
        activity: &Activity,
    ) -> Result<(), ExportError> {
        let mut element = BytesStart::new("Activity");
        element.push_attribute(("Sport", activity.activity_type.tcx_sport()));
        writer.write_event(XmlEvent::Start(element))?;

        Self::write_text_element(writer, "Id", &format_time(activity.start))?;

        let mut carried = None;
        if activity.laps().is_empty() {
            // One lap spanning the whole activity
            let mut lap = Lap::new(activity.start, activity.end, LapType::Manual);
            lap.stats = activity.stats.clone();
            Self::write_lap(writer, activity, &lap, true, &mut carried)?;
        } else {
            let last = activity.laps().len() - 1;
            for (index, lap) in activity.laps().iter().enumerate() {
                Self::write_lap(writer, activity, lap, index == last, &mut carried)?;
            }
        }
        if let Some(pending) = carried {
            tracing::debug!(
                time = %pending.time(),
                "Trailing readings without a position are not exported"
            );
        }

        Self::write_creator(writer, activity)?;

        writer.write_event(XmlEvent::End(BytesEnd::new("Activity")))?;
        Ok(())
    }

    fn write_lap<W: Write>(
        writer: &mut Writer<W>,
        activity: &Activity,
        lap: &Lap,
        is_last: bool,
        carried: &mut Option<Point>,
    ) -> Result<(), ExportError> {
        let duration = required(&lap.stats, MeasurementKind::Duration, "Lap Duration")?;
        let distance = required(&lap.stats, MeasurementKind::Distance, "Lap Distance")?;

        let mut element = BytesStart::new("Lap");
        element.push_attribute(("StartTime", format_time(lap.start).as_str()));
        writer.write_event(XmlEvent::Start(element))?;

        Self::write_text_element(writer, "TotalTimeSeconds", &duration.to_string())?;
        Self::write_text_element(writer, "DistanceMeters", &distance.to_string())?;

        if let Some(max_speed) = lap.stats.value(MeasurementKind::MaxSpeed) {
            Self::write_text_element(writer, "MaximumSpeed", &max_speed.to_string())?;
        }
        if let Some(energy) = lap.stats.value(MeasurementKind::Energy) {
            Self::write_text_element(writer, "Calories", &(energy.round() as i64).to_string())?;
        }
        if let Some(avg_hr) = lap.stats.value(MeasurementKind::AvgHeartRate) {
            Self::write_value_element(writer, "AverageHeartRateBpm", avg_hr.round())?;
        }
        if let Some(max_hr) = lap.stats.value(MeasurementKind::MaxHeartRate) {
            Self::write_value_element(writer, "MaximumHeartRateBpm", max_hr.round())?;
        }

        Self::write_text_element(writer, "Intensity", "Active")?;

        if let Some(cadence) = lap.stats.value(MeasurementKind::AvgCadence) {
            if !is_running(activity.activity_type) {
                Self::write_text_element(writer, "Cadence", &(cadence.round() as i64).to_string())?;
            }
        }

        Self::write_text_element(writer, "TriggerMethod", trigger_method(lap.lap_type))?;

        writer.write_event(XmlEvent::Start(BytesStart::new("Track")))?;
        for point in track_points(activity, lap, is_last, carried) {
            Self::write_trackpoint(writer, activity, &point)?;
        }
        writer.write_event(XmlEvent::End(BytesEnd::new("Track")))?;

        writer.write_event(XmlEvent::End(BytesEnd::new("Lap")))?;
        Ok(())
    }

    fn write_trackpoint<W: Write>(
        writer: &mut Writer<W>,
        activity: &Activity,
        point: &Point,
    ) -> Result<(), ExportError> {
        writer.write_event(XmlEvent::Start(BytesStart::new("Trackpoint")))?;
        Self::write_text_element(writer, "Time", &format_time(point.time()))?;

        if let Some(position) = point.position() {
            writer.write_event(XmlEvent::Start(BytesStart::new("Position")))?;
            Self::write_text_element(writer, "LatitudeDegrees", &position.latitude.to_string())?;
            Self::write_text_element(writer, "LongitudeDegrees", &position.longitude.to_string())?;
            writer.write_event(XmlEvent::End(BytesEnd::new("Position")))?;
        }

        let altitude = point
            .value(MeasurementKind::Altitude)
            .or_else(|| point.value(MeasurementKind::GpsAltitude));
        if let Some(altitude) = altitude {
            Self::write_text_element(writer, "AltitudeMeters", &altitude.to_string())?;
        }
        if let Some(distance) = point.value(MeasurementKind::Distance) {
            Self::write_text_element(writer, "DistanceMeters", &distance.to_string())?;
        }
        if let Some(hr) = point.value(MeasurementKind::HeartRate) {
            Self::write_value_element(writer, "HeartRateBpm", hr.round())?;
        }

        let running = is_running(activity.activity_type);
        let cadence = point.value(MeasurementKind::Cadence);
        if let Some(cadence) = cadence.filter(|_| !running) {
            Self::write_text_element(writer, "Cadence", &(cadence.round() as i64).to_string())?;
        }

        let speed = point.value(MeasurementKind::Speed);
        let power = point.value(MeasurementKind::Power);
        let run_cadence = cadence.filter(|_| running);
        if speed.is_some() || power.is_some() || run_cadence.is_some() {
            writer.write_event(XmlEvent::Start(BytesStart::new("Extensions")))?;
            writer.write_event(XmlEvent::Start(BytesStart::new("ns3:TPX")))?;
            if let Some(speed) = speed {
                Self::write_text_element(writer, "ns3:Speed", &speed.to_string())?;
            }
            if let Some(cadence) = run_cadence {
                Self::write_text_element(
                    writer,
                    "ns3:RunCadence",
                    &(cadence.round() as i64).to_string(),
                )?;
            }
            if let Some(power) = power {
                Self::write_text_element(writer, "ns3:Watts", &(power.round() as i64).to_string())?;
            }
            writer.write_event(XmlEvent::End(BytesEnd::new("ns3:TPX")))?;
            writer.write_event(XmlEvent::End(BytesEnd::new("Extensions")))?;
        }

        writer.write_event(XmlEvent::End(BytesEnd::new("Trackpoint")))?;
        Ok(())
    }

    fn write_creator<W: Write>(
        writer: &mut Writer<W>,
        activity: &Activity,
    ) -> Result<(), ExportError> {
        let mut element = BytesStart::new("Creator");
        element.push_attribute(("xsi:type", "Device_t"));
        writer.write_event(XmlEvent::Start(element))?;

        let name = if activity.creator.name.is_empty() {
            "Unknown"
        } else {
            activity.creator.name.as_str()
        };
        Self::write_text_element(writer, "Name", name)?;
        let unit_id = activity
            .creator
            .serial_number
            .as_deref()
            .and_then(|serial| serial.parse::<u64>().ok())
            .unwrap_or(0);
        Self::write_text_element(writer, "UnitId", &unit_id.to_string())?;
        Self::write_text_element(writer, "ProductID", "0")?;

        let (major, minor) = split_version(activity.creator.sw_info.as_deref());
        writer.write_event(XmlEvent::Start(BytesStart::new("Version")))?;
        Self::write_text_element(writer, "VersionMajor", &major.to_string())?;
        Self::write_text_element(writer, "VersionMinor", &minor.to_string())?;
        writer.write_event(XmlEvent::End(BytesEnd::new("Version")))?;

        writer.write_event(XmlEvent::End(BytesEnd::new("Creator")))?;
        Ok(())
    }

    fn write_value_element<W: Write>(
        writer: &mut Writer<W>,
        name: &str,
        value: f64,
    ) -> Result<(), ExportError> {
        writer.write_event(XmlEvent::Start(BytesStart::new(name)))?;
        Self::write_text_element(writer, "Value", &(value as i64).to_string())?;
        writer.write_event(XmlEvent::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn write_text_element<W: Write>(
        writer: &mut Writer<W>,
        name: &str,
        value: &str,
    ) -> Result<(), ExportError> {
        writer.write_event(XmlEvent::Start(BytesStart::new(name)))?;
        writer.write_event(XmlEvent::Text(BytesText::new(value)))?;
        writer.write_event(XmlEvent::End(BytesEnd::new(name)))?;
        Ok(())
    }
}

/// Position-bearing points of a lap on the 1-second grid.
///
/// Laps are half-open except the last one. Points without a position hand
/// their measurements to the next point that has one, filling only kinds that
/// point lacks. `carried` holds those readings between laps.
fn track_points(
    activity: &Activity,
    lap: &Lap,
    is_last: bool,
    carried: &mut Option<Point>,
) -> Vec<Point> {
    let mut points = Vec::new();

    for mut point in activity.get_points_interpolated(Some(lap.start), Some(lap.end)) {
        if !is_last && point.time() >= lap.end {
            continue;
        }

        if point.has_position() {
            if let Some(pending) = carried.take() {
                point.fill_missing_from(&pending);
            }
            points.push(point);
        } else {
            if let Some(pending) = carried.as_ref() {
                point.fill_missing_from(pending);
            }
            *carried = Some(point);
        }
    }

    points
}

fn required(stats: &Stats, kind: MeasurementKind, field: &str) -> Result<f64, ExportError> {
    stats.value(kind).ok_or_else(|| ExportError::MissingData {
        field: field.to_string(),
    })
}

fn trigger_method(lap_type: LapType) -> &'static str {
    match lap_type {
        LapType::Distance => "Distance",
        LapType::Location => "Location",
        LapType::Time => "Time",
        LapType::HeartRate => "HeartRate",
        _ => "Manual",
    }
}

fn is_running(activity_type: ActivityType) -> bool {
    activity_type.tcx_sport() == "Running"
}

fn split_version(version: Option<&str>) -> (u32, u32) {
    let mut parts = version
        .unwrap_or_default()
        .split('.')
        .map(|part| part.trim().parse::<u32>().unwrap_or(0));
    let major = parts.next().unwrap_or(0);
    let minor = parts.next().unwrap_or(0);
    (major, minor)
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
