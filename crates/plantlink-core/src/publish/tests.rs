use super::*;
use crate::{
    config::DEFAULT_STRIP_ON_COLOR,
    frame::RawFrame,
    validate::Rejection,
};

#[derive(Default)]
struct RecordingKv {
    writes: std::vec::Vec<(std::string::String, KvValue)>,
    failing_suffix: Option<&'static str>,
    services: u32,
}

impl KeyValueSink for RecordingKv {
    fn set(&mut self, path: &str, value: KvValue) -> Result<(), SinkError> {
        if let Some(suffix) = self.failing_suffix {
            if path.ends_with(suffix) {
                return Err(SinkError::new(-3, "connection refused"));
            }
        }
        self.writes.push((path.to_string(), value));
        Ok(())
    }

    fn service(&mut self) {
        self.services += 1;
    }
}

impl RecordingKv {
    fn value_at(&self, path: &str) -> Option<KvValue> {
        self.writes
            .iter()
            .find(|(written, _)| written == path)
            .map(|(_, value)| *value)
    }

    fn paths(&self) -> std::vec::Vec<&str> {
        self.writes.iter().map(|(path, _)| path.as_str()).collect()
    }
}

#[derive(Default)]
struct RecordingSheet {
    appends: std::vec::Vec<(std::string::String, SheetRow)>,
    fail: bool,
}

impl SheetSink for RecordingSheet {
    fn append(&mut self, range: &str, row: &SheetRow) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::new(403, "PERMISSION_DENIED"));
        }
        self.appends.push((range.to_string(), row.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingDisplay {
    rows: [std::string::String; 2],
    clears: u32,
    broken: bool,
}

impl TextDisplay for RecordingDisplay {
    type Error = &'static str;

    fn clear(&mut self) -> Result<(), Self::Error> {
        if self.broken {
            return Err("nack");
        }
        self.clears += 1;
        self.rows = Default::default();
        Ok(())
    }

    fn write_line(&mut self, row: u8, text: &str) -> Result<(), Self::Error> {
        if self.broken {
            return Err("nack");
        }
        self.rows[usize::from(row)] = text.to_string();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingStrip {
    pending: Option<Rgb>,
    shown: std::vec::Vec<Rgb>,
}

impl IndicatorStrip for RecordingStrip {
    type Error = core::convert::Infallible;

    fn fill(&mut self, color: Rgb) {
        self.pending = Some(color);
    }

    fn show(&mut self) -> Result<(), Self::Error> {
        if let Some(color) = self.pending.take() {
            self.shown.push(color);
        }
        Ok(())
    }
}

#[derive(Default)]
struct RecordingObserver {
    errors: std::vec::Vec<(std::string::String, std::string::String, i32)>,
}

impl TelemetryObserver for RecordingObserver {
    fn on_error(&mut self, task: &str, message: &str, code: i32) {
        self.errors
            .push((task.to_string(), message.to_string(), code));
    }
}

type TestPublisher =
    Publisher<RecordingKv, RecordingSheet, RecordingDisplay, RecordingStrip, RecordingObserver>;

fn publisher() -> TestPublisher {
    Publisher::new(
        RecordingKv::default(),
        RecordingSheet::default(),
        RecordingDisplay::default(),
        RecordingStrip::default(),
        RecordingObserver::default(),
        GatewayConfig::default(),
    )
}

fn frame(soil: &str, light: &str, pump: &str) -> ValidatedFrame {
    let mut raw = RawFrame::default();
    raw.soil.push_str(soil).unwrap();
    raw.light.push_str(light).unwrap();
    raw.pump.push_str(pump).unwrap();
    ValidatedFrame::from_raw(&raw)
}

fn int_cells(row: &SheetRow) -> std::vec::Vec<Option<i64>> {
    row.columns()
        .iter()
        .map(|cell| match cell {
            Some(CellValue::Int(value)) => Some(*value),
            Some(CellValue::Number { .. }) => panic!("unexpected float cell"),
            None => None,
        })
        .collect()
}

const EPOCH: u64 = 1_700_000_000;

#[test]
fn full_frame_reaches_both_sinks() {
    let mut publisher = publisher();
    publisher.publish_frame(EPOCH, &frame("80", "200", "1"));

    let kv = publisher.kv();
    assert_eq!(
        kv.paths(),
        [
            "/ESP32-Gateway1/plant1/soil_moisture",
            "/ESP32-Gateway1/plant1/timestamp",
            "/ESP32-Gateway1/plant1/light",
            "/ESP32-Gateway1/plant1/pump",
        ]
    );
    assert_eq!(
        kv.value_at("/ESP32-Gateway1/plant1/soil_moisture"),
        Some(KvValue::Int(20))
    );
    assert_eq!(
        kv.value_at("/ESP32-Gateway1/plant1/timestamp"),
        Some(KvValue::ServerTimestamp)
    );
    assert_eq!(
        kv.value_at("/ESP32-Gateway1/plant1/light"),
        Some(KvValue::Int(800))
    );
    assert_eq!(
        kv.value_at("/ESP32-Gateway1/plant1/pump"),
        Some(KvValue::Bool(true))
    );

    let (range, row) = &publisher.sheet().appends[0];
    assert_eq!(range, "plant1!A2");
    assert_eq!(
        int_cells(row),
        [Some(EPOCH as i64), Some(20), Some(800), Some(1)]
    );

    assert_eq!(publisher.display().rows[1], "soil:20 LDR:800");
    assert_eq!(publisher.strip().shown, [Rgb::OFF]);
}

#[test]
fn rejected_soil_is_absent_from_both_sinks() {
    let mut publisher = publisher();
    publisher.publish_frame(EPOCH, &frame("", "300", "0"));

    let kv = publisher.kv();
    assert_eq!(
        kv.paths(),
        ["/ESP32-Gateway1/plant1/light", "/ESP32-Gateway1/plant1/pump"]
    );
    assert_eq!(
        kv.value_at("/ESP32-Gateway1/plant1/pump"),
        Some(KvValue::Bool(false))
    );

    let (_, row) = &publisher.sheet().appends[0];
    assert_eq!(int_cells(row), [Some(EPOCH as i64), None, Some(700), Some(0)]);
    assert_eq!(publisher.display().rows[1], "soil:-- LDR:700");
    assert_eq!(publisher.strip().shown, [Rgb::OFF]);
}

#[test]
fn dim_light_turns_the_strip_on() {
    let mut publisher = publisher();
    publisher.publish_frame(EPOCH, &frame("40", "550", "0"));

    assert_eq!(publisher.strip().shown, [DEFAULT_STRIP_ON_COLOR]);
}

#[test]
fn threshold_is_exclusive() {
    let config = GatewayConfig::default();
    assert_eq!(strip_color(&config, 499), DEFAULT_STRIP_ON_COLOR);
    assert_eq!(strip_color(&config, 500), Rgb::OFF);
    assert_eq!(strip_color(&config, -20), DEFAULT_STRIP_ON_COLOR);

    let custom = config
        .with_light_threshold(100)
        .with_strip_on_color(Rgb::new(255, 0, 0));
    assert_eq!(strip_color(&custom, 99), Rgb::new(255, 0, 0));
    assert_eq!(strip_color(&custom, 450), Rgb::OFF);
}

#[test]
fn rejected_light_leaves_the_strip_alone() {
    let mut publisher = publisher();
    publisher.publish_frame(EPOCH, &frame("80", "-5", "1"));

    assert!(publisher.strip().shown.is_empty());
    assert_eq!(publisher.kv().value_at("/ESP32-Gateway1/plant1/light"), None);
}

#[test]
fn all_rejected_frame_sends_nothing() {
    let mut publisher = publisher();
    let rejected = frame("abc", "0", "-1");
    assert_eq!(rejected.soil, ValidatedReading::Rejected(Rejection::NotNumeric));
    assert_eq!(rejected.light, ValidatedReading::Rejected(Rejection::NonPositive));
    assert_eq!(rejected.pump, ValidatedReading::Rejected(Rejection::Negative));

    publisher.publish_frame(EPOCH, &rejected);

    assert!(publisher.kv().writes.is_empty());
    assert!(publisher.sheet().appends.is_empty());
    assert_eq!(publisher.display().rows[1], "soil:-- LDR:--");
}

#[test]
fn ambient_values_go_to_the_device_root() {
    let mut publisher = publisher();
    let ambient = AmbientReading::new(24.567, 61.0);
    publisher.begin_cycle(&ambient);
    publisher.publish_ambient(EPOCH, &ambient);

    let kv = publisher.kv();
    assert_eq!(
        kv.value_at("/ESP32-Gateway1/timestamp"),
        Some(KvValue::ServerTimestamp)
    );
    assert_eq!(
        kv.value_at("/ESP32-Gateway1/temperature"),
        Some(KvValue::Number {
            value: 24.567,
            decimals: 2
        })
    );
    assert_eq!(
        kv.value_at("/ESP32-Gateway1/humidity"),
        Some(KvValue::Number {
            value: 61.0,
            decimals: 2
        })
    );

    let (range, row) = &publisher.sheet().appends[0];
    assert_eq!(range, "ESP32-Gateway1!A2");
    assert_eq!(row.filled(), 3);
    assert_eq!(publisher.display().rows[0], "Temp:24 Humi:61");
    assert_eq!(publisher.display().clears, 1);
}

#[test]
fn failed_ambient_read_still_appends_a_timestamp_row() {
    let mut publisher = publisher();
    let ambient = AmbientReading::failed();
    publisher.begin_cycle(&ambient);
    publisher.publish_ambient(EPOCH, &ambient);

    assert_eq!(publisher.kv().paths(), ["/ESP32-Gateway1/timestamp"]);
    let (_, row) = &publisher.sheet().appends[0];
    assert_eq!(row.columns().len(), 3);
    assert_eq!(row.filled(), 1);
    assert_eq!(publisher.display().rows[0], "Temp:-- Humi:--");
}

#[test]
fn display_truncates_toward_zero() {
    assert_eq!(
        ambient_line(&AmbientReading::new(-3.9, 99.99)).as_str(),
        "Temp:-3 Humi:99"
    );
}

#[test]
fn extreme_readings_fit_the_display_line() {
    assert_eq!(
        frame_line(&frame("2147483647", "2147483647", "0")).as_str(),
        "soil:-2147483547 LDR:-2147482647"
    );
    assert_eq!(
        ambient_line(&AmbientReading::new(-1.0e12, 1.0e12)).as_str(),
        "Temp:-2147483648 Humi:2147483647"
    );
}

#[test]
fn sink_failure_does_not_stop_other_writes() {
    let mut publisher = publisher();
    publisher.kv.failing_suffix = Some("/light");
    publisher.sheet.fail = true;

    publisher.publish_frame(EPOCH, &frame("80", "200", "1"));

    assert_eq!(
        publisher.kv().paths(),
        [
            "/ESP32-Gateway1/plant1/soil_moisture",
            "/ESP32-Gateway1/plant1/timestamp",
            "/ESP32-Gateway1/plant1/pump",
        ]
    );
    assert_eq!(
        publisher.observer().errors,
        [
            ("rtdb".to_string(), "connection refused".to_string(), -3),
            ("sheets".to_string(), "PERMISSION_DENIED".to_string(), 403),
        ]
    );
    assert_eq!(publisher.display().rows[1], "soil:20 LDR:800");
}

#[test]
fn broken_display_does_not_block_publishing() {
    let mut publisher = publisher();
    publisher.display.broken = true;

    let ambient = AmbientReading::new(20.0, 40.0);
    publisher.begin_cycle(&ambient);
    publisher.publish_frame(EPOCH, &frame("80", "200", "1"));
    publisher.publish_ambient(EPOCH, &ambient);

    assert_eq!(publisher.sheet().appends.len(), 2);
    assert!(publisher.display_fault_logged);
}

#[test]
fn identical_frames_produce_identical_batches() {
    let config = GatewayConfig::default();
    let reading = frame("80", "200", "1");
    assert_eq!(
        PublishBatch::for_frame(&config, EPOCH, &reading),
        PublishBatch::for_frame(&config, EPOCH, &reading)
    );

    let mut publisher = publisher();
    publisher.publish_frame(EPOCH, &reading);
    publisher.publish_frame(EPOCH, &reading);
    let appends = &publisher.sheet().appends;
    assert_eq!(appends.len(), 2);
    assert_eq!(appends[0], appends[1]);
}

#[test]
fn custom_names_shape_paths_and_ranges() {
    let config = GatewayConfig::default()
        .with_device_root("greenhouse")
        .with_plant("basil");
    let batch = PublishBatch::for_frame(&config, 5, &frame("10", "10", "0"));

    assert_eq!(batch.writes()[0].0.as_str(), "/greenhouse/basil/soil_moisture");
    assert_eq!(batch.range(), "basil!A2");
    assert_eq!(batch.epoch_secs(), 5);
}

#[test]
fn service_reaches_the_kv_sink() {
    let mut publisher = publisher();
    publisher.service();
    publisher.service();
    assert_eq!(publisher.kv().services, 2);
}
