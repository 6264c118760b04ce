mod common;

use common::WpilogBuilder;
use robolog::export::{generate_wpilog, select_fields};
use robolog::reader::decode_wpilog;
use robolog::{Error, LogStore, LogValue, LoggableType, WpilogReader, WpilogReaderBuilder};
use std::io::Write;
use tempfile::NamedTempFile;

fn values(log: &LogStore, key: &str) -> Vec<(f64, LogValue)> {
    let field = log.get_field(key).unwrap();
    field
        .timestamps()
        .iter()
        .copied()
        .zip(field.values().iter().cloned())
        .collect()
}

#[test]
fn test_decode_every_type_tag() {
    let data = WpilogBuilder::new()
        .start_record(0, 1, "/bool", "boolean", "")
        .start_record(0, 2, "/int", "int64", "")
        .start_record(0, 3, "/float", "float", "")
        .start_record(0, 4, "/double", "double", "")
        .start_record(0, 5, "/string", "string", "")
        .start_record(0, 6, "/json", "json", "")
        .start_record(0, 7, "/bools", "boolean[]", "")
        .start_record(0, 8, "/ints", "int64[]", "")
        .start_record(0, 9, "/floats", "float[]", "")
        .start_record(0, 10, "/doubles", "double[]", "")
        .start_record(0, 11, "/strings", "string[]", "")
        .start_record(0, 12, "/struct", "struct:Pose2d", "")
        .boolean_record(1, 1_000_000, true)
        .int64_record(2, 1_000_000, -3)
        .float_record(3, 1_000_000, 0.5)
        .double_record(4, 1_000_000, 2.25)
        .string_record(5, 1_000_000, "hi")
        .string_record(6, 1_000_000, r#"{"a":1}"#)
        .boolean_array_record(7, 1_000_000, &[false, true])
        .int64_array_record(8, 1_000_000, &[4, 5])
        .float_array_record(9, 1_000_000, &[1.5])
        .double_array_record(10, 1_000_000, &[0.25, 0.75])
        .string_array_record(11, 1_000_000, &["x", "y"])
        .raw_record(12, 1_000_000, &[9, 8])
        .build();

    let log = decode_wpilog(&data).unwrap();
    let first = |key: &str| values(&log, key)[0].clone();

    assert_eq!(first("/bool"), (1.0, LogValue::Boolean(true)));
    assert_eq!(first("/int"), (1.0, LogValue::Number(-3.0)));
    assert_eq!(first("/float"), (1.0, LogValue::Number(0.5)));
    assert_eq!(first("/double"), (1.0, LogValue::Number(2.25)));
    assert_eq!(first("/string"), (1.0, LogValue::String("hi".to_string())));
    assert_eq!(first("/json"), (1.0, LogValue::String(r#"{"a":1}"#.to_string())));
    assert_eq!(first("/bools"), (1.0, LogValue::BooleanArray(vec![false, true])));
    assert_eq!(first("/ints"), (1.0, LogValue::NumberArray(vec![4.0, 5.0])));
    assert_eq!(first("/floats"), (1.0, LogValue::NumberArray(vec![1.5])));
    assert_eq!(first("/doubles"), (1.0, LogValue::NumberArray(vec![0.25, 0.75])));
    assert_eq!(
        first("/strings"),
        (1.0, LogValue::StringArray(vec!["x".to_string(), "y".to_string()]))
    );
    assert_eq!(first("/struct"), (1.0, LogValue::Raw(vec![9, 8])));
    assert_eq!(log.get_type("/strings/1"), Some(LoggableType::String));
}

#[test]
fn test_start_creates_empty_field() {
    let data = WpilogBuilder::new()
        .start_record(0, 1, "/never/written", "double", "")
        .build();
    let log = decode_wpilog(&data).unwrap();
    assert_eq!(log.get_type("/never/written"), Some(LoggableType::Number));
    assert!(log.get_field("/never/written").unwrap().is_empty());
    assert_eq!(log.get_timestamp_range(), (0.0, 10.0));
}

#[test]
fn test_finish_unbinds_entry() {
    let data = WpilogBuilder::new()
        .start_record(0, 1, "/a", "double", "")
        .double_record(1, 1_000_000, 1.0)
        .finish_record(1_500_000, 1)
        .double_record(1, 2_000_000, 2.0)
        .start_record(2_500_000, 1, "/b", "string", "")
        .string_record(1, 3_000_000, "b")
        .build();

    let log = decode_wpilog(&data).unwrap();
    assert_eq!(values(&log, "/a"), vec![(1.0, LogValue::Number(1.0))]);
    assert_eq!(values(&log, "/b"), vec![(3.0, LogValue::String("b".to_string()))]);
}

#[test]
fn test_unknown_entry_and_metadata_update() {
    let data = WpilogBuilder::new()
        .start_record(0, 1, "/a", "int64", r#"{"v":1}"#)
        .set_metadata_record(100, 1, r#"{"v":2}"#)
        .int64_record(2, 200, 7)
        .int64_record(1, 300, 8)
        .build();

    let log = decode_wpilog(&data).unwrap();
    assert_eq!(log.get_field_keys(), vec!["/a".to_string()]);
    assert_eq!(values(&log, "/a"), vec![(0.0003, LogValue::Number(8.0))]);
}

#[test]
fn test_malformed_payload_is_parse_error() {
    let data = WpilogBuilder::new()
        .start_record(0, 1, "/a", "double", "")
        .raw_record(1, 10, &[1, 2, 3])
        .build();
    assert!(matches!(decode_wpilog(&data), Err(Error::ParseError(_))));
}

#[test]
fn test_invalid_utf8_string_is_replaced() {
    let data = WpilogBuilder::new()
        .start_record(0, 1, "/text", "string", "")
        .raw_record(1, 1_000_000, &[0xC3, 0x28])
        .string_record(1, 2_000_000, "ok")
        .build();

    let log = decode_wpilog(&data).unwrap();
    assert_eq!(
        values(&log, "/text"),
        vec![
            (1.0, LogValue::String("\u{FFFD}(".to_string())),
            (2.0, LogValue::String("ok".to_string())),
        ]
    );
}

#[test]
fn test_header_errors() {
    assert!(matches!(
        decode_wpilog(b"not a log at all"),
        Err(Error::InvalidFormat(_))
    ));

    let data = WpilogBuilder::with_header(0x0200, "").build();
    assert!(matches!(
        decode_wpilog(&data),
        Err(Error::UnsupportedVersion(_))
    ));
}

#[test]
fn test_read_from_file() {
    let data = WpilogBuilder::with_header(0x0100, "practice")
        .start_record(0, 1, "/x", "double", "")
        .double_record(1, 20_000, 1.0)
        .build();

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();

    let reader = WpilogReader::from_file(file.path()).unwrap();
    assert_eq!(reader.version(), 0x0100);
    assert_eq!(reader.extra_header(), "practice");
    assert_eq!(reader.low_level_reader().records().unwrap().count(), 2);

    let log = reader.read_log().unwrap();
    assert_eq!(values(&log, "/x"), vec![(0.02, LogValue::Number(1.0))]);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.wpilog");
    assert!(matches!(
        WpilogReader::from_file(&path),
        Err(Error::FileNotFound(p)) if p == path
    ));
}

#[test]
fn test_empty_file_is_invalid() {
    let file = NamedTempFile::new().unwrap();
    assert!(matches!(
        WpilogReader::from_file(file.path()),
        Err(Error::InvalidFormat(_))
    ));
}

#[test]
fn test_schema_decoding_can_be_disabled() {
    let mut result = Vec::new();
    result.extend_from_slice(&0.5f64.to_be_bytes());
    result.push(0);

    let data = WpilogBuilder::new()
        .start_record(0, 1, "/photon", "rawBytes", "")
        .raw_record(1, 2_000_000, &result)
        .build();

    let log = decode_wpilog(&data).unwrap();
    assert_eq!(
        values(&log, "/photon/timestamp"),
        vec![(2.0, LogValue::Number(1.5))]
    );

    let plain = WpilogReaderBuilder::new()
        .decode_schemas(false)
        .from_bytes(data)
        .unwrap()
        .read_log()
        .unwrap();
    assert_eq!(plain.get_field_keys(), vec!["/photon".to_string()]);
}

#[test]
fn test_export_then_decode_round_trip() {
    let mut log = LogStore::new();
    log.put_raw("/raw", 0.5, vec![0, 255]);
    log.put_boolean("/flag", 0.25, true);
    log.put_boolean("/flag", 0.75, false);
    log.put_number("/value", 1.0, -2.5);
    log.put_string("/text", 1.25, "hello");
    log.put_boolean_array("/bools", 1.5, vec![true]);
    log.put_number_array("/numbers", 1.5, vec![1.0, 2.0]);
    log.put_string_array("/strings", 2.0, vec!["a".to_string()]);

    let fields = select_fields(&log, "", false);
    let bytes = generate_wpilog(&log, &fields, "robolog");

    let reader = WpilogReader::from_bytes(bytes).unwrap();
    assert_eq!(reader.extra_header(), "robolog");
    let decoded = reader.read_log().unwrap();

    for key in &fields {
        assert_eq!(
            decoded.get_field(key),
            log.get_field(key),
            "field {} differs",
            key
        );
    }
    assert_eq!(decoded.get_array_length("/numbers"), Some(2));
}
