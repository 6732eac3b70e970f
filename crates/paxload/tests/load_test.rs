//! Load strategy tests against SQLite files in temporary directories.

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value as SqlValue;
use tempfile::tempdir;

use paxload::config::{Catalog, KindRules, WarehouseConfig};
use paxload::load::{LoadStrategist, SqlType, TableSpec, Warehouse, default_tables};
use paxload::pipeline::{Outcome, OutcomeMap};
use paxload::stage::{AuditStamper, Stage, staged_path};
use paxload::transform::{CleanOptions, TransformChain, change_hash};
use paxload::{LoadMode, PipelineConfig, RecordSet, SourceKind, Value};

fn run_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(6, 30, 0)
        .unwrap()
}

fn catalog() -> Catalog {
    Catalog::default().with_rules(
        SourceKind::Booking,
        KindRules {
            datetime_columns: vec!["extract_dt".to_string()],
            conversions: Default::default(),
            identity_columns: vec!["BookingID".to_string()],
            derivations: Vec::new(),
        },
    )
}

fn booking_table() -> TableSpec {
    TableSpec::new(
        "Booking",
        &[
            ("BookingID", SqlType::Integer),
            ("RecordLocator", SqlType::Text),
            ("TotalCost", SqlType::Real),
            ("extract_dt", SqlType::Timestamp),
            ("source", SqlType::Text),
            ("proc_status", SqlType::Text),
            ("business_key", SqlType::Text),
            ("hash", SqlType::Text),
        ],
        &["BookingID"],
    )
}

fn config(root: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::from_lookup(|key| match key {
        "DESTINATION_PATH" => Some(root.join("extracted").display().to_string()),
        "TRANSFORMED_PATH" => Some(root.join("transformed").display().to_string()),
        "API_URL" => Some("localhost".to_string()),
        "API_PORT" => Some("8000".to_string()),
        "PATH_EXCEL" => Some("segment.xlsx".to_string()),
        "PATH_CSV_LEG" => Some("leg.csv".to_string()),
        "PATH_CSV_CHARGE" => Some("charge.csv".to_string()),
        _ => None,
    })
    .unwrap();
    config.warehouse = WarehouseConfig::new(root.join("warehouse.db"));
    config
}

/// Transform booking rows and stage them as today's `transformed` file.
fn stage_bookings(config: &PipelineConfig, rows: &[(i64, &str, f64)]) {
    let mut data = RecordSet::from_values(
        vec!["BookingID".into(), "RecordLocator".into(), "TotalCost".into()],
        rows.iter()
            .map(|(id, locator, cost)| vec![Value::Int(*id), Value::Text(locator.to_string()), Value::Float(*cost)])
            .collect(),
    );

    let catalog = catalog();
    let report = TransformChain::new(&catalog, CleanOptions::default(), run_at().date())
        .run(SourceKind::Booking, &mut data);
    assert!(!report.has_issues(), "{:?}", report.issues);

    AuditStamper::new(&config.transform_dir)
        .stage(data, "Booking", run_at(), Stage::Transformed)
        .unwrap();
}

fn load(config: &PipelineConfig, table: TableSpec, mode: LoadMode) -> OutcomeMap {
    LoadStrategist::new(config)
        .with_tables(vec![table])
        .load_all(mode, run_at().date())
}

fn rows_loaded(outcomes: &OutcomeMap, table: &str) -> usize {
    match outcomes.get(table) {
        Some(Outcome::Success(summary)) => summary.rows,
        other => panic!("{} did not load: {:?}", table, other),
    }
}

#[test]
fn test_full_load_twice_does_not_duplicate() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    stage_bookings(&config, &[(1, "AAA111", 10.0), (2, "BBB222", 20.0), (3, "CCC333", 30.0)]);

    let first = load(&config, booking_table(), LoadMode::Full);
    let second = load(&config, booking_table(), LoadMode::Full);

    assert_eq!(rows_loaded(&first, "Booking"), 3);
    assert_eq!(rows_loaded(&second, "Booking"), 3);
    let warehouse = Warehouse::open(&config.warehouse).unwrap();
    assert_eq!(warehouse.row_count("Booking").unwrap(), 3);
}

#[test]
fn test_full_load_replaces_previous_contents() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    stage_bookings(&config, &[(1, "AAA111", 10.0), (2, "BBB222", 20.0), (3, "CCC333", 30.0)]);
    load(&config, booking_table(), LoadMode::Full);
    stage_bookings(&config, &[(4, "DDD444", 40.0)]);
    load(&config, booking_table(), LoadMode::Full);

    let warehouse = Warehouse::open(&config.warehouse).unwrap();
    assert_eq!(warehouse.row_count("Booking").unwrap(), 1);
}

#[test]
fn test_incremental_updates_row_in_place() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let hash = change_hash(&[Value::Int(1)]);

    stage_bookings(&config, &[(1, "AAA111", 10.0)]);
    load(&config, booking_table(), LoadMode::Incremental);
    stage_bookings(&config, &[(1, "ZZZ999", 99.5)]);
    let outcomes = load(&config, booking_table(), LoadMode::Incremental);

    assert_eq!(rows_loaded(&outcomes, "Booking"), 1);
    let warehouse = Warehouse::open(&config.warehouse).unwrap();
    assert_eq!(warehouse.row_count("Booking").unwrap(), 1);
    assert_eq!(
        warehouse.lookup("Booking", &hash, "RecordLocator").unwrap(),
        Some(SqlValue::Text("ZZZ999".to_string()))
    );
    assert_eq!(warehouse.lookup("Booking", &hash, "TotalCost").unwrap(), Some(SqlValue::Real(99.5)));
}

#[test]
fn test_incremental_appends_new_identities() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    stage_bookings(&config, &[(1, "AAA111", 10.0)]);
    load(&config, booking_table(), LoadMode::Incremental);
    stage_bookings(&config, &[(1, "AAA111", 10.0), (2, "BBB222", 20.0)]);
    load(&config, booking_table(), LoadMode::Incremental);

    let warehouse = Warehouse::open(&config.warehouse).unwrap();
    assert_eq!(warehouse.row_count("Booking").unwrap(), 2);
}

fn charges_table() -> TableSpec {
    TableSpec::new(
        "Charges",
        &[
            ("PassengerID", SqlType::Integer),
            ("SegmentID", SqlType::Integer),
            ("ChargeNumber", SqlType::Integer),
            ("hash", SqlType::Text),
        ],
        &["PassengerID", "SegmentID", "ChargeNumber"],
    )
}

/// Two charges on one passenger segment share their identity columns.
fn charges_sharing_a_hash() -> RecordSet {
    let hash = Value::Text(change_hash(&[Value::Int(1), Value::Int(10)]));
    RecordSet::from_values(
        vec!["PassengerID".into(), "SegmentID".into(), "ChargeNumber".into(), "hash".into()],
        vec![
            vec![Value::Int(1), Value::Int(10), Value::Int(1), hash.clone()],
            vec![Value::Int(1), Value::Int(10), Value::Int(2), hash],
        ],
    )
}

#[test]
fn test_full_load_keeps_charges_sharing_a_hash() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let mut warehouse = Warehouse::open(&config.warehouse).unwrap();
    warehouse.ensure_table(&charges_table()).unwrap();

    let loaded = warehouse
        .load(&charges_table(), &charges_sharing_a_hash(), LoadMode::Full)
        .unwrap();

    assert_eq!(loaded, 2);
    assert_eq!(warehouse.row_count("Charges").unwrap(), 2);
}

#[test]
fn test_incremental_collapses_charges_sharing_a_hash() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    let mut warehouse = Warehouse::open(&config.warehouse).unwrap();
    warehouse.ensure_table(&charges_table()).unwrap();

    let loaded = warehouse
        .load(&charges_table(), &charges_sharing_a_hash(), LoadMode::Incremental)
        .unwrap();

    assert_eq!(loaded, 2);
    assert_eq!(warehouse.row_count("Charges").unwrap(), 1);
    let hash = change_hash(&[Value::Int(1), Value::Int(10)]);
    assert_eq!(
        warehouse.lookup("Charges", &hash, "ChargeNumber").unwrap(),
        Some(SqlValue::Integer(2))
    );
}

#[test]
fn test_missing_staged_file_fails_only_that_table() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());
    stage_bookings(&config, &[(1, "AAA111", 10.0)]);

    let mut other = booking_table();
    other.name = "BookingArchive".to_string();
    let outcomes = LoadStrategist::new(&config)
        .with_tables(vec![booking_table(), other])
        .load_all(LoadMode::Full, run_at().date());

    assert_eq!(outcomes.success_count(), 1);
    assert!(matches!(
        outcomes.get("BookingArchive"),
        Some(Outcome::Failed { kind, .. }) if kind == "io"
    ));
}

#[test]
fn test_writer_held_past_busy_timeout_does_not_fail_tables() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.warehouse.busy_timeout_ms = 10;
    stage_bookings(&config, &[(1, "AAA111", 10.0), (2, "BBB222", 20.0)]);

    let mut archive = booking_table();
    archive.name = "BookingArchive".to_string();
    let staged = staged_path(&config.transform_dir, "Booking", run_at().date(), Stage::Transformed);
    let archive_path = staged_path(&config.transform_dir, "BookingArchive", run_at().date(), Stage::Transformed);
    fs::copy(&staged, &archive_path).unwrap();

    let strategist = LoadStrategist::new(&config).with_tables(vec![booking_table(), archive]);
    let writer = Mutex::new(Warehouse::open(&config.warehouse).unwrap());

    let outcomes = thread::scope(|scope| {
        let guard = writer.lock().unwrap();
        let loading = scope.spawn(|| strategist.load_with(&writer, LoadMode::Full, run_at().date()));
        thread::sleep(Duration::from_millis(200));
        drop(guard);
        loading.join().unwrap()
    });

    assert!(outcomes.all_succeeded(), "{:?}", outcomes);
    let warehouse = writer.into_inner().unwrap();
    assert_eq!(warehouse.row_count("Booking").unwrap(), 2);
    assert_eq!(warehouse.row_count("BookingArchive").unwrap(), 2);
}

#[test]
fn test_default_tables_can_be_created() {
    let dir = tempdir().unwrap();
    let config = config(dir.path());

    let warehouse = Warehouse::open(&config.warehouse).unwrap();
    warehouse.ensure_tables(&default_tables()).unwrap();
    warehouse.ensure_tables(&default_tables()).unwrap();

    for spec in default_tables() {
        assert_eq!(warehouse.row_count(&spec.name).unwrap(), 0);
    }
}
