//! End-to-end tests: extract, transform and load over temporary directories.

use std::fs;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use tempfile::{TempDir, tempdir};

use paxload::config::{FetchConfig, SourceDescriptor, SourceLocation, WarehouseConfig};
use paxload::input::{DelimitedReader, JsonRecord, MockFetcher, STAGED_DELIMITER};
use paxload::load::{LoadStrategist, SqlType, TableSpec, Warehouse};
use paxload::stage::{Stage, staged_path};
use paxload::transform::{CleanOptions, change_hash};
use paxload::{LoadMode, Outcome, Paxload, PipelineConfig, RunStage, SourceKind, Value};

fn run_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(6, 30, 0)
        .unwrap()
}

fn record(value: serde_json::Value) -> JsonRecord {
    value.as_object().cloned().expect("fixture is an object")
}

fn booking_records() -> Vec<JsonRecord> {
    (1..=3)
        .map(|id| {
            record(json!({
                "BookingID": id,
                "BookingParentID": 0,
                "Status": 2,
                "RecordLocator": format!("LOC{}", id),
                "CreatedDate": "2024-02-01 08:00:00",
                "ModifiedDate": "2024-02-01 09:30:00",
            }))
        })
        .collect()
}

/// Five sources in a temporary workspace; the passenger API is down.
fn workspace() -> (TempDir, PipelineConfig) {
    let dir = tempdir().expect("Failed to create temp dir");
    let root = dir.path();

    fs::write(
        root.join("segment.tsv"),
        "PassengerID\tSegmentID\tChannelType\tCreatedDate\tModifiedDate\n\
         1\t10\t2\t2024-02-01 08:00:00\t2024-02-01 08:00:00\n\
         2\t20\t3\t2024-02-01 08:00:00\t2024-02-02 08:00:00\n",
    )
    .unwrap();
    fs::write(
        root.join("leg.csv"),
        "PassengerID;SegmentID;LegNumber;InventoryLegID;CreatedDate;ModifiedDate\n\
         1;10;1;500;2024-02-01 08:00:00;2024-02-01 10:00:00\n\
         2;20;1;501;2024-02-01 08:00:00;\n",
    )
    .unwrap();
    fs::write(
        root.join("charge.csv"),
        "PassengerID,SegmentID,ChargeNumber,ChargeAmount,CurrencyCode,ForeignAmount,ForeignCurrencyCode,CreatedDate\n\
         1,10,1,12.5,EUR,100,GBP,2024-02-01 08:00:00\n\
         2,20,1,0,EUR,40,EUR,2024-02-01 08:00:00\n",
    )
    .unwrap();

    let sources = vec![
        SourceDescriptor::new(
            SourceKind::Booking,
            SourceLocation::Api {
                endpoint: "booking/new".to_string(),
                columns: Vec::new(),
            },
        ),
        SourceDescriptor::new(
            SourceKind::BookingPassenger,
            SourceLocation::Api {
                endpoint: "booking/passenger/new".to_string(),
                columns: Vec::new(),
            },
        ),
        SourceDescriptor::new(
            SourceKind::JourneySegment,
            SourceLocation::Spreadsheet {
                path: root.join("segment.tsv"),
            },
        ),
        SourceDescriptor::new(
            SourceKind::JourneyLeg,
            SourceLocation::Delimited {
                path: root.join("leg.csv"),
                delimiter: Some(b';'),
            },
        ),
        SourceDescriptor::new(
            SourceKind::JourneyCharge,
            SourceLocation::Delimited {
                path: root.join("charge.csv"),
                delimiter: Some(b','),
            },
        ),
    ];

    let mut fetch = FetchConfig::new("http://localhost:0");
    fetch.page_size = 2;
    fetch.page_delay_ms = 0;

    let config = PipelineConfig {
        extract_dir: root.join("extracted"),
        transform_dir: root.join("transformed"),
        sources,
        fetch,
        warehouse: WarehouseConfig::new(root.join("db").join("warehouse.db")),
        clean: CleanOptions::default(),
    };
    (dir, config)
}

fn mock_fetcher() -> MockFetcher {
    MockFetcher::new()
        .with_records("booking/new", booking_records())
        .with_failure("booking/passenger/new")
}

fn read_staged(dir: &Path, source: &str, stage: Stage) -> paxload::RecordSet {
    let path = staged_path(dir, source, run_at().date(), stage);
    DelimitedReader::with_delimiter(STAGED_DELIMITER)
        .read_file(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e))
}

/// Destination layouts matching the fixture columns.
fn fixture_tables() -> Vec<TableSpec> {
    use SqlType::*;

    let audit = [
        ("extract_dt", Timestamp),
        ("source", Text),
        ("proc_status", Text),
    ];
    let keys = [("business_key", Text), ("hash", Text)];
    let table = |name: &str, source: &[(&str, SqlType)], derived: &[(&str, SqlType)], pk: &[&str]| {
        let columns: Vec<(&str, SqlType)> = source
            .iter()
            .chain(audit.iter())
            .chain(derived.iter())
            .chain(keys.iter())
            .copied()
            .collect();
        TableSpec::new(name, &columns, pk)
    };

    vec![
        table(
            "Booking",
            &[
                ("BookingID", Integer),
                ("BookingParentID", Integer),
                ("CreatedDate", Timestamp),
                ("ModifiedDate", Timestamp),
                ("RecordLocator", Text),
                ("Status", Integer),
            ],
            &[("TimeToModify", Interval)],
            &["BookingID"],
        ),
        table(
            "PassengerJourneyLeg",
            &[
                ("PassengerID", Integer),
                ("SegmentID", Integer),
                ("LegNumber", Integer),
                ("InventoryLegID", Integer),
                ("CreatedDate", Timestamp),
                ("ModifiedDate", Timestamp),
            ],
            &[("TimeToModify", Interval)],
            &["PassengerID", "SegmentID", "LegNumber"],
        ),
        table(
            "PassengerJourneyCharge",
            &[
                ("PassengerID", Integer),
                ("SegmentID", Integer),
                ("ChargeNumber", Integer),
                ("ChargeAmount", Real),
                ("CurrencyCode", Text),
                ("ForeignAmount", Real),
                ("ForeignCurrencyCode", Text),
                ("CreatedDate", Timestamp),
            ],
            &[("PassengerJourneyCharge", Text)],
            &["PassengerID", "SegmentID", "ChargeNumber"],
        ),
    ]
}

// =============================================================================
// Extract
// =============================================================================

#[test]
fn test_extract_isolates_failing_source() {
    let (_dir, config) = workspace();
    let pipeline = Paxload::with_fetcher(config.clone(), mock_fetcher());

    let outcomes = pipeline.extract(run_at());

    assert_eq!(outcomes.len(), 5);
    assert_eq!(outcomes.success_count(), 4);
    assert!(matches!(
        outcomes.get("BookingPassenger"),
        Some(Outcome::Failed { kind, .. }) if kind == "fetch"
    ));

    for source in ["Booking", "PassengerJourneySegment", "PassengerJourneyLeg", "PassengerJourneyCharge"] {
        let staged = read_staged(&config.extract_dir, source, Stage::Extracted);
        assert!(staged.has_columns(&["extract_dt", "source", "proc_status"]), "{}", source);

        let status = staged.column_index("proc_status").unwrap();
        assert_eq!(staged.get(0, status), Some(&Value::Text("extracted".into())));
        let name = staged.column_index("source").unwrap();
        assert_eq!(staged.get(0, name), Some(&Value::Text(source.into())));
    }
    assert!(!staged_path(&config.extract_dir, "BookingPassenger", run_at().date(), Stage::Extracted).exists());
}

#[test]
fn test_extract_paginates_api_sources() {
    let (_dir, config) = workspace();
    let fetcher = mock_fetcher();
    let pipeline = Paxload::with_fetcher(config.clone(), fetcher);

    let outcomes = pipeline.extract(run_at());

    match outcomes.get("Booking") {
        Some(Outcome::Success(summary)) => assert_eq!(summary.rows, 3),
        other => panic!("unexpected outcome: {:?}", other),
    }
    let staged = read_staged(&config.extract_dir, "Booking", Stage::Extracted);
    assert_eq!(staged.row_count(), 3);
    assert_eq!(staged.column_count(), 6 + 3);
}

// =============================================================================
// Transform
// =============================================================================

#[test]
fn test_transform_stages_keys_and_derivations() {
    let (_dir, config) = workspace();
    let pipeline = Paxload::with_fetcher(config.clone(), mock_fetcher());
    pipeline.extract(run_at());

    let outcomes = pipeline.transform(run_at());

    assert_eq!(outcomes.success_count(), 4);
    assert!(matches!(
        outcomes.get("BookingPassenger"),
        Some(Outcome::Failed { kind, .. }) if kind == "io"
    ));

    let leg = read_staged(&config.transform_dir, "PassengerJourneyLeg", Stage::Transformed);
    let key = leg.column_index("business_key").unwrap();
    let hash = leg.column_index("hash").unwrap();
    let elapsed = leg.column_index("TimeToModify").unwrap();
    assert_eq!(leg.get(0, key), Some(&Value::Text("1_10_500".into())));
    assert_eq!(leg.get(0, hash), Some(&Value::Text(change_hash(&[Value::Text("1_10_500".into())]))));
    assert_eq!(leg.get(0, elapsed), Some(&Value::Text("0 days 02:00:00".into())));
    assert_eq!(leg.get(1, elapsed), Some(&Value::Null));

    let charge = read_staged(&config.transform_dir, "PassengerJourneyCharge", Stage::Transformed);
    let amount = charge.column_index("ForeignAmount").unwrap();
    let label = charge.column_index("PassengerJourneyCharge").unwrap();
    let currency = charge.column_index("ForeignCurrencyCode").unwrap();
    assert_eq!(charge.get(0, amount).and_then(Value::as_f64), Some(85.0));
    assert_eq!(charge.get(0, currency), Some(&Value::Text("EUR".into())));
    assert_eq!(charge.get(0, label), Some(&Value::Text("Charged".into())));
    assert_eq!(charge.get(1, label), Some(&Value::Text("Not Charged".into())));

    let segment = read_staged(&config.transform_dir, "PassengerJourneySegment", Stage::Transformed);
    let channel = segment.column_index("ChannelType").unwrap();
    assert_eq!(segment.get(0, channel), Some(&Value::Text("Web".into())));
    assert_eq!(segment.get(1, channel), Some(&Value::Text("GDS".into())));

    let status = segment.column_index("proc_status").unwrap();
    assert_eq!(segment.get(0, status), Some(&Value::Text("transformed".into())));
}

// =============================================================================
// Load
// =============================================================================

#[test]
fn test_full_run_loads_every_available_table() {
    let (_dir, config) = workspace();
    let pipeline = Paxload::with_fetcher(config.clone(), mock_fetcher());

    let report = pipeline
        .run(&[RunStage::Extract, RunStage::Transform], run_at(), || Ok(LoadMode::Full))
        .unwrap();
    assert_eq!(report.stages.len(), 2);

    let strategist = LoadStrategist::new(&config).with_tables(fixture_tables());
    let outcomes = strategist.load_all(LoadMode::Full, run_at().date());
    assert!(outcomes.all_succeeded(), "{:?}", outcomes);

    let warehouse = Warehouse::open(&config.warehouse).unwrap();
    assert_eq!(warehouse.row_count("Booking").unwrap(), 3);
    assert_eq!(warehouse.row_count("PassengerJourneyLeg").unwrap(), 2);
    assert_eq!(warehouse.row_count("PassengerJourneyCharge").unwrap(), 2);
}

#[test]
fn test_load_failure_does_not_stop_other_tables() {
    let (_dir, config) = workspace();
    let pipeline = Paxload::with_fetcher(config.clone(), mock_fetcher());
    pipeline.extract(run_at());
    pipeline.transform(run_at());

    let mut tables = fixture_tables();
    tables.push(TableSpec::for_kind(SourceKind::BookingPassenger));
    // Default segment layout has far more columns than the fixture.
    tables.push(TableSpec::for_kind(SourceKind::JourneySegment));

    let outcomes = LoadStrategist::new(&config)
        .with_tables(tables)
        .load_all(LoadMode::Incremental, run_at().date());

    assert_eq!(outcomes.len(), 5);
    assert_eq!(outcomes.success_count(), 3);
    assert!(matches!(
        outcomes.get("PassengerJourneySegment"),
        Some(Outcome::Failed { kind, .. }) if kind == "schema_mismatch"
    ));
    assert!(matches!(
        outcomes.get("BookingPassenger"),
        Some(Outcome::Failed { kind, .. }) if kind == "io"
    ));
}

#[test]
fn test_run_without_load_never_asks_for_mode() {
    let (_dir, config) = workspace();
    let pipeline = Paxload::with_fetcher(config, mock_fetcher());

    let report = pipeline
        .run(&[RunStage::Extract], run_at(), || panic!("mode requested"))
        .unwrap();

    assert_eq!(report.failure_count(), 1);
    assert!(report.outcomes(RunStage::Transform).is_none());
}
