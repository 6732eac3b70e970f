//! Fuzz target for the transform chain.
//!
//! Feeds arbitrary cell text through every source kind's chain and checks
//! that it never panics.

#![no_main]

use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;
use paxload::config::Catalog;
use paxload::transform::{CleanOptions, TransformChain};
use paxload::{RecordSet, SourceKind};

const COLUMNS: [&str; 8] = [
    "PassengerID",
    "SegmentID",
    "DOB",
    "ChargeAmount",
    "ForeignAmount",
    "ForeignCurrencyCode",
    "CreatedDate",
    "ModifiedDate",
];

fuzz_target!(|data: &[u8]| {
    if data.len() > 10_000 {
        return;
    }
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let headers: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).chain(["CurrencyCode".to_string()]).collect();
    let rows: Vec<Vec<String>> = text
        .lines()
        .map(|line| {
            let mut cells: Vec<String> = line.split('|').map(str::to_string).collect();
            cells.resize(headers.len(), String::new());
            cells
        })
        .collect();

    let catalog = Catalog::default();
    let Some(today) = NaiveDate::from_ymd_opt(2024, 6, 1) else {
        return;
    };
    let chain = TransformChain::new(&catalog, CleanOptions::default(), today);

    for kind in SourceKind::ALL {
        let mut records = RecordSet::from_strings(headers.clone(), rows.clone());
        let _ = chain.run(kind, &mut records);
    }
});
