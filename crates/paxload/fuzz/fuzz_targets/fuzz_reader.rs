//! Fuzz target for the delimited reader.
//!
//! Checks that reading never panics, with either a fixed delimiter or
//! auto-detection, and that every parsed row matches the header width.

#![no_main]

use libfuzzer_sys::fuzz_target;
use paxload::input::{DelimitedReader, STAGED_DELIMITER};

fuzz_target!(|data: &[u8]| {
    if data.len() > 100_000 {
        return;
    }

    for reader in [DelimitedReader::new(), DelimitedReader::with_delimiter(STAGED_DELIMITER)] {
        if let Ok(records) = reader.read_bytes(data) {
            assert!(records.rows.iter().all(|row| row.len() == records.headers.len()));
        }
    }
});
