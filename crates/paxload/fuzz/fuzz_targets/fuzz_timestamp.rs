//! Fuzz target for timestamp and interval parsing.

#![no_main]

use chrono::Timelike;
use libfuzzer_sys::fuzz_target;
use paxload::record::{format_interval, parse_interval};
use paxload::transform::parse_timestamp;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Some(ts) = parse_timestamp(text) {
        assert_eq!(ts.nanosecond(), 0);
    }
    if let Some(interval) = parse_interval(text) {
        assert_eq!(parse_interval(&format_interval(interval)), Some(interval));
    }
});
