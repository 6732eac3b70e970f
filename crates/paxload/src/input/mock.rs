//! In-memory page fetcher for testing.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::{EtlError, Result};

use super::fetch::{JsonRecord, PageFetcher};

/// Serves canned records per endpoint and remembers every requested offset.
#[derive(Default)]
pub struct MockFetcher {
    collections: HashMap<String, Vec<JsonRecord>>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl MockFetcher {
    /// Create a fetcher with no collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `records` for `endpoint`.
    pub fn with_records(mut self, endpoint: impl Into<String>, records: Vec<JsonRecord>) -> Self {
        self.collections.insert(endpoint.into(), records);
        self
    }

    /// Make every request to `endpoint` fail.
    pub fn with_failure(mut self, endpoint: impl Into<String>) -> Self {
        self.failing.insert(endpoint.into());
        self
    }

    /// Offsets requested for `endpoint`, in order.
    pub fn calls(&self, endpoint: &str) -> Vec<usize> {
        self.calls
            .lock()
            .map(|calls| {
                calls
                    .iter()
                    .filter(|(e, _)| e == endpoint)
                    .map(|(_, offset)| *offset)
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl PageFetcher for MockFetcher {
    fn fetch_page(&self, endpoint: &str, offset: usize, limit: usize) -> Result<Vec<JsonRecord>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((endpoint.to_string(), offset));
        }

        if self.failing.contains(endpoint) {
            return Err(EtlError::Fetch {
                endpoint: endpoint.to_string(),
                message: "connection refused".to_string(),
            });
        }

        let records = self.collections.get(endpoint).ok_or_else(|| EtlError::Fetch {
            endpoint: endpoint.to_string(),
            message: "HTTP 404 Not Found".to_string(),
        })?;

        Ok(records.iter().skip(offset).take(limit).cloned().collect())
    }
}
