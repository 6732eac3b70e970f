//! Paginated JSON source fetching.

use std::time::Duration;

use indexmap::IndexSet;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Map;
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::error::{EtlError, Result};
use crate::record::{RecordSet, Value};

/// One JSON object from a source collection.
pub type JsonRecord = Map<String, serde_json::Value>;

/// Pull-based access to a paginated record collection.
pub trait PageFetcher: Send + Sync {
    /// Fetch up to `limit` records of `endpoint` starting at `offset`.
    fn fetch_page(&self, endpoint: &str, offset: usize, limit: usize) -> Result<Vec<JsonRecord>>;
}

/// Response body of a page request.
#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    data: Vec<JsonRecord>,
}

/// Fetches pages over HTTP: `GET {base}/{endpoint}?limit=&offset=`.
pub struct HttpFetcher {
    client: Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| EtlError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch_page(&self, endpoint: &str, offset: usize, limit: usize) -> Result<Vec<JsonRecord>> {
        let url = self.url(endpoint);
        let fetch_error = |message: String| EtlError::Fetch {
            endpoint: endpoint.to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    fetch_error(format!("request to {} timed out", url))
                } else {
                    fetch_error(format!("request to {} failed: {}", url, e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(fetch_error(format!("HTTP {}: {}", status, error_text)));
        }

        let body: PageBody = response
            .json()
            .map_err(|e| fetch_error(format!("invalid page body: {}", e)))?;

        Ok(body.data)
    }
}

/// Drive pagination over `endpoint` and project the records onto `columns`.
///
/// Pages are requested until one returns fewer rows than `page_size`. An
/// empty `columns` list takes every key seen, in first-seen order.
pub fn fetch_all(
    fetcher: &dyn PageFetcher,
    endpoint: &str,
    columns: &[String],
    page_size: usize,
    page_delay: Duration,
) -> Result<RecordSet> {
    let limit = page_size.max(1);
    let mut offset = 0;
    let mut records = Vec::new();

    loop {
        let page = fetcher.fetch_page(endpoint, offset, limit)?;
        let fetched = page.len();
        debug!(endpoint, offset, rows = fetched, "Fetched page");
        records.extend(page);

        if fetched < limit {
            break;
        }
        offset += limit;
        if !page_delay.is_zero() {
            std::thread::sleep(page_delay);
        }
    }

    if records.is_empty() {
        return Err(EtlError::EmptyData(format!("{} returned no records", endpoint)));
    }

    let headers: Vec<String> = if columns.is_empty() {
        let mut keys = IndexSet::new();
        for record in &records {
            keys.extend(record.keys().cloned());
        }
        keys.into_iter().collect()
    } else {
        columns.to_vec()
    };

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|column| record.get(column).map(json_to_value).unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    info!(endpoint, rows = records.len(), "Fetched collection");
    Ok(RecordSet::from_values(headers, rows))
}

/// Convert a JSON scalar into a cell value.
fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
        },
        serde_json::Value::String(s) if Value::is_null_token(s) => Value::Null,
        serde_json::Value::String(s) => Value::Text(s.clone()),
        other => Value::Text(other.to_string()),
    }
}
