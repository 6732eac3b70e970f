//! Source readers: delimited files, workbooks and paginated API collections.

mod fetch;
mod mock;
mod reader;
mod spreadsheet;

pub use fetch::{HttpFetcher, JsonRecord, PageFetcher, fetch_all};
pub use mock::MockFetcher;
pub use reader::{DelimitedReader, STAGED_DELIMITER, detect_delimiter, read_table};
pub use spreadsheet::SpreadsheetReader;
