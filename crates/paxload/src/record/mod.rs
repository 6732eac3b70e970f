//! Record set model shared by every pipeline stage.

mod table;
mod value;

pub use table::RecordSet;
pub use value::{ColumnType, TIMESTAMP_FORMAT, Value, format_interval, parse_interval};
