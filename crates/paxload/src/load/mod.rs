//! Load stage: destination tables, load modes and the per-table strategist.

mod mode;
mod strategist;
mod tables;
mod warehouse;

pub use mode::{LoadMode, PROMPT_ATTEMPTS, prompt_load_mode};
pub use strategist::LoadStrategist;
pub use tables::{ColumnDef, SqlType, TableSpec, default_tables};
pub use warehouse::{Warehouse, is_valid_identifier};
