//! Injected configuration: per-kind rules, lookup tables and run settings.

mod catalog;
mod settings;

pub use catalog::{Catalog, ChannelLabels, Derivation, ExchangeRates, KindRules, SourceKind};
pub use settings::{
    FetchConfig, PipelineConfig, SourceDescriptor, SourceLocation, WarehouseConfig, default_sources,
    load_dotenv,
};
