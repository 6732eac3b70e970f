//! The transform chain: clean, coerce, canonicalize, key and hash.

mod canonical;
mod clean;
mod coerce;
mod keys;
mod report;

use chrono::NaiveDate;

use crate::config::{Catalog, SourceKind};
use crate::record::RecordSet;

pub use canonical::{
    AGE, CHANNEL_TYPE, CHARGE_LABEL, CHARGED, Canonicalizer, IS_ADULT, NOT_CHARGED, TIME_TO_MODIFY,
};
pub use clean::{CleanOptions, Cleaner};
pub use coerce::{TypeCoercer, coerce_value, parse_timestamp};
pub use keys::{BUSINESS_KEY, HASH, KeyGenerator, NULL_PLACEHOLDER, business_key, change_hash};
pub use report::{TransformChange, TransformIssue, TransformReport};

/// Runs every transform step, in order, over one record set.
pub struct TransformChain<'a> {
    catalog: &'a Catalog,
    clean: CleanOptions,
    today: NaiveDate,
}

impl<'a> TransformChain<'a> {
    /// Create a chain; `today` is the reference date for age derivation.
    pub fn new(catalog: &'a Catalog, clean: CleanOptions, today: NaiveDate) -> Self {
        Self {
            catalog,
            clean,
            today,
        }
    }

    /// Transform `data` in place and report what happened.
    pub fn run(&self, kind: SourceKind, data: &mut RecordSet) -> TransformReport {
        let mut report = TransformReport::new();

        Cleaner::new(self.clean.clone()).apply(data, &mut report);
        TypeCoercer::new(self.catalog).apply(kind, data, &mut report);
        Canonicalizer::new(self.catalog, self.today).apply(kind, data, &mut report);
        KeyGenerator::new(self.catalog).apply(kind, data, &mut report);

        report
    }
}
