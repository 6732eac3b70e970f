//! Per-source-kind rule tables and lookup tables used by the transform chain.
//!
//! Everything here is immutable once built. [`Catalog::default`] holds the
//! production tables; tests build overrides with the `with_*` methods.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::EtlError;
use crate::record::ColumnType;

/// One of the five fixed record categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Booking,
    BookingPassenger,
    JourneySegment,
    JourneyLeg,
    JourneyCharge,
}

impl SourceKind {
    /// Every source kind, in pipeline order.
    pub const ALL: [SourceKind; 5] = [
        SourceKind::Booking,
        SourceKind::BookingPassenger,
        SourceKind::JourneySegment,
        SourceKind::JourneyLeg,
        SourceKind::JourneyCharge,
    ];

    /// Identifier used in configuration and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Booking => "booking",
            SourceKind::BookingPassenger => "booking_passenger",
            SourceKind::JourneySegment => "journey_segment",
            SourceKind::JourneyLeg => "journey_leg",
            SourceKind::JourneyCharge => "journey_charge",
        }
    }

    /// Source label written to the audit `source` column and staged file names.
    pub fn source_name(&self) -> &'static str {
        match self {
            SourceKind::Booking => "Booking",
            SourceKind::BookingPassenger => "BookingPassenger",
            SourceKind::JourneySegment => "PassengerJourneySegment",
            SourceKind::JourneyLeg => "PassengerJourneyLeg",
            SourceKind::JourneyCharge => "PassengerJourneyCharge",
        }
    }

    fn index(&self) -> usize {
        match self {
            SourceKind::Booking => 0,
            SourceKind::BookingPassenger => 1,
            SourceKind::JourneySegment => 2,
            SourceKind::JourneyLeg => 3,
            SourceKind::JourneyCharge => 4,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s || kind.source_name() == s)
            .ok_or_else(|| EtlError::Config(format!("Unknown source kind: {}", s)))
    }
}

/// Source-kind-gated row derivations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Foreign amounts converted to the base currency.
    Currency,
    /// Age and adult flag from date of birth.
    Age,
    /// Charged / not charged label from the charge amount.
    ChargeClass,
    /// Channel type codes replaced by labels.
    ChannelLabel,
}

/// Type, identity and derivation rules for one source kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindRules {
    /// Columns converted to whole-second timestamps.
    pub datetime_columns: Vec<String>,
    /// Non-temporal columns with a declared target type.
    #[serde(default)]
    pub conversions: IndexMap<String, ColumnType>,
    /// Ordered identity columns for the business key and change hash.
    pub identity_columns: Vec<String>,
    /// Gated derivations applied to this kind.
    #[serde(default)]
    pub derivations: Vec<Derivation>,
}

impl KindRules {
    /// Default rules for a source kind.
    pub fn for_kind(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Booking => Self {
                datetime_columns: names(&[
                    "ExpiredDate",
                    "BookingDate",
                    "CreatedDate",
                    "ModifiedDate",
                    "extract_dt",
                ]),
                conversions: IndexMap::new(),
                identity_columns: names(&["BookingID", "BookingParentID", "Status", "RecordLocator"]),
                derivations: Vec::new(),
            },
            SourceKind::BookingPassenger => Self {
                datetime_columns: names(&["CreatedDate", "ModifiedDate", "extract_dt"]),
                conversions: IndexMap::from([
                    ("ProgramNumber".to_string(), ColumnType::String),
                    ("CustomerNumber".to_string(), ColumnType::String),
                    ("DOB".to_string(), ColumnType::String),
                    ("Infant".to_string(), ColumnType::Integer),
                ]),
                identity_columns: names(&["PassengerID", "BookingID"]),
                derivations: vec![Derivation::Age],
            },
            SourceKind::JourneySegment => Self {
                datetime_columns: names(&[
                    "DepartureDate",
                    "SalesDate",
                    "ActivityDate",
                    "CreatedDate",
                    "ModifiedDate",
                    "extract_dt",
                ]),
                conversions: IndexMap::new(),
                identity_columns: names(&["PassengerID", "SegmentID"]),
                derivations: vec![Derivation::ChannelLabel],
            },
            SourceKind::JourneyLeg => Self {
                datetime_columns: names(&["CreatedDate", "ModifiedDate", "extract_dt"]),
                conversions: IndexMap::new(),
                identity_columns: names(&["PassengerID", "SegmentID", "InventoryLegID"]),
                derivations: Vec::new(),
            },
            SourceKind::JourneyCharge => Self {
                datetime_columns: names(&["ChargeDateTime", "CreatedDate", "extract_dt"]),
                conversions: IndexMap::new(),
                identity_columns: names(&["PassengerID", "SegmentID"]),
                derivations: vec![Derivation::Currency, Derivation::ChargeClass],
            },
        }
    }

    pub fn derives(&self, derivation: Derivation) -> bool {
        self.derivations.contains(&derivation)
    }
}

/// Fixed conversion rates into the base currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRates {
    /// Currency every amount is converted into.
    pub base: String,
    /// Multiplier from each currency code into `base`.
    pub rates: IndexMap<String, f64>,
}

impl ExchangeRates {
    pub fn new(base: impl Into<String>, rates: IndexMap<String, f64>) -> Self {
        Self {
            base: base.into(),
            rates,
        }
    }

    /// Rate for a currency code, if the table knows it.
    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }
}

impl Default for ExchangeRates {
    fn default() -> Self {
        let rates = [
            ("GBP", 0.85),
            ("CHF", 0.92),
            ("CAD", 0.68),
            ("DKK", 0.13),
            ("EUR", 1.0),
            ("SEK", 0.087),
            ("NOK", 0.09),
            ("USD", 0.92),
        ]
        .into_iter()
        .map(|(code, rate)| (code.to_string(), rate))
        .collect();

        Self::new("EUR", rates)
    }
}

/// Human-readable labels for numeric channel type codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelLabels {
    pub labels: IndexMap<i64, String>,
}

impl ChannelLabels {
    /// Label for a code; unmapped codes render as the code itself.
    pub fn label(&self, code: i64) -> String {
        self.labels
            .get(&code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

impl Default for ChannelLabels {
    fn default() -> Self {
        let labels = [
            "Default",
            "Direct",
            "Web",
            "GDS",
            "API",
            "DigitalAPI",
            "DigitalWeb",
            "NDC",
        ]
        .into_iter()
        .enumerate()
        .map(|(code, label)| (code as i64, label.to_string()))
        .collect();

        Self { labels }
    }
}

/// All lookup tables injected into the transform chain.
#[derive(Debug, Clone)]
pub struct Catalog {
    rules: [KindRules; 5],
    rates: ExchangeRates,
    channels: ChannelLabels,
}

impl Catalog {
    /// Rules for a source kind.
    pub fn rules(&self, kind: SourceKind) -> &KindRules {
        &self.rules[kind.index()]
    }

    pub fn rates(&self) -> &ExchangeRates {
        &self.rates
    }

    pub fn channels(&self) -> &ChannelLabels {
        &self.channels
    }

    /// Replace the rules for one source kind.
    pub fn with_rules(mut self, kind: SourceKind, rules: KindRules) -> Self {
        self.rules[kind.index()] = rules;
        self
    }

    pub fn with_rates(mut self, rates: ExchangeRates) -> Self {
        self.rates = rates;
        self
    }

    pub fn with_channels(mut self, channels: ChannelLabels) -> Self {
        self.channels = channels;
        self
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            rules: SourceKind::ALL.map(KindRules::for_kind),
            rates: ExchangeRates::default(),
            channels: ChannelLabels::default(),
        }
    }
}

fn names(columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| c.to_string()).collect()
}
