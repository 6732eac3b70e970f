//! Destination table layouts, one per source kind.

use serde::{Deserialize, Serialize};

use crate::config::SourceKind;

/// Storage class of a destination column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Boolean,
    Timestamp,
    Interval,
}

impl SqlType {
    /// Column type used in `CREATE TABLE`.
    pub fn declaration(&self) -> &'static str {
        match self {
            SqlType::Integer | SqlType::Boolean => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text | SqlType::Timestamp | SqlType::Interval => "TEXT",
        }
    }
}

/// One destination column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
}

/// Layout of one destination table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    /// Natural identity, enforced as the primary key.
    pub primary_key: Vec<String>,
    /// Column carrying the change hash; unique only while loading incrementally.
    pub hash_column: String,
}

impl TableSpec {
    pub fn new(name: impl Into<String>, columns: &[(&str, SqlType)], primary_key: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns
                .iter()
                .map(|(name, sql_type)| ColumnDef {
                    name: name.to_string(),
                    sql_type: *sql_type,
                })
                .collect(),
            primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
            hash_column: "hash".to_string(),
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns supplied by the source itself, before the audit columns.
    pub fn source_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .take_while(|name| *name != "extract_dt")
            .collect()
    }

    /// Default layout for a source kind.
    pub fn for_kind(kind: SourceKind) -> Self {
        use SqlType::*;

        match kind {
            SourceKind::Booking => Self::new(
                kind.source_name(),
                &with_trailer(
                    &[
                        ("BookingID", Integer),
                        ("BookingParentID", Integer),
                        ("Status", Integer),
                        ("RecordLocator", Text),
                        ("BookingPromoCode", Text),
                        ("CurrencyCode", Text),
                        ("HoldDateTime", Text),
                        ("ExpiredDate", Timestamp),
                        ("PriceStatus", Integer),
                        ("PaidStatus", Integer),
                        ("SystemCode", Text),
                        ("ChannelType", Text),
                        ("CreatedAgentCode", Text),
                        ("CreatedOrganizationCode", Text),
                        ("CreatedDomainCode", Text),
                        ("CreatedLocationCode", Text),
                        ("SourceAgentCode", Text),
                        ("SourceOrganizationCode", Text),
                        ("SourceDomainCode", Text),
                        ("SourceLocationCode", Text),
                        ("ReferralCode", Text),
                        ("GroupName", Text),
                        ("ReceivedBy", Text),
                        ("ReceivedByReference", Text),
                        ("ProfileStatus", Integer),
                        ("PaxResidentCountry", Text),
                        ("CreatedSystemType", Integer),
                        ("BookingDate", Timestamp),
                        ("BookingType", Text),
                        ("OwningCarrierCode", Text),
                        ("CreatedAgentID", Integer),
                        ("CreatedDate", Timestamp),
                        ("ModifiedAgentID", Integer),
                        ("ModifiedDate", Timestamp),
                    ],
                    &[("TimeToModify", Interval)],
                ),
                &["BookingID"],
            ),
            SourceKind::BookingPassenger => Self::new(
                kind.source_name(),
                &with_trailer(
                    &[
                        ("PassengerID", Integer),
                        ("DOB", Text),
                        ("PaxType", Text),
                        ("Gender", Integer),
                        ("WeightCategory", Integer),
                        ("Suffix", Text),
                        ("BookingSearchNameID", Integer),
                        ("Nationality", Text),
                        ("ResidentCountry", Text),
                        ("DiscountCode", Text),
                        ("Infant", Integer),
                        ("PseudoPassenger", Boolean),
                        ("BookingID", Integer),
                        ("CustomerNumber", Text),
                        ("ProgramCode", Text),
                        ("ProgramLevel", Text),
                        ("ProgramNumber", Text),
                        ("FamilyNumber", Integer),
                        ("TotalCost", Real),
                        ("BalanceDue", Real),
                        ("CreatedAgentID", Integer),
                        ("CreatedDate", Timestamp),
                        ("ModifiedAgentID", Integer),
                        ("ModifiedDate", Timestamp),
                    ],
                    &[("age", Real), ("IsAdult", Boolean), ("TimeToModify", Interval)],
                ),
                &["PassengerID"],
            ),
            SourceKind::JourneySegment => Self::new(
                kind.source_name(),
                &with_trailer(
                    &[
                        ("PassengerID", Integer),
                        ("SegmentID", Integer),
                        ("DepartureDate", Timestamp),
                        ("DepartureStation", Text),
                        ("ArrivalStation", Text),
                        ("TripType", Integer),
                        ("TripNumber", Integer),
                        ("JourneyNumber", Integer),
                        ("SegmentNumber", Integer),
                        ("FareComponentNumber", Integer),
                        ("FareJourneyType", Integer),
                        ("BookingStatus", Text),
                        ("ClassOfService", Text),
                        ("TravelClassCode", Text),
                        ("ClassType", Text),
                        ("International", Integer),
                        ("GoverningFare", Integer),
                        ("FlexibleFare", Integer),
                        ("VerifiedTravelDocs", Text),
                        ("FareStatus", Integer),
                        ("FareClassOfService", Text),
                        ("ProductClassCode", Text),
                        ("CurrencyCode", Text),
                        ("RuleTariff", Real),
                        ("RuleCarrierCode", Text),
                        ("RuleNumber", Text),
                        ("FareBasis", Text),
                        ("FareDiscountCode", Text),
                        ("TicketNumber", Real),
                        ("InfantTicketNumber", Real),
                        ("TicketIndicator", Text),
                        ("TicketStatus", Text),
                        ("OverbookIndicator", Text),
                        ("ChangeReasonCode", Text),
                        ("SegmentType", Text),
                        ("XRefCarrierCode", Text),
                        ("XRefFlightNumber", Real),
                        ("XRefOpSuffix", Text),
                        ("XRefClassOfService", Text),
                        ("ChannelType", Text),
                        ("CreatedAgentCode", Text),
                        ("CreatedOrganizationCode", Text),
                        ("CreatedDomainCode", Text),
                        ("CreatedLocationCode", Text),
                        ("SourceAgentCode", Text),
                        ("SourceOrganizationCode", Text),
                        ("SourceDomainCode", Text),
                        ("SourceLocationCode", Text),
                        ("SalesDate", Timestamp),
                        ("ActivityDate", Timestamp),
                        ("CreatedAgentID", Integer),
                        ("CreatedDate", Timestamp),
                        ("ModifiedAgentID", Integer),
                        ("ModifiedDate", Timestamp),
                    ],
                    &[("TimeToModify", Interval)],
                ),
                &["PassengerID", "SegmentID"],
            ),
            SourceKind::JourneyLeg => Self::new(
                kind.source_name(),
                &with_trailer(
                    &[
                        ("PassengerID", Integer),
                        ("SegmentID", Integer),
                        ("LegNumber", Integer),
                        ("InventoryLegID", Integer),
                        ("DepartureDetail", Text),
                        ("ArrivalDetail", Text),
                        ("JourneyNumber", Integer),
                        ("BookingStatus", Text),
                        ("SeatPreference", Text),
                        ("SeatTogetherPreference", Integer),
                        ("CompartmentDesignator", Text),
                        ("UnitDesignator", Text),
                        ("UnitAssignmentWeight", Integer),
                        ("BoardingSequence", Integer),
                        ("LiftStatus", Integer),
                        ("PriorityCode", Text),
                        ("PriorityDate", Text),
                        ("CreatedAgentID", Integer),
                        ("CreatedDate", Timestamp),
                        ("ModifiedAgentID", Integer),
                        ("ModifiedDate", Timestamp),
                    ],
                    &[("TimeToModify", Interval)],
                ),
                &["PassengerID", "SegmentID", "LegNumber"],
            ),
            SourceKind::JourneyCharge => Self::new(
                kind.source_name(),
                &with_trailer(
                    &[
                        ("PassengerID", Integer),
                        ("SegmentID", Integer),
                        ("ChargeNumber", Integer),
                        ("ChargeType", Integer),
                        ("ChargeCode", Text),
                        ("TicketCode", Text),
                        ("CurrencyCode", Text),
                        ("ChargeAmount", Real),
                        ("ChargeDetail", Text),
                        ("ForeignCurrencyCode", Text),
                        ("ForeignAmount", Real),
                        ("CreatedAgentID", Integer),
                        ("CreatedDate", Timestamp),
                    ],
                    &[("PassengerJourneyCharge", Text)],
                ),
                &["PassengerID", "SegmentID", "ChargeNumber"],
            ),
        }
    }
}

/// Every default table layout, in pipeline order.
pub fn default_tables() -> Vec<TableSpec> {
    SourceKind::ALL.into_iter().map(TableSpec::for_kind).collect()
}

/// Source columns, then audit columns, then derived columns, then key and hash.
fn with_trailer(
    source: &[(&'static str, SqlType)],
    derived: &[(&'static str, SqlType)],
) -> Vec<(&'static str, SqlType)> {
    let audit = [
        ("extract_dt", SqlType::Timestamp),
        ("source", SqlType::Text),
        ("proc_status", SqlType::Text),
    ];
    let keys = [("business_key", SqlType::Text), ("hash", SqlType::Text)];

    source
        .iter()
        .chain(audit.iter())
        .chain(derived.iter())
        .chain(keys.iter())
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_layout() {
        let spec = TableSpec::for_kind(SourceKind::JourneyCharge);
        let names = spec.column_names();

        assert_eq!(spec.name, "PassengerJourneyCharge");
        assert_eq!(names.len(), 19);
        assert_eq!(
            names[13..],
            ["extract_dt", "source", "proc_status", "PassengerJourneyCharge", "business_key", "hash"]
        );
        assert_eq!(spec.primary_key, vec!["PassengerID", "SegmentID", "ChargeNumber"]);
        assert_eq!(spec.source_columns().len(), 13);
    }

    #[test]
    fn test_every_table_ends_with_key_and_hash() {
        for spec in default_tables() {
            let names = spec.column_names();
            assert_eq!(names[names.len() - 2..], ["business_key", "hash"], "{}", spec.name);
            assert!(names.contains(&"extract_dt"));
        }
    }
}
