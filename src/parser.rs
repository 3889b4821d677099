// 🏗️ Registration Input - positional CSV from the form service
// The CSV has no reliable header names: the configured field list says what each column is.

use crate::error::RallyError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ============================================================================
// COLUMNS THE ENGINE READS
// ============================================================================

/// Staged column names the engine understands.
///
/// Field lists may contain any other columns too; they are staged but ignored.
/// Columns missing from a field list read back as empty strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    EntryId,
    RiderNumber,
    RiderFirst,
    RiderLast,
    RiderMember,
    RiderLegion,
    NoviceRider,
    PillionFirst,
    PillionLast,
    PillionMember,
    PillionLegion,
    NovicePillion,
    HasPillion,
    BikeMakeModel,
    Registration,
    OdoCounts,
    Email,
    Mobile,
    Address1,
    Address2,
    Town,
    County,
    Postcode,
    Country,
    NokName,
    NokNumber,
    NokRelation,
    BonusClaimMethod,
    Route,
    Tshirt1,
    Tshirt2,
    Patches,
    Camping,
    DistanceToStart,
    PaymentTotal,
    Cash,
    Sponsorship,
    PaymentStatus,
    Withdrawn,
    DateCreated,
}

impl Column {
    /// Must be present in every field list
    pub const REQUIRED: &'static [Column] = &[Column::EntryId, Column::RiderFirst, Column::RiderLast];

    /// Columns read for each entrant, in SELECT order
    pub const ROW: &'static [Column] = &[
        Column::EntryId,
        Column::RiderFirst,
        Column::RiderLast,
        Column::RiderMember,
        Column::RiderLegion,
        Column::NoviceRider,
        Column::PillionFirst,
        Column::PillionLast,
        Column::PillionMember,
        Column::PillionLegion,
        Column::NovicePillion,
        Column::HasPillion,
        Column::BikeMakeModel,
        Column::Registration,
        Column::OdoCounts,
        Column::Email,
        Column::Mobile,
        Column::Address1,
        Column::Address2,
        Column::Town,
        Column::County,
        Column::Postcode,
        Column::Country,
        Column::NokName,
        Column::NokNumber,
        Column::NokRelation,
        Column::BonusClaimMethod,
        Column::Route,
        Column::Tshirt1,
        Column::Tshirt2,
        Column::Patches,
        Column::Camping,
        Column::DistanceToStart,
        Column::PaymentTotal,
        Column::Cash,
        Column::Sponsorship,
        Column::PaymentStatus,
        Column::Withdrawn,
        Column::DateCreated,
    ];

    /// Column name as it appears in the field list and staging table
    pub fn name(&self) -> &'static str {
        match self {
            Column::EntryId => "EntryId",
            Column::RiderNumber => "RiderNumber",
            Column::RiderFirst => "RiderFirst",
            Column::RiderLast => "RiderLast",
            Column::RiderMember => "RiderMember",
            Column::RiderLegion => "RiderLegion",
            Column::NoviceRider => "NoviceRider",
            Column::PillionFirst => "PillionFirst",
            Column::PillionLast => "PillionLast",
            Column::PillionMember => "PillionMember",
            Column::PillionLegion => "PillionLegion",
            Column::NovicePillion => "NovicePillion",
            Column::HasPillion => "HasPillion",
            Column::BikeMakeModel => "BikeMakeModel",
            Column::Registration => "Registration",
            Column::OdoCounts => "OdoCounts",
            Column::Email => "Email",
            Column::Mobile => "Mobile",
            Column::Address1 => "Address1",
            Column::Address2 => "Address2",
            Column::Town => "Town",
            Column::County => "County",
            Column::Postcode => "Postcode",
            Column::Country => "Country",
            Column::NokName => "NokName",
            Column::NokNumber => "NokNumber",
            Column::NokRelation => "NokRelation",
            Column::BonusClaimMethod => "BonusClaimMethod",
            Column::Route => "Route",
            Column::Tshirt1 => "Tshirt1",
            Column::Tshirt2 => "Tshirt2",
            Column::Patches => "Patches",
            Column::Camping => "Camping",
            Column::DistanceToStart => "DistanceToStart",
            Column::PaymentTotal => "PaymentTotal",
            Column::Cash => "Cash",
            Column::Sponsorship => "Sponsorship",
            Column::PaymentStatus => "PaymentStatus",
            Column::Withdrawn => "Withdrawn",
            Column::DateCreated => "DateCreated",
        }
    }
}

// ============================================================================
// RAW REGISTRATION ROW
// ============================================================================

/// One submission exactly as staged, plus the display number assigned to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRegistrationRow {
    pub entry_id: String,
    pub final_number: i64,

    pub rider_first: String,
    pub rider_last: String,
    pub rider_member: String,
    pub rider_legion: String,
    pub novice_rider: String,

    pub pillion_first: String,
    pub pillion_last: String,
    pub pillion_member: String,
    pub pillion_legion: String,
    pub novice_pillion: String,
    pub has_pillion: String,

    pub bike: String,
    pub registration: String,
    pub odo_counts: String,

    pub email: String,
    pub mobile: String,
    pub address1: String,
    pub address2: String,
    pub town: String,
    pub county: String,
    pub postcode: String,
    pub country: String,

    pub nok_name: String,
    pub nok_number: String,
    pub nok_relation: String,

    pub bonus_claim_method: String,
    pub route: String,
    pub tshirt1: String,
    pub tshirt2: String,
    pub patches: String,
    pub camping: String,
    pub distance_to_start: String,

    pub payment_total: String,
    pub cash: String,
    pub sponsorship: String,
    pub payment_status: String,
    pub withdrawn: String,
    pub date_created: String,
}

impl RawRegistrationRow {
    /// Build from values laid out in `Column::ROW` order
    pub fn from_values(final_number: i64, values: &[String]) -> Self {
        let get = |column: Column| -> String {
            Column::ROW
                .iter()
                .position(|c| *c == column)
                .and_then(|i| values.get(i))
                .cloned()
                .unwrap_or_default()
        };

        RawRegistrationRow {
            entry_id: get(Column::EntryId),
            final_number,
            rider_first: get(Column::RiderFirst),
            rider_last: get(Column::RiderLast),
            rider_member: get(Column::RiderMember),
            rider_legion: get(Column::RiderLegion),
            novice_rider: get(Column::NoviceRider),
            pillion_first: get(Column::PillionFirst),
            pillion_last: get(Column::PillionLast),
            pillion_member: get(Column::PillionMember),
            pillion_legion: get(Column::PillionLegion),
            novice_pillion: get(Column::NovicePillion),
            has_pillion: get(Column::HasPillion),
            bike: get(Column::BikeMakeModel),
            registration: get(Column::Registration),
            odo_counts: get(Column::OdoCounts),
            email: get(Column::Email),
            mobile: get(Column::Mobile),
            address1: get(Column::Address1),
            address2: get(Column::Address2),
            town: get(Column::Town),
            county: get(Column::County),
            postcode: get(Column::Postcode),
            country: get(Column::Country),
            nok_name: get(Column::NokName),
            nok_number: get(Column::NokNumber),
            nok_relation: get(Column::NokRelation),
            bonus_claim_method: get(Column::BonusClaimMethod),
            route: get(Column::Route),
            tshirt1: get(Column::Tshirt1),
            tshirt2: get(Column::Tshirt2),
            patches: get(Column::Patches),
            camping: get(Column::Camping),
            distance_to_start: get(Column::DistanceToStart),
            payment_total: get(Column::PaymentTotal),
            cash: get(Column::Cash),
            sponsorship: get(Column::Sponsorship),
            payment_status: get(Column::PaymentStatus),
            withdrawn: get(Column::Withdrawn),
            date_created: get(Column::DateCreated),
        }
    }
}

// ============================================================================
// INPUT SOURCE
// ============================================================================

/// Where the CSV comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    File(PathBuf),
    Url(String),
}

impl InputSource {
    pub fn parse(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            InputSource::Url(location.to_string())
        } else {
            InputSource::File(PathBuf::from(location))
        }
    }

    /// Name recorded in the rally metadata table
    pub fn name(&self) -> String {
        match self {
            InputSource::File(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("unknown.csv")
                .to_string(),
            InputSource::Url(url) => url.clone(),
        }
    }

    /// Read the whole source; a missing file or failed fetch is fatal
    pub fn read_to_string(&self) -> Result<String> {
        match self {
            InputSource::File(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to open CSV file: {}", path.display())),
            InputSource::Url(url) => fetch_url(url),
        }
    }
}

#[cfg(feature = "online")]
fn fetch_url(url: &str) -> Result<String> {
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Fetching {} returned an error status", url))?;

    response
        .text()
        .with_context(|| format!("Failed to read body of {}", url))
}

#[cfg(not(feature = "online"))]
fn fetch_url(url: &str) -> Result<String> {
    Err(RallyError::RemoteInputUnsupported(url.to_string()).into())
}

// ============================================================================
// CSV RECORDS
// ============================================================================

/// Parse CSV content into positional records, skipping the header row.
///
/// Every record must have exactly `expected` columns.
pub fn read_records(content: &str, expected: usize) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV record {}", index + 1))?;

        if record.len() != expected {
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(index as u64 + 2);
            return Err(RallyError::ColumnCountMismatch {
                line,
                expected,
                found: record.len(),
            }
            .into());
        }

        records.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(records)
}

// ============================================================================
// LENIENT NUMBERS
// ============================================================================

/// Pull an integer out of free text typed into a form.
///
/// The first run of digits anywhere in the string is the value (0 if none).
/// A `-` anywhere in the string makes it negative, so `"30-"` is -30.
/// Decimals are truncated: `"30.5"` is 30.
pub fn parse_lenient_int(text: &str) -> i64 {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    let value = digits.chars().fold(0i64, |acc, c| {
        acc.saturating_mul(10)
            .saturating_add(c.to_digit(10).unwrap_or(0) as i64)
    });

    if text.contains('-') {
        -value
    } else {
        value
    }
}

/// Sponsorship pledged on the form; never negative
pub fn parse_pledge(text: &str) -> i64 {
    parse_lenient_int(text).max(0)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient_int() {
        let cases = [
            ("30", 30),
            ("aa30", 30),
            ("30bbb", 30),
            ("'30", 30),
            ("£30", 30),
            ("-30", -30),
            ("30.5", 30),
            ("", 0),
            ("none", 0),
            ("Include £50 sponsorship", 50),
        ];

        for (input, expected) in cases {
            assert_eq!(parse_lenient_int(input), expected, "input {:?}", input);
        }
    }

    #[test]
    fn test_hyphen_anywhere_negates() {
        assert_eq!(parse_lenient_int("30-"), -30);
        assert_eq!(parse_lenient_int("-30-"), -30);
        assert_eq!(parse_lenient_int("pay 20 - later"), -20);
    }

    #[test]
    fn test_pledge_is_never_negative() {
        assert_eq!(parse_pledge("Include £50"), 50);
        assert_eq!(parse_pledge("£50 - thanks"), 0);
        assert_eq!(parse_pledge(""), 0);
    }

    #[test]
    fn test_long_digit_runs_saturate() {
        assert_eq!(parse_lenient_int("99999999999999999999"), i64::MAX);
        assert_eq!(parse_lenient_int("-99999999999999999999"), -i64::MAX);
    }

    #[test]
    fn test_read_records_skips_header() {
        let csv = "EntryId,First,Last\n1,Bob,Stammers\n2,Colin,McCrea\n";
        let records = read_records(csv, 3).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1], vec!["2", "Colin", "McCrea"]);
    }

    #[test]
    fn test_read_records_rejects_wrong_width() {
        let csv = "EntryId,First,Last\n1,Bob,Stammers\n2,Colin\n";
        let err = read_records(csv, 3).unwrap_err();

        match err.downcast_ref::<RallyError>() {
            Some(RallyError::ColumnCountMismatch { line, expected, found }) => {
                assert_eq!(*line, 3);
                assert_eq!(*expected, 3);
                assert_eq!(*found, 2);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_input_source_detection() {
        assert!(matches!(InputSource::parse("entrants.csv"), InputSource::File(_)));
        assert!(matches!(
            InputSource::parse("https://example.com/export.csv"),
            InputSource::Url(_)
        ));
        assert_eq!(InputSource::parse("/tmp/x/entrants.csv").name(), "entrants.csv");
    }

    #[test]
    fn test_row_from_values_follows_column_order() {
        let mut values = vec![String::new(); Column::ROW.len()];
        values[0] = "17".to_string();
        values[1] = "bob".to_string();
        values[Column::ROW.len() - 1] = "2025-03-01 10:00:00".to_string();

        let row = RawRegistrationRow::from_values(117, &values);

        assert_eq!(row.entry_id, "17");
        assert_eq!(row.final_number, 117);
        assert_eq!(row.rider_first, "bob");
        assert_eq!(row.date_created, "2025-03-01 10:00:00");
        assert_eq!(row.payment_status, "");
    }
}
