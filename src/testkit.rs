// Shared fixtures for unit tests

use crate::config::RallyConfig;
use crate::entities::{Entrant, EntrantDraft};
use crate::normalize::Normalizer;
use crate::parser::RawRegistrationRow;
use crate::status::EntryStatus;
use crate::words::WordLists;

pub const CONFIG: &str = r#"
    name = "rblr"
    year = "2025"
    rider_fee = 20
    pillion_fee = 10
    tshirt_cost = 15
    patch_cost = 5
    patches_available = true
    tshirt_sizes = ["S", "M", "L", "XL"]
    free_camping = "Yes"
    novice = "novice"
    paid_marker = "Completed"
    admin_fields = [
        "EntryId", "RiderNumber", "RiderFirst", "RiderLast", "RiderMember", "NoviceRider",
        "PillionFirst", "PillionLast", "BikeMakeModel", "Email", "Mobile",
        "NokName", "NokNumber", "Route", "Tshirt1", "Tshirt2", "Patches", "Camping",
        "DistanceToStart", "PaymentTotal", "Cash", "Sponsorship", "PaymentStatus",
        "Withdrawn", "DateCreated",
    ]

    [routes]
    A = "NCW"
    B = "NAC"
"#;

/// Header line matching `CONFIG`'s admin field list
pub const CSV_HEADER: &str = "Entry Id,Rider No,First,Last,Member,Novice,Pillion First,Pillion Last,Bike,Email,Mobile,NOK,NOK Phone,Route,T1,T2,Patches,Camping,Miles,Paid,Cash,Sponsor,Status,Withdrawn,Created";

pub fn config() -> RallyConfig {
    RallyConfig::from_toml_str(CONFIG).unwrap()
}

pub fn words() -> WordLists {
    WordLists {
        name_exceptions: vec!["McCrea".to_string()],
        bike_exceptions: vec!["BMW".to_string(), "Triumph".to_string(), "Royal Enfield".to_string()],
        default_make: "Unknown".to_string(),
        default_bike_pattern: "(?i)^tba".to_string(),
        max_phone: 13,
        ..WordLists::default()
    }
}

pub fn normalizer() -> Normalizer {
    Normalizer::new(&words()).unwrap()
}

pub fn row(entry_id: i64, first: &str, last: &str) -> RawRegistrationRow {
    RawRegistrationRow {
        entry_id: entry_id.to_string(),
        final_number: entry_id,
        rider_first: first.to_string(),
        rider_last: last.to_string(),
        bike: "Triumph Tiger".to_string(),
        payment_status: "Completed".to_string(),
        date_created: "2025-03-05 10:00:00".to_string(),
        ..RawRegistrationRow::default()
    }
}

pub fn entrant(row: &RawRegistrationRow, status: EntryStatus) -> Entrant {
    let cfg = config();
    EntrantDraft::from_row(row, status, &normalizer(), &cfg).freeze(&cfg)
}

/// One CSV line in `CONFIG`'s admin column order; unnamed columns are blank
pub fn csv_record(values: &[(&str, &str)]) -> String {
    config()
        .admin_fields
        .iter()
        .map(|field| {
            values
                .iter()
                .find(|(name, _)| name == field)
                .map(|(_, value)| *value)
                .unwrap_or("")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Header plus the given records
pub fn csv_document(records: &[String]) -> String {
    let mut out = String::from(CSV_HEADER);
    for record in records {
        out.push('\n');
        out.push_str(record);
    }
    out.push('\n');
    out
}
