// ⏰ Reporting Periods
// Entry volume is bucketed by the week or month the form was submitted.
// Timestamps come from the form service as "YYYY-MM-DD HH:MM:SS".

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Bucket key for entries whose timestamp can't be read
pub const UNKNOWN_PERIOD: &str = "unknown";

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

// ============================================================================
// GRANULARITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportingGranularity {
    Weekly,
    #[default]
    Monthly,
}

// ============================================================================
// PERIOD KEYS
// ============================================================================

/// Parse the submission timestamp; a bare date is accepted too
pub fn parse_entered(entered: &str) -> Option<NaiveDate> {
    let trimmed = entered.trim();

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|dt| dt.date())
        .or_else(|| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok())
}

/// Reporting period key for an entry date.
///
/// Weekly periods are keyed by the Monday starting the week ("2025-03-03"),
/// monthly periods by "YYYY-MM". Keys sort chronologically as strings.
pub fn reporting_period(entered: &str, granularity: ReportingGranularity) -> String {
    let Some(date) = parse_entered(entered) else {
        return UNKNOWN_PERIOD.to_string();
    };

    match granularity {
        ReportingGranularity::Weekly => {
            let back = i64::from(date.weekday().num_days_from_monday());
            (date - Duration::days(back)).format("%Y-%m-%d").to_string()
        }
        ReportingGranularity::Monthly => date.format("%Y-%m").to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
