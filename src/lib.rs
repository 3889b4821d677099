// Rally Registration List - Core Library
// Normalizes entrant registrations and aggregates rally statistics

pub mod config;         // Rally document (TOML)
pub mod words;          // Spelling exceptions (JSON)
pub mod error;
pub mod parser;         // Positional CSV input
pub mod db;             // SQLite staging store
pub mod normalize;      // Names, bikes, phones
pub mod status;
pub mod reconciliation; // Fees, payments, sponsorship
pub mod numbering;      // Final rider numbers
pub mod temporal;       // Reporting periods
pub mod totals;         // Rally-wide aggregation
pub mod lookup;         // Membership reference lists
pub mod deduplication;
pub mod data_quality;
pub mod entities;
pub mod schema;         // Export column layouts
pub mod export;         // CSV + mirror database sinks
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testkit;

// Re-export commonly used types
pub use config::{InputVariant, RallyConfig};
pub use words::WordLists;
pub use error::RallyError;
pub use parser::{parse_lenient_int, InputSource, RawRegistrationRow};
pub use db::{assign_final_numbers, open_database, query_entrants, read_staging_info, stage_csv, StagingInfo};
pub use normalize::{extract_make_model, Normalizer};
pub use status::EntryStatus;
pub use reconciliation::{FeeBreakdown, FeeReconciler, FeeSchedule, PaymentFields};
pub use numbering::{assign_rider_numbers, NumberingOptions, NumberingRow, RiderNumberMap};
pub use temporal::ReportingGranularity;
pub use totals::RallyTotals;
pub use lookup::{LookupOutcome, MembershipLookup, MembershipSource};
pub use data_quality::{Diagnostic, DiagnosticKind, Severity};
pub use entities::{Entrant, EntrantDraft, LegionStatus, Person};
pub use export::{CanonicalCsvSink, ContactsCsvSink, EntrantSink, ExportFile, ExportTarget, MirrorStore};
pub use pipeline::{run_staged, select_lookup, Pipeline, RunReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
