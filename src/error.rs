// Typed failures for the registration pipeline
// Everything here is fatal: the run stops before any output is written.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RallyError {
    /// A CSV record doesn't line up with the configured field list
    #[error("line {line}: expected {expected} columns but found {found}")]
    ColumnCountMismatch {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// A column the engine reads is missing from the configured field list
    #[error("field list is missing required column {0:?}")]
    MissingColumn(&'static str),

    /// Two live entrants ended up with the same display number
    #[error("rider number {number} assigned to both entry {first} and entry {second}")]
    DuplicateRiderNumber {
        number: i64,
        first: String,
        second: String,
    },

    /// A word-list regex failed to compile
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("remote input {0} needs the `online` feature")]
    RemoteInputUnsupported(String),
}
