// 🔢 Rider Numbers
// Each entry gets the number painted on the rider's flag. Computed once from the
// staged rows, persisted as FinalRiderNumber, never recomputed during the run.

use crate::error::RallyError;
use crate::parser::parse_lenient_int;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;

/// Inputs for one staged row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingRow {
    pub entry_id: String,
    /// Manually assigned number ("RiderNumber" column), 0 when none
    pub manual: i64,
    pub withdrawn: bool,
}

impl NumberingRow {
    pub fn new(entry_id: &str, manual: &str, withdrawn: bool) -> Self {
        NumberingRow {
            entry_id: entry_id.to_string(),
            manual: parse_lenient_int(manual),
            withdrawn,
        }
    }

    fn numeric_id(&self) -> i64 {
        parse_lenient_int(&self.entry_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumberingOptions {
    /// Added to every computed number ("entries start at 100")
    pub offset: i64,
    /// Number 1, 2, 3... in entry-id order instead of reusing the entry id
    pub sequential: bool,
}

// ============================================================================
// RIDER NUMBER MAP
// ============================================================================

/// Entry id → final rider number
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiderNumberMap {
    numbers: BTreeMap<String, i64>,
}

impl RiderNumberMap {
    pub fn get(&self, entry_id: &str) -> Option<i64> {
        self.numbers.get(entry_id).copied()
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.numbers.iter().map(|(id, n)| (id.as_str(), *n))
    }
}

// ============================================================================
// ASSIGNMENT
// ============================================================================

/// Assign final numbers.
///
/// Rows are taken in numeric entry-id order whatever order they were staged in.
/// Withdrawn rows keep their entry id and don't advance the sequence. A non-zero
/// manual number always wins. Two live entries sharing a number is an error.
pub fn assign_rider_numbers(rows: &[NumberingRow], options: NumberingOptions) -> Result<RiderNumberMap, RallyError> {
    let mut ordered: Vec<&NumberingRow> = rows.iter().collect();
    ordered.sort_by_key(|r| (r.numeric_id(), r.entry_id.clone()));

    let mut numbers = BTreeMap::new();
    let mut sequence: i64 = 0;

    for row in &ordered {
        let candidate = if row.withdrawn {
            row.numeric_id()
        } else if options.sequential {
            sequence += 1;
            sequence.saturating_add(options.offset)
        } else {
            row.numeric_id().saturating_add(options.offset)
        };

        let number = if row.manual != 0 { row.manual } else { candidate };
        numbers.insert(row.entry_id.clone(), number);
    }

    check_collisions(&ordered, &numbers)?;

    Ok(RiderNumberMap { numbers })
}

fn check_collisions(ordered: &[&NumberingRow], numbers: &BTreeMap<String, i64>) -> Result<(), RallyError> {
    let mut seen: HashMap<i64, &str> = HashMap::new();

    for row in ordered.iter().filter(|r| !r.withdrawn) {
        let Some(&number) = numbers.get(&row.entry_id) else {
            continue;
        };
        if let Some(first) = seen.insert(number, &row.entry_id) {
            return Err(RallyError::DuplicateRiderNumber {
                number,
                first: first.to_string(),
                second: row.entry_id.clone(),
            });
        }
    }

    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
