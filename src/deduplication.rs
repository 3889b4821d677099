// 🔍 Duplicate Entrants
// The form lets people register twice. Same normalized name on two live entries
// is almost always a resubmission; the second and later ones get flagged.

use crate::data_quality::{Diagnostic, DiagnosticKind};
use crate::entities::Entrant;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct DuplicateDetector {
    /// Lower-cased full name → first entry id seen with it
    seen: HashMap<String, String>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entrant; returns a warning when the name has been seen before.
    /// Cancelled entries are ignored.
    pub fn check(&mut self, entrant: &Entrant) -> Option<Diagnostic> {
        if entrant.status.is_cancelled() || entrant.status.is_withdrawn() {
            return None;
        }

        let key = name_key(&entrant.rider.full_name());
        if key.is_empty() {
            return None;
        }

        match self.seen.get(&key) {
            Some(first) => Some(Diagnostic::warning(
                &entrant.entry_id,
                DiagnosticKind::DuplicateEntrant,
                format!(
                    "Rider {} [#{}] is already entered as #{}",
                    entrant.rider.full_name(),
                    entrant.entry_id,
                    first
                ),
            )),
            None => {
                self.seen.insert(key, entrant.entry_id.clone());
                None
            }
        }
    }
}

fn name_key(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
