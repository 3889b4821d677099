// ✅ Data Quality - per-entrant checks that never stop the run
// Each check returns diagnostics; the pipeline logs them and keeps them for the report.

use crate::entities::Entrant;
use crate::status::{needs_payment_note, EntryStatus};
use serde::{Deserialize, Serialize};

// ============================================================================
// DIAGNOSTICS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning, // Someone should look at this before rally day
    Info,    // Worth knowing, nothing to fix
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    DuplicateEntrant,
    NokIsRider,
    NokIsPillion,
    NokSharesMobile,
    PaymentStatus,
    MembershipMismatch,
    MembershipFilled,
    MembershipUnconfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub entry_id: String,
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(entry_id: &str, kind: DiagnosticKind, message: String) -> Self {
        Diagnostic {
            entry_id: entry_id.to_string(),
            kind,
            severity: Severity::Warning,
            message,
        }
    }

    pub fn info(entry_id: &str, kind: DiagnosticKind, message: String) -> Self {
        Diagnostic {
            entry_id: entry_id.to_string(),
            kind,
            severity: Severity::Info,
            message,
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

// ============================================================================
// CHECKS
// ============================================================================

/// The emergency contact should be somebody who isn't on the bike
pub fn check_emergency_contact(entrant: &Entrant) -> Vec<Diagnostic> {
    let mut found = Vec::new();
    let id = entrant.entry_id.as_str();
    let nok = entrant.nok_name.trim();

    if !nok.is_empty() {
        if entrant.rider.full_name() == nok {
            found.push(Diagnostic::warning(
                id,
                DiagnosticKind::NokIsRider,
                format!("Rider {} [#{}] is the emergency contact ({})", nok, id, entrant.nok_relation),
            ));
        } else if let Some(pillion) = entrant.pillion.as_ref().filter(|p| p.full_name() == nok) {
            found.push(Diagnostic::warning(
                id,
                DiagnosticKind::NokIsPillion,
                format!(
                    "Pillion {} [#{}] is the emergency contact ({})",
                    pillion.full_name(),
                    id,
                    entrant.nok_relation
                ),
            ));
        }
    }

    if !entrant.mobile.is_empty() && compact(&entrant.mobile) == compact(&entrant.nok_phone) {
        found.push(Diagnostic::warning(
            id,
            DiagnosticKind::NokSharesMobile,
            format!(
                "Rider {} [#{}] has the same mobile as emergency contact {}",
                entrant.rider.full_name(),
                id,
                entrant.mobile
            ),
        ));
    }

    found
}

/// Active entries not marked as fully paid
pub fn check_payment_status(entrant: &Entrant, payment_status: &str, paid_marker: &str) -> Option<Diagnostic> {
    if !needs_payment_note(entrant.status, payment_status, paid_marker) {
        return None;
    }

    Some(Diagnostic::info(
        &entrant.entry_id,
        DiagnosticKind::PaymentStatus,
        format!(
            "Rider {} [#{}] has payment status = {}",
            entrant.rider.full_name(),
            entrant.entry_id,
            payment_status
        ),
    ))
}

/// One-line verbose note for fee-waived and cancelled entries
pub fn status_note(entrant: &Entrant, payment_status: &str) -> Option<String> {
    let name = entrant.rider.full_name();
    match entrant.status {
        EntryStatus::FeeWaived => Some(format!(
            "Rider {} [#{}] has Paid={} and is therefore free of charge",
            name, entrant.entry_id, payment_status
        )),
        EntryStatus::Cancelled => Some(format!(
            "Rider {} [#{}] has Paid={}",
            name, entrant.entry_id, payment_status
        )),
        _ => None,
    }
}

fn compact(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

// ============================================================================
// TESTS
// ============================================================================
