// 🚦 Entry Status
// One status per registration row, derived once from two raw form fields.

use serde::{Deserialize, Serialize};

pub const WITHDRAWN_MARKER: &str = "Withdrawn";
pub const REFUNDED_MARKER: &str = "Refunded";
pub const CANCELLED_MARKER: &str = "Cancelled";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Normal entry; counted everywhere
    Active,
    /// Paid but then cancelled; fees forfeit, excluded from rider counts
    Cancelled,
    /// Provisional entry that never completed; ignored by the whole run
    Withdrawn,
    /// Free of charge: whatever is due is treated as paid
    FeeWaived,
}

impl EntryStatus {
    /// Exact, case-sensitive match on the raw values. Withdrawn wins over
    /// any payment status.
    pub fn classify(payment_status: &str, withdrawn: &str) -> Self {
        if withdrawn == WITHDRAWN_MARKER {
            EntryStatus::Withdrawn
        } else if payment_status == REFUNDED_MARKER {
            EntryStatus::FeeWaived
        } else if payment_status == CANCELLED_MARKER {
            EntryStatus::Cancelled
        } else {
            EntryStatus::Active
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EntryStatus::Cancelled)
    }

    pub fn is_withdrawn(&self) -> bool {
        matches!(self, EntryStatus::Withdrawn)
    }

    pub fn name(&self) -> &str {
        match self {
            EntryStatus::Active => "active",
            EntryStatus::Cancelled => "cancelled",
            EntryStatus::Withdrawn => "withdrawn",
            EntryStatus::FeeWaived => "fee-waived",
        }
    }

    /// Does this row show up in the canonical and contacts exports?
    pub fn is_exported(&self) -> bool {
        matches!(self, EntryStatus::Active | EntryStatus::FeeWaived)
    }
}

/// An active entry that isn't marked fully paid deserves a second look
pub fn needs_payment_note(status: EntryStatus, payment_status: &str, paid_marker: &str) -> bool {
    status == EntryStatus::Active && payment_status != paid_marker
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        let cases = [
            ("Completed", "", EntryStatus::Active),
            ("Unpaid", "", EntryStatus::Active),
            ("", "", EntryStatus::Active),
            ("Refunded", "", EntryStatus::FeeWaived),
            ("Cancelled", "", EntryStatus::Cancelled),
            ("Completed", "Withdrawn", EntryStatus::Withdrawn),
            ("Refunded", "Withdrawn", EntryStatus::Withdrawn),
            ("Cancelled", "Withdrawn", EntryStatus::Withdrawn),
            ("cancelled", "", EntryStatus::Active),
            ("Completed", "withdrawn", EntryStatus::Active),
            ("Refunded ", "", EntryStatus::Active),
        ];

        for (payment, withdrawn, expected) in cases {
            assert_eq!(
                EntryStatus::classify(payment, withdrawn),
                expected,
                "payment={:?} withdrawn={:?}",
                payment,
                withdrawn
            );
        }
    }

    #[test]
    fn test_export_filter() {
        assert!(EntryStatus::Active.is_exported());
        assert!(EntryStatus::FeeWaived.is_exported());
        assert!(!EntryStatus::Cancelled.is_exported());
        assert!(!EntryStatus::Withdrawn.is_exported());
    }

    #[test]
    fn test_payment_note() {
        assert!(needs_payment_note(EntryStatus::Active, "Unpaid", "Completed"));
        assert!(!needs_payment_note(EntryStatus::Active, "Completed", "Completed"));
        assert!(!needs_payment_note(EntryStatus::Cancelled, "Cancelled", "Completed"));
        assert!(!needs_payment_note(EntryStatus::FeeWaived, "Refunded", "Completed"));
    }
}
