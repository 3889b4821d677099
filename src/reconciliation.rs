// ⚖️ Fee Reconciliation - what each entrant owes, paid, and gave
//
// For every processed entry:
//   fees_due + forfeited_fees  = everything the entry selected
//   payment_total + cash       = money received
//   balance_due                = received - fees_due (after sponsorship absorbs any surplus)
//
// A negative balance means the entrant still owes money.

use crate::entities::Entrant;
use crate::parser::{parse_lenient_int, parse_pledge, RawRegistrationRow};
use crate::status::EntryStatus;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEE SCHEDULE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub rider_fee: i64,
    pub pillion_fee: i64,
    pub tshirt_cost: i64,
    pub patch_cost: i64,
    pub patches_available: bool,
    pub sponsorship: bool,
    pub cancels_lose_benefits: bool,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        FeeSchedule {
            rider_fee: 0,
            pillion_fee: 0,
            tshirt_cost: 0,
            patch_cost: 0,
            patches_available: false,
            sponsorship: false,
            cancels_lose_benefits: true,
        }
    }
}

// ============================================================================
// PAYMENT FIELDS
// ============================================================================

/// Money columns from the form, parsed leniently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaymentFields {
    /// Original online payment
    pub payment_total: i64,
    /// Later top-up payments
    pub cash: i64,
    /// Sponsorship pledged ("Include £50", "I'll bring 20")
    pub sponsorship: i64,
}

impl PaymentFields {
    pub fn from_row(row: &RawRegistrationRow) -> Self {
        PaymentFields {
            payment_total: parse_lenient_int(&row.payment_total),
            cash: parse_lenient_int(&row.cash),
            sponsorship: parse_pledge(&row.sponsorship),
        }
    }
}

// ============================================================================
// FEE BREAKDOWN
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub rider_fee: i64,
    pub pillion_fee: i64,
    pub tshirt_fees: i64,
    pub patch_fees: i64,
    /// Sum of the four component fees
    pub fees_due: i64,
    /// Fees a cancellation gave up
    pub forfeited_fees: i64,
    /// Main payment; for a fee-waived entry, whatever makes it balance
    pub payment_total: i64,
    pub cash: i64,
    pub sponsorship_credit: i64,
    pub balance_due: i64,
}

impl FeeBreakdown {
    pub fn is_settled(&self) -> bool {
        self.balance_due == 0
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

pub struct FeeReconciler {
    schedule: FeeSchedule,
    tshirt_sizes: Vec<String>,
}

impl FeeReconciler {
    pub fn new(schedule: FeeSchedule, tshirt_sizes: Vec<String>) -> Self {
        FeeReconciler {
            schedule,
            tshirt_sizes,
        }
    }

    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    pub fn reconcile(&self, entrant: &Entrant, payment: &PaymentFields) -> FeeBreakdown {
        let fees = &self.schedule;
        let cancelled = entrant.status.is_cancelled();
        let loses_benefits = cancelled && fees.cancels_lose_benefits;

        let mut b = FeeBreakdown::default();

        // Entry fees are always lost on cancellation
        if cancelled {
            b.forfeited_fees += fees.rider_fee;
        } else {
            b.rider_fee = fees.rider_fee;
        }

        if entrant.has_pillion() {
            if cancelled {
                b.forfeited_fees += fees.pillion_fee;
            } else {
                b.pillion_fee = fees.pillion_fee;
            }
        }

        // Merchandise only when the cancellation policy says so
        let tshirts = entrant.tshirt_count(&self.tshirt_sizes).saturating_mul(fees.tshirt_cost);
        if loses_benefits {
            b.forfeited_fees = b.forfeited_fees.saturating_add(tshirts);
        } else {
            b.tshirt_fees = tshirts;
        }

        if fees.patches_available && entrant.patches > 0 {
            let patches = entrant.patches.saturating_mul(fees.patch_cost);
            if loses_benefits {
                b.forfeited_fees = b.forfeited_fees.saturating_add(patches);
            } else {
                b.patch_fees = patches;
            }
        }

        // Form amounts are unbounded; every sum saturates
        b.fees_due = [b.rider_fee, b.pillion_fee, b.tshirt_fees, b.patch_fees]
            .iter()
            .fold(0i64, |sum, fee| sum.saturating_add(*fee));
        b.cash = payment.cash;
        b.payment_total = if entrant.status == EntryStatus::FeeWaived {
            b.fees_due.saturating_sub(payment.cash)
        } else {
            payment.payment_total
        };

        let received = b.payment_total.saturating_add(b.cash);

        if fees.sponsorship {
            b.sponsorship_credit = b.forfeited_fees.saturating_add(payment.sponsorship);
            let mut due = received.saturating_sub(b.fees_due).saturating_sub(b.sponsorship_credit);
            if due > 0 {
                // Overpayment counts as sponsorship
                b.sponsorship_credit = b.sponsorship_credit.saturating_add(due);
                due = 0;
            }
            b.balance_due = due;
        } else {
            b.balance_due = received.saturating_sub(b.fees_due);
        }

        b
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    fn reconciler(sponsorship: bool, cancels_lose_benefits: bool) -> FeeReconciler {
        let cfg = testkit::config();
        let schedule = FeeSchedule {
            sponsorship,
            cancels_lose_benefits,
            ..cfg.fee_schedule()
        };
        FeeReconciler::new(schedule, cfg.tshirt_sizes)
    }

    fn pay(payment_total: i64, cash: i64, sponsorship: i64) -> PaymentFields {
        PaymentFields {
            payment_total,
            cash,
            sponsorship,
        }
    }

    #[test]
    fn test_rider_and_pillion_paid_in_full() {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.pillion_first = "Jane".to_string();
        row.pillion_last = "Stammers".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::Active);

        let b = reconciler(false, true).reconcile(&entrant, &pay(30, 0, 0));

        assert_eq!(b.rider_fee, 20);
        assert_eq!(b.pillion_fee, 10);
        assert_eq!(b.fees_due, 30);
        assert_eq!(b.balance_due, 0);
        assert_eq!(b.sponsorship_credit, 0);
        assert!(b.is_settled());
    }

    #[test]
    fn test_overpayment_becomes_sponsorship() {
        let entrant = testkit::entrant(&testkit::row(1, "Bob", "Stammers"), EntryStatus::Active);

        let b = reconciler(true, true).reconcile(&entrant, &pay(35, 0, 0));

        assert_eq!(b.fees_due, 20);
        assert_eq!(b.sponsorship_credit, 15);
        assert_eq!(b.balance_due, 0);
    }

    #[test]
    fn test_pledged_sponsorship_not_yet_paid() {
        let entrant = testkit::entrant(&testkit::row(1, "Bob", "Stammers"), EntryStatus::Active);

        let b = reconciler(true, true).reconcile(&entrant, &pay(20, 0, 50));

        assert_eq!(b.sponsorship_credit, 50);
        assert_eq!(b.balance_due, -50, "pledge is still owed");
    }

    #[test]
    fn test_sponsorship_off_ignores_pledge() {
        let entrant = testkit::entrant(&testkit::row(1, "Bob", "Stammers"), EntryStatus::Active);

        let b = reconciler(false, true).reconcile(&entrant, &pay(35, 0, 50));

        assert_eq!(b.sponsorship_credit, 0);
        assert_eq!(b.balance_due, 15);
    }

    #[test]
    fn test_cancelled_entry_forfeits_everything() {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.tshirt1 = "L".to_string();
        row.patches = "2".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::Cancelled);

        let b = reconciler(true, true).reconcile(&entrant, &pay(45, 0, 0));

        assert_eq!(b.fees_due, 0);
        assert_eq!(b.forfeited_fees, 20 + 15 + 10);
        assert_eq!(b.sponsorship_credit, 45, "forfeited fees count as sponsorship");
        assert_eq!(b.balance_due, 0);
    }

    #[test]
    fn test_cancelled_entry_keeps_merchandise_when_configured() {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.tshirt1 = "L".to_string();
        row.tshirt2 = "M".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::Cancelled);

        let b = reconciler(false, false).reconcile(&entrant, &pay(50, 0, 0));

        assert_eq!(b.rider_fee, 0);
        assert_eq!(b.tshirt_fees, 30);
        assert_eq!(b.fees_due, 30);
        assert_eq!(b.forfeited_fees, 20);
        assert_eq!(b.balance_due, 20);
    }

    #[test]
    fn test_fee_waived_balances_to_zero() {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.tshirt1 = "XL".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::FeeWaived);

        let b = reconciler(false, true).reconcile(&entrant, &pay(0, 5, 0));

        assert_eq!(b.fees_due, 35);
        assert_eq!(b.payment_total, 30);
        assert_eq!(b.cash, 5);
        assert_eq!(b.balance_due, 0);
    }

    #[test]
    fn test_patches_not_on_sale_cost_nothing() {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.patches = "3".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::Active);

        let mut r = reconciler(false, true);
        r.schedule.patches_available = false;
        let b = r.reconcile(&entrant, &pay(20, 0, 0));

        assert_eq!(b.patch_fees, 0);
        assert_eq!(b.fees_due, 20);
    }

    #[test]
    fn test_payment_fields_from_row() {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.payment_total = "£30.00".to_string();
        row.cash = "5".to_string();
        row.sponsorship = "Include £50 sponsorship".to_string();

        assert_eq!(PaymentFields::from_row(&row), pay(30, 5, 50));
    }

    #[test]
    fn test_huge_patch_count_saturates() {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.patches = "99999999999999999999".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::Active);
        assert_eq!(entrant.patches, i64::MAX);

        let b = reconciler(true, true).reconcile(&entrant, &pay(20, 0, 0));

        assert_eq!(b.patch_fees, i64::MAX);
        assert_eq!(b.fees_due, i64::MAX);
        assert!(b.balance_due < 0);
    }

    #[test]
    fn test_huge_payment_saturates_sponsorship() {
        let entrant = testkit::entrant(&testkit::row(1, "Bob", "Stammers"), EntryStatus::Active);

        let b = reconciler(true, true).reconcile(&entrant, &pay(i64::MAX, i64::MAX, 0));

        assert_eq!(b.balance_due, 0);
        assert_eq!(b.sponsorship_credit, i64::MAX - 20);
    }

    #[test]
    fn test_cancelled_keeps_shirts_and_patches_when_configured() {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.tshirt1 = "L".to_string();
        row.patches = "2".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::Cancelled);

        let b = reconciler(false, false).reconcile(&entrant, &pay(25, 0, 0));

        assert_eq!(b.rider_fee, 0);
        assert_eq!(b.tshirt_fees, 15);
        assert_eq!(b.patch_fees, 10);
        assert_eq!(b.fees_due, 25);
        assert_eq!(b.forfeited_fees, 20, "only the entry fee is lost");
        assert_eq!(b.balance_due, 0);
    }

    #[test]
    fn test_pledge_reads_the_same_as_the_entrant() {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.sponsorship = "£50 - thanks".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::Active);

        assert_eq!(PaymentFields::from_row(&row).sponsorship, entrant.sponsorship);
        assert_eq!(entrant.sponsorship, 0);
    }
}
