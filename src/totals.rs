// 📊 Rally Totals - one accumulator per run
//
// Updated once per processed row, in processing order. Which counters a row
// touches depends on its status:
//   not cancelled                      → riders, pillions, bikes, routes, periods, flags
//   not (cancelled and loses benefits) → T-shirts, patches, camping, distance
//   every processed row                → money
// Withdrawn rows only bump the withdrawal counter.

use crate::config::RallyConfig;
use crate::entities::{Entrant, Person};
use crate::reconciliation::FeeBreakdown;
use crate::temporal::{reporting_period, ReportingGranularity};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// BREAKDOWNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BikeTally {
    pub make: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeCount {
    pub size: String,
    pub count: i64,
}

/// Entry volume for one reporting period
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PeriodStats {
    pub total: i64,
    pub novices: i64,
    pub members: i64,
    pub legion_branch: i64,
    pub legion_riders: i64,
}

impl PeriodStats {
    fn merge(&mut self, other: &PeriodStats) {
        self.total += other.total;
        self.novices += other.novices;
        self.members += other.members;
        self.legion_branch += other.legion_branch;
        self.legion_riders += other.legion_riders;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MoneyTotals {
    /// Main online payments, after fee-waived rows are balanced
    pub main_payments: i64,
    pub cash: i64,
    pub sponsorship: i64,
    pub fees_due: i64,
    pub forfeited: i64,
}

// ============================================================================
// RALLY TOTALS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct RallyTotals {
    pub riders: i64,
    pub pillions: i64,
    pub novices: i64,
    pub members: i64,
    pub legion_branch: i64,
    pub legion_riders: i64,
    pub camping: i64,
    pub patches: i64,
    pub tshirts: i64,
    pub tshirts_by_size: Vec<SizeCount>,
    /// First-seen order
    pub bikes: Vec<BikeTally>,
    pub routes: BTreeMap<String, i64>,
    /// Keyed by period; keys sort chronologically
    pub periods: BTreeMap<String, PeriodStats>,
    pub distance_min: Option<i64>,
    pub distance_max: Option<i64>,
    pub money: MoneyTotals,
    /// Positions (0-based, among processed rows) of cancelled entries
    pub cancelled_rows: Vec<usize>,
    pub processed: i64,
    pub withdrawn: i64,

    #[serde(skip)]
    bike_index: HashMap<String, usize>,
    #[serde(skip)]
    policy: TotalsPolicy,
}

#[derive(Debug, Clone)]
struct TotalsPolicy {
    cancels_lose_benefits: bool,
    granularity: ReportingGranularity,
    routes: BTreeMap<String, String>,
}

impl RallyTotals {
    pub fn new(cfg: &RallyConfig) -> Self {
        RallyTotals {
            riders: 0,
            pillions: 0,
            novices: 0,
            members: 0,
            legion_branch: 0,
            legion_riders: 0,
            camping: 0,
            patches: 0,
            tshirts: 0,
            tshirts_by_size: cfg
                .tshirt_sizes
                .iter()
                .map(|size| SizeCount {
                    size: size.clone(),
                    count: 0,
                })
                .collect(),
            bikes: Vec::new(),
            routes: BTreeMap::new(),
            periods: BTreeMap::new(),
            distance_min: None,
            distance_max: None,
            money: MoneyTotals::default(),
            cancelled_rows: Vec::new(),
            processed: 0,
            withdrawn: 0,
            bike_index: HashMap::new(),
            policy: TotalsPolicy {
                cancels_lose_benefits: cfg.cancels_lose_benefits,
                granularity: cfg.report_granularity,
                routes: cfg.routes.clone(),
            },
        }
    }

    pub fn record_withdrawn(&mut self) {
        self.withdrawn += 1;
    }

    /// Fold one processed row into the totals
    pub fn add(&mut self, row_index: usize, entrant: &Entrant, fees: &FeeBreakdown) {
        let cancelled = entrant.status.is_cancelled();
        self.processed += 1;

        if !cancelled {
            self.count_participation(entrant);
        }

        if !(cancelled && self.policy.cancels_lose_benefits) {
            self.count_benefits(entrant);
        }

        let money = &mut self.money;
        money.main_payments = money.main_payments.saturating_add(fees.payment_total);
        money.cash = money.cash.saturating_add(fees.cash);
        money.sponsorship = money.sponsorship.saturating_add(fees.sponsorship_credit);
        money.fees_due = money.fees_due.saturating_add(fees.fees_due);
        money.forfeited = money.forfeited.saturating_add(fees.forfeited_fees);

        if cancelled {
            self.cancelled_rows.push(row_index);
        }
    }

    fn count_participation(&mut self, entrant: &Entrant) {
        self.tally_bike(&entrant.bike_make);
        self.riders += 1;

        let mut period = PeriodStats {
            total: 1,
            ..PeriodStats::default()
        };
        count_person(&entrant.rider, &mut period);
        if let Some(pillion) = &entrant.pillion {
            self.pillions += 1;
            count_person(pillion, &mut period);
        }

        self.novices += period.novices;
        self.members += period.members;
        self.legion_branch += period.legion_branch;
        self.legion_riders += period.legion_riders;

        if let Some(route) = self.route_key(&entrant.route) {
            *self.routes.entry(route).or_insert(0) += 1;
        }

        let key = reporting_period(&entrant.entered, self.policy.granularity);
        self.periods.entry(key).or_default().merge(&period);
    }

    fn count_benefits(&mut self, entrant: &Entrant) {
        for shirt in entrant.tshirts() {
            if let Some(slot) = self.tshirts_by_size.iter_mut().find(|s| s.size == shirt) {
                slot.count += 1;
                self.tshirts += 1;
            }
        }

        self.patches = self.patches.saturating_add(entrant.patches);

        if entrant.camping {
            self.camping += 1;
        }

        if let Some(distance) = entrant.distance_to_start {
            self.distance_min = Some(self.distance_min.map_or(distance, |lo| lo.min(distance)));
            self.distance_max = Some(self.distance_max.map_or(distance, |hi| hi.max(distance)));
        }
    }

    fn tally_bike(&mut self, make: &str) {
        match self.bike_index.get(make) {
            Some(&i) => self.bikes[i].count += 1,
            None => {
                self.bike_index.insert(make.to_string(), self.bikes.len());
                self.bikes.push(BikeTally {
                    make: make.to_string(),
                    count: 1,
                });
            }
        }
    }

    /// Configured route code, or the answer itself when there's no code for it
    fn route_key(&self, route: &str) -> Option<String> {
        let route = route.trim();
        let first = route.chars().next()?;

        Some(
            self.policy
                .routes
                .get(&first.to_ascii_uppercase().to_string())
                .cloned()
                .unwrap_or_else(|| route.to_string()),
        )
    }

    pub fn bike_count(&self, make: &str) -> i64 {
        self.bike_index
            .get(make)
            .map(|&i| self.bikes[i].count)
            .unwrap_or(0)
    }

    pub fn size_count(&self, size: &str) -> i64 {
        self.tshirts_by_size
            .iter()
            .find(|s| s.size == size)
            .map(|s| s.count)
            .unwrap_or(0)
    }
}

fn count_person(person: &Person, period: &mut PeriodStats) {
    use crate::entities::LegionStatus;

    if person.is_novice() {
        period.novices += 1;
    }
    if person.is_member() {
        period.members += 1;
    }
    match person.legion {
        LegionStatus::BranchMember => period.legion_branch += 1,
        LegionStatus::Rider => period.legion_riders += 1,
        LegionStatus::None => {}
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciliation::{FeeReconciler, PaymentFields};
    use crate::status::EntryStatus;
    use crate::testkit;

    fn add(totals: &mut RallyTotals, index: usize, entrant: &Entrant) {
        let cfg = testkit::config();
        let fees = FeeReconciler::new(cfg.fee_schedule(), cfg.tshirt_sizes.clone())
            .reconcile(entrant, &PaymentFields::default());
        totals.add(index, entrant, &fees);
    }

    fn shopper(status: EntryStatus) -> Entrant {
        let mut row = testkit::row(1, "Bob", "Stammers");
        row.tshirt1 = "L".to_string();
        row.tshirt2 = "M".to_string();
        row.patches = "2".to_string();
        row.camping = "Yes".to_string();
        row.distance_to_start = "150".to_string();
        testkit::entrant(&row, status)
    }

    #[test]
    fn test_active_entry_counts_everywhere() {
        let cfg = testkit::config();
        let mut totals = RallyTotals::new(&cfg);

        add(&mut totals, 0, &shopper(EntryStatus::Active));

        assert_eq!(totals.riders, 1);
        assert_eq!(totals.bike_count("Triumph"), 1);
        assert_eq!(totals.tshirts, 2);
        assert_eq!(totals.size_count("L"), 1);
        assert_eq!(totals.size_count("M"), 1);
        assert_eq!(totals.patches, 2);
        assert_eq!(totals.camping, 1);
        assert_eq!(totals.distance_min, Some(150));
        assert_eq!(totals.periods["2025-03"].total, 1);
        assert!(totals.cancelled_rows.is_empty());
    }

    #[test]
    fn test_cancellation_toggle_only_moves_benefits() {
        let mut keep = testkit::config();
        keep.cancels_lose_benefits = false;
        let mut lose = testkit::config();
        lose.cancels_lose_benefits = true;

        let entrant = shopper(EntryStatus::Cancelled);

        let mut kept = RallyTotals::new(&keep);
        kept.add(0, &entrant, &FeeBreakdown::default());
        let mut lost = RallyTotals::new(&lose);
        lost.add(0, &entrant, &FeeBreakdown::default());

        assert_eq!(kept.tshirts - lost.tshirts, 2);
        assert_eq!(kept.patches - lost.patches, 2);
        assert_eq!(kept.camping - lost.camping, 1);

        assert_eq!(kept.riders, lost.riders);
        assert_eq!(kept.riders, 0);
        assert_eq!(kept.bikes, lost.bikes);
        assert!(kept.bikes.is_empty());
        assert_eq!(kept.cancelled_rows, vec![0]);
        assert_eq!(lost.cancelled_rows, vec![0]);
    }

    #[test]
    fn test_bikes_keep_first_seen_order() {
        let cfg = testkit::config();
        let mut totals = RallyTotals::new(&cfg);

        for (i, bike) in ["Triumph Tiger", "BMW R1200GS", "triumph bonneville", "Honda"].iter().enumerate() {
            let mut row = testkit::row(i as i64 + 1, "Rider", "Person");
            row.bike = bike.to_string();
            add(&mut totals, i, &testkit::entrant(&row, EntryStatus::Active));
        }

        let makes: Vec<_> = totals.bikes.iter().map(|b| (b.make.as_str(), b.count)).collect();
        assert_eq!(makes, vec![("Triumph", 2), ("BMW", 1), ("Honda", 1)]);
    }

    #[test]
    fn test_distance_ignores_blank_answers() {
        let cfg = testkit::config();
        let mut totals = RallyTotals::new(&cfg);

        let mut near = testkit::row(1, "A", "B");
        near.distance_to_start = "12".to_string();
        let blank = testkit::row(2, "C", "D");
        let mut far = testkit::row(3, "E", "F");
        far.distance_to_start = "about 400 miles".to_string();

        for (i, row) in [near, blank, far].iter().enumerate() {
            add(&mut totals, i, &testkit::entrant(row, EntryStatus::Active));
        }

        assert_eq!(totals.distance_min, Some(12));
        assert_eq!(totals.distance_max, Some(400));
    }

    #[test]
    fn test_routes_and_periods() {
        let cfg = testkit::config();
        let mut totals = RallyTotals::new(&cfg);

        let mut a = testkit::row(1, "A", "B");
        a.route = "A - North clockwise".to_string();
        let mut b = testkit::row(2, "C", "D");
        b.route = "b - North anti-clockwise".to_string();
        b.date_created = "2025-04-10 08:00:00".to_string();
        let mut c = testkit::row(3, "E", "F");
        c.route = "Z - somewhere".to_string();
        c.date_created = "not a date".to_string();

        for (i, row) in [a, b, c].iter().enumerate() {
            add(&mut totals, i, &testkit::entrant(row, EntryStatus::Active));
        }

        assert_eq!(totals.routes["NCW"], 1);
        assert_eq!(totals.routes["NAC"], 1);
        assert_eq!(totals.routes["Z - somewhere"], 1);
        let keys: Vec<_> = totals.periods.keys().cloned().collect();
        assert_eq!(keys, vec!["2025-03", "2025-04", "unknown"]);
    }

    #[test]
    fn test_cancelled_entry_still_owes_for_kept_merchandise() {
        let mut cfg = testkit::config();
        cfg.cancels_lose_benefits = false;
        let reconciler = FeeReconciler::new(cfg.fee_schedule(), cfg.tshirt_sizes.clone());

        let entrant = shopper(EntryStatus::Cancelled);
        let fees = reconciler.reconcile(&entrant, &PaymentFields::default());

        let mut totals = RallyTotals::new(&cfg);
        totals.add(0, &entrant, &fees);

        assert_eq!(totals.riders, 0);
        assert_eq!(totals.tshirts, 2);
        assert_eq!(totals.patches, 2);
        assert_eq!(totals.money.fees_due, 15 * 2 + 5 * 2);
        assert_eq!(totals.money.forfeited, 20);
        assert_eq!(totals.cancelled_rows, vec![0]);
    }

    #[test]
    fn test_weekly_periods_group_by_monday() {
        let mut cfg = testkit::config();
        cfg.report_granularity = ReportingGranularity::Weekly;
        let mut totals = RallyTotals::new(&cfg);

        let dates = ["2025-03-04 09:00:00", "2025-03-08 18:30:00", "2025-03-10 07:15:00"];
        for (i, date) in dates.iter().enumerate() {
            let mut row = testkit::row(i as i64 + 1, "Rider", "Person");
            row.date_created = date.to_string();
            add(&mut totals, i, &testkit::entrant(&row, EntryStatus::Active));
        }

        assert_eq!(totals.periods["2025-03-03"].total, 2);
        assert_eq!(totals.periods["2025-03-10"].total, 1);
        let keys: Vec<_> = totals.periods.keys().cloned().collect();
        assert_eq!(keys, vec!["2025-03-03", "2025-03-10"]);
    }

    #[test]
    fn test_money_sums_saturate() {
        let cfg = testkit::config();
        let mut totals = RallyTotals::new(&cfg);
        let entrant = shopper(EntryStatus::Active);
        let rich = FeeBreakdown {
            payment_total: i64::MAX,
            fees_due: i64::MAX,
            ..FeeBreakdown::default()
        };

        totals.add(0, &entrant, &rich);
        totals.add(1, &entrant, &rich);

        assert_eq!(totals.money.main_payments, i64::MAX);
        assert_eq!(totals.money.fees_due, i64::MAX);
        assert_eq!(totals.processed, 2);
    }

    #[test]
    fn test_withdrawn_only_counts_withdrawals() {
        let cfg = testkit::config();
        let mut totals = RallyTotals::new(&cfg);

        totals.record_withdrawn();
        totals.record_withdrawn();

        assert_eq!(totals.withdrawn, 2);
        assert_eq!(totals.processed, 0);
        assert_eq!(totals.riders, 0);
    }
}
