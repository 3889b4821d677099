// 🏍️ Entrant Entity - the canonical record for one registration
//
// Built in two steps:
//   1. EntrantDraft: names and bike normalized, membership numbers still editable
//   2. Entrant: frozen once the membership lookup has had its say
//
// Everything downstream (fees, totals, exports) only ever sees the frozen Entrant.

use crate::config::RallyConfig;
use crate::normalize::{self, Normalizer};
use crate::parser::{parse_lenient_int, parse_pledge, RawRegistrationRow};
use crate::status::EntryStatus;
use serde::{Deserialize, Serialize};

// ============================================================================
// LEGION STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LegionStatus {
    #[default]
    None,
    /// Member of the sponsoring branch
    BranchMember,
    /// Rides with the branch without being a member
    Rider,
}

impl LegionStatus {
    /// Single-letter code used in exports
    pub fn code(&self) -> &'static str {
        match self {
            LegionStatus::None => "",
            LegionStatus::BranchMember => "L",
            LegionStatus::Rider => "R",
        }
    }
}

// ============================================================================
// PERSON
// ============================================================================

/// Rider or pillion after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Person {
    pub first: String,
    pub last: String,
    /// Membership number, "n/a" for a declared non-member, "" if unknown
    pub membership: String,
    pub novice: bool,
    pub legion: LegionStatus,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first, self.last).trim().to_string()
    }

    pub fn is_member(&self) -> bool {
        !self.membership.is_empty() && self.membership != "n/a"
    }

    pub fn is_novice(&self) -> bool {
        self.novice
    }
}

/// A person whose membership number may still be corrected
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DraftPerson {
    pub first: String,
    pub last: String,
    pub membership: String,
    novice_answer: String,
    legion_answer: String,
}

impl DraftPerson {
    pub fn new(first: &str, last: &str, membership: &str) -> Self {
        DraftPerson {
            first: first.to_string(),
            last: last.to_string(),
            membership: membership.to_string(),
            ..DraftPerson::default()
        }
    }

    fn freeze(self, cfg: &RallyConfig) -> Person {
        let novice = normalize::is_novice(
            &self.novice_answer,
            &self.membership,
            &cfg.novice,
            &cfg.member_check_keyword,
        );
        let legion = normalize::legion_status(&self.legion_answer, &cfg.legion_member, &cfg.legion_rider);

        Person {
            first: self.first,
            last: self.last,
            membership: self.membership,
            novice,
            legion,
        }
    }
}

// ============================================================================
// ENTRANT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entrant {
    /// Entry id assigned by the form service
    pub entry_id: String,
    /// Number shown on the rider's flag and in every export
    pub rider_number: i64,
    pub status: EntryStatus,

    pub rider: Person,
    pub pillion: Option<Person>,

    // Bike
    pub bike: String,
    pub bike_make: String,
    pub bike_model: String,
    pub registration: String,
    pub odo_units: String,

    // Contact
    pub email: String,
    pub mobile: String,
    pub address1: String,
    pub address2: String,
    pub town: String,
    pub county: String,
    pub postcode: String,
    pub country: String,

    // Emergency contact
    pub nok_name: String,
    pub nok_phone: String,
    pub nok_relation: String,

    // Rally choices
    pub bonus_claim_method: String,
    pub route: String,
    pub tshirt1: String,
    pub tshirt2: String,
    pub patches: i64,
    pub camping: bool,
    /// Miles to the start; None when the form left it blank
    pub distance_to_start: Option<i64>,
    /// Sponsorship pledged on the form (0 when none)
    pub sponsorship: i64,
    pub entered: String,
}

impl Entrant {
    pub fn has_pillion(&self) -> bool {
        self.pillion.is_some()
    }

    pub fn short_make(&self) -> &str {
        normalize::short_make(&self.bike_make)
    }

    /// Selected T-shirts, in form order
    pub fn tshirts(&self) -> impl Iterator<Item = &str> {
        [self.tshirt1.as_str(), self.tshirt2.as_str()]
            .into_iter()
            .filter(|size| !size.is_empty())
    }

    /// Number of T-shirt selections matching an offered size
    pub fn tshirt_count(&self, sizes: &[String]) -> i64 {
        self.tshirts()
            .filter(|t| sizes.iter().any(|s| s == t))
            .count() as i64
    }
}

// ============================================================================
// DRAFT
// ============================================================================

/// An entrant whose membership numbers haven't been verified yet
#[derive(Debug, Clone)]
pub struct EntrantDraft {
    pub rider: DraftPerson,
    pub pillion: Option<DraftPerson>,
    entrant: Entrant,
}

impl EntrantDraft {
    pub fn from_row(row: &RawRegistrationRow, status: EntryStatus, normalizer: &Normalizer, cfg: &RallyConfig) -> Self {
        let rider = DraftPerson {
            first: normalizer.normalize_name(&row.rider_first),
            last: normalizer.normalize_name(&row.rider_last),
            membership: normalize::format_membership(&row.rider_member),
            novice_answer: row.novice_rider.clone(),
            legion_answer: row.rider_legion.clone(),
        };

        // "Pillion coming" with no surname means same surname as the rider
        let pillion_last = if normalize::has_pillion_answer(&row.has_pillion) && row.pillion_last.trim().is_empty() {
            rider.last.clone()
        } else {
            normalizer.normalize_name(&row.pillion_last)
        };
        let pillion_first = normalizer.normalize_name(&row.pillion_first);

        let pillion = if !pillion_first.is_empty() && !pillion_last.is_empty() {
            Some(DraftPerson {
                first: pillion_first,
                last: pillion_last,
                membership: normalize::format_membership(&row.pillion_member),
                novice_answer: row.novice_pillion.clone(),
                legion_answer: row.pillion_legion.clone(),
            })
        } else {
            None
        };

        let bike = normalizer.normalize_bike_description(&row.bike);
        let (bike_make, bike_model) = normalizer.resolve_make_model(&bike);

        let distance_to_start = if row.distance_to_start.trim().is_empty() {
            None
        } else {
            Some(parse_lenient_int(&row.distance_to_start))
        };

        let entrant = Entrant {
            entry_id: row.entry_id.trim().to_string(),
            rider_number: row.final_number,
            status,
            rider: Person::default(),
            pillion: None,
            bike,
            bike_make,
            bike_model,
            registration: row.registration.trim().to_uppercase(),
            odo_units: normalize::odometer_units(&row.odo_counts).to_string(),
            email: row.email.trim().to_string(),
            mobile: normalizer.trim_phone(&row.mobile),
            address1: row.address1.trim().to_string(),
            address2: row.address2.trim().to_string(),
            town: row.town.trim().to_string(),
            county: row.county.trim().to_string(),
            postcode: row.postcode.trim().to_uppercase(),
            country: row.country.trim().to_string(),
            nok_name: normalizer.normalize_name(&row.nok_name),
            nok_phone: normalizer.trim_phone(&row.nok_number),
            nok_relation: normalizer.normalize_name(&row.nok_relation),
            bonus_claim_method: row.bonus_claim_method.trim().to_string(),
            route: row.route.trim().to_string(),
            tshirt1: row.tshirt1.trim().to_string(),
            tshirt2: row.tshirt2.trim().to_string(),
            patches: parse_lenient_int(&row.patches).max(0),
            camping: normalize::takes_free_camping(&row.camping, &cfg.free_camping),
            distance_to_start,
            sponsorship: parse_pledge(&row.sponsorship),
            entered: row.date_created.trim().to_string(),
        };

        EntrantDraft {
            rider,
            pillion,
            entrant,
        }
    }

    pub fn entry_id(&self) -> &str {
        &self.entrant.entry_id
    }

    pub fn email(&self) -> &str {
        &self.entrant.email
    }

    /// Compute the membership-dependent flags and freeze
    pub fn freeze(self, cfg: &RallyConfig) -> Entrant {
        Entrant {
            rider: self.rider.freeze(cfg),
            pillion: self.pillion.map(|p| p.freeze(cfg)),
            ..self.entrant
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::words::WordLists;

    fn config() -> RallyConfig {
        RallyConfig::from_toml_str(
            r#"
            name = "rblr"
            year = "2025"
            novice = "novice"
            member_check_keyword = "check"
            free_camping = "Yes"
            legion_member = "Branch member"
            legion_rider = "Rider"
            tshirt_sizes = ["S", "M", "L"]
            admin_fields = ["EntryId", "RiderFirst", "RiderLast"]
            "#,
        )
        .unwrap()
    }

    fn normalizer() -> Normalizer {
        let words = WordLists {
            name_exceptions: vec!["McCrea".to_string()],
            bike_exceptions: vec!["BMW".to_string(), "GS".to_string()],
            default_make: "Unknown".to_string(),
            max_phone: 13,
            ..WordLists::default()
        };
        Normalizer::new(&words).unwrap()
    }

    fn row() -> RawRegistrationRow {
        RawRegistrationRow {
            entry_id: "17".to_string(),
            final_number: 117,
            rider_first: "colin".to_string(),
            rider_last: "MCCREA".to_string(),
            rider_member: "12345.0".to_string(),
            novice_rider: "Please check my number".to_string(),
            rider_legion: "Branch member".to_string(),
            bike: "bmw r1200gs".to_string(),
            registration: "ab12 cde".to_string(),
            odo_counts: "Kilometres".to_string(),
            mobile: "0044 7700 900123".to_string(),
            postcode: "ls1 4ab".to_string(),
            nok_name: "JANE MCCREA".to_string(),
            tshirt1: "M".to_string(),
            tshirt2: "XXL".to_string(),
            patches: "2".to_string(),
            camping: "Yes".to_string(),
            distance_to_start: "120 miles".to_string(),
            sponsorship: "I'll bring £50".to_string(),
            date_created: "2025-03-05 14:22:01".to_string(),
            ..RawRegistrationRow::default()
        }
    }

    #[test]
    fn test_draft_normalizes_fields() {
        let cfg = config();
        let entrant = EntrantDraft::from_row(&row(), EntryStatus::Active, &normalizer(), &cfg).freeze(&cfg);

        assert_eq!(entrant.rider.full_name(), "Colin McCrea");
        assert_eq!(entrant.rider.membership, "12345");
        assert!(entrant.rider.is_member());
        assert!(!entrant.rider.is_novice(), "member with 'check' answer isn't a novice");
        assert_eq!(entrant.rider.legion, LegionStatus::BranchMember);
        assert_eq!(entrant.rider_number, 117);
        assert_eq!(entrant.bike, "BMW r1200GS");
        assert_eq!(entrant.bike_make, "BMW");
        assert_eq!(entrant.bike_model, "r1200GS");
        assert_eq!(entrant.registration, "AB12 CDE");
        assert_eq!(entrant.postcode, "LS1 4AB");
        assert_eq!(entrant.odo_units, "K");
        assert_eq!(entrant.mobile, "+447700900123");
        assert_eq!(entrant.nok_name, "Jane McCrea");
        assert_eq!(entrant.patches, 2);
        assert!(entrant.camping);
        assert_eq!(entrant.distance_to_start, Some(120));
        assert_eq!(entrant.sponsorship, 50);
        assert!(!entrant.has_pillion());
    }

    #[test]
    fn test_membership_set_before_freeze_drives_novice_flag() {
        let cfg = config();
        let mut raw = row();
        raw.rider_member = String::new();

        let mut draft = EntrantDraft::from_row(&raw, EntryStatus::Active, &normalizer(), &cfg);
        let unverified = draft.clone().freeze(&cfg);
        assert!(unverified.rider.is_novice());

        draft.rider.membership = "999".to_string();
        let verified = draft.freeze(&cfg);
        assert!(!verified.rider.is_novice());
        assert!(verified.rider.is_member());
    }

    #[test]
    fn test_pillion_inherits_rider_surname() {
        let cfg = config();
        let mut raw = row();
        raw.pillion_first = "JANE".to_string();
        raw.has_pillion = "Yes".to_string();

        let entrant = EntrantDraft::from_row(&raw, EntryStatus::Active, &normalizer(), &cfg).freeze(&cfg);
        let pillion = entrant.pillion.expect("pillion present");

        assert_eq!(pillion.full_name(), "Jane McCrea");
    }

    #[test]
    fn test_no_pillion_answer_means_no_pillion() {
        let cfg = config();
        let mut raw = row();
        raw.pillion_first = "Jane".to_string();
        raw.has_pillion = "No pillion".to_string();

        let entrant = EntrantDraft::from_row(&raw, EntryStatus::Active, &normalizer(), &cfg).freeze(&cfg);
        assert!(entrant.pillion.is_none());
    }

    #[test]
    fn test_tshirt_count_only_counts_offered_sizes() {
        let cfg = config();
        let entrant = EntrantDraft::from_row(&row(), EntryStatus::Active, &normalizer(), &cfg).freeze(&cfg);

        assert_eq!(entrant.tshirt_count(&cfg.tshirt_sizes), 1);
    }

    #[test]
    fn test_blank_distance_is_none() {
        let cfg = config();
        let mut raw = row();
        raw.distance_to_start = "  ".to_string();

        let entrant = EntrantDraft::from_row(&raw, EntryStatus::Active, &normalizer(), &cfg).freeze(&cfg);
        assert_eq!(entrant.distance_to_start, None);
    }
}
