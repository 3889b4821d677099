// 🪞 Mirror Record - the row written to the rally's own database
// The rally-day application reads this table to run check-in and certificates.

use super::entrant::{Entrant, Person};
use crate::config::RallyConfig;
use serde::{Deserialize, Serialize};

/// Every entrant starts the rally as "did not start"
pub const STATUS_DNS: i64 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MirrorPerson {
    pub first: String,
    pub last: String,
    pub address1: String,
    pub address2: String,
    pub town: String,
    pub county: String,
    pub postcode: String,
    pub country: String,
    pub membership: String,
    pub legion: String,
    pub phone: String,
    pub email: String,
}

impl MirrorPerson {
    fn from_person(person: &Person) -> Self {
        MirrorPerson {
            first: person.first.clone(),
            last: person.last.clone(),
            membership: person.membership.clone(),
            legion: person.legion.code().to_string(),
            ..MirrorPerson::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorRecord {
    pub entrant_id: i64,
    pub entrant_status: i64,
    pub rider: MirrorPerson,
    pub pillion: MirrorPerson,
    pub bike: String,
    pub bike_reg: String,
    pub nok_name: String,
    pub nok_relation: String,
    pub nok_phone: String,
    /// Route code ("NCW"), empty when the answer has no configured code
    pub route: String,
    pub odo_counts: String,
    pub entry_donation: String,
    pub free_camping: String,
    pub certificate_available: String,
    pub tshirt1: String,
    pub tshirt2: String,
    pub patches: i64,
}

impl MirrorRecord {
    pub fn from_entrant(entrant: &Entrant, cfg: &RallyConfig) -> Self {
        let rider = MirrorPerson {
            address1: entrant.address1.clone(),
            address2: entrant.address2.clone(),
            town: entrant.town.clone(),
            county: entrant.county.clone(),
            postcode: entrant.postcode.clone(),
            country: entrant.country.clone(),
            phone: entrant.mobile.clone(),
            email: entrant.email.clone(),
            ..MirrorPerson::from_person(&entrant.rider)
        };

        let pillion = entrant
            .pillion
            .as_ref()
            .map(MirrorPerson::from_person)
            .unwrap_or_default();

        MirrorRecord {
            entrant_id: entrant.rider_number,
            entrant_status: STATUS_DNS,
            rider,
            pillion,
            bike: entrant.bike.clone(),
            bike_reg: entrant.registration.clone(),
            nok_name: entrant.nok_name.clone(),
            nok_relation: entrant.nok_relation.clone(),
            nok_phone: entrant.nok_phone.clone(),
            route: cfg.route_code(&entrant.route).unwrap_or_default().to_string(),
            odo_counts: entrant.odo_units.clone(),
            entry_donation: if entrant.sponsorship > 0 {
                entrant.sponsorship.to_string()
            } else {
                String::new()
            },
            free_camping: if entrant.camping { "Y" } else { "" }.to_string(),
            certificate_available: "Y".to_string(),
            tshirt1: entrant.tshirt1.clone(),
            tshirt2: entrant.tshirt2.clone(),
            patches: entrant.patches,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::EntrantDraft;
    use crate::normalize::Normalizer;
    use crate::parser::RawRegistrationRow;
    use crate::status::EntryStatus;
    use crate::words::WordLists;

    #[test]
    fn test_mirror_record_from_entrant() {
        let cfg = RallyConfig::from_toml_str(
            r#"
            name = "rblr"
            year = "2025"
            free_camping = "Yes"
            admin_fields = ["EntryId", "RiderFirst", "RiderLast"]

            [routes]
            B = "NAC"
            "#,
        )
        .unwrap();
        let normalizer = Normalizer::new(&WordLists::default()).unwrap();
        let row = RawRegistrationRow {
            entry_id: "4".to_string(),
            final_number: 104,
            rider_first: "bob".to_string(),
            rider_last: "stammers".to_string(),
            route: "B - North anti-clockwise".to_string(),
            camping: "Yes".to_string(),
            sponsorship: "25".to_string(),
            email: "bob@example.com".to_string(),
            ..RawRegistrationRow::default()
        };

        let entrant = EntrantDraft::from_row(&row, EntryStatus::Cancelled, &normalizer, &cfg).freeze(&cfg);
        let mirror = MirrorRecord::from_entrant(&entrant, &cfg);

        assert_eq!(mirror.entrant_id, 104);
        assert_eq!(mirror.entrant_status, STATUS_DNS);
        assert_eq!(mirror.rider.first, "Bob");
        assert_eq!(mirror.rider.email, "bob@example.com");
        assert_eq!(mirror.pillion, MirrorPerson::default());
        assert_eq!(mirror.route, "NAC");
        assert_eq!(mirror.free_camping, "Y");
        assert_eq!(mirror.entry_donation, "25");
        assert_eq!(mirror.certificate_available, "Y");
    }
}
