// 📐 Export Schemas
// Column layouts for the CSV exports. Each layout is one ordered list so the
// header and every row can never drift apart.

use crate::entities::{Entrant, Person};

// ============================================================================
// EXPORT KINDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportSchema {
    /// Cleaned-up entrant record, one column per field
    Canonical,
    /// Address-book import layout (name + email, grouped by rally)
    Contacts,
}

impl ExportSchema {
    pub fn name(&self) -> &str {
        match self {
            ExportSchema::Canonical => "canonical",
            ExportSchema::Contacts => "contacts",
        }
    }
}

// ============================================================================
// CANONICAL LAYOUT
// ============================================================================

/// One export column: header text and how to read it off an entrant
pub struct Field {
    pub name: &'static str,
    pub get: fn(&Entrant) -> String,
}

impl Field {
    fn new(name: &'static str, get: fn(&Entrant) -> String) -> Self {
        Field { name, get }
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "Y" } else { "N" }.to_string()
}

fn pillion_field(e: &Entrant, get: fn(&Person) -> String) -> String {
    e.pillion.as_ref().map(get).unwrap_or_default()
}

pub fn canonical_fields() -> Vec<Field> {
    vec![
        Field::new("EntrantId", |e| e.rider_number.to_string()),
        Field::new("RiderFirst", |e| e.rider.first.clone()),
        Field::new("RiderLast", |e| e.rider.last.clone()),
        Field::new("RiderMember", |e| e.rider.membership.clone()),
        Field::new("RiderNovice", |e| yes_no(e.rider.novice)),
        Field::new("RiderLegion", |e| e.rider.legion.code().to_string()),
        Field::new("PillionFirst", |e| pillion_field(e, |p| p.first.clone())),
        Field::new("PillionLast", |e| pillion_field(e, |p| p.last.clone())),
        Field::new("PillionMember", |e| pillion_field(e, |p| p.membership.clone())),
        Field::new("PillionNovice", |e| pillion_field(e, |p| yes_no(p.novice))),
        Field::new("PillionLegion", |e| pillion_field(e, |p| p.legion.code().to_string())),
        Field::new("Bike", |e| e.bike.clone()),
        Field::new("BikeMake", |e| e.bike_make.clone()),
        Field::new("BikeModel", |e| e.bike_model.clone()),
        Field::new("BikeReg", |e| e.registration.clone()),
        Field::new("OdoUnits", |e| e.odo_units.clone()),
        Field::new("Email", |e| e.email.clone()),
        Field::new("Phone", |e| e.mobile.clone()),
        Field::new("Address1", |e| e.address1.clone()),
        Field::new("Address2", |e| e.address2.clone()),
        Field::new("Town", |e| e.town.clone()),
        Field::new("County", |e| e.county.clone()),
        Field::new("Postcode", |e| e.postcode.clone()),
        Field::new("Country", |e| e.country.clone()),
        Field::new("NokName", |e| e.nok_name.clone()),
        Field::new("NokPhone", |e| e.nok_phone.clone()),
        Field::new("NokRelation", |e| e.nok_relation.clone()),
        Field::new("BonusClaimMethod", |e| e.bonus_claim_method.clone()),
        Field::new("Route", |e| e.route.clone()),
        Field::new("Tshirt1", |e| e.tshirt1.clone()),
        Field::new("Tshirt2", |e| e.tshirt2.clone()),
        Field::new("Patches", |e| e.patches.to_string()),
        Field::new("Camping", |e| if e.camping { "Y" } else { "" }.to_string()),
        Field::new("DistanceToStart", |e| {
            e.distance_to_start.map(|d| d.to_string()).unwrap_or_default()
        }),
        Field::new("Sponsorship", |e| {
            if e.sponsorship > 0 {
                e.sponsorship.to_string()
            } else {
                String::new()
            }
        }),
        Field::new("EnteredDate", |e| e.entered.clone()),
    ]
}

pub fn canonical_header(fields: &[Field]) -> Vec<&'static str> {
    fields.iter().map(|f| f.name).collect()
}

pub fn canonical_row(fields: &[Field], entrant: &Entrant) -> Vec<String> {
    fields.iter().map(|f| (f.get)(entrant)).collect()
}

// ============================================================================
// CONTACTS LAYOUT
// ============================================================================

pub const CONTACTS_HEADER: &[&str] = &[
    "Name",
    "Given Name",
    "Additional Name",
    "Family Name",
    "Yomi Name",
    "Given Name Yomi",
    "Additional Name Yomi",
    "Family Name Yomi",
    "Name Prefix",
    "Name Suffix",
    "Initials",
    "Nickname",
    "Short Name",
    "Maiden Name",
    "Birthday",
    "Gender",
    "Location",
    "Billing Information",
    "Directory Server",
    "Mileage",
    "Occupation",
    "Hobby",
    "Sensitivity",
    "Priority",
    "Subject",
    "Notes",
    "Language",
    "Photo",
    "Group Membership",
    "E-mail 1 - Type",
    "E-mail 1 - Value",
    "E-mail 2 - Type",
    "E-mail 2 - Value",
    "Website 1 - Type",
    "Website 1 - Value",
];

/// Contact row for the rider, filed under `group` ("rblr2025")
pub fn contacts_row(entrant: &Entrant, group: &str) -> Vec<String> {
    let mut row = vec![String::new(); CONTACTS_HEADER.len()];

    let mut set = |column: &str, value: String| {
        if let Some(i) = CONTACTS_HEADER.iter().position(|h| *h == column) {
            row[i] = value;
        }
    };

    set("Name", entrant.rider.full_name());
    set("Given Name", entrant.rider.first.clone());
    set("Family Name", entrant.rider.last.clone());
    set("Group Membership", group.to_string());
    set("E-mail 1 - Type", "*".to_string());
    set("E-mail 1 - Value", entrant.email.clone());

    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::EntryStatus;
    use crate::testkit;

    #[test]
    fn test_canonical_header_and_row_line_up() {
        let fields = canonical_fields();
        let mut row = testkit::row(3, "colin", "mccrea");
        row.final_number = 103;
        row.camping = "Yes".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::Active);

        let header = canonical_header(&fields);
        let values = canonical_row(&fields, &entrant);

        assert_eq!(header.len(), values.len());
        assert_eq!(header[0], "EntrantId");
        assert_eq!(values[0], "103");
        assert_eq!(values[1], "Colin");
        assert_eq!(values[2], "McCrea");

        let camping = header.iter().position(|h| *h == "Camping").unwrap();
        assert_eq!(values[camping], "Y");
        let pillion = header.iter().position(|h| *h == "PillionNovice").unwrap();
        assert_eq!(values[pillion], "", "no pillion, no flags");
    }

    #[test]
    fn test_contacts_row_layout() {
        let mut row = testkit::row(3, "Bob", "Stammers");
        row.email = "bob@example.com".to_string();
        let entrant = testkit::entrant(&row, EntryStatus::Active);

        let contact = contacts_row(&entrant, "rblr2025");

        assert_eq!(contact.len(), CONTACTS_HEADER.len());
        assert_eq!(contact[0], "Bob Stammers");
        assert_eq!(contact[1], "Bob");
        assert_eq!(contact[3], "Stammers");
        assert_eq!(contact[28], "rblr2025");
        assert_eq!(contact[29], "*");
        assert_eq!(contact[30], "bob@example.com");
        assert!(contact[31..].iter().all(|c| c.is_empty()));
    }
}
