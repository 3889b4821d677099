// ✍️ Name & Bike Normalizer
// Form data arrives in every casing imaginable: "BOB STAMMERS", "colin mccrea", "bmw r1200gs".
// Everything here is pure and deterministic for a given set of word lists.

use crate::entities::LegionStatus;
use crate::error::RallyError;
use crate::words::WordLists;
use regex::{Captures, NoExpand, Regex};

/// Stands in for the space inside a two-word make until the make is split off
pub const MAKE_PLACEHOLDER: char = '_';

/// Leading noise before the make: "'98", "2005 ", quotes
const QUOTES: &[char] = &['\'', '"', '‘', '’', '`'];

// ============================================================================
// BIKE RULES
// ============================================================================

/// One bike exception, compiled once per run
#[derive(Debug, Clone)]
struct BikeRule {
    word: String,
    /// The word on its own
    standalone: Regex,
    /// The word glued to an engine size, "1200gs"
    after_digits: Regex,
}

impl BikeRule {
    fn compile(word: &str) -> Result<Self, RallyError> {
        let escaped = regex::escape(word);
        let standalone_src = format!(r"(?i)\b{}\b", escaped);
        let after_digits_src = format!(r"(?i)(\d){}\b", escaped);

        Ok(BikeRule {
            word: word.to_string(),
            standalone: compile_pattern(&standalone_src)?,
            after_digits: compile_pattern(&after_digits_src)?,
        })
    }

    fn apply(&self, text: &str) -> String {
        if self.standalone.is_match(text) {
            self.standalone
                .replace_all(text, NoExpand(&self.word))
                .into_owned()
        } else if self.after_digits.is_match(text) {
            self.after_digits
                .replace_all(text, |caps: &Captures| format!("{}{}", &caps[1], self.word))
                .into_owned()
        } else {
            text.to_string()
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, RallyError> {
    Regex::new(pattern).map_err(|source| RallyError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

// ============================================================================
// NORMALIZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct Normalizer {
    name_exceptions: Vec<String>,
    proper_names: bool,
    bike_exceptions: Vec<String>,
    bike_rules: Vec<BikeRule>,
    default_make: String,
    default_bike: Option<Regex>,
    max_phone: usize,
}

impl Normalizer {
    pub fn new(words: &WordLists) -> Result<Self, RallyError> {
        let bike_rules = words
            .bike_exceptions
            .iter()
            .filter(|w| !w.trim().is_empty())
            .map(|w| BikeRule::compile(w))
            .collect::<Result<Vec<_>, _>>()?;

        let default_bike = if words.default_bike_pattern.trim().is_empty() {
            None
        } else {
            Some(compile_pattern(&words.default_bike_pattern)?)
        };

        Ok(Normalizer {
            name_exceptions: words.name_exceptions.clone(),
            proper_names: words.proper_names,
            bike_exceptions: words.bike_exceptions.clone(),
            bike_rules,
            default_make: words.default_make.clone(),
            default_bike,
            max_phone: words.max_phone,
        })
    }

    pub fn default_make(&self) -> &str {
        &self.default_make
    }

    // ========================================================================
    // NAMES
    // ========================================================================

    /// Fix the casing of a person's name.
    ///
    /// Only names typed entirely in upper or lower case are touched; anything
    /// mixed-case is assumed to have been typed properly already.
    pub fn normalize_name(&self, name: &str) -> String {
        let trimmed = name.trim();
        if trimmed.to_uppercase() != trimmed && trimmed.to_lowercase() != trimmed {
            return trimmed.to_string();
        }

        trimmed
            .split_whitespace()
            .map(|word| {
                let lower = word.to_lowercase();

                match self
                    .name_exceptions
                    .iter()
                    .find(|exception| exception.to_lowercase() == lower)
                {
                    Some(exception) => exception.clone(),
                    None if self.proper_names => title_case(&lower),
                    None => word.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    // ========================================================================
    // BIKES
    // ========================================================================

    /// Apply the bike word list to a free-text description
    pub fn normalize_bike_description(&self, description: &str) -> String {
        let joined = self.join_two_word_make(description);
        self.bike_rules
            .iter()
            .fold(joined, |text, rule| rule.apply(&text))
    }

    /// "royal enfield bullet" → "Royal_Enfield bullet"
    ///
    /// An exception written as "Moto-Guzzi" also matches "moto guzzi".
    /// Only the first two words are tried, so "2015 Royal Enfield Bullet"
    /// stays split and reports "Royal" as its make.
    fn join_two_word_make(&self, description: &str) -> String {
        let words: Vec<&str> = description.split_whitespace().collect();
        if words.len() < 2 {
            return description.to_string();
        }

        let make2 = words[..2].join(" ").to_lowercase();
        let rest = words[2..].join(" ");

        for exception in &self.bike_exceptions {
            if exception.replacen('-', " ", 1).to_lowercase() == make2 {
                let make = exception.replacen(' ', &MAKE_PLACEHOLDER.to_string(), 1);
                return if rest.is_empty() {
                    make
                } else {
                    format!("{} {}", make, rest)
                };
            }
        }

        description.to_string()
    }

    /// Make and model after the default-bike rules.
    ///
    /// A description matching the default pattern becomes the default make with
    /// no model. Any other bike with no model gets the default make as its model
    /// so the column is never silently blank.
    pub fn resolve_make_model(&self, description: &str) -> (String, String) {
        let (make, mut model) = match &self.default_bike {
            Some(re) if re.is_match(description) => (self.default_make.clone(), String::new()),
            _ => extract_make_model(description),
        };

        if make != self.default_make && model.is_empty() {
            model = self.default_make.clone();
        }

        (make, model)
    }

    // ========================================================================
    // CONTACT DETAILS
    // ========================================================================

    /// "07700 900 123" → "07700900123", "0044…" → "+44…", capped at max length
    pub fn trim_phone(&self, phone: &str) -> String {
        let mut compact: String = phone.chars().filter(|c| *c != ' ').collect();

        if let Some(rest) = compact.strip_prefix("00") {
            compact = format!("+{}", rest);
        }

        if self.max_phone > 0 && compact.chars().count() > self.max_phone {
            compact.chars().take(self.max_phone).collect()
        } else {
            compact
        }
    }
}

// ============================================================================
// PURE HELPERS
// ============================================================================

/// Capitalise the first letter of a lower-cased word and after each hyphen
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut capitalize = true;

    for c in word.chars() {
        if capitalize && c.is_alphabetic() {
            out.extend(c.to_uppercase());
            capitalize = false;
        } else {
            out.push(c);
        }
        if c == '-' {
            capitalize = true;
        }
    }

    out
}

/// Split a bike description into (make, model).
///
/// Leading years, engine sizes and quotes are dropped, the first alphabetic
/// token is the make, and the rest is the model.
pub fn extract_make_model(description: &str) -> (String, String) {
    if description.trim().is_empty() {
        return (String::new(), String::new());
    }

    let rest = description
        .trim_start_matches(|c: char| c.is_ascii_digit() || c.is_whitespace() || QUOTES.contains(&c));

    let make_len = rest
        .find(|c: char| !(c.is_ascii_alphabetic() || c == '-' || c == MAKE_PLACEHOLDER))
        .unwrap_or(rest.len());

    let make = rest[..make_len].replace(MAKE_PLACEHOLDER, " ");
    let model = rest[make_len..].trim().replace(MAKE_PLACEHOLDER, " ");

    (make, model)
}

/// "Harley-Davidson" → "Harley"
pub fn short_make(make: &str) -> &str {
    match make.find('-') {
        Some(pos) => &make[..pos],
        None => make,
    }
}

/// Membership numbers come through spreadsheets as "12345.0" or "-1"
pub fn format_membership(number: &str) -> String {
    let trimmed = number.trim();
    if trimmed == "-1" {
        return "n/a".to_string();
    }
    trimmed.strip_suffix(".0").unwrap_or(trimmed).to_string()
}

/// Odometer reads kilometres ("K") or miles ("M")
pub fn odometer_units(answer: &str) -> &'static str {
    if answer.trim_start().to_uppercase().starts_with('K') {
        "K"
    } else {
        "M"
    }
}

/// Novice flag from the form answer.
///
/// An answer containing the member-check keyword ("check my membership")
/// means novice exactly when no membership number is on file.
pub fn is_novice(answer: &str, membership: &str, novice_keyword: &str, member_check_keyword: &str) -> bool {
    let answer = answer.to_lowercase();

    if !member_check_keyword.is_empty() && answer.contains(&member_check_keyword.to_lowercase()) {
        return membership.is_empty();
    }

    !novice_keyword.is_empty() && answer.contains(&novice_keyword.to_lowercase())
}

pub fn legion_status(answer: &str, member_marker: &str, rider_marker: &str) -> LegionStatus {
    if !member_marker.is_empty() && answer == member_marker {
        LegionStatus::BranchMember
    } else if !rider_marker.is_empty() && answer == rider_marker {
        LegionStatus::Rider
    } else {
        LegionStatus::None
    }
}

/// Anything other than blank or "No pillion" means a pillion is coming
pub fn has_pillion_answer(answer: &str) -> bool {
    let trimmed = answer.trim();
    !trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("no pillion")
}

pub fn takes_free_camping(answer: &str, marker: &str) -> bool {
    !marker.is_empty() && answer.trim() == marker
}

// ============================================================================
// TESTS
// ============================================================================
