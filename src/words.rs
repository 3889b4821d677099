// 📖 Word Lists - Rules as Data
// Spelling exceptions for names and bikes, the default bike, phone limits, lookup URL

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// WORD LISTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordLists {
    /// Names with fixed casing ("McCrea", "O'Keefe", "de")
    #[serde(default)]
    pub name_exceptions: Vec<String>,

    /// Bike words with fixed casing ("BMW", "GS", "Royal Enfield", "Moto-Guzzi")
    #[serde(default)]
    pub bike_exceptions: Vec<String>,

    /// Make used when the description says nothing useful
    #[serde(default)]
    pub default_make: String,

    /// Regex that forces the default make ("^(tba|unknown|not sure)")
    #[serde(default)]
    pub default_bike_pattern: String,

    /// Phone numbers are truncated to this many characters (0 = no limit)
    #[serde(default)]
    pub max_phone: usize,

    /// Online membership lookup endpoint
    #[serde(default)]
    pub lookup_url: String,

    /// Title-case all-upper/all-lower names before applying exceptions
    #[serde(default = "default_proper_names")]
    pub proper_names: bool,
}

fn default_proper_names() -> bool {
    true
}

impl WordLists {
    /// Load word lists from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read word lists: {:?}", path.as_ref()))?;

        Self::from_json_str(&content)
            .with_context(|| format!("Invalid word lists: {:?}", path.as_ref()))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse word lists JSON")
    }

    pub fn has_lookup_url(&self) -> bool {
        !self.lookup_url.trim().is_empty()
    }
}

impl Default for WordLists {
    fn default() -> Self {
        WordLists {
            name_exceptions: Vec::new(),
            bike_exceptions: Vec::new(),
            default_make: String::new(),
            default_bike_pattern: String::new(),
            max_phone: 0,
            lookup_url: String::new(),
            proper_names: true,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_word_lists() {
        let words = WordLists::from_json_str(
            r#"{
                "name_exceptions": ["McCrea", "O'Keefe"],
                "bike_exceptions": ["BMW", "Royal Enfield"],
                "default_make": "Unknown",
                "default_bike_pattern": "(?i)^tba",
                "max_phone": 13
            }"#,
        )
        .unwrap();

        assert_eq!(words.name_exceptions.len(), 2);
        assert_eq!(words.default_make, "Unknown");
        assert_eq!(words.max_phone, 13);
        assert!(words.proper_names, "proper names defaults on");
        assert!(!words.has_lookup_url());
    }

    #[test]
    fn test_malformed_word_lists_fail() {
        assert!(WordLists::from_json_str("{ \"name_exceptions\": 12 }").is_err());
    }

    #[test]
    fn test_missing_file_fails() {
        let result = WordLists::from_file("/definitely/not/here/words.json");
        assert!(result.is_err());
    }
}
