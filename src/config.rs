// ⚙️ Rally Configuration - one TOML document per rally
// Fee schedule, merchandise, field lists for both CSV variants, reporting options

use crate::error::RallyError;
use crate::parser::Column;
use crate::reconciliation::FeeSchedule;
use crate::temporal::ReportingGranularity;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// INPUT VARIANT
// ============================================================================

/// Which download of the form data we were given.
/// The two exports carry the same data in different column orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputVariant {
    /// Administrator page export
    Admin,
    /// Saved report export
    Report,
}

impl InputVariant {
    pub fn name(&self) -> &str {
        match self {
            InputVariant::Admin => "administrator export",
            InputVariant::Report => "report export",
        }
    }
}

// ============================================================================
// RALLY CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RallyConfig {
    /// Short rally name, e.g. "rblr"
    pub name: String,
    pub year: String,

    // ------------------------------------------------------------------------
    // Fee schedule
    // ------------------------------------------------------------------------
    #[serde(default)]
    pub rider_fee: i64,
    #[serde(default)]
    pub pillion_fee: i64,
    #[serde(default)]
    pub tshirt_cost: i64,
    #[serde(default)]
    pub patch_cost: i64,
    #[serde(default)]
    pub patches_available: bool,
    #[serde(default)]
    pub sponsorship: bool,
    /// Cancelled entrants give up their T-shirts, patches and camping
    #[serde(default = "default_true")]
    pub cancels_lose_benefits: bool,

    // ------------------------------------------------------------------------
    // Merchandise and classification markers
    // ------------------------------------------------------------------------
    #[serde(default)]
    pub tshirt_sizes: Vec<String>,
    /// Substring of the novice answer that marks a first-timer
    #[serde(default = "default_novice")]
    pub novice: String,
    /// Substring of the novice answer meaning "novice unless a member"
    #[serde(default)]
    pub member_check_keyword: String,
    /// Camping answer that counts as taking a free camping place
    #[serde(default)]
    pub free_camping: String,
    #[serde(default)]
    pub legion_member: String,
    #[serde(default)]
    pub legion_rider: String,
    /// Route codes keyed by the first letter of the route answer
    #[serde(default)]
    pub routes: BTreeMap<String, String>,

    // ------------------------------------------------------------------------
    // Numbering
    // ------------------------------------------------------------------------
    #[serde(default)]
    pub add_to_entrant_id: i64,
    #[serde(default)]
    pub renumber_sequentially: bool,

    // ------------------------------------------------------------------------
    // Query + reporting
    // ------------------------------------------------------------------------
    /// Payment statuses to include; empty means everything
    #[serde(default)]
    pub payment_status: Vec<String>,
    /// Status recorded for a fully paid entry
    #[serde(default = "default_paid_marker")]
    pub paid_marker: String,
    /// SQL ORDER BY expression over the staged columns
    #[serde(default = "default_entrant_order")]
    pub entrant_order: String,
    #[serde(default)]
    pub report_granularity: ReportingGranularity,
    /// Secondary database mirrored on every run
    #[serde(default)]
    pub mirror_db: Option<PathBuf>,

    // ------------------------------------------------------------------------
    // Field lists (order and count must match the CSV exactly)
    // ------------------------------------------------------------------------
    pub admin_fields: Vec<String>,
    #[serde(default)]
    pub report_fields: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_novice() -> String {
    "novice".to_string()
}

fn default_paid_marker() -> String {
    "Completed".to_string()
}

fn default_entrant_order() -> String {
    "FinalRiderNumber".to_string()
}

impl RallyConfig {
    /// Load and validate the rally document
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rally config: {:?}", path.as_ref()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid rally config: {:?}", path.as_ref()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RallyConfig = toml::from_str(content).context("Failed to parse rally TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Required columns must appear in every field list we might stage
    pub fn validate(&self) -> Result<()> {
        if self.admin_fields.is_empty() {
            anyhow::bail!("admin_fields must list the CSV columns");
        }

        for fields in [&self.admin_fields, &self.report_fields] {
            if fields.is_empty() {
                continue;
            }
            for column in Column::REQUIRED {
                if !contains_field(fields, column.name()) {
                    return Err(RallyError::MissingColumn(column.name()).into());
                }
            }
        }

        Ok(())
    }

    /// Field list for the given CSV variant
    ///
    /// A rally with no separate report layout uses the admin list for both.
    pub fn field_list(&self, variant: InputVariant) -> &[String] {
        match variant {
            InputVariant::Report if !self.report_fields.is_empty() => &self.report_fields,
            _ => &self.admin_fields,
        }
    }

    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            rider_fee: self.rider_fee,
            pillion_fee: self.pillion_fee,
            tshirt_cost: self.tshirt_cost,
            patch_cost: self.patch_cost,
            patches_available: self.patches_available,
            sponsorship: self.sponsorship,
            cancels_lose_benefits: self.cancels_lose_benefits,
        }
    }

    /// "rblr2025" - used as the contacts group and default export name
    pub fn rally_tag(&self) -> String {
        format!("{}{}", self.name, self.year)
    }

    /// Route code for a route answer such as "B - North anti-clockwise"
    pub fn route_code(&self, route: &str) -> Option<&str> {
        let first = route.trim().chars().next()?;
        self.routes
            .get(&first.to_ascii_uppercase().to_string())
            .map(String::as_str)
    }
}

/// SQLite column names are case-insensitive, so the field list is too
pub fn contains_field(fields: &[String], name: &str) -> bool {
    fields.iter().any(|f| f.eq_ignore_ascii_case(name))
}

// ============================================================================
// TESTS
// ============================================================================
