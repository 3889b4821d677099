// 🔄 Registration Pipeline - one rally, one run, one pass
//
// Per staged row, in query order:
//   classify → normalize → membership lookup → freeze → diagnostics
//   → reconcile fees → fold into totals → hand to every sink
//
// Withdrawn rows stop at the first step.

use crate::config::{InputVariant, RallyConfig};
use crate::data_quality::{check_emergency_contact, check_payment_status, status_note, Diagnostic};
use crate::db::{self, StagingInfo};
use crate::deduplication::DuplicateDetector;
use crate::entities::{Entrant, EntrantDraft};
use crate::export::EntrantSink;
use crate::lookup::{LocalMemberTable, MembershipLookup};
use crate::normalize::Normalizer;
use crate::parser::RawRegistrationRow;
use crate::reconciliation::{FeeBreakdown, FeeReconciler, PaymentFields};
use crate::status::EntryStatus;
use crate::totals::RallyTotals;
use crate::words::WordLists;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

// ============================================================================
// RUN REPORT
// ============================================================================

/// What one processed entry was charged and paid
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub entry_id: String,
    pub rider_number: i64,
    pub name: String,
    pub status: EntryStatus,
    pub fees: FeeBreakdown,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportCount {
    pub sink: String,
    pub rows: usize,
}

/// Everything the run produced, serialized as the JSON statistics report
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub rally: String,
    pub generated: String,
    pub staging: Option<StagingInfo>,
    pub totals: RallyTotals,
    pub ledger: Vec<LedgerEntry>,
    pub diagnostics: Vec<Diagnostic>,
    pub exports: Vec<ExportCount>,
}

impl RunReport {
    pub fn warnings(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_warning()).count()
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write statistics report: {:?}", path.as_ref()))
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    cfg: RallyConfig,
    normalizer: Normalizer,
    reconciler: FeeReconciler,
    lookup: MembershipLookup,
    duplicates: DuplicateDetector,
    sinks: Vec<Box<dyn EntrantSink>>,
    totals: RallyTotals,
    ledger: Vec<LedgerEntry>,
    diagnostics: Vec<Diagnostic>,
}

impl Pipeline {
    pub fn new(cfg: RallyConfig, words: &WordLists, lookup: MembershipLookup) -> Result<Self> {
        let normalizer = Normalizer::new(words).context("Failed to compile word lists")?;
        let reconciler = FeeReconciler::new(cfg.fee_schedule(), cfg.tshirt_sizes.clone());
        let totals = RallyTotals::new(&cfg);

        Ok(Pipeline {
            cfg,
            normalizer,
            reconciler,
            lookup,
            duplicates: DuplicateDetector::new(),
            sinks: Vec::new(),
            totals,
            ledger: Vec::new(),
            diagnostics: Vec::new(),
        })
    }

    pub fn add_sink(&mut self, sink: Box<dyn EntrantSink>) {
        self.sinks.push(sink);
    }

    pub fn config(&self) -> &RallyConfig {
        &self.cfg
    }

    pub fn totals(&self) -> &RallyTotals {
        &self.totals
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Run one staged row through every stage
    pub fn process_row(&mut self, row: &RawRegistrationRow) -> Result<()> {
        let status = EntryStatus::classify(&row.payment_status, &row.withdrawn);
        if status.is_withdrawn() {
            debug!(entry = %row.entry_id, "withdrawn, skipped");
            self.totals.record_withdrawn();
            return Ok(());
        }

        let index = self.totals.processed as usize;
        let mut draft = EntrantDraft::from_row(row, status, &self.normalizer, &self.cfg);
        let entry_id = draft.entry_id().to_string();

        let mut found = self.lookup.verify("Rider", &entry_id, &mut draft.rider);
        if let Some(pillion) = draft.pillion.as_mut() {
            found.extend(self.lookup.verify("Pillion", &entry_id, pillion));
        }

        let entrant = draft.freeze(&self.cfg);

        if let Some(note) = status_note(&entrant, &row.payment_status) {
            debug!("{}", note);
        }
        found.extend(check_payment_status(&entrant, &row.payment_status, &self.cfg.paid_marker));
        found.extend(check_emergency_contact(&entrant));
        found.extend(self.duplicates.check(&entrant));

        for diagnostic in &found {
            if diagnostic.is_warning() {
                warn!("{}", diagnostic.message);
            } else {
                info!("{}", diagnostic.message);
            }
        }
        self.diagnostics.extend(found);

        let fees = self.reconciler.reconcile(&entrant, &PaymentFields::from_row(row));
        self.totals.add(index, &entrant, &fees);

        self.emit(&entrant)?;

        self.ledger.push(LedgerEntry {
            entry_id,
            rider_number: entrant.rider_number,
            name: entrant.rider.full_name(),
            status,
            fees,
        });

        Ok(())
    }

    fn emit(&mut self, entrant: &Entrant) -> Result<()> {
        for sink in self.sinks.iter_mut() {
            sink.write(entrant)
                .with_context(|| format!("{} failed on entry {}", sink.name(), entrant.entry_id))?;
        }
        Ok(())
    }

    pub fn process_all(&mut self, rows: &[RawRegistrationRow]) -> Result<()> {
        for row in rows {
            self.process_row(row)?;
        }
        Ok(())
    }

    /// Flush every sink and hand back the report
    pub fn finish(mut self, staging: Option<StagingInfo>) -> Result<RunReport> {
        let mut exports = Vec::new();
        for sink in self.sinks.iter_mut() {
            let rows = sink
                .finish()
                .with_context(|| format!("Failed to finish {}", sink.name()))?;
            info!(sink = sink.name(), rows, "export written");
            exports.push(ExportCount {
                sink: sink.name().to_string(),
                rows,
            });
        }

        Ok(RunReport {
            rally: self.cfg.rally_tag(),
            generated: Utc::now().to_rfc3339(),
            staging,
            totals: self.totals,
            ledger: self.ledger,
            diagnostics: self.diagnostics,
            exports,
        })
    }
}

// ============================================================================
// RUN HELPERS
// ============================================================================

/// Pick the membership reference list once, at startup.
///
/// A members database wins over the online service.
pub fn select_lookup(words: &WordLists, members_db: Option<&Path>, enabled: bool) -> Result<MembershipLookup> {
    if !enabled {
        return Ok(MembershipLookup::disabled());
    }

    if let Some(path) = members_db {
        info!("membership lookup via {:?}", path);
        return Ok(MembershipLookup::new(Box::new(LocalMemberTable::open(path)?)));
    }

    online_lookup(words)
}

#[cfg(feature = "online")]
fn online_lookup(words: &WordLists) -> Result<MembershipLookup> {
    use crate::lookup::OnlineMemberService;
    use std::time::Duration;

    if !words.has_lookup_url() {
        return Ok(MembershipLookup::disabled());
    }

    info!("membership lookup via {}", words.lookup_url);
    let service = OnlineMemberService::new(&words.lookup_url, Duration::from_secs(10))?;
    Ok(MembershipLookup::new(Box::new(service)))
}

#[cfg(not(feature = "online"))]
fn online_lookup(words: &WordLists) -> Result<MembershipLookup> {
    if words.has_lookup_url() {
        warn!("built without the online feature; membership lookup disabled");
    }
    Ok(MembershipLookup::disabled())
}

/// Number, query and process whatever is currently staged
pub fn run_staged(conn: &mut Connection, mut pipeline: Pipeline, variant: InputVariant) -> Result<RunReport> {
    let staging = db::read_staging_info(conn)?;

    let numbers = db::assign_final_numbers(conn, pipeline.config(), variant)?;
    info!(entrants = numbers.len(), "rider numbers fixed");

    let rows = db::query_entrants(conn, pipeline.config(), variant)?;
    pipeline.process_all(&rows)?;

    pipeline.finish(Some(staging))
}

// ============================================================================
// TESTS
// ============================================================================
