// 🗄️ Staging Store - the form CSV loaded into SQLite
//
// The CSV is staged as-is into an `entrants` table whose columns come from the
// configured field list, plus RiderNumber (if the form doesn't have one) and
// FinalRiderNumber. A one-row `rally` table records what was staged and when.

use crate::config::{contains_field, InputVariant, RallyConfig};
use crate::numbering::{assign_rider_numbers, NumberingOptions, NumberingRow, RiderNumberMap};
use crate::parser::{read_records, Column, RawRegistrationRow};
use crate::status::WITHDRAWN_MARKER;
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// STAGING METADATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingInfo {
    pub rally: String,
    pub year: String,
    /// When the CSV was staged (RFC 3339)
    pub extracted: String,
    /// File name or URL of the CSV
    pub source: String,
    /// SHA-256 of the CSV text
    pub sha256: String,
    pub run_id: String,
    pub rows: usize,
}

/// SHA-256 hex digest of the staged CSV text
pub fn source_fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Connection> {
    Connection::open(path.as_ref())
        .with_context(|| format!("Failed to open staging database: {:?}", path.as_ref()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SELECT expression for a column that may not be staged
fn column_expr(fields: &[String], name: &str) -> String {
    if contains_field(fields, name) {
        format!("ifnull({},'')", quote_ident(name))
    } else {
        "''".to_string()
    }
}

// ============================================================================
// STAGING
// ============================================================================

/// Replace the staged entrants with the rows of `content`.
///
/// Every record is checked against the field list before the database is
/// touched. Empty and literal "NULL" cells are stored as SQL NULL.
pub fn stage_csv(
    conn: &mut Connection,
    cfg: &RallyConfig,
    variant: InputVariant,
    source: &str,
    content: &str,
) -> Result<StagingInfo> {
    let fields = cfg.field_list(variant);
    let records = read_records(content, fields.len())
        .with_context(|| format!("Failed to read {} {}", variant.name(), source))?;

    let mut columns: Vec<String> = fields.iter().map(|f| quote_ident(f)).collect();
    if !contains_field(fields, Column::RiderNumber.name()) {
        columns.push(quote_ident(Column::RiderNumber.name()));
    }

    let info = StagingInfo {
        rally: cfg.name.clone(),
        year: cfg.year.clone(),
        extracted: Utc::now().to_rfc3339(),
        source: source.to_string(),
        sha256: source_fingerprint(content),
        run_id: uuid::Uuid::new_v4().to_string(),
        rows: records.len(),
    };

    let tx = conn.transaction()?;

    tx.execute("DROP TABLE IF EXISTS entrants", [])?;
    tx.execute(
        &format!(
            "CREATE TABLE entrants ({}, FinalRiderNumber INTEGER)",
            columns.join(", ")
        ),
        [],
    )
    .context("Failed to create entrants table from field list")?;

    tx.execute("DROP TABLE IF EXISTS rally", [])?;
    tx.execute(
        "CREATE TABLE rally (
            name TEXT,
            year TEXT,
            extracted TEXT,
            source TEXT,
            sha256 TEXT,
            run_id TEXT,
            row_count INTEGER
        )",
        [],
    )?;
    tx.execute(
        "INSERT INTO rally (name, year, extracted, source, sha256, run_id, row_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            info.rally,
            info.year,
            info.extracted,
            info.source,
            info.sha256,
            info.run_id,
            info.rows as i64,
        ],
    )?;

    {
        let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("?{}", i)).collect();
        let insert = format!(
            "INSERT INTO entrants ({}) VALUES ({})",
            fields.iter().map(|f| quote_ident(f)).collect::<Vec<_>>().join(", "),
            placeholders.join(", ")
        );
        let mut stmt = tx.prepare(&insert)?;

        for record in &records {
            let values = record
                .iter()
                .map(|v| if v.is_empty() || v == "NULL" { None } else { Some(v.as_str()) });
            stmt.execute(params_from_iter(values))?;
        }
    }

    tx.commit()?;

    info!(rows = info.rows, source = %info.source, "staged entrants");
    Ok(info)
}

/// Metadata of whatever is currently staged
pub fn read_staging_info(conn: &Connection) -> Result<StagingInfo> {
    conn.query_row(
        "SELECT name, year, extracted, source, sha256, run_id, row_count FROM rally LIMIT 1",
        [],
        |row| {
            Ok(StagingInfo {
                rally: row.get(0)?,
                year: row.get(1)?,
                extracted: row.get(2)?,
                source: row.get(3)?,
                sha256: row.get(4)?,
                run_id: row.get(5)?,
                rows: row.get::<_, i64>(6)? as usize,
            })
        },
    )
    .context("Nothing staged yet - run without --no-csv first")
}

// ============================================================================
// RIDER NUMBERS
// ============================================================================

pub fn read_numbering_rows(conn: &Connection, fields: &[String]) -> Result<Vec<NumberingRow>> {
    let sql = format!(
        "SELECT ifnull(EntryId,''), ifnull(RiderNumber,''), {} FROM entrants",
        column_expr(fields, Column::Withdrawn.name())
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map([], |row| {
            let entry_id: String = row.get(0)?;
            let manual: String = row.get(1)?;
            let withdrawn: String = row.get(2)?;
            Ok(NumberingRow::new(&entry_id, &manual, withdrawn == WITHDRAWN_MARKER))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Compute every FinalRiderNumber and write them back in one transaction
pub fn assign_final_numbers(conn: &mut Connection, cfg: &RallyConfig, variant: InputVariant) -> Result<RiderNumberMap> {
    let rows = read_numbering_rows(conn, cfg.field_list(variant))?;
    let options = NumberingOptions {
        offset: cfg.add_to_entrant_id,
        sequential: cfg.renumber_sequentially,
    };
    let numbers = assign_rider_numbers(&rows, options)?;

    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare("UPDATE entrants SET FinalRiderNumber = ?1 WHERE EntryId = ?2")?;
        for (entry_id, number) in numbers.iter() {
            stmt.execute(params![number, entry_id])?;
        }
    }
    tx.commit()?;

    debug!(count = numbers.len(), "rider numbers assigned");
    Ok(numbers)
}

// ============================================================================
// ENTRANT QUERY
// ============================================================================

/// Staged rows in the configured order, filtered by payment status
pub fn query_entrants(conn: &Connection, cfg: &RallyConfig, variant: InputVariant) -> Result<Vec<RawRegistrationRow>> {
    let fields = cfg.field_list(variant);

    let select: Vec<String> = Column::ROW.iter().map(|c| column_expr(fields, c.name())).collect();
    let mut sql = format!(
        "SELECT {}, ifnull(FinalRiderNumber,0) FROM entrants",
        select.join(", ")
    );

    if !cfg.payment_status.is_empty() {
        let placeholders: Vec<String> = (1..=cfg.payment_status.len()).map(|i| format!("?{}", i)).collect();
        sql.push_str(&format!(
            " WHERE {} IN ({})",
            column_expr(fields, Column::PaymentStatus.name()),
            placeholders.join(", ")
        ));
    }

    if !cfg.entrant_order.trim().is_empty() {
        sql.push_str(&format!(" ORDER BY {}", cfg.entrant_order));
    }

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("Bad entrant query (check entrant_order): {}", sql))?;

    let width = Column::ROW.len();
    let rows = stmt
        .query_map(params_from_iter(cfg.payment_status.iter()), |row| {
            let values = (0..width)
                .map(|i| row.get::<_, String>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            let final_number: i64 = row.get(width)?;
            Ok(RawRegistrationRow::from_values(final_number, &values))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

// ============================================================================
// TESTS
// ============================================================================
