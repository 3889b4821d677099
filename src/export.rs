// 📤 Export Sinks
// Where frozen entrants go: the canonical CSV, the contacts CSV and the
// rally database mirror. The pipeline hands every processed entrant to every
// sink and lets each one decide what it keeps.

use crate::config::RallyConfig;
use crate::entities::{Entrant, MirrorPerson, MirrorRecord};
use crate::schema::{canonical_fields, canonical_header, canonical_row, contacts_row, Field, CONTACTS_HEADER};
use anyhow::{Context, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub trait EntrantSink {
    fn name(&self) -> &str;

    /// Offer one processed entrant (withdrawn rows never get this far)
    fn write(&mut self, entrant: &Entrant) -> Result<()>;

    /// Flush everything; returns how many entrants were kept
    fn finish(&mut self) -> Result<usize>;
}

// ============================================================================
// EXPORT FILES
// ============================================================================

/// Destination of a CSV sink; `commit` runs once every row is written
pub trait ExportTarget: Write {
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }
}

impl ExportTarget for Vec<u8> {}

/// Written beside its target and renamed over it on commit, so a failed
/// run leaves the previous export in place
pub struct ExportFile {
    temp: Option<NamedTempFile>,
    target: PathBuf,
}

impl ExportFile {
    pub fn create<P: AsRef<Path>>(target: P) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let temp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create export file beside {:?}", target))?;

        Ok(ExportFile { temp: Some(temp), target })
    }

    fn temp(&mut self) -> io::Result<&mut NamedTempFile> {
        self.temp
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "export file already committed"))
    }
}

impl Write for ExportFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp()?.flush()
    }
}

impl ExportTarget for ExportFile {
    fn commit(&mut self) -> Result<()> {
        if let Some(temp) = self.temp.take() {
            temp.persist(&self.target)
                .map_err(|e| e.error)
                .with_context(|| format!("Failed to replace export file: {:?}", self.target))?;
            debug!(path = ?self.target, "export file replaced");
        }
        Ok(())
    }
}

// ============================================================================
// CANONICAL CSV
// ============================================================================

pub struct CanonicalCsvSink<W: ExportTarget> {
    writer: csv::Writer<W>,
    fields: Vec<Field>,
    written: usize,
}

impl CanonicalCsvSink<ExportFile> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(ExportFile::create(path)?)
    }
}

impl<W: ExportTarget> CanonicalCsvSink<W> {
    /// The header row is written straight away
    pub fn new(inner: W) -> Result<Self> {
        let fields = canonical_fields();
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(canonical_header(&fields))?;

        Ok(CanonicalCsvSink { writer, fields, written: 0 })
    }
}

impl<W: ExportTarget> EntrantSink for CanonicalCsvSink<W> {
    fn name(&self) -> &str {
        "canonical csv"
    }

    fn write(&mut self, entrant: &Entrant) -> Result<()> {
        if !entrant.status.is_exported() {
            return Ok(());
        }
        self.writer.write_record(canonical_row(&self.fields, entrant))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<usize> {
        self.writer.flush().context("Failed to flush canonical export")?;
        self.writer.get_mut().commit()?;
        Ok(self.written)
    }
}

// ============================================================================
// CONTACTS CSV
// ============================================================================

pub struct ContactsCsvSink<W: ExportTarget> {
    writer: csv::Writer<W>,
    group: String,
    written: usize,
}

impl ContactsCsvSink<ExportFile> {
    pub fn create<P: AsRef<Path>>(path: P, group: &str) -> Result<Self> {
        Self::new(ExportFile::create(path)?, group)
    }
}

impl<W: ExportTarget> ContactsCsvSink<W> {
    pub fn new(inner: W, group: &str) -> Result<Self> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(CONTACTS_HEADER)?;

        Ok(ContactsCsvSink {
            writer,
            group: group.to_string(),
            written: 0,
        })
    }
}

impl<W: ExportTarget> EntrantSink for ContactsCsvSink<W> {
    fn name(&self) -> &str {
        "contacts csv"
    }

    fn write(&mut self, entrant: &Entrant) -> Result<()> {
        if !entrant.status.is_exported() {
            return Ok(());
        }
        self.writer.write_record(contacts_row(entrant, &self.group))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<usize> {
        self.writer.flush().context("Failed to flush contacts export")?;
        self.writer.get_mut().commit()?;
        Ok(self.written)
    }
}

// ============================================================================
// RALLY DATABASE MIRROR
// ============================================================================

const PERSON_COLUMNS: [&str; 12] = [
    "First", "Last", "Address1", "Address2", "Town", "County", "Postcode", "Country", "Member", "Legion", "Phone",
    "Email",
];

fn mirror_columns() -> Vec<String> {
    let mut columns = vec!["EntrantID".to_string(), "Bike".to_string(), "BikeReg".to_string()];
    for role in ["Rider", "Pillion"] {
        columns.extend(PERSON_COLUMNS.iter().map(|c| format!("{}{}", role, c)));
    }
    columns.extend(
        [
            "NokName",
            "NokRelation",
            "NokPhone",
            "Route",
            "OdoCounts",
            "EntryDonation",
            "FreeCamping",
            "CertificateAvailable",
            "Tshirt1",
            "Tshirt2",
            "Patches",
            "EntrantStatus",
        ]
        .iter()
        .map(|c| c.to_string()),
    );
    columns
}

fn person_values(person: &MirrorPerson) -> [Value; 12] {
    [
        &person.first,
        &person.last,
        &person.address1,
        &person.address2,
        &person.town,
        &person.county,
        &person.postcode,
        &person.country,
        &person.membership,
        &person.legion,
        &person.phone,
        &person.email,
    ]
    .map(|s| Value::Text(s.clone()))
}

/// Values in `mirror_columns()` order
fn mirror_values(record: &MirrorRecord) -> Vec<Value> {
    let mut values = vec![
        Value::Integer(record.entrant_id),
        Value::Text(record.bike.clone()),
        Value::Text(record.bike_reg.clone()),
    ];
    values.extend(person_values(&record.rider));
    values.extend(person_values(&record.pillion));
    values.extend(
        [
            &record.nok_name,
            &record.nok_relation,
            &record.nok_phone,
            &record.route,
            &record.odo_counts,
            &record.entry_donation,
            &record.free_camping,
            &record.certificate_available,
            &record.tshirt1,
            &record.tshirt2,
        ]
        .map(|s| Value::Text(s.clone())),
    );
    values.push(Value::Integer(record.patches));
    values.push(Value::Integer(record.entrant_status));
    values
}

/// Rebuilds the rally application's `entrants` table.
///
/// Existing rows are deleted when the store opens; everything from this run
/// lands in one transaction committed by `finish`. Cancelled entrants are kept.
pub struct MirrorStore {
    conn: Connection,
    cfg: RallyConfig,
    insert_sql: String,
    written: usize,
    open_tx: bool,
}

impl MirrorStore {
    pub fn open<P: AsRef<Path>>(path: P, cfg: &RallyConfig) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open rally database: {:?}", path.as_ref()))?;
        Self::from_connection(conn, cfg)
    }

    pub fn from_connection(conn: Connection, cfg: &RallyConfig) -> Result<Self> {
        let columns = mirror_columns();
        setup_mirror(&conn, &columns)?;

        conn.execute_batch("BEGIN")?;
        conn.execute("DELETE FROM entrants", [])?;

        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let insert_sql = format!(
            "INSERT INTO entrants ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );

        Ok(MirrorStore {
            conn,
            cfg: cfg.clone(),
            insert_sql,
            written: 0,
            open_tx: true,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn setup_mirror(conn: &Connection, columns: &[String]) -> Result<()> {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| match c.as_str() {
            "EntrantID" => format!("{} INTEGER PRIMARY KEY", c),
            "Patches" | "EntrantStatus" => format!("{} INTEGER", c),
            _ => format!("{} TEXT", c),
        })
        .collect();

    conn.execute(
        &format!("CREATE TABLE IF NOT EXISTS entrants ({})", defs.join(", ")),
        [],
    )
    .context("Failed to create mirror entrants table")?;

    Ok(())
}

impl EntrantSink for MirrorStore {
    fn name(&self) -> &str {
        "rally database"
    }

    fn write(&mut self, entrant: &Entrant) -> Result<()> {
        let record = MirrorRecord::from_entrant(entrant, &self.cfg);
        let mut stmt = self.conn.prepare_cached(&self.insert_sql)?;
        stmt.execute(params_from_iter(mirror_values(&record)))
            .with_context(|| format!("Failed to mirror entrant {}", record.entrant_id))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<usize> {
        if self.open_tx {
            self.conn.execute_batch("COMMIT")?;
            self.open_tx = false;
        }
        debug!(rows = self.written, "rally database mirrored");
        Ok(self.written)
    }
}

// ============================================================================
// TESTS
// ============================================================================
