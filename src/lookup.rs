// 🔎 Membership Lookup
// Confirms or fills in membership numbers against a reference list:
//   - a local SQLite table (members: full_name, member_number, email), or
//   - the association's online lookup service (JSON over HTTP)
//
// The first backend failure switches lookup off for the rest of the run.

use crate::data_quality::{Diagnostic, DiagnosticKind};
use crate::entities::DraftPerson;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct MemberRecord {
    #[serde(alias = "Iba", default)]
    pub number: String,
    #[serde(alias = "Sname", default)]
    pub last_name: String,
    #[serde(alias = "Email", default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(MemberRecord),
    NotFound,
    /// The backend failed, now or earlier in the run
    Unavailable,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("member database query failed: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("member service unreachable: {0}")]
    Network(String),

    #[error("member service returned HTTP {0}")]
    Http(u16),

    #[error("malformed member service response: {0}")]
    Parse(String),
}

/// A reference list of members
pub trait MembershipSource {
    fn name(&self) -> &str;

    /// Who holds this number? `last_name` and `email` are filled in.
    fn by_number(&self, number: &str) -> Result<Option<MemberRecord>, LookupError>;

    /// Membership number for a person, if they have one
    fn by_name(&self, first: &str, last: &str) -> Result<Option<MemberRecord>, LookupError>;
}

// ============================================================================
// LOCAL TABLE
// ============================================================================

pub struct LocalMemberTable {
    conn: Connection,
}

impl LocalMemberTable {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open members database: {:?}", path.as_ref()))?;
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        LocalMemberTable { conn }
    }
}

impl MembershipSource for LocalMemberTable {
    fn name(&self) -> &str {
        "local members table"
    }

    fn by_number(&self, number: &str) -> Result<Option<MemberRecord>, LookupError> {
        let found = self
            .conn
            .query_row(
                "SELECT ifnull(full_name,''), ifnull(email,'') FROM members WHERE member_number = ?1",
                params![number],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        Ok(found.map(|(full_name, email)| MemberRecord {
            number: number.to_string(),
            last_name: full_name.split_whitespace().last().unwrap_or_default().to_string(),
            email,
        }))
    }

    fn by_name(&self, first: &str, last: &str) -> Result<Option<MemberRecord>, LookupError> {
        let full_name = format!("{} {}", first, last);
        let found = self
            .conn
            .query_row(
                "SELECT CAST(member_number AS TEXT), ifnull(email,'') FROM members
                 WHERE full_name = ?1 COLLATE NOCASE AND ifnull(member_number,'') <> ''
                 LIMIT 1",
                params![full_name],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        Ok(found.map(|(number, email)| MemberRecord {
            number,
            last_name: last.to_string(),
            email,
        }))
    }
}

// ============================================================================
// ONLINE SERVICE
// ============================================================================

#[cfg(feature = "online")]
pub struct OnlineMemberService {
    http: reqwest::blocking::Client,
    url: String,
}

#[cfg(feature = "online")]
impl OnlineMemberService {
    pub fn new(url: &str, timeout: std::time::Duration) -> Result<Self, LookupError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("rally-reglist/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(OnlineMemberService {
            http,
            url: url.to_string(),
        })
    }

    fn get(&self, query: &[(&str, &str)]) -> Result<MemberRecord, LookupError> {
        let response = self
            .http
            .get(&self.url)
            .query(query)
            .send()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LookupError::Http(response.status().as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| LookupError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| LookupError::Parse(e.to_string()))
    }
}

#[cfg(feature = "online")]
impl MembershipSource for OnlineMemberService {
    fn name(&self) -> &str {
        "online member service"
    }

    fn by_number(&self, number: &str) -> Result<Option<MemberRecord>, LookupError> {
        let record = self.get(&[("i", number)])?;
        Ok(Some(record).filter(|r| !r.last_name.is_empty()))
    }

    fn by_name(&self, first: &str, last: &str) -> Result<Option<MemberRecord>, LookupError> {
        let record = self.get(&[("f", first), ("l", last)])?;
        Ok(Some(record).filter(|r| !r.number.is_empty() && r.number != "0"))
    }
}

// ============================================================================
// LOOKUP CAPABILITY
// ============================================================================

/// Owned by the pipeline; remembers when its backend has gone away
pub struct MembershipLookup {
    source: Option<Box<dyn MembershipSource>>,
    available: bool,
}

impl MembershipLookup {
    pub fn new(source: Box<dyn MembershipSource>) -> Self {
        MembershipLookup {
            source: Some(source),
            available: true,
        }
    }

    /// Lookup switched off (--no-lookup or no reference list configured)
    pub fn disabled() -> Self {
        MembershipLookup {
            source: None,
            available: false,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available && self.source.is_some()
    }

    pub fn by_number(&mut self, number: &str) -> LookupOutcome {
        self.query(|source| source.by_number(number))
    }

    pub fn by_name(&mut self, first: &str, last: &str) -> LookupOutcome {
        self.query(|source| source.by_name(first, last))
    }

    fn query<F>(&mut self, run: F) -> LookupOutcome
    where
        F: FnOnce(&dyn MembershipSource) -> Result<Option<MemberRecord>, LookupError>,
    {
        if !self.available {
            return LookupOutcome::Unavailable;
        }
        let Some(source) = self.source.as_deref() else {
            return LookupOutcome::Unavailable;
        };

        match run(source) {
            Ok(Some(record)) => LookupOutcome::Found(record),
            Ok(None) => LookupOutcome::NotFound,
            Err(e) => {
                warn!("can't access {} ({}); membership lookup disabled", source.name(), e);
                self.available = false;
                LookupOutcome::Unavailable
            }
        }
    }

    /// Check a rider's or pillion's membership number, filling it in when the
    /// reference list knows them by name.
    pub fn verify(&mut self, role: &str, entry_id: &str, person: &mut DraftPerson) -> Vec<Diagnostic> {
        let mut found = Vec::new();
        if !self.is_available() {
            return found;
        }

        let name = format!("{} {}", person.first, person.last);
        let offered = !person.membership.is_empty() && person.membership != "n/a";

        if offered {
            match self.by_number(&person.membership) {
                LookupOutcome::Found(record) => {
                    if !record.last_name.eq_ignore_ascii_case(&person.last) {
                        found.push(Diagnostic::warning(
                            entry_id,
                            DiagnosticKind::MembershipMismatch,
                            format!(
                                "{} {} [#{}], member {} doesn't match {} {}",
                                role, name, entry_id, person.membership, record.last_name, record.email
                            ),
                        ));
                    }
                    return found;
                }
                LookupOutcome::Unavailable => return found,
                LookupOutcome::NotFound => {}
            }
        }

        match self.by_name(&person.first, &person.last) {
            LookupOutcome::Found(record) => {
                debug!("{} {} [#{}] is member {}", role, name, entry_id, record.number);
                found.push(Diagnostic::info(
                    entry_id,
                    DiagnosticKind::MembershipFilled,
                    format!(
                        "{} {} [#{}] ({}) is member {} {}",
                        role, name, entry_id, person.membership, record.number, record.email
                    ),
                ));
                person.membership = record.number;
            }
            LookupOutcome::NotFound if offered => {
                found.push(Diagnostic::warning(
                    entry_id,
                    DiagnosticKind::MembershipUnconfirmed,
                    format!("{} {} [#{}] is not member {}", role, name, entry_id, person.membership),
                ));
            }
            _ => {}
        }

        found
    }
}

// ============================================================================
// TESTS
// ============================================================================
