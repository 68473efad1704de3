//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Components call store methods; they never execute SQL directly.
//!
//! Every multi-step write runs inside `write_tx`: one `BEGIN IMMEDIATE`
//! transaction, which takes SQLite's single writer lock up front. Reads done
//! inside it therefore cannot go stale before the writes that depend on them.

use crate::{
    config::RetryConfig,
    error::{LedgerError, LedgerResult},
    event::{EventLogEntry, LedgerEvent},
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, types::Type, Connection, Row};
use rust_decimal::Decimal;
use std::{str::FromStr, time::Duration};

mod allocation;
mod budget;
mod citizen;
mod payment;
mod target_group;

pub use payment::AllocationPaymentRow;

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
    retry: RetryConfig,
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        let retry = RetryConfig::default();
        conn.busy_timeout(Duration::from_millis(retry.busy_timeout_ms))?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
            retry,
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: None,
            retry: RetryConfig::default(),
        })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based databases, this opens the same file.
    pub fn reopen(&self) -> LedgerResult<Self> {
        let store = match &self.path {
            Some(p) => Self::open(p)?,
            None => Self::in_memory()?,
        };
        store.with_retry(self.retry.clone())
    }

    /// Apply retry policy and busy timeout.
    pub fn with_retry(mut self, retry: RetryConfig) -> LedgerResult<Self> {
        self.conn
            .busy_timeout(Duration::from_millis(retry.busy_timeout_ms))?;
        self.retry = retry;
        Ok(self)
    }

    /// Apply all schema migrations in order. Safe to run more than once.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_target_groups.sql"))?;
        Ok(())
    }

    // ── Transactions ───────────────────────────────────────────

    /// Run `f` as one all-or-nothing write.
    ///
    /// Busy/locked errors and stale optimistic versions roll back and retry
    /// with linear backoff; after `max_attempts` the caller gets `Conflict`.
    /// Any other error rolls back and is returned unchanged. Called while a
    /// transaction is already open, `f` simply joins it.
    pub fn write_tx<T>(
        &self,
        operation: &str,
        mut f: impl FnMut(&Self) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        if !self.conn.is_autocommit() {
            return f(self);
        }

        let max = self.retry.max_attempts.max(1);
        for attempt in 1..=max {
            match self.run_once(&mut f) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    log::warn!("store: '{operation}' attempt {attempt}/{max} conflicted: {e}");
                    if attempt < max {
                        std::thread::sleep(Duration::from_millis(
                            self.retry.backoff_ms * u64::from(attempt),
                        ));
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(LedgerError::Conflict {
            operation: operation.to_string(),
            attempts: max,
        })
    }

    fn run_once<T>(&self, f: &mut impl FnMut(&Self) -> LedgerResult<T>) -> LedgerResult<T> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = f(self).and_then(|value| {
            self.conn.execute_batch("COMMIT")?;
            Ok(value)
        });
        if result.is_err() && !self.conn.is_autocommit() {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                log::warn!("store: rollback failed: {e}");
            }
        }
        result
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &LedgerEvent, at: DateTime<Utc>) -> LedgerResult<()> {
        let entry = EventLogEntry::new(event, at)?;
        self.conn.execute(
            "INSERT INTO event_log (event_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.event_id,
                entry.event_type,
                entry.payload,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Entries with `id > after_id`, oldest first.
    pub fn events_since(&self, after_id: i64) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_id, event_type, payload, created_at
             FROM event_log WHERE id > ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![after_id], |row| {
                Ok(EventLogEntry {
                    id: Some(row.get(0)?),
                    event_id: row.get(1)?,
                    event_type: row.get(2)?,
                    payload: row.get(3)?,
                    created_at: time_col(row, 4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

// ── Column helpers ─────────────────────────────────────────────

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn money_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_money_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| Decimal::from_str(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(&raw).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn opt_time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_time(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc))
}

/// Exact decimal text as stored in money columns.
pub(crate) fn money_text(amount: Decimal) -> String {
    amount.normalize().to_string()
}
