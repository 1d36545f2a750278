//! Storage layer for the SLA engine.
//!
//! Provides persistence for time entries, customer hour accounts, SLA rules,
//! and SLA trackers using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. A `Database` can be moved between threads but cannot be shared
//! without external synchronization (e.g. a `Mutex<Database>` per service
//! instance, or one connection per thread).
//!
//! # Concurrency
//!
//! Every read-modify-write runs in an immediate transaction so check-then-act
//! sequences (one running timer per ticket/agent, hour-account recompute,
//! escalation claims) are atomic against concurrent writers. A partial unique
//! index on `time_entries(ticket_id, agent_id) WHERE end_time IS NULL`
//! backstops the timer invariant at the schema level. Writes that hit
//! `SQLITE_BUSY` are retried up to [`WRITE_ATTEMPTS`] times before surfacing
//! [`DbError::Busy`] to the caller.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 UTC (e.g. `2024-01-15T10:30:00Z`)
//! so lexicographic ordering matches chronological ordering. Durations and
//! hour balances are REAL, always rounded to 2 decimals before storage.
//! The schema is created by an idempotent [`Database::migrate`] pass when the
//! database is opened; no per-request existence checks.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use thiserror::Error;

use sd_core::escalation::BreachKind;
use sd_core::hours::{elapsed_hours, hours_between, round_hours};
use sd_core::rule::SlaRule;
use sd_core::tracker::SlaTracker;
use sd_core::types::Priority;

/// Bounded retry for writes that hit a busy database.
pub const WRITE_ATTEMPTS: u32 = 3;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A timer is already running for this ticket/agent pair.
    #[error("timer already running for ticket {ticket_id} and agent {agent_id}")]
    TimerAlreadyRunning { ticket_id: String, agent_id: String },
    /// No running timer exists for this ticket/agent pair.
    #[error("no active timer for ticket {ticket_id} and agent {agent_id}")]
    NoActiveTimer { ticket_id: String, agent_id: String },
    /// The database stayed busy through the bounded retry.
    #[error("database busy after {attempts} attempts")]
    Busy { attempts: u32 },
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table} row {id}: {value}")]
    TimestampParse {
        table: &'static str,
        id: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored value failed domain validation (e.g. unknown priority).
    #[error("invalid {table} row {id}: {message}")]
    InvalidRow {
        table: &'static str,
        id: String,
        message: String,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A row of the time ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeEntryRecord {
    pub id: String,
    pub ticket_id: String,
    pub agent_id: String,
    pub customer_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_hours: f64,
}

impl sd_core::LedgerEntry for TimeEntryRecord {
    fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    fn duration_hours(&self) -> f64 {
        self.duration_hours
    }
}

/// A new ledger entry created by a timer start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimeEntry {
    pub id: String,
    pub ticket_id: String,
    pub agent_id: String,
    pub customer_id: String,
    pub start_time: DateTime<Utc>,
}

/// A customer hour account balance.
///
/// `hours_spent` here is freshly derived wherever the record is produced;
/// the stored column is only a cache for dashboards that read the table
/// directly.
#[derive(Debug, Clone, PartialEq)]
pub struct HourAccountRecord {
    pub customer_id: String,
    pub hours_allocated: f64,
    pub hours_spent: f64,
    pub hours_remaining: f64,
}

/// A tracker row to insert at ticket creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTracker {
    pub ticket_id: String,
    pub rule_id: i64,
    pub created_at: DateTime<Utc>,
    pub first_response_target: DateTime<Utc>,
    pub resolution_target: DateTime<Utc>,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// Runs the idempotent schema migration before returning.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Creates the schema.
    ///
    /// Idempotent; runs once at open, which is the explicit migration step
    /// for this deployment model.
    fn migrate(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS time_entries (
                id TEXT PRIMARY KEY,
                ticket_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                customer_id TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                duration_hours REAL NOT NULL DEFAULT 0
            );

            -- One running timer per (ticket, agent); different agents may run
            -- concurrent timers on the same ticket.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_time_entries_running
                ON time_entries(ticket_id, agent_id) WHERE end_time IS NULL;

            CREATE INDEX IF NOT EXISTS idx_time_entries_ticket ON time_entries(ticket_id);
            CREATE INDEX IF NOT EXISTS idx_time_entries_customer ON time_entries(customer_id);

            CREATE TABLE IF NOT EXISTS hour_accounts (
                customer_id TEXT PRIMARY KEY,
                hours_allocated REAL NOT NULL DEFAULT 0,
                hours_spent REAL NOT NULL DEFAULT 0,
                hours_remaining REAL NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sla_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                priority TEXT NOT NULL,
                first_response_hours REAL NOT NULL,
                resolution_hours REAL NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_sla_rules_priority ON sla_rules(priority);

            CREATE TABLE IF NOT EXISTS sla_trackers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ticket_id TEXT NOT NULL UNIQUE,
                rule_id INTEGER NOT NULL REFERENCES sla_rules(id),
                created_at TEXT NOT NULL,
                first_response_target TEXT NOT NULL,
                first_response_actual TEXT,
                first_response_met INTEGER,
                resolution_target TEXT NOT NULL,
                resolution_actual TEXT,
                resolution_met INTEGER,
                first_response_escalated_at TEXT,
                resolution_escalated_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_sla_trackers_fr_target
                ON sla_trackers(first_response_target);
            CREATE INDEX IF NOT EXISTS idx_sla_trackers_res_target
                ON sla_trackers(resolution_target);
            ",
        )?;
        Ok(())
    }

    // ========== Time Ledger ==========

    /// Starts a timer, inserting a running ledger entry.
    ///
    /// Fails with [`DbError::TimerAlreadyRunning`] if a running entry already
    /// exists for the ticket/agent pair.
    pub fn start_timer(&mut self, entry: &NewTimeEntry) -> Result<(), DbError> {
        with_retry(|| {
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;
            let running: Option<String> = tx
                .query_row(
                    "SELECT id FROM time_entries
                     WHERE ticket_id = ? AND agent_id = ? AND end_time IS NULL",
                    params![entry.ticket_id, entry.agent_id],
                    |row| row.get(0),
                )
                .optional()?;
            if running.is_some() {
                return Err(DbError::TimerAlreadyRunning {
                    ticket_id: entry.ticket_id.clone(),
                    agent_id: entry.agent_id.clone(),
                });
            }
            let inserted = tx.execute(
                "INSERT INTO time_entries
                 (id, ticket_id, agent_id, customer_id, start_time, end_time, duration_hours)
                 VALUES (?, ?, ?, ?, ?, NULL, 0)",
                params![
                    entry.id,
                    entry.ticket_id,
                    entry.agent_id,
                    entry.customer_id,
                    format_timestamp(entry.start_time),
                ],
            );
            match inserted {
                Ok(_) => {}
                // The partial unique index backstops a racing start that
                // slipped past the check above.
                Err(err) if is_unique_violation(&err) => {
                    return Err(DbError::TimerAlreadyRunning {
                        ticket_id: entry.ticket_id.clone(),
                        agent_id: entry.agent_id.clone(),
                    });
                }
                Err(err) => return Err(err.into()),
            }
            tx.commit()?;
            Ok(())
        })
    }

    /// Stops the running timer for a ticket/agent pair.
    ///
    /// Computes the entry duration (wall-clock hours, 2 decimals), persists
    /// it, and refreshes the customer's hour-account cache from the ledger
    /// inside the same transaction. Returns the duration.
    pub fn stop_timer(
        &mut self,
        ticket_id: &str,
        agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<f64, DbError> {
        with_retry(|| {
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;
            let running: Option<(String, String, String)> = tx
                .query_row(
                    "SELECT id, customer_id, start_time FROM time_entries
                     WHERE ticket_id = ? AND agent_id = ? AND end_time IS NULL",
                    params![ticket_id, agent_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let Some((entry_id, customer_id, start_time)) = running else {
                return Err(DbError::NoActiveTimer {
                    ticket_id: ticket_id.to_string(),
                    agent_id: agent_id.to_string(),
                });
            };
            let start = parse_timestamp("time_entries", &entry_id, &start_time)?;
            let duration = hours_between(start, now);
            tx.execute(
                "UPDATE time_entries SET end_time = ?, duration_hours = ? WHERE id = ?",
                params![format_timestamp(now), duration, entry_id],
            )?;
            refresh_account_cache(&tx, &customer_id, now)?;
            tx.commit()?;
            tracing::debug!(ticket_id, agent_id, duration, "timer stopped");
            Ok(duration)
        })
    }

    /// All ledger entries for a ticket, oldest first.
    pub fn entries_for_ticket(&self, ticket_id: &str) -> Result<Vec<TimeEntryRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ticket_id, agent_id, customer_id, start_time, end_time, duration_hours
             FROM time_entries WHERE ticket_id = ?
             ORDER BY start_time ASC, id ASC",
        )?;
        let rows = stmt.query_map([ticket_id], entry_row)?;
        collect_entries(rows)
    }

    /// All ledger entries for a customer, oldest first.
    pub fn entries_for_customer(&self, customer_id: &str) -> Result<Vec<TimeEntryRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ticket_id, agent_id, customer_id, start_time, end_time, duration_hours
             FROM time_entries WHERE customer_id = ?
             ORDER BY start_time ASC, id ASC",
        )?;
        let rows = stmt.query_map([customer_id], entry_row)?;
        collect_entries(rows)
    }

    /// Total hours logged against a ticket as of `now`.
    ///
    /// Running timers contribute live elapsed time without being stopped.
    pub fn elapsed_for_ticket(&self, ticket_id: &str, now: DateTime<Utc>) -> Result<f64, DbError> {
        let entries = self.entries_for_ticket(ticket_id)?;
        Ok(elapsed_hours(&entries, now))
    }

    /// Total hours logged for a customer as of `now`.
    ///
    /// This is the source of truth for "spent"; the hour-account column is a
    /// cache of it.
    pub fn total_hours_for_customer(
        &self,
        customer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<f64, DbError> {
        let entries = self.entries_for_customer(customer_id)?;
        Ok(elapsed_hours(&entries, now))
    }

    // ========== Customer Hour Accounts ==========

    /// Adds allocated hours to a customer account, creating it if absent.
    ///
    /// `hours_spent` is recomputed from the ledger inside the same
    /// transaction rather than trusted from the cached column, so the write
    /// self-heals any drift.
    pub fn allocate_hours(
        &mut self,
        customer_id: &str,
        hours: f64,
        now: DateTime<Utc>,
    ) -> Result<HourAccountRecord, DbError> {
        with_retry(|| {
            let tx = self
                .conn
                .transaction_with_behavior(TransactionBehavior::Immediate)?;
            let existing: Option<f64> = tx
                .query_row(
                    "SELECT hours_allocated FROM hour_accounts WHERE customer_id = ?",
                    [customer_id],
                    |row| row.get(0),
                )
                .optional()?;
            let allocated = round_hours(existing.unwrap_or(0.0) + hours);
            let spent = ledger_total(&tx, customer_id, now)?;
            let remaining = round_hours(allocated - spent);
            tx.execute(
                "INSERT INTO hour_accounts
                 (customer_id, hours_allocated, hours_spent, hours_remaining, updated_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(customer_id) DO UPDATE SET
                     hours_allocated = excluded.hours_allocated,
                     hours_spent = excluded.hours_spent,
                     hours_remaining = excluded.hours_remaining,
                     updated_at = excluded.updated_at",
                params![
                    customer_id,
                    allocated,
                    spent,
                    remaining,
                    format_timestamp(now)
                ],
            )?;
            tx.commit()?;
            Ok(HourAccountRecord {
                customer_id: customer_id.to_string(),
                hours_allocated: allocated,
                hours_spent: spent,
                hours_remaining: remaining,
            })
        })
    }

    /// Account balance with `spent` recomputed from the ledger at read time.
    ///
    /// Returns `None` for customers with no allocation yet; their hours are
    /// not tracked. Remaining may be negative: over-allocation is surfaced,
    /// never blocked.
    pub fn account_summary(
        &self,
        customer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<HourAccountRecord>, DbError> {
        let allocated: Option<f64> = self
            .conn
            .query_row(
                "SELECT hours_allocated FROM hour_accounts WHERE customer_id = ?",
                [customer_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(allocated) = allocated else {
            return Ok(None);
        };
        let spent = self.total_hours_for_customer(customer_id, now)?;
        Ok(Some(HourAccountRecord {
            customer_id: customer_id.to_string(),
            hours_allocated: allocated,
            hours_spent: spent,
            hours_remaining: round_hours(allocated - spent),
        }))
    }

    // ========== SLA Rules ==========

    /// Inserts a rule and returns its id.
    pub fn insert_rule(
        &mut self,
        name: &str,
        priority: Priority,
        first_response_hours: f64,
        resolution_hours: f64,
    ) -> Result<i64, DbError> {
        self.conn.execute(
            "INSERT INTO sla_rules (name, priority, first_response_hours, resolution_hours, enabled)
             VALUES (?, ?, ?, ?, 1)",
            params![
                name,
                priority.as_str(),
                first_response_hours,
                resolution_hours
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Lists all rules ordered by id.
    pub fn list_rules(&self) -> Result<Vec<SlaRule>, DbError> {
        self.query_rules("SELECT id, name, priority, first_response_hours, resolution_hours, enabled FROM sla_rules ORDER BY id ASC")
    }

    /// Lists enabled rules ordered by id, the input to rule matching.
    pub fn enabled_rules(&self) -> Result<Vec<SlaRule>, DbError> {
        self.query_rules("SELECT id, name, priority, first_response_hours, resolution_hours, enabled FROM sla_rules WHERE enabled = 1 ORDER BY id ASC")
    }

    fn query_rules(&self, sql: &str) -> Result<Vec<SlaRule>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, bool>(5)?,
            ))
        })?;
        let mut rules = Vec::new();
        for row in rows {
            let (id, name, priority, first_response_hours, resolution_hours, enabled) = row?;
            let priority = priority
                .parse::<Priority>()
                .map_err(|err| DbError::InvalidRow {
                    table: "sla_rules",
                    id: id.to_string(),
                    message: err.to_string(),
                })?;
            rules.push(SlaRule {
                id,
                name,
                priority,
                first_response_hours,
                resolution_hours,
                enabled,
            });
        }
        Ok(rules)
    }

    /// Enables or disables a rule. Returns false if the rule does not exist.
    pub fn set_rule_enabled(&mut self, id: i64, enabled: bool) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE sla_rules SET enabled = ? WHERE id = ?",
            params![enabled, id],
        )?;
        Ok(changed > 0)
    }

    // ========== SLA Trackers ==========

    /// Inserts a tracker for a ticket.
    ///
    /// Returns the new tracker id, or `None` if the ticket is already
    /// tracked (re-delivered creation events are a no-op).
    pub fn insert_tracker(&mut self, tracker: &NewTracker) -> Result<Option<i64>, DbError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO sla_trackers
             (ticket_id, rule_id, created_at, first_response_target, resolution_target)
             VALUES (?, ?, ?, ?, ?)",
            params![
                tracker.ticket_id,
                tracker.rule_id,
                format_timestamp(tracker.created_at),
                format_timestamp(tracker.first_response_target),
                format_timestamp(tracker.resolution_target),
            ],
        )?;
        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(self.conn.last_insert_rowid()))
    }

    /// The tracker for a ticket, if SLA tracking applies to it.
    pub fn get_tracker(&self, ticket_id: &str) -> Result<Option<SlaTracker>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{TRACKER_SELECT} WHERE ticket_id = ?"
        ))?;
        let row = stmt
            .query_row([ticket_id], tracker_row)
            .optional()?;
        row.map(raw_tracker_into_domain).transpose()
    }

    /// Records the first agent response, first-write-wins.
    ///
    /// The conditional update means a racing duplicate call observes zero
    /// affected rows; the first recorded time and its met flag stand.
    /// Returns whether this call performed the write.
    pub fn record_first_response(
        &mut self,
        ticket_id: &str,
        actual: DateTime<Utc>,
        met: bool,
    ) -> Result<bool, DbError> {
        with_retry(|| {
            let changed = self.conn.execute(
                "UPDATE sla_trackers
                 SET first_response_actual = ?, first_response_met = ?
                 WHERE ticket_id = ? AND first_response_actual IS NULL",
                params![format_timestamp(actual), met, ticket_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Records the resolution, first-write-wins. Same contract as
    /// [`Database::record_first_response`].
    pub fn record_resolution(
        &mut self,
        ticket_id: &str,
        actual: DateTime<Utc>,
        met: bool,
    ) -> Result<bool, DbError> {
        with_retry(|| {
            let changed = self.conn.execute(
                "UPDATE sla_trackers
                 SET resolution_actual = ?, resolution_met = ?
                 WHERE ticket_id = ? AND resolution_actual IS NULL",
                params![format_timestamp(actual), met, ticket_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Trackers with at least one deadline past target, still pending, and
    /// not yet escalated. Ordered by id so sweep output is stable.
    pub fn breached_trackers(&self, now: DateTime<Utc>) -> Result<Vec<SlaTracker>, DbError> {
        let now = format_timestamp(now);
        let mut stmt = self.conn.prepare(&format!(
            "{TRACKER_SELECT}
             WHERE (first_response_actual IS NULL
                    AND first_response_target < ?1
                    AND first_response_escalated_at IS NULL)
                OR (resolution_actual IS NULL
                    AND resolution_target < ?1
                    AND resolution_escalated_at IS NULL)
             ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([now], tracker_row)?;
        let mut trackers = Vec::new();
        for row in rows {
            trackers.push(raw_tracker_into_domain(row?)?);
        }
        Ok(trackers)
    }

    /// Claims a breach for escalation with a compare-and-set write.
    ///
    /// The marker only lands if the deadline is still pending (`actual IS
    /// NULL`) and unclaimed, so a response or resolution recorded between the
    /// sweep's read and this write makes the claim fail. Returns whether the
    /// claim succeeded; a false return means skip the escalation actions.
    pub fn claim_escalation(
        &mut self,
        ticket_id: &str,
        kind: BreachKind,
        now: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let sql = match kind {
            BreachKind::FirstResponse => {
                "UPDATE sla_trackers SET first_response_escalated_at = ?
                 WHERE ticket_id = ?
                   AND first_response_actual IS NULL
                   AND first_response_escalated_at IS NULL"
            }
            BreachKind::Resolution => {
                "UPDATE sla_trackers SET resolution_escalated_at = ?
                 WHERE ticket_id = ?
                   AND resolution_actual IS NULL
                   AND resolution_escalated_at IS NULL"
            }
        };
        with_retry(|| {
            let changed = self
                .conn
                .execute(sql, params![format_timestamp(now), ticket_id])?;
            Ok(changed > 0)
        })
    }

    /// All trackers ordered by id, for analytics.
    pub fn all_trackers(&self) -> Result<Vec<SlaTracker>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TRACKER_SELECT} ORDER BY id ASC"))?;
        let rows = stmt.query_map([], tracker_row)?;
        let mut trackers = Vec::new();
        for row in rows {
            trackers.push(raw_tracker_into_domain(row?)?);
        }
        Ok(trackers)
    }

    /// Counts of stored entities, for the status command.
    pub fn table_counts(&self) -> Result<Vec<(&'static str, i64)>, DbError> {
        let mut counts = Vec::new();
        for table in ["time_entries", "hour_accounts", "sla_rules", "sla_trackers"] {
            let count: i64 =
                self.conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })?;
            counts.push((table, count));
        }
        Ok(counts)
    }
}

const TRACKER_SELECT: &str = "SELECT id, ticket_id, rule_id, created_at,
        first_response_target, first_response_actual, first_response_met,
        resolution_target, resolution_actual, resolution_met,
        first_response_escalated_at, resolution_escalated_at
 FROM sla_trackers";

/// Tracker row before timestamp parsing.
struct RawTracker {
    id: i64,
    ticket_id: String,
    rule_id: i64,
    created_at: String,
    first_response_target: String,
    first_response_actual: Option<String>,
    first_response_met: Option<bool>,
    resolution_target: String,
    resolution_actual: Option<String>,
    resolution_met: Option<bool>,
    first_response_escalated_at: Option<String>,
    resolution_escalated_at: Option<String>,
}

fn tracker_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawTracker> {
    Ok(RawTracker {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        rule_id: row.get(2)?,
        created_at: row.get(3)?,
        first_response_target: row.get(4)?,
        first_response_actual: row.get(5)?,
        first_response_met: row.get(6)?,
        resolution_target: row.get(7)?,
        resolution_actual: row.get(8)?,
        resolution_met: row.get(9)?,
        first_response_escalated_at: row.get(10)?,
        resolution_escalated_at: row.get(11)?,
    })
}

fn raw_tracker_into_domain(raw: RawTracker) -> Result<SlaTracker, DbError> {
    let id = raw.id.to_string();
    let parse = |value: &str| parse_timestamp("sla_trackers", &id, value);
    let parse_opt = |value: &Option<String>| value.as_deref().map(parse).transpose();
    Ok(SlaTracker {
        id: raw.id,
        ticket_id: raw.ticket_id,
        rule_id: raw.rule_id,
        created_at: parse(&raw.created_at)?,
        first_response_target: parse(&raw.first_response_target)?,
        first_response_actual: parse_opt(&raw.first_response_actual)?,
        first_response_met: raw.first_response_met,
        resolution_target: parse(&raw.resolution_target)?,
        resolution_actual: parse_opt(&raw.resolution_actual)?,
        resolution_met: raw.resolution_met,
        first_response_escalated_at: parse_opt(&raw.first_response_escalated_at)?,
        resolution_escalated_at: parse_opt(&raw.resolution_escalated_at)?,
    })
}

fn entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String, String, Option<String>, f64)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn collect_entries(
    rows: impl Iterator<Item = rusqlite::Result<(String, String, String, String, String, Option<String>, f64)>>,
) -> Result<Vec<TimeEntryRecord>, DbError> {
    let mut entries = Vec::new();
    for row in rows {
        let (id, ticket_id, agent_id, customer_id, start_time, end_time, duration_hours) = row?;
        let start = parse_timestamp("time_entries", &id, &start_time)?;
        let end = end_time
            .as_deref()
            .map(|value| parse_timestamp("time_entries", &id, value))
            .transpose()?;
        entries.push(TimeEntryRecord {
            id,
            ticket_id,
            agent_id,
            customer_id,
            start_time: start,
            end_time: end,
            duration_hours,
        });
    }
    Ok(entries)
}

/// Recomputes a customer's cached spent/remaining from the ledger, inside
/// the caller's transaction. No-op when the customer has no account row.
fn refresh_account_cache(
    tx: &rusqlite::Transaction<'_>,
    customer_id: &str,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let allocated: Option<f64> = tx
        .query_row(
            "SELECT hours_allocated FROM hour_accounts WHERE customer_id = ?",
            [customer_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(allocated) = allocated else {
        return Ok(());
    };
    let spent = ledger_total(tx, customer_id, now)?;
    tx.execute(
        "UPDATE hour_accounts
         SET hours_spent = ?, hours_remaining = ?, updated_at = ?
         WHERE customer_id = ?",
        params![
            spent,
            round_hours(allocated - spent),
            format_timestamp(now),
            customer_id
        ],
    )?;
    Ok(())
}

/// Ledger total for a customer as of `now`, inside a transaction.
fn ledger_total(
    tx: &rusqlite::Transaction<'_>,
    customer_id: &str,
    now: DateTime<Utc>,
) -> Result<f64, DbError> {
    let mut stmt = tx.prepare(
        "SELECT id, ticket_id, agent_id, customer_id, start_time, end_time, duration_hours
         FROM time_entries WHERE customer_id = ?
         ORDER BY start_time ASC, id ASC",
    )?;
    let rows = stmt.query_map([customer_id], entry_row)?;
    let entries = collect_entries(rows)?;
    Ok(elapsed_hours(&entries, now))
}

/// Runs a write, retrying on a busy database up to [`WRITE_ATTEMPTS`] times.
fn with_retry<T>(mut op: impl FnMut() -> Result<T, DbError>) -> Result<T, DbError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if is_busy(&err) => {
                if attempt >= WRITE_ATTEMPTS {
                    return Err(DbError::Busy { attempts: attempt });
                }
                tracing::debug!(attempt, "database busy, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_busy(err: &DbError) -> bool {
    matches!(
        err,
        DbError::Sqlite(rusqlite::Error::SqliteFailure(inner, _))
            if inner.code == rusqlite::ErrorCode::DatabaseBusy
                || inner.code == rusqlite::ErrorCode::DatabaseLocked
    )
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn parse_timestamp(table: &'static str, id: &str, value: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            id: id.to_string(),
            value: value.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
