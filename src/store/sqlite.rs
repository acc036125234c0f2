use super::{CallStore, ClassificationUpdate};
use crate::config::Config;
use crate::error::{storage, Result, ScreenError};
use crate::models::{
    CallFlags, CallRecord, ClassificationRule, ListEntry, ListEntryPatch, ListType,
    NewCallRecord, NewListEntry, RuleKind, SimulationProfile,
};
use crate::phone::PhoneNumber;
use crate::statistics::{CallCounts, CallPage, CallQuery, ClassificationCounts};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS phone_lists (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phone_number TEXT NOT NULL,
    phone_key TEXT NOT NULL UNIQUE,
    list_type TEXT NOT NULL CHECK (list_type IN ('whitelist', 'blacklist')),
    label TEXT,
    notes TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS classification_rules (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    rule_name TEXT NOT NULL UNIQUE,
    threshold_value REAL NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS calls (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    from_number TEXT NOT NULL,
    from_key TEXT NOT NULL,
    to_store TEXT,
    duration_seconds INTEGER,
    classification TEXT NOT NULL,
    action TEXT NOT NULL,
    reason TEXT NOT NULL,
    is_simulated INTEGER NOT NULL DEFAULT 0,
    correlation_id TEXT,
    auto_whitelisted INTEGER NOT NULL DEFAULT 0,
    flagged_false_positive INTEGER NOT NULL DEFAULT 0,
    flagged_false_negative INTEGER NOT NULL DEFAULT 0,
    reviewed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_calls_from_key_created ON calls (from_key, created_at);
CREATE INDEX IF NOT EXISTS idx_calls_correlation ON calls (correlation_id);

CREATE TABLE IF NOT EXISTS simulation_profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    phone_number TEXT NOT NULL,
    phone_key TEXT NOT NULL,
    behavior TEXT NOT NULL,
    avg_duration_seconds INTEGER NOT NULL,
    targets_multiple_stores INTEGER NOT NULL,
    passes_ivr INTEGER NOT NULL,
    label TEXT NOT NULL
);
";

const CALL_COLUMNS: &str = "id, from_number, to_store, duration_seconds, classification, action, \
     reason, is_simulated, correlation_id, auto_whitelisted, flagged_false_positive, \
     flagged_false_negative, reviewed, created_at";

const LIST_COLUMNS: &str = "id, phone_number, list_type, label, notes, updated_at";

const PROFILE_COLUMNS: &str = "id, phone_number, behavior, avg_duration_seconds, \
     targets_multiple_stores, passes_ivr, label";

/// SQLite-backed [`CallStore`]. One connection behind a mutex; every
/// operation is a single statement or a short read-after-write.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &str, config: &Config) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ScreenError::Config(format!(
                        "Failed to create database directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }
        let conn = Connection::open(db_path).map_err(storage("open_database"))?;
        Self::initialize(conn, config)
    }

    pub fn open_in_memory(config: &Config) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage("open_database"))?;
        Self::initialize(conn, config)
    }

    fn initialize(conn: Connection, config: &Config) -> Result<Self> {
        conn.execute_batch(SCHEMA).map_err(storage("create_schema"))?;
        let store = SqliteStore {
            conn: Mutex::new(conn),
        };
        store.seed(config)?;
        Ok(store)
    }

    /// First-boot seeding. Rules are inserted when missing and never
    /// overwritten; profiles and lists only when their tables are empty.
    fn seed(&self, config: &Config) -> Result<()> {
        let conn = self.conn();
        let now = Utc::now();

        for seed in &config.rules {
            conn.execute(
                "INSERT OR IGNORE INTO classification_rules (rule_name, threshold_value, enabled, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![seed.rule.as_str(), seed.threshold, seed.enabled, now],
            )
            .map_err(storage("seed_rules"))?;
        }

        let profile_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM simulation_profiles", [], |row| row.get(0))
            .map_err(storage("seed_profiles"))?;
        if profile_count == 0 {
            for profile in &config.profiles {
                conn.execute(
                    "INSERT INTO simulation_profiles
                     (phone_number, phone_key, behavior, avg_duration_seconds,
                      targets_multiple_stores, passes_ivr, label)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        PhoneNumber::display(&profile.phone_number),
                        PhoneNumber::key(&profile.phone_number),
                        profile.behavior.as_str(),
                        profile.avg_duration_seconds,
                        profile.targets_multiple_stores,
                        profile.passes_ivr,
                        profile.label,
                    ],
                )
                .map_err(storage("seed_profiles"))?;
            }
        }

        let list_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM phone_lists", [], |row| row.get(0))
            .map_err(storage("seed_lists"))?;
        if list_count == 0 {
            for entry in &config.lists {
                Self::upsert_entry(&conn, entry, now).map_err(storage("seed_lists"))?;
            }
            if !config.lists.is_empty() {
                log::info!("Database seeded with {} list entries", config.lists.len());
            }
        }

        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave a half-applied
        // statement behind, so a poisoned connection is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn upsert_entry(
        conn: &Connection,
        entry: &NewListEntry,
        now: DateTime<Utc>,
    ) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO phone_lists (phone_number, phone_key, list_type, label, notes, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (phone_key) DO UPDATE SET
                phone_number = excluded.phone_number,
                list_type = excluded.list_type,
                label = excluded.label,
                notes = excluded.notes,
                updated_at = excluded.updated_at",
            params![
                PhoneNumber::display(&entry.phone_number),
                PhoneNumber::key(&entry.phone_number),
                entry.list_type.as_str(),
                entry.label,
                entry.notes,
                now,
            ],
        )
    }

    fn list_entry_where(
        conn: &Connection,
        clause: &str,
        param: &dyn rusqlite::ToSql,
    ) -> rusqlite::Result<Option<ListEntry>> {
        conn.query_row(
            &format!("SELECT {LIST_COLUMNS} FROM phone_lists WHERE {clause}"),
            [param],
            list_entry_from_row,
        )
        .optional()
    }

    fn call_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<CallRecord>> {
        conn.query_row(
            &format!("SELECT {CALL_COLUMNS} FROM calls WHERE id = ?1"),
            [id],
            call_from_row,
        )
        .optional()
    }

    fn rule_by_id(conn: &Connection, id: i64) -> Result<Option<ClassificationRule>> {
        let raw = conn
            .query_row(
                "SELECT id, rule_name, threshold_value, enabled, updated_at
                 FROM classification_rules WHERE id = ?1",
                [id],
                raw_rule_from_row,
            )
            .optional()
            .map_err(storage("find_rule"))?;
        raw.map(RawRule::into_rule).transpose()
    }
}

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ScreenError>,
{
    let value: String = row.get(idx)?;
    value
        .parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn call_from_row(row: &Row<'_>) -> rusqlite::Result<CallRecord> {
    Ok(CallRecord {
        id: row.get(0)?,
        from_number: row.get(1)?,
        to_store: row.get(2)?,
        duration_seconds: row.get(3)?,
        classification: parse_column(row, 4)?,
        action: parse_column(row, 5)?,
        reason: row.get(6)?,
        is_simulated: row.get(7)?,
        correlation_id: row.get(8)?,
        auto_whitelisted: row.get(9)?,
        flagged_false_positive: row.get(10)?,
        flagged_false_negative: row.get(11)?,
        reviewed: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn list_entry_from_row(row: &Row<'_>) -> rusqlite::Result<ListEntry> {
    Ok(ListEntry {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        list_type: parse_column(row, 2)?,
        label: row.get(3)?,
        notes: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<SimulationProfile> {
    Ok(SimulationProfile {
        id: row.get(0)?,
        phone_number: row.get(1)?,
        behavior: parse_column(row, 2)?,
        avg_duration_seconds: row.get(3)?,
        targets_multiple_stores: row.get(4)?,
        passes_ivr: row.get(5)?,
        label: row.get(6)?,
    })
}

/// Rule row before its name is checked against [`RuleKind`], so a
/// misspelled name surfaces as a configuration error rather than a storage one.
struct RawRule {
    id: i64,
    name: String,
    threshold: f64,
    enabled: bool,
    updated_at: DateTime<Utc>,
}

impl RawRule {
    fn into_rule(self) -> Result<ClassificationRule> {
        Ok(ClassificationRule {
            id: self.id,
            rule: RuleKind::from_str(&self.name)?,
            threshold: self.threshold,
            enabled: self.enabled,
            updated_at: self.updated_at,
        })
    }
}

fn raw_rule_from_row(row: &Row<'_>) -> rusqlite::Result<RawRule> {
    Ok(RawRule {
        id: row.get(0)?,
        name: row.get(1)?,
        threshold: row.get(2)?,
        enabled: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn count_to_u32(count: i64) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

impl CallStore for SqliteStore {
    fn find_list_entry(&self, phone_key: &str) -> Result<Option<ListEntry>> {
        let conn = self.conn();
        Self::list_entry_where(&conn, "phone_key = ?1", &phone_key)
            .map_err(storage("find_list_entry"))
    }

    fn find_list_entry_by_id(&self, id: i64) -> Result<Option<ListEntry>> {
        let conn = self.conn();
        Self::list_entry_where(&conn, "id = ?1", &id).map_err(storage("find_list_entry"))
    }

    fn list_entries(&self, list_type: Option<ListType>) -> Result<Vec<ListEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {LIST_COLUMNS} FROM phone_lists
                 WHERE (?1 IS NULL OR list_type = ?1)
                 ORDER BY updated_at DESC, id DESC"
            ))
            .map_err(storage("list_entries"))?;
        let entries = stmt
            .query_map([list_type.map(|t| t.as_str())], list_entry_from_row)
            .map_err(storage("list_entries"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("list_entries"))?;
        Ok(entries)
    }

    fn upsert_list_entry(&self, entry: &NewListEntry) -> Result<ListEntry> {
        let conn = self.conn();
        Self::upsert_entry(&conn, entry, Utc::now()).map_err(storage("upsert_list_entry"))?;
        let key = PhoneNumber::key(&entry.phone_number);
        Self::list_entry_where(&conn, "phone_key = ?1", &key)
            .map_err(storage("upsert_list_entry"))?
            .ok_or_else(|| ScreenError::not_found("List entry", &entry.phone_number))
    }

    fn insert_list_entry_if_absent(&self, entry: &NewListEntry) -> Result<bool> {
        let conn = self.conn();
        let written = conn
            .execute(
                "INSERT OR IGNORE INTO phone_lists
                 (phone_number, phone_key, list_type, label, notes, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    PhoneNumber::display(&entry.phone_number),
                    PhoneNumber::key(&entry.phone_number),
                    entry.list_type.as_str(),
                    entry.label,
                    entry.notes,
                    Utc::now(),
                ],
            )
            .map_err(storage("insert_list_entry"))?;
        Ok(written == 1)
    }

    fn update_list_entry(&self, id: i64, patch: &ListEntryPatch) -> Result<Option<ListEntry>> {
        let conn = self.conn();
        let display = patch.phone_number.as_deref().map(PhoneNumber::display);
        let key = patch.phone_number.as_deref().map(PhoneNumber::key);
        let result = conn.execute(
            "UPDATE phone_lists SET
                phone_number = COALESCE(?2, phone_number),
                phone_key = COALESCE(?3, phone_key),
                list_type = COALESCE(?4, list_type),
                label = COALESCE(?5, label),
                notes = COALESCE(?6, notes),
                updated_at = ?7
             WHERE id = ?1",
            params![
                id,
                display,
                key,
                patch.list_type.map(|t| t.as_str()),
                patch.label,
                patch.notes,
                Utc::now(),
            ],
        );
        match result {
            Ok(0) => Ok(None),
            Ok(_) => Self::list_entry_where(&conn, "id = ?1", &id)
                .map_err(storage("update_list_entry")),
            Err(e) if is_constraint_violation(&e) => Err(ScreenError::invalid(format!(
                "{} is already on a list",
                display.unwrap_or_default()
            ))),
            Err(e) => Err(storage("update_list_entry")(e)),
        }
    }

    fn delete_list_entry(&self, id: i64) -> Result<bool> {
        let conn = self.conn();
        let removed = conn
            .execute("DELETE FROM phone_lists WHERE id = ?1", [id])
            .map_err(storage("delete_list_entry"))?;
        Ok(removed > 0)
    }

    fn rules(&self) -> Result<Vec<ClassificationRule>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, rule_name, threshold_value, enabled, updated_at
                 FROM classification_rules ORDER BY rule_name",
            )
            .map_err(storage("rules"))?;
        let raw = stmt
            .query_map([], raw_rule_from_row)
            .map_err(storage("rules"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("rules"))?;
        raw.into_iter().map(RawRule::into_rule).collect()
    }

    fn update_rule(
        &self,
        id: i64,
        threshold: Option<f64>,
        enabled: Option<bool>,
    ) -> Result<Option<ClassificationRule>> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE classification_rules SET
                    threshold_value = COALESCE(?2, threshold_value),
                    enabled = COALESCE(?3, enabled),
                    updated_at = ?4
                 WHERE id = ?1",
                params![id, threshold, enabled, Utc::now()],
            )
            .map_err(storage("update_rule"))?;
        if changed == 0 {
            return Ok(None);
        }
        Self::rule_by_id(&conn, id)
    }

    fn count_calls_since(&self, phone_key: &str, since: DateTime<Utc>) -> Result<u32> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM calls WHERE from_key = ?1 AND created_at > ?2",
                params![phone_key, since],
                |row| row.get(0),
            )
            .map_err(storage("count_calls_since"))?;
        Ok(count_to_u32(count))
    }

    fn count_distinct_stores_since(&self, phone_key: &str, since: DateTime<Utc>) -> Result<u32> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT to_store) FROM calls
                 WHERE from_key = ?1 AND created_at > ?2",
                params![phone_key, since],
                |row| row.get(0),
            )
            .map_err(storage("count_distinct_stores_since"))?;
        Ok(count_to_u32(count))
    }

    fn insert_call(&self, call: &NewCallRecord) -> Result<CallRecord> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO calls
             (from_number, from_key, to_store, duration_seconds, classification, action,
              reason, is_simulated, correlation_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                PhoneNumber::display(&call.from_number),
                PhoneNumber::key(&call.from_number),
                call.to_store,
                call.duration_seconds,
                call.classification.as_str(),
                call.action.as_str(),
                call.reason,
                call.is_simulated,
                call.correlation_id,
                Utc::now(),
            ],
        )
        .map_err(storage("insert_call"))?;
        let id = conn.last_insert_rowid();
        Self::call_by_id(&conn, id)
            .map_err(storage("insert_call"))?
            .ok_or_else(|| ScreenError::not_found("Call", id))
    }

    fn find_call(&self, id: i64) -> Result<Option<CallRecord>> {
        let conn = self.conn();
        Self::call_by_id(&conn, id).map_err(storage("find_call"))
    }

    fn find_call_by_correlation_id(&self, correlation_id: &str) -> Result<Option<CallRecord>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {CALL_COLUMNS} FROM calls WHERE correlation_id = ?1
                 ORDER BY (duration_seconds IS NULL) ASC, id DESC LIMIT 1"
            ),
            [correlation_id],
            call_from_row,
        )
        .optional()
        .map_err(storage("find_call_by_correlation_id"))
    }

    fn conclude_call(
        &self,
        id: i64,
        seconds: i64,
        update: Option<&ClassificationUpdate>,
    ) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE calls SET
                    duration_seconds = ?2,
                    classification = COALESCE(?3, classification),
                    action = COALESCE(?4, action),
                    reason = COALESCE(?5, reason),
                    auto_whitelisted = COALESCE(?6, auto_whitelisted)
                 WHERE id = ?1 AND duration_seconds IS NULL",
                params![
                    id,
                    seconds,
                    update.map(|u| u.classification.as_str()),
                    update.map(|u| u.action.as_str()),
                    update.map(|u| u.reason.as_str()),
                    update.map(|u| u.auto_whitelisted),
                ],
            )
            .map_err(storage("conclude_call"))?;
        Ok(changed == 1)
    }

    fn set_call_flags(&self, id: i64, flags: CallFlags) -> Result<Option<CallRecord>> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE calls SET
                    flagged_false_positive = COALESCE(?2, flagged_false_positive),
                    flagged_false_negative = COALESCE(?3, flagged_false_negative),
                    reviewed = 1
                 WHERE id = ?1",
                params![id, flags.false_positive, flags.false_negative],
            )
            .map_err(storage("set_call_flags"))?;
        if changed == 0 {
            return Ok(None);
        }
        Self::call_by_id(&conn, id).map_err(storage("set_call_flags"))
    }

    fn list_calls(&self, query: &CallQuery) -> Result<CallPage> {
        let conn = self.conn();
        let limit = query.effective_limit();
        let offset = query.effective_offset();
        let filter = query.classification.map(|c| c.as_str());

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {CALL_COLUMNS} FROM calls
                 WHERE (?1 IS NULL OR classification = ?1)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2 OFFSET ?3"
            ))
            .map_err(storage("list_calls"))?;
        let calls = stmt
            .query_map(params![filter, limit, offset], call_from_row)
            .map_err(storage("list_calls"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("list_calls"))?;

        let total: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM calls WHERE (?1 IS NULL OR classification = ?1)",
                [filter],
                |row| row.get(0),
            )
            .map_err(storage("list_calls"))?;

        Ok(CallPage {
            calls,
            total: count_to_u64(total),
            limit,
            offset,
        })
    }

    fn call_counts(&self) -> Result<CallCounts> {
        let conn = self.conn();
        conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(action = 'blocked'), 0),
                COALESCE(SUM(action = 'allowed'), 0),
                COALESCE(SUM(flagged_false_positive), 0),
                COALESCE(SUM(flagged_false_negative), 0),
                COALESCE(SUM(classification = 'blacklisted'), 0),
                COALESCE(SUM(classification = 'whitelisted'), 0),
                COALESCE(SUM(classification = 'spam_detected'), 0),
                COALESCE(SUM(classification = 'legitimate'), 0),
                COALESCE(SUM(classification = 'unknown'), 0)
             FROM calls",
            [],
            |row| {
                let n = |idx: usize| row.get::<_, i64>(idx).map(count_to_u64);
                Ok(CallCounts {
                    total: n(0)?,
                    blocked: n(1)?,
                    allowed: n(2)?,
                    false_positives: n(3)?,
                    false_negatives: n(4)?,
                    by_classification: ClassificationCounts {
                        blacklisted: n(5)?,
                        whitelisted: n(6)?,
                        spam_detected: n(7)?,
                        legitimate: n(8)?,
                        unknown: n(9)?,
                    },
                })
            },
        )
        .map_err(storage("call_counts"))
    }

    fn list_profiles(&self) -> Result<Vec<SimulationProfile>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PROFILE_COLUMNS} FROM simulation_profiles ORDER BY behavior, id"
            ))
            .map_err(storage("list_profiles"))?;
        let profiles = stmt
            .query_map([], profile_from_row)
            .map_err(storage("list_profiles"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(storage("list_profiles"))?;
        Ok(profiles)
    }

    fn find_profile(&self, id: i64) -> Result<Option<SimulationProfile>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM simulation_profiles WHERE id = ?1"),
            [id],
            profile_from_row,
        )
        .optional()
        .map_err(storage("find_profile"))
    }

    fn random_profile(&self) -> Result<Option<SimulationProfile>> {
        let conn = self.conn();
        conn.query_row(
            &format!(
                "SELECT {PROFILE_COLUMNS} FROM simulation_profiles ORDER BY RANDOM() LIMIT 1"
            ),
            [],
            profile_from_row,
        )
        .optional()
        .map_err(storage("random_profile"))
    }

    fn caller_label(&self, phone_key: &str) -> Result<Option<String>> {
        let conn = self.conn();
        let list_label: Option<Option<String>> = conn
            .query_row(
                "SELECT label FROM phone_lists WHERE phone_key = ?1",
                [phone_key],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage("caller_label"))?;
        if let Some(label) = list_label.flatten() {
            return Ok(Some(label));
        }
        conn.query_row(
            "SELECT label FROM simulation_profiles WHERE phone_key = ?1 LIMIT 1",
            [phone_key],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage("caller_label"))
    }
}
