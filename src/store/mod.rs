//! Storage seam for the screening engine.
//!
//! The engine holds no entity state of its own; every decision reads a
//! snapshot of lists, rules and recent history through [`CallStore`], and
//! every mutation is a single-row insert or update keyed by a unique column.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::{
    CallAction, CallFlags, CallRecord, Classification, ClassificationRule, ListEntry,
    ListEntryPatch, ListType, NewCallRecord, NewListEntry, SimulationProfile,
};
use crate::statistics::{CallCounts, CallPage, CallQuery};
use chrono::{DateTime, Utc};

/// Fields rewritten when a call's classification changes after the fact.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationUpdate {
    pub classification: Classification,
    pub action: CallAction,
    pub reason: String,
    pub auto_whitelisted: bool,
}

pub trait CallStore: Send + Sync {
    /// Entry whose normalised number matches `phone_key` (digits only).
    fn find_list_entry(&self, phone_key: &str) -> Result<Option<ListEntry>>;
    fn find_list_entry_by_id(&self, id: i64) -> Result<Option<ListEntry>>;
    fn list_entries(&self, list_type: Option<ListType>) -> Result<Vec<ListEntry>>;
    /// Insert, or overwrite type/label/notes of the existing entry for the same number.
    fn upsert_list_entry(&self, entry: &NewListEntry) -> Result<ListEntry>;
    /// Insert only when no entry exists for the number. Returns whether a row was written.
    fn insert_list_entry_if_absent(&self, entry: &NewListEntry) -> Result<bool>;
    fn update_list_entry(&self, id: i64, patch: &ListEntryPatch) -> Result<Option<ListEntry>>;
    fn delete_list_entry(&self, id: i64) -> Result<bool>;

    fn rules(&self) -> Result<Vec<ClassificationRule>>;
    fn enabled_rules(&self) -> Result<Vec<ClassificationRule>> {
        Ok(self.rules()?.into_iter().filter(|r| r.enabled).collect())
    }
    fn update_rule(
        &self,
        id: i64,
        threshold: Option<f64>,
        enabled: Option<bool>,
    ) -> Result<Option<ClassificationRule>>;

    /// Calls from `phone_key` created after `since`.
    fn count_calls_since(&self, phone_key: &str, since: DateTime<Utc>) -> Result<u32>;
    /// Distinct destination stores called by `phone_key` after `since`.
    fn count_distinct_stores_since(&self, phone_key: &str, since: DateTime<Utc>) -> Result<u32>;

    fn insert_call(&self, call: &NewCallRecord) -> Result<CallRecord>;
    fn find_call(&self, id: i64) -> Result<Option<CallRecord>>;
    /// When duplicates share a correlation id, a concluded record wins over
    /// pending ones; among pending records the newest wins.
    fn find_call_by_correlation_id(&self, correlation_id: &str) -> Result<Option<CallRecord>>;
    /// Records the duration, and optionally the rewritten classification, in
    /// one write that only applies while no duration is set. Returns whether
    /// the write happened.
    fn conclude_call(
        &self,
        id: i64,
        seconds: i64,
        update: Option<&ClassificationUpdate>,
    ) -> Result<bool>;
    /// Applies reviewer flags and marks the call reviewed.
    fn set_call_flags(&self, id: i64, flags: CallFlags) -> Result<Option<CallRecord>>;
    fn list_calls(&self, query: &CallQuery) -> Result<CallPage>;
    fn call_counts(&self) -> Result<CallCounts>;

    fn list_profiles(&self) -> Result<Vec<SimulationProfile>>;
    fn find_profile(&self, id: i64) -> Result<Option<SimulationProfile>>;
    fn random_profile(&self) -> Result<Option<SimulationProfile>>;
    /// Display label for a caller: curated list label first, then profile label.
    fn caller_label(&self, phone_key: &str) -> Result<Option<String>>;
}
