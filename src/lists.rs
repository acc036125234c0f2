use crate::error::{Result, ScreenError};
use crate::models::{ListEntry, ListEntryPatch, ListType, NewListEntry};
use crate::phone::PhoneNumber;
use crate::store::CallStore;
use serde::{Deserialize, Serialize};

/// Outcome of checking a caller against the curated lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ListVerdict {
    Blacklisted { label: Option<String> },
    Whitelisted { label: Option<String> },
    Unresolved,
}

impl ListVerdict {
    pub fn label(&self) -> Option<&str> {
        match self {
            ListVerdict::Blacklisted { label } | ListVerdict::Whitelisted { label } => {
                label.as_deref()
            }
            ListVerdict::Unresolved => None,
        }
    }

    /// Caller status reported to the voice provider.
    pub fn caller_status(&self) -> &'static str {
        match self {
            ListVerdict::Blacklisted { .. } => "blacklisted",
            ListVerdict::Whitelisted { .. } => "whitelisted",
            ListVerdict::Unresolved => "unknown",
        }
    }
}

impl From<Option<ListEntry>> for ListVerdict {
    fn from(entry: Option<ListEntry>) -> Self {
        match entry {
            Some(ListEntry {
                list_type: ListType::Blacklist,
                label,
                ..
            }) => ListVerdict::Blacklisted { label },
            Some(ListEntry {
                list_type: ListType::Whitelist,
                label,
                ..
            }) => ListVerdict::Whitelisted { label },
            None => ListVerdict::Unresolved,
        }
    }
}

pub struct PhoneLists;

impl PhoneLists {
    /// Read-only lookup; matches on digits regardless of stored formatting.
    pub fn lookup(store: &dyn CallStore, phone_number: &str) -> Result<ListVerdict> {
        let key = PhoneNumber::key(phone_number);
        Ok(store.find_list_entry(&key)?.into())
    }

    /// Curated add. Re-adding a number overwrites its type, label and notes.
    pub fn add_entry(store: &dyn CallStore, entry: NewListEntry) -> Result<ListEntry> {
        let entry = Self::validate(entry)?;
        let saved = store.upsert_list_entry(&entry)?;
        log::info!(
            "Added {} to {} (label: {})",
            saved.phone_number,
            saved.list_type,
            saved.label.as_deref().unwrap_or("-")
        );
        Ok(saved)
    }

    /// Like [`PhoneLists::add_entry`], but the list type arrives as free text.
    pub fn add_entry_raw(
        store: &dyn CallStore,
        phone_number: &str,
        list_type: &str,
        label: Option<String>,
        notes: Option<String>,
    ) -> Result<ListEntry> {
        let list_type = list_type.parse::<ListType>()?;
        Self::add_entry(
            store,
            NewListEntry {
                phone_number: phone_number.to_string(),
                list_type,
                label,
                notes,
            },
        )
    }

    pub fn update_entry(
        store: &dyn CallStore,
        id: i64,
        mut patch: ListEntryPatch,
    ) -> Result<ListEntry> {
        if let Some(number) = patch.phone_number.take() {
            if PhoneNumber::key(&number).is_empty() {
                return Err(ScreenError::invalid("phone_number must contain digits"));
            }
            patch.phone_number = Some(number);
        }
        store
            .update_list_entry(id, &patch)?
            .ok_or_else(|| ScreenError::not_found("List entry", id))
    }

    pub fn remove_entry(store: &dyn CallStore, id: i64) -> Result<()> {
        if !store.delete_list_entry(id)? {
            return Err(ScreenError::not_found("List entry", id));
        }
        log::info!("Removed list entry {id}");
        Ok(())
    }

    pub fn entries(store: &dyn CallStore, list_type: Option<ListType>) -> Result<Vec<ListEntry>> {
        store.list_entries(list_type)
    }

    fn validate(mut entry: NewListEntry) -> Result<NewListEntry> {
        if PhoneNumber::key(&entry.phone_number).is_empty() {
            return Err(ScreenError::invalid("phone_number is required"));
        }
        entry.label = entry.label.filter(|l| !l.trim().is_empty());
        entry.notes = entry.notes.filter(|n| !n.trim().is_empty());
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::store::SqliteStore;

    fn empty_store() -> SqliteStore {
        let config = Config {
            lists: vec![],
            ..Config::default()
        };
        SqliteStore::open_in_memory(&config).unwrap()
    }

    #[test]
    fn test_lookup_ignores_stored_formatting() {
        let store = empty_store();
        PhoneLists::add_entry_raw(&store, "201 637 4059", "blacklist", None, None).unwrap();

        for incoming in ["+12016374059", "2016374059", "+1-201-637-4059"] {
            assert_eq!(
                PhoneLists::lookup(&store, incoming).unwrap(),
                ListVerdict::Blacklisted { label: None }
            );
        }
        assert_eq!(
            PhoneLists::lookup(&store, "2016374058").unwrap(),
            ListVerdict::Unresolved
        );
    }

    #[test]
    fn test_lookup_returns_label() {
        let store = empty_store();
        PhoneLists::add_entry_raw(
            &store,
            "+1-404-555-0199",
            "whitelist",
            Some("Regional Manager".to_string()),
            None,
        )
        .unwrap();
        let verdict = PhoneLists::lookup(&store, "4045550199").unwrap();
        assert_eq!(verdict.label(), Some("Regional Manager"));
        assert_eq!(verdict.caller_status(), "whitelisted");
    }

    #[test]
    fn test_invalid_list_type_rejected_before_mutation() {
        let store = empty_store();
        let result = PhoneLists::add_entry_raw(&store, "2016374059", "greylist", None, None);
        assert!(matches!(result, Err(ScreenError::InvalidInput(_))));
        assert!(PhoneLists::entries(&store, None).unwrap().is_empty());
    }

    #[test]
    fn test_missing_number_rejected() {
        let store = empty_store();
        let result = PhoneLists::add_entry_raw(&store, "  ", "whitelist", None, None);
        assert!(matches!(result, Err(ScreenError::InvalidInput(_))));
    }

    #[test]
    fn test_readding_updates_in_place() {
        let store = empty_store();
        let first = PhoneLists::add_entry_raw(
            &store,
            "2016374059",
            "whitelist",
            Some("Vendor".to_string()),
            Some("first".to_string()),
        )
        .unwrap();
        let second = PhoneLists::add_entry_raw(
            &store,
            "+1 201 637 4059",
            "blacklist",
            Some("Spoofed vendor".to_string()),
            Some("second".to_string()),
        )
        .unwrap();

        assert_eq!(first.id, second.id);
        let entries = PhoneLists::entries(&store, None).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].list_type, ListType::Blacklist);
        assert_eq!(entries[0].notes.as_deref(), Some("second"));
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn test_update_and_remove() {
        let store = empty_store();
        let entry =
            PhoneLists::add_entry_raw(&store, "2016374059", "whitelist", None, None).unwrap();

        let updated = PhoneLists::update_entry(
            &store,
            entry.id,
            ListEntryPatch {
                label: Some("Corporate".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.label.as_deref(), Some("Corporate"));
        assert_eq!(updated.list_type, ListType::Whitelist);

        PhoneLists::remove_entry(&store, entry.id).unwrap();
        assert!(matches!(
            PhoneLists::remove_entry(&store, entry.id),
            Err(ScreenError::NotFound { .. })
        ));
        assert!(matches!(
            PhoneLists::update_entry(&store, entry.id, ListEntryPatch::default()),
            Err(ScreenError::NotFound { .. })
        ));
    }

    #[test]
    fn test_entries_filter_by_type() {
        let store = empty_store();
        PhoneLists::add_entry_raw(&store, "2016374059", "whitelist", None, None).unwrap();
        PhoneLists::add_entry_raw(&store, "2016374050", "blacklist", None, None).unwrap();
        let whitelist = PhoneLists::entries(&store, Some(ListType::Whitelist)).unwrap();
        assert_eq!(whitelist.len(), 1);
        assert_eq!(whitelist[0].phone_number, "+1-201-637-4059");
    }
}
