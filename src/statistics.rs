use crate::error::Result;
use crate::models::{CallRecord, Classification};
use crate::store::CallStore;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub classification: Option<Classification>,
}

impl CallQuery {
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallPage {
    pub calls: Vec<CallRecord>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

/// Raw counters as read from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallCounts {
    pub total: u64,
    pub blocked: u64,
    pub allowed: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub by_classification: ClassificationCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub blacklisted: u64,
    pub whitelisted: u64,
    pub spam_detected: u64,
    pub legitimate: u64,
    pub unknown: u64,
}

impl ClassificationCounts {
    pub fn get(&self, classification: Classification) -> u64 {
        match classification {
            Classification::Blacklisted => self.blacklisted,
            Classification::Whitelisted => self.whitelisted,
            Classification::SpamDetected => self.spam_detected,
            Classification::Legitimate => self.legitimate,
            Classification::Unknown => self.unknown,
        }
    }
}

/// Dashboard summary of all recorded calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMetrics {
    pub total: u64,
    pub blocked: u64,
    pub allowed: u64,
    pub blocked_pct: String,
    pub allowed_pct: String,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub by_classification: ClassificationCounts,
}

impl From<CallCounts> for CallMetrics {
    fn from(counts: CallCounts) -> Self {
        CallMetrics {
            total: counts.total,
            blocked: counts.blocked,
            allowed: counts.allowed,
            blocked_pct: percentage(counts.blocked, counts.total),
            allowed_pct: percentage(counts.allowed, counts.total),
            false_positives: counts.false_positives,
            false_negatives: counts.false_negatives,
            by_classification: counts.by_classification,
        }
    }
}

fn percentage(part: u64, total: u64) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", part as f64 / total as f64 * 100.0)
}

pub struct CallStatistics;

impl CallStatistics {
    pub fn metrics(store: &dyn CallStore) -> Result<CallMetrics> {
        Ok(store.call_counts()?.into())
    }

    pub fn call_log(store: &dyn CallStore, query: &CallQuery) -> Result<CallPage> {
        store.list_calls(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentages_with_no_calls() {
        let metrics = CallMetrics::from(CallCounts::default());
        assert_eq!(metrics.blocked_pct, "0.0");
        assert_eq!(metrics.allowed_pct, "0.0");
    }

    #[test]
    fn test_percentages_round_to_one_decimal() {
        let metrics = CallMetrics::from(CallCounts {
            total: 3,
            blocked: 1,
            allowed: 2,
            ..Default::default()
        });
        assert_eq!(metrics.blocked_pct, "33.3");
        assert_eq!(metrics.allowed_pct, "66.7");
    }

    #[test]
    fn test_page_size_is_capped() {
        let query = CallQuery {
            limit: Some(1000),
            ..Default::default()
        };
        assert_eq!(query.effective_limit(), MAX_PAGE_SIZE);
        assert_eq!(CallQuery::default().effective_limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(
            CallQuery {
                limit: Some(0),
                ..Default::default()
            }
            .effective_limit(),
            DEFAULT_PAGE_SIZE
        );
    }
}
