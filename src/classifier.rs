use crate::error::Result;
use crate::lists::{ListVerdict, PhoneLists};
use crate::models::{CallAction, Classification};
use crate::rules::{CallHistory, CandidateCall, RuleSet};
use crate::store::CallStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Number of rule flags at which an unlisted caller is blocked.
pub const BLOCK_FLAG_THRESHOLD: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub classification: Classification,
    pub action: CallAction,
    pub reason: String,
}

impl Decision {
    fn new(classification: Classification, reason: impl Into<String>) -> Self {
        Self {
            classification,
            action: classification.action(),
            reason: reason.into(),
        }
    }
}

/// Fixed precedence: blacklist, then whitelist, then heuristic flags.
pub fn decide(verdict: &ListVerdict, flags: &[String]) -> Decision {
    match verdict {
        ListVerdict::Blacklisted { .. } => {
            Decision::new(Classification::Blacklisted, "Number is blacklisted")
        }
        ListVerdict::Whitelisted { .. } => {
            Decision::new(Classification::Whitelisted, "Number is whitelisted")
        }
        ListVerdict::Unresolved => match flags.len() {
            0 => Decision::new(Classification::Legitimate, "No spam indicators detected"),
            n if n >= BLOCK_FLAG_THRESHOLD => {
                Decision::new(Classification::SpamDetected, flags.join(", "))
            }
            _ => Decision::new(
                Classification::Unknown,
                format!("Suspicious but insufficient evidence: {}", flags.join(", ")),
            ),
        },
    }
}

/// Classification result plus the list verdict it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Classified {
    pub decision: Decision,
    pub verdict: ListVerdict,
    pub flags: Vec<String>,
}

pub struct CallClassifier;

impl CallClassifier {
    /// Rules and history are only consulted when neither list matches.
    pub fn classify(
        store: &dyn CallStore,
        call: &CandidateCall,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Classified> {
        let verdict = PhoneLists::lookup(store, &call.from_number)?;
        let flags = match verdict {
            ListVerdict::Unresolved => {
                let rules = RuleSet::load(store)?;
                let history = CallHistory::load(store, &call.phone_key(), &rules, window, now)?;
                rules.evaluate(call, &history)
            }
            _ => Vec::new(),
        };
        let decision = decide(&verdict, &flags);
        log::debug!(
            "Classified {} as {} ({} flags): {}",
            call.from_number,
            decision.classification,
            flags.len(),
            decision.reason
        );
        Ok(Classified {
            decision,
            verdict,
            flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{ListType, NewCallRecord, NewListEntry};
    use crate::store::SqliteStore;

    fn flags(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("flag {i}")).collect()
    }

    fn store() -> SqliteStore {
        let config = Config {
            lists: vec![],
            ..Config::default()
        };
        SqliteStore::open_in_memory(&config).unwrap()
    }

    fn record_prior_call(store: &SqliteStore, from: &str, to: &str) {
        store
            .insert_call(&NewCallRecord {
                from_number: from.to_string(),
                to_store: Some(to.to_string()),
                duration_seconds: Some(30),
                classification: Classification::Legitimate,
                action: CallAction::Allowed,
                reason: "No spam indicators detected".to_string(),
                is_simulated: false,
                correlation_id: None,
            })
            .unwrap();
    }

    #[test]
    fn test_blacklist_wins_over_flags() {
        let verdict = ListVerdict::Blacklisted { label: None };
        let decision = decide(&verdict, &flags(4));
        assert_eq!(decision.classification, Classification::Blacklisted);
        assert_eq!(decision.action, CallAction::Blocked);
        assert_eq!(decision.reason, "Number is blacklisted");
    }

    #[test]
    fn test_whitelist_wins_over_flags() {
        let verdict = ListVerdict::Whitelisted { label: None };
        let decision = decide(&verdict, &flags(3));
        assert_eq!(decision.classification, Classification::Whitelisted);
        assert_eq!(decision.action, CallAction::Allowed);
        assert_eq!(decision.reason, "Number is whitelisted");
    }

    #[test]
    fn test_flag_count_thresholds() {
        let verdict = ListVerdict::Unresolved;

        let decision = decide(&verdict, &[]);
        assert_eq!(decision.classification, Classification::Legitimate);
        assert_eq!(decision.reason, "No spam indicators detected");

        let decision = decide(&verdict, &flags(1));
        assert_eq!(decision.classification, Classification::Unknown);
        assert_eq!(decision.action, CallAction::Allowed);
        assert_eq!(
            decision.reason,
            "Suspicious but insufficient evidence: flag 0"
        );

        let decision = decide(&verdict, &flags(2));
        assert_eq!(decision.classification, Classification::SpamDetected);
        assert_eq!(decision.action, CallAction::Blocked);
        assert_eq!(decision.reason, "flag 0, flag 1");
    }

    #[test]
    fn test_action_always_follows_classification() {
        for verdict in [
            ListVerdict::Blacklisted { label: None },
            ListVerdict::Whitelisted { label: None },
            ListVerdict::Unresolved,
        ] {
            for n in 0..5 {
                let decision = decide(&verdict, &flags(n));
                assert_eq!(decision.action, decision.classification.action());
            }
        }
    }

    #[test]
    fn test_listed_caller_skips_rules() {
        let store = store();
        store
            .upsert_list_entry(&NewListEntry {
                phone_number: "2016374059".to_string(),
                list_type: ListType::Whitelist,
                label: None,
                notes: None,
            })
            .unwrap();
        let call = CandidateCall {
            from_number: "+1-201-637-4059".to_string(),
            to_store: None,
            duration_seconds: Some(1),
            passes_ivr: Some(false),
        };
        let classified =
            CallClassifier::classify(&store, &call, Duration::minutes(60), Utc::now()).unwrap();
        assert_eq!(classified.decision.classification, Classification::Whitelisted);
        assert!(classified.flags.is_empty());
    }

    #[test]
    fn test_inbound_caller_hopping_stores_is_unknown() {
        let store = store();
        let caller = "+1-555-010-2030";
        record_prior_call(&store, caller, "Store #1042 - Atlanta");
        record_prior_call(&store, caller, "Store #1187 - Charlotte");

        let call = CandidateCall::inbound(caller, Some("Store #1233 - Richmond".to_string()));
        let classified =
            CallClassifier::classify(&store, &call, Duration::minutes(60), Utc::now()).unwrap();
        assert_eq!(classified.flags, vec!["Multi-store calling (3 stores/hr)"]);
        assert_eq!(classified.decision.classification, Classification::Unknown);
    }

    #[test]
    fn test_repeat_caller_is_blocked() {
        let store = store();
        let caller = "+1-555-010-2030";
        for to in [
            "Store #1042 - Atlanta",
            "Store #1187 - Charlotte",
            "Store #1233 - Richmond",
            "Store #1398 - Nashville",
        ] {
            record_prior_call(&store, caller, to);
        }

        let call = CandidateCall::inbound(caller, Some("Store #1576 - Durham".to_string()));
        let classified =
            CallClassifier::classify(&store, &call, Duration::minutes(60), Utc::now()).unwrap();
        assert_eq!(classified.flags.len(), 2);
        assert_eq!(classified.decision.classification, Classification::SpamDetected);
        assert_eq!(
            classified.decision.reason,
            "High call frequency (5 calls/hr), Multi-store calling (5 stores/hr)"
        );
    }

    #[test]
    fn test_history_outside_window_is_ignored() {
        let store = store();
        let caller = "+1-555-010-2030";
        record_prior_call(&store, caller, "Store #1042 - Atlanta");
        record_prior_call(&store, caller, "Store #1187 - Charlotte");

        let call = CandidateCall::inbound(caller, Some("Store #1233 - Richmond".to_string()));
        let later = Utc::now() + Duration::minutes(120);
        let classified =
            CallClassifier::classify(&store, &call, Duration::minutes(60), later).unwrap();
        assert_eq!(classified.decision.classification, Classification::Legitimate);
    }
}
