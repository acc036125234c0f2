//! Heuristic rule evaluation.
//!
//! Rules are a closed set ([`RuleKind`]); every enabled rule runs against the
//! candidate call and contributes at most one human-readable flag. Disabled
//! rules are neither evaluated nor counted.

use crate::error::{Result, ScreenError};
use crate::models::{ClassificationRule, RuleKind};
use crate::phone::PhoneNumber;
use crate::store::CallStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Attributes of the call being classified. Duration and IVR outcome are
/// unknown at inbound time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCall {
    pub from_number: String,
    pub to_store: Option<String>,
    pub duration_seconds: Option<i64>,
    pub passes_ivr: Option<bool>,
}

impl CandidateCall {
    pub fn inbound(from_number: &str, to_store: Option<String>) -> Self {
        Self {
            from_number: from_number.to_string(),
            to_store,
            duration_seconds: None,
            passes_ivr: None,
        }
    }

    pub fn phone_key(&self) -> String {
        PhoneNumber::key(&self.from_number)
    }
}

/// Recent activity of the caller, excluding the call being classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallHistory {
    pub window_minutes: i64,
    pub prior_calls: u32,
    pub prior_stores: u32,
}

impl CallHistory {
    pub fn empty(window: Duration) -> Self {
        Self {
            window_minutes: window.num_minutes(),
            prior_calls: 0,
            prior_stores: 0,
        }
    }

    /// Read the trailing-window aggregates the enabled rules need.
    pub fn load(
        store: &dyn CallStore,
        phone_key: &str,
        rules: &RuleSet,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let since = now - window;
        let mut history = Self::empty(window);
        if rules.is_enabled(RuleKind::HighFrequency) {
            history.prior_calls = store.count_calls_since(phone_key, since)?;
        }
        if rules.is_enabled(RuleKind::MultiStore) {
            history.prior_stores = store.count_distinct_stores_since(phone_key, since)?;
        }
        Ok(history)
    }

    fn per_window(&self) -> String {
        if self.window_minutes == 60 {
            "hr".to_string()
        } else {
            format!("{}min", self.window_minutes)
        }
    }
}

/// Snapshot of the enabled rules and their thresholds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<(RuleKind, f64)>,
}

impl RuleSet {
    pub fn from_rules(rules: &[ClassificationRule]) -> Self {
        let mut enabled: Vec<(RuleKind, f64)> = rules
            .iter()
            .filter(|r| r.enabled)
            .map(|r| (r.rule, r.threshold))
            .collect();
        enabled.sort_by_key(|(kind, _)| *kind);
        Self { rules: enabled }
    }

    pub fn load(store: &dyn CallStore) -> Result<Self> {
        Ok(Self::from_rules(&store.enabled_rules()?))
    }

    pub fn is_enabled(&self, kind: RuleKind) -> bool {
        self.rules.iter().any(|(k, _)| *k == kind)
    }

    pub fn threshold(&self, kind: RuleKind) -> Option<f64> {
        self.rules.iter().find(|(k, _)| *k == kind).map(|(_, t)| *t)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Run every enabled rule; flags come back in rule order.
    pub fn evaluate(&self, call: &CandidateCall, history: &CallHistory) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(|(kind, threshold)| evaluate_rule(*kind, *threshold, call, history))
            .collect()
    }
}

fn evaluate_rule(
    kind: RuleKind,
    threshold: f64,
    call: &CandidateCall,
    history: &CallHistory,
) -> Option<String> {
    match kind {
        RuleKind::ShortDuration => {
            let duration = call.duration_seconds?;
            ((duration as f64) < threshold)
                .then(|| format!("Short duration ({duration}s < {threshold}s threshold)"))
        }
        RuleKind::HighFrequency => {
            // The call being classified counts toward its own frequency.
            let total = history.prior_calls + 1;
            (f64::from(total) >= threshold).then(|| {
                format!(
                    "High call frequency ({total} calls/{})",
                    history.per_window()
                )
            })
        }
        RuleKind::MultiStore => {
            let stores = history.prior_stores + u32::from(call.to_store.is_some());
            (f64::from(stores) > threshold).then(|| {
                format!(
                    "Multi-store calling ({stores} stores/{})",
                    history.per_window()
                )
            })
        }
        RuleKind::IvrChallengeFail => {
            (call.passes_ivr == Some(false)).then(|| "Failed IVR press-1 challenge".to_string())
        }
    }
}

/// Threshold / enabled change requested by an operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleUpdate {
    pub threshold: Option<f64>,
    pub enabled: Option<bool>,
}

pub fn update_rule(
    store: &dyn CallStore,
    id: i64,
    update: RuleUpdate,
) -> Result<ClassificationRule> {
    if let Some(threshold) = update.threshold {
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ScreenError::invalid(format!(
                "threshold must be a non-negative number, got {threshold}"
            )));
        }
    }
    let rule = store
        .update_rule(id, update.threshold, update.enabled)?
        .ok_or_else(|| ScreenError::not_found("Rule", id))?;
    log::info!(
        "Rule {} updated: threshold={} enabled={}",
        rule.rule,
        rule.threshold,
        rule.enabled
    );
    Ok(rule)
}
