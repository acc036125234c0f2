use crate::error::ScreenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Blacklisted,
    Whitelisted,
    SpamDetected,
    Legitimate,
    Unknown,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::Blacklisted,
        Classification::Whitelisted,
        Classification::SpamDetected,
        Classification::Legitimate,
        Classification::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Blacklisted => "blacklisted",
            Classification::Whitelisted => "whitelisted",
            Classification::SpamDetected => "spam_detected",
            Classification::Legitimate => "legitimate",
            Classification::Unknown => "unknown",
        }
    }

    /// The action implied by a classification: only deny-listed and
    /// spam-detected callers are blocked.
    pub fn action(&self) -> CallAction {
        match self {
            Classification::Blacklisted | Classification::SpamDetected => CallAction::Blocked,
            _ => CallAction::Allowed,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Classification {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Classification::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ScreenError::invalid(format!("unknown classification '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallAction {
    Blocked,
    Allowed,
}

impl CallAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallAction::Blocked => "blocked",
            CallAction::Allowed => "allowed",
        }
    }
}

impl FromStr for CallAction {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocked" => Ok(CallAction::Blocked),
            "allowed" => Ok(CallAction::Allowed),
            other => Err(ScreenError::invalid(format!("unknown action '{other}'"))),
        }
    }
}

/// One row per phone call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: i64,
    pub from_number: String,
    pub to_store: Option<String>,
    pub duration_seconds: Option<i64>,
    pub classification: Classification,
    pub action: CallAction,
    pub reason: String,
    pub is_simulated: bool,
    pub correlation_id: Option<String>,
    pub auto_whitelisted: bool,
    pub flagged_false_positive: bool,
    pub flagged_false_negative: bool,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of a call, derived from whether its duration is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Concluded,
}

impl CallRecord {
    pub fn state(&self) -> CallState {
        if self.duration_seconds.is_some() {
            CallState::Concluded
        } else {
            CallState::Pending
        }
    }
}

/// A call about to be inserted.
#[derive(Debug, Clone)]
pub struct NewCallRecord {
    pub from_number: String,
    pub to_store: Option<String>,
    pub duration_seconds: Option<i64>,
    pub classification: Classification,
    pub action: CallAction,
    pub reason: String,
    pub is_simulated: bool,
    pub correlation_id: Option<String>,
}

/// Reviewer flag toggles; absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFlags {
    pub false_positive: Option<bool>,
    pub false_negative: Option<bool>,
}

impl CallFlags {
    pub fn is_empty(&self) -> bool {
        self.false_positive.is_none() && self.false_negative.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListType {
    Whitelist,
    Blacklist,
}

impl ListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListType::Whitelist => "whitelist",
            ListType::Blacklist => "blacklist",
        }
    }
}

impl fmt::Display for ListType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListType {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "whitelist" => Ok(ListType::Whitelist),
            "blacklist" => Ok(ListType::Blacklist),
            other => Err(ScreenError::invalid(format!(
                "list_type must be whitelist or blacklist, got '{other}'"
            ))),
        }
    }
}

/// One curated allow/deny entry; unique per normalised number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    pub id: i64,
    pub phone_number: String,
    pub list_type: ListType,
    pub label: Option<String>,
    pub notes: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListEntry {
    pub phone_number: String,
    pub list_type: ListType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Partial update of a list entry; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListEntryPatch {
    pub phone_number: Option<String>,
    pub list_type: Option<ListType>,
    pub label: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    ShortDuration,
    HighFrequency,
    MultiStore,
    IvrChallengeFail,
}

impl RuleKind {
    pub const ALL: [RuleKind; 4] = [
        RuleKind::ShortDuration,
        RuleKind::HighFrequency,
        RuleKind::MultiStore,
        RuleKind::IvrChallengeFail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::ShortDuration => "short_duration",
            RuleKind::HighFrequency => "high_frequency",
            RuleKind::MultiStore => "multi_store",
            RuleKind::IvrChallengeFail => "ivr_challenge_fail",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleKind {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ScreenError::Config(format!("unknown classification rule '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub id: i64,
    pub rule: RuleKind,
    pub threshold: f64,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Legitimate,
    Robocaller,
    Mixed,
}

impl Behavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            Behavior::Legitimate => "legitimate",
            Behavior::Robocaller => "robocaller",
            Behavior::Mixed => "mixed",
        }
    }
}

impl FromStr for Behavior {
    type Err = ScreenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legitimate" => Ok(Behavior::Legitimate),
            "robocaller" => Ok(Behavior::Robocaller),
            "mixed" => Ok(Behavior::Mixed),
            other => Err(ScreenError::Config(format!("unknown behavior '{other}'"))),
        }
    }
}

/// Synthetic caller persona used by the traffic generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationProfile {
    #[serde(default)]
    pub id: i64,
    pub phone_number: String,
    pub behavior: Behavior,
    pub avg_duration_seconds: i64,
    pub targets_multiple_stores: bool,
    pub passes_ivr: bool,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_follows_classification() {
        assert_eq!(Classification::Blacklisted.action(), CallAction::Blocked);
        assert_eq!(Classification::SpamDetected.action(), CallAction::Blocked);
        assert_eq!(Classification::Whitelisted.action(), CallAction::Allowed);
        assert_eq!(Classification::Legitimate.action(), CallAction::Allowed);
        assert_eq!(Classification::Unknown.action(), CallAction::Allowed);
    }

    #[test]
    fn test_rule_kind_parsing_is_closed() {
        for kind in RuleKind::ALL {
            assert_eq!(kind.as_str().parse::<RuleKind>().unwrap(), kind);
        }
        assert!(matches!(
            "short_duraton".parse::<RuleKind>(),
            Err(ScreenError::Config(_))
        ));
    }

    #[test]
    fn test_list_type_rejects_other_values() {
        assert_eq!("blacklist".parse::<ListType>().unwrap(), ListType::Blacklist);
        assert!(matches!(
            "greylist".parse::<ListType>(),
            Err(ScreenError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_classification_serializes_snake_case() {
        let json = serde_json::to_string(&Classification::SpamDetected).unwrap();
        assert_eq!(json, "\"spam_detected\"");
        assert_eq!(
            "spam_detected".parse::<Classification>().unwrap(),
            Classification::SpamDetected
        );
    }
}
