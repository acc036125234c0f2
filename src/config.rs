use crate::error::ScreenError;
use crate::models::{Behavior, ListType, NewListEntry, RuleKind, SimulationProfile};
use crate::phone::PhoneNumber;
use crate::simulator::{MAX_INTERVAL_MS, MIN_INTERVAL_MS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/callscreen.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_path: String,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub handlers: HandlerConfig,
    #[serde(default = "default_store_name")]
    pub default_store_name: String,
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
    /// Seed values for the classification rules, applied on first boot only.
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleSeed>,
    #[serde(default)]
    pub profiles: Vec<SimulationProfile>,
    #[serde(default)]
    pub lists: Vec<NewListEntry>,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub fanout: FanoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_history_window_minutes")]
    pub history_window_minutes: u32,
    /// What the webhook acknowledges when the store cannot be reached.
    #[serde(default)]
    pub storage_failure: StorageFailurePolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            history_window_minutes: default_history_window_minutes(),
            storage_failure: StorageFailurePolicy::default(),
        }
    }
}

impl PolicyConfig {
    pub fn history_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.history_window_minutes))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageFailurePolicy {
    /// Acknowledge without a routing override; the provider's default handler takes the call.
    #[default]
    FailOpen,
    /// Acknowledge with an override to the blocked handler.
    FailClosed,
}

/// Downstream handler (voice agent) that takes a call after the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerRole {
    Blocked,
    Assistant,
    Screening,
}

impl HandlerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerRole::Blocked => "blocked",
            HandlerRole::Assistant => "assistant",
            HandlerRole::Screening => "screening",
        }
    }
}

/// Provider handler ids per role. A missing id means the provider's default
/// handler takes the call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub blocked: Option<String>,
    pub assistant: Option<String>,
    pub screening: Option<String>,
}

impl HandlerConfig {
    pub fn handler_for(&self, role: HandlerRole) -> Option<&str> {
        match role {
            HandlerRole::Blocked => self.blocked.as_deref(),
            HandlerRole::Assistant => self.assistant.as_deref(),
            HandlerRole::Screening => self.screening.as_deref(),
        }
    }

    /// Whether `handler` names the screening role, either by its configured
    /// id or by the role name itself.
    pub fn is_screening(&self, handler: &str) -> bool {
        handler == HandlerRole::Screening.as_str() || self.screening.as_deref() == Some(handler)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub name: String,
    /// Inbound number that rings this store, if it has one.
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSeed {
    pub rule: RuleKind,
    pub threshold: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub default_interval_ms: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutConfig {
    /// Events buffered per subscriber before deliveries to it are dropped.
    pub subscriber_buffer: usize,
}

impl Default for FanoutConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 64,
        }
    }
}

fn default_store_name() -> String {
    "Main Line".to_string()
}

fn default_history_window_minutes() -> u32 {
    60
}

fn default_enabled() -> bool {
    true
}

fn default_rules() -> Vec<RuleSeed> {
    vec![
        RuleSeed {
            rule: RuleKind::ShortDuration,
            threshold: 5.0,
            enabled: true,
        },
        RuleSeed {
            rule: RuleKind::HighFrequency,
            threshold: 5.0,
            enabled: true,
        },
        RuleSeed {
            rule: RuleKind::MultiStore,
            threshold: 2.0,
            enabled: true,
        },
        RuleSeed {
            rule: RuleKind::IvrChallengeFail,
            threshold: 1.0,
            enabled: true,
        },
    ]
}

fn profile(
    phone_number: &str,
    behavior: Behavior,
    avg_duration_seconds: i64,
    targets_multiple_stores: bool,
    passes_ivr: bool,
    label: &str,
) -> SimulationProfile {
    SimulationProfile {
        id: 0,
        phone_number: phone_number.to_string(),
        behavior,
        avg_duration_seconds,
        targets_multiple_stores,
        passes_ivr,
        label: label.to_string(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: "/var/lib/callscreen/calls.db".to_string(),
            policy: PolicyConfig::default(),
            handlers: HandlerConfig::default(),
            default_store_name: default_store_name(),
            stores: [
                "Store #1042 - Atlanta",
                "Store #2187 - Charlotte",
                "Store #0891 - Raleigh",
                "Store #3305 - Richmond",
                "Store #1576 - Durham",
            ]
            .into_iter()
            .map(|name| StoreConfig {
                name: name.to_string(),
                phone_number: None,
            })
            .collect(),
            rules: default_rules(),
            profiles: vec![
                profile("+1-404-555-0142", Behavior::Legitimate, 180, false, true, "Fleet Customer"),
                profile("+1-704-555-0187", Behavior::Legitimate, 95, false, true, "Parts Supplier"),
                profile("+1-888-555-0101", Behavior::Robocaller, 2, true, false, "Auto Warranty Robocall"),
                profile("+1-877-555-0133", Behavior::Robocaller, 3, true, false, "Vehicle Recall Scam"),
                profile("+1-919-555-0166", Behavior::Mixed, 30, false, true, "Unverified Caller"),
                profile("+1-804-555-0190", Behavior::Mixed, 25, true, true, "Survey Dialer"),
            ],
            lists: vec![
                NewListEntry {
                    phone_number: "+1-404-555-0142".to_string(),
                    list_type: ListType::Whitelist,
                    label: Some("Fleet Customer".to_string()),
                    notes: Some("Commercial account".to_string()),
                },
                NewListEntry {
                    phone_number: "+1-877-555-0133".to_string(),
                    list_type: ListType::Blacklist,
                    label: Some("Vehicle Recall Scam".to_string()),
                    notes: Some("Reported by three stores".to_string()),
                },
            ],
            generator: GeneratorConfig::default(),
            fanout: FanoutConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ScreenError> {
        if self.database_path.trim().is_empty() {
            return Err(ScreenError::Config("database_path must not be empty".into()));
        }
        if self.policy.history_window_minutes == 0 {
            return Err(ScreenError::Config(
                "policy.history_window_minutes must be positive".into(),
            ));
        }

        let mut seen = HashSet::new();
        for seed in &self.rules {
            if !seen.insert(seed.rule) {
                return Err(ScreenError::Config(format!(
                    "rule {} is configured more than once",
                    seed.rule
                )));
            }
            if !seed.threshold.is_finite() || seed.threshold < 0.0 {
                return Err(ScreenError::Config(format!(
                    "rule {} has invalid threshold {}",
                    seed.rule, seed.threshold
                )));
            }
        }

        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&self.generator.default_interval_ms) {
            return Err(ScreenError::Config(format!(
                "generator.default_interval_ms must be between {MIN_INTERVAL_MS} and {MAX_INTERVAL_MS}"
            )));
        }
        if self.fanout.subscriber_buffer == 0 {
            return Err(ScreenError::Config(
                "fanout.subscriber_buffer must be positive".into(),
            ));
        }
        if self.stores.iter().any(|s| s.name.trim().is_empty()) {
            return Err(ScreenError::Config("store names must not be empty".into()));
        }
        Ok(())
    }

    /// Store name for an inbound destination number.
    pub fn store_name_for(&self, to_number: &str) -> String {
        let key = PhoneNumber::key(to_number);
        self.stores
            .iter()
            .find(|s| {
                s.phone_number
                    .as_deref()
                    .is_some_and(|n| PhoneNumber::key(n) == key)
            })
            .map(|s| s.name.clone())
            .unwrap_or_else(|| self.default_store_name.clone())
    }

    pub fn store_names(&self) -> Vec<String> {
        if self.stores.is_empty() {
            vec![self.default_store_name.clone()]
        } else {
            self.stores.iter().map(|s| s.name.clone()).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rules.len(), 4);
        assert_eq!(config.policy.history_window_minutes, 60);
    }

    #[test]
    fn test_yaml_roundtrip_keeps_rules() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.rules, config.rules);
        assert_eq!(parsed.stores.len(), 5);
    }

    #[test]
    fn test_unknown_rule_name_fails_at_load() {
        let yaml = r#"
database_path: /tmp/calls.db
rules:
  - rule: short_duration
    threshold: 5
  - rule: call_velocity
    threshold: 3
"#;
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("database_path: /tmp/calls.db\n").unwrap();
        assert_eq!(config.default_store_name, "Main Line");
        assert_eq!(config.rules.len(), 4);
        assert_eq!(config.policy.storage_failure, StorageFailurePolicy::FailOpen);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_duplicate_rule_rejected() {
        let mut config = Config::default();
        config.rules.push(RuleSeed {
            rule: RuleKind::MultiStore,
            threshold: 3.0,
            enabled: true,
        });
        assert!(matches!(config.validate(), Err(ScreenError::Config(_))));
    }

    #[test]
    fn test_generator_interval_bounds() {
        let mut config = Config::default();
        config.generator.default_interval_ms = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_name_lookup() {
        let mut config = Config::default();
        config.stores[1].phone_number = Some("+1 (704) 555-0100".to_string());
        assert_eq!(config.store_name_for("7045550100"), "Store #2187 - Charlotte");
        assert_eq!(config.store_name_for("+15555550000"), "Main Line");
    }

    #[test]
    fn test_screening_handler_matching() {
        let handlers = HandlerConfig {
            screening: Some("agent_screen_01".to_string()),
            ..Default::default()
        };
        assert!(handlers.is_screening("agent_screen_01"));
        assert!(handlers.is_screening("screening"));
        assert!(!handlers.is_screening("agent_assist_01"));
        assert_eq!(handlers.handler_for(HandlerRole::Blocked), None);
    }
}
