//! Per-call state machine: `Pending` once the inbound decision is stored,
//! `Concluded` once the duration is known.

use crate::classifier::CallClassifier;
use crate::config::{Config, HandlerRole};
use crate::error::{Result, ScreenError};
use crate::fanout::{CallEvent, Fanout};
use crate::lists::ListVerdict;
use crate::models::{
    CallAction, CallFlags, CallRecord, CallState, Classification, ListType, NewCallRecord,
    NewListEntry,
};
use crate::phone::PhoneNumber;
use crate::rules::CandidateCall;
use crate::store::{CallStore, ClassificationUpdate};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Minimum screening conversation that earns an automatic whitelist entry.
pub const MIN_SCREENING_PASS_MS: u64 = 15_000;

pub const AUTO_WHITELIST_REASON: &str = "Passed voice screening — auto-whitelisted";

/// Why the provider says the call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The handling agent ended the call, e.g. after rejecting the caller.
    HandlerHangup,
    CallerHangup,
    Other(String),
}

impl DisconnectReason {
    pub fn from_provider(reason: &str) -> Self {
        match reason.trim().to_ascii_lowercase().as_str() {
            "agent_hangup" | "handler_hangup" => DisconnectReason::HandlerHangup,
            "user_hangup" | "caller_hangup" => DisconnectReason::CallerHangup,
            other => DisconnectReason::Other(other.to_string()),
        }
    }
}

/// Values the voice provider injects into the handler's prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicVariables {
    pub caller_name: String,
    pub caller_status: String,
    pub store_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundOutcome {
    pub record: CallRecord,
    pub handler_role: HandlerRole,
    /// `None` when no handler is configured for the role.
    pub routing_override: Option<String>,
    pub dynamic_variables: DynamicVariables,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEndOutcome {
    Concluded { call_id: i64 },
    AutoWhitelisted { call_id: i64, entry_created: bool },
    UnknownCorrelation,
    AlreadyConcluded { call_id: i64 },
}

pub fn handler_role(classification: Classification) -> HandlerRole {
    match classification {
        Classification::Blacklisted | Classification::SpamDetected => HandlerRole::Blocked,
        Classification::Whitelisted => HandlerRole::Assistant,
        Classification::Unknown | Classification::Legitimate => HandlerRole::Screening,
    }
}

pub struct CallCoordinator {
    store: Arc<dyn CallStore>,
    fanout: Arc<Fanout>,
    config: Arc<Config>,
}

impl CallCoordinator {
    pub fn new(store: Arc<dyn CallStore>, fanout: Arc<Fanout>, config: Arc<Config>) -> Self {
        Self {
            store,
            fanout,
            config,
        }
    }

    pub fn store(&self) -> &dyn CallStore {
        self.store.as_ref()
    }

    pub fn fanout(&self) -> &Arc<Fanout> {
        &self.fanout
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Inbound → Pending. Duplicate notifications for one correlation id each
    /// produce their own record.
    pub fn classify_and_record_inbound(
        &self,
        caller: &str,
        destination: &str,
        correlation_id: &str,
    ) -> Result<InboundOutcome> {
        if PhoneNumber::key(caller).is_empty() {
            return Err(ScreenError::invalid("from_number is required"));
        }
        let store_name = self.config.store_name_for(destination);
        let candidate = CandidateCall::inbound(caller, Some(store_name.clone()));
        let classified = CallClassifier::classify(
            self.store.as_ref(),
            &candidate,
            self.config.policy.history_window(),
            Utc::now(),
        )?;

        let record = self.store.insert_call(&NewCallRecord {
            from_number: caller.to_string(),
            to_store: Some(store_name.clone()),
            duration_seconds: None,
            classification: classified.decision.classification,
            action: classified.decision.action,
            reason: classified.decision.reason,
            is_simulated: false,
            correlation_id: Some(correlation_id.to_string()),
        })?;

        let role = handler_role(record.classification);
        let routing_override = self.config.handlers.handler_for(role).map(str::to_string);
        match &routing_override {
            Some(handler) => log::info!(
                "Call {} from {} ({}) → {} → handler {}",
                correlation_id,
                record.from_number,
                record.classification,
                store_name,
                handler
            ),
            None => log::info!(
                "Call {} from {} ({}) → {} → no {} handler configured, using default",
                correlation_id,
                record.from_number,
                record.classification,
                store_name,
                role.as_str()
            ),
        }

        let dynamic_variables = DynamicVariables {
            caller_name: classified.verdict.label().unwrap_or("Caller").to_string(),
            caller_status: classified.verdict.caller_status().to_string(),
            store_name,
        };
        let caller_label = self.caller_label(&classified.verdict, &record.from_number);
        self.emit(CallEvent::CallDecided {
            record: record.clone(),
            caller_label,
        });

        Ok(InboundOutcome {
            record,
            handler_role: role,
            routing_override,
            dynamic_variables,
        })
    }

    /// Pending → Concluded. Unknown or already concluded calls are no-ops.
    pub fn record_call_ended(
        &self,
        correlation_id: &str,
        caller: &str,
        handler_used: &str,
        duration_ms: u64,
        disconnect_reason: &DisconnectReason,
    ) -> Result<CallEndOutcome> {
        let Some(record) = self.store.find_call_by_correlation_id(correlation_id)? else {
            log::info!("call_ended for unknown call {correlation_id}, ignoring");
            return Ok(CallEndOutcome::UnknownCorrelation);
        };
        if record.state() == CallState::Concluded {
            log::info!("call_ended replay for call {correlation_id}, already concluded");
            return Ok(CallEndOutcome::AlreadyConcluded { call_id: record.id });
        }

        let seconds = i64::try_from(duration_ms / 1000).unwrap_or(i64::MAX);
        if !caller.is_empty() && !PhoneNumber::same_number(caller, &record.from_number) {
            log::warn!(
                "call_ended for {correlation_id} reports caller {caller}, record has {}",
                record.from_number
            );
        }

        let eligible = self.config.handlers.is_screening(handler_used)
            && duration_ms >= MIN_SCREENING_PASS_MS
            && *disconnect_reason != DisconnectReason::HandlerHangup;
        if !eligible {
            if !self.store.conclude_call(record.id, seconds, None)? {
                return Ok(CallEndOutcome::AlreadyConcluded { call_id: record.id });
            }
            log::debug!("Call {correlation_id} concluded after {seconds}s via {handler_used}");
            return Ok(CallEndOutcome::Concluded { call_id: record.id });
        }

        // Idempotent. The record stays Pending until the conclusion lands.
        let entry_created = self.store.insert_list_entry_if_absent(&NewListEntry {
            phone_number: record.from_number.clone(),
            list_type: ListType::Whitelist,
            label: None,
            notes: Some(format!("Passed voice screening ({seconds}s)")),
        })?;
        let update = ClassificationUpdate {
            classification: Classification::Legitimate,
            action: CallAction::Allowed,
            reason: AUTO_WHITELIST_REASON.to_string(),
            auto_whitelisted: true,
        };
        if !self.store.conclude_call(record.id, seconds, Some(&update))? {
            // Another delivery of the same event got there first.
            return Ok(CallEndOutcome::AlreadyConcluded { call_id: record.id });
        }
        log::info!(
            "Auto-whitelisted {} after {}s screening call{}",
            record.from_number,
            seconds,
            if entry_created {
                ""
            } else {
                " (existing list entry kept)"
            }
        );
        self.emit(CallEvent::AutoWhitelisted {
            phone_number: record.from_number.clone(),
            store: record.to_store.clone(),
            duration_seconds: seconds,
            timestamp: Utc::now(),
        });

        Ok(CallEndOutcome::AutoWhitelisted {
            call_id: record.id,
            entry_created,
        })
    }

    /// Reviewer feedback; independent of the call's lifecycle state.
    pub fn flag_call(&self, id: i64, flags: CallFlags) -> Result<CallRecord> {
        if flags.is_empty() {
            return Err(ScreenError::invalid(
                "at least one of false_positive or false_negative is required",
            ));
        }
        let record = self
            .store
            .set_call_flags(id, flags)?
            .ok_or_else(|| ScreenError::not_found("Call", id))?;
        log::info!(
            "Call {} reviewed (false_positive={}, false_negative={})",
            id,
            record.flagged_false_positive,
            record.flagged_false_negative
        );
        Ok(record)
    }

    /// Classify and store a synthetic call whose outcome is already known.
    pub fn record_simulated(&self, candidate: &CandidateCall) -> Result<CallRecord> {
        let classified = CallClassifier::classify(
            self.store.as_ref(),
            candidate,
            self.config.policy.history_window(),
            Utc::now(),
        )?;
        let record = self.store.insert_call(&NewCallRecord {
            from_number: candidate.from_number.clone(),
            to_store: candidate.to_store.clone(),
            duration_seconds: candidate.duration_seconds,
            classification: classified.decision.classification,
            action: classified.decision.action,
            reason: classified.decision.reason,
            is_simulated: true,
            correlation_id: None,
        })?;
        let caller_label = self.caller_label(&classified.verdict, &record.from_number);
        self.emit(CallEvent::CallDecided {
            record: record.clone(),
            caller_label,
        });
        Ok(record)
    }

    fn caller_label(&self, verdict: &ListVerdict, phone_number: &str) -> Option<String> {
        if let Some(label) = verdict.label() {
            return Some(label.to_string());
        }
        match self.store.caller_label(&PhoneNumber::key(phone_number)) {
            Ok(label) => label,
            Err(e) => {
                log::warn!("Could not resolve caller label for {phone_number}: {e}");
                None
            }
        }
    }

    fn emit(&self, event: CallEvent) {
        let report = self.fanout.broadcast(&event);
        log::debug!(
            "{} delivered to {} subscribers ({} dropped, {} detached)",
            event.event_type(),
            report.delivered,
            report.dropped,
            report.detached
        );
    }
}
