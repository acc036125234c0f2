//! Voice-provider webhook payloads and their handlers.
//!
//! Both handlers acknowledge success to the provider even when processing
//! fails internally; failures are logged with the correlation id and event
//! type instead.

use crate::config::{HandlerRole, StorageFailurePolicy};
use crate::error::{Result, ScreenError};
use crate::lifecycle::{CallCoordinator, CallEndOutcome, DisconnectReason, DynamicVariables};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const INBOUND_EVENT: &str = "call_inbound";
pub const CALL_ENDED_EVENT: &str = "call_ended";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundWebhook {
    pub event: String,
    pub call_inbound: Option<InboundCall>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundCall {
    pub call_id: String,
    pub from_number: String,
    #[serde(default)]
    pub to_number: String,
    /// Handler the provider would use without an override.
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallEndedWebhook {
    pub event: String,
    pub call: EndedCall,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndedCall {
    pub call_id: String,
    #[serde(default)]
    pub from_number: String,
    #[serde(default)]
    pub agent_id: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub disconnection_reason: String,
}

/// Body returned for `call_inbound`. Empty directives leave the call to the
/// provider's default handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundResponse {
    pub call_inbound: InboundDirectives,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundDirectives {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_agent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_variables: Option<DynamicVariables>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: String,
}

impl WebhookAck {
    fn new(outcome: impl Into<String>) -> Self {
        Self {
            received: true,
            outcome: outcome.into(),
        }
    }
}

pub struct WebhookAdapter {
    coordinator: Arc<CallCoordinator>,
}

impl WebhookAdapter {
    pub fn new(coordinator: Arc<CallCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Only a malformed event is rejected; everything after validation is
    /// acknowledged.
    pub fn handle_inbound(&self, payload: &InboundWebhook) -> Result<InboundResponse> {
        let call = match (&payload.call_inbound, payload.event.as_str()) {
            (Some(call), INBOUND_EVENT) => call,
            _ => {
                log::warn!("Rejected inbound webhook with event '{}'", payload.event);
                return Err(ScreenError::invalid(format!(
                    "expected {INBOUND_EVENT} event, got '{}'",
                    payload.event
                )));
            }
        };

        match self.coordinator.classify_and_record_inbound(
            &call.from_number,
            &call.to_number,
            &call.call_id,
        ) {
            Ok(outcome) => Ok(InboundResponse {
                call_inbound: InboundDirectives {
                    override_agent_id: outcome.routing_override,
                    dynamic_variables: Some(outcome.dynamic_variables),
                },
            }),
            Err(e) => {
                log::error!(
                    "{INBOUND_EVENT} processing failed for call {}: {e}",
                    call.call_id
                );
                Ok(self.degraded_response())
            }
        }
    }

    pub fn handle_inbound_json(&self, body: &str) -> Result<InboundResponse> {
        let payload: InboundWebhook = serde_json::from_str(body)
            .map_err(|e| ScreenError::invalid(format!("malformed inbound webhook: {e}")))?;
        self.handle_inbound(&payload)
    }

    fn degraded_response(&self) -> InboundResponse {
        let config = self.coordinator.config();
        let override_agent_id = match config.policy.storage_failure {
            StorageFailurePolicy::FailOpen => None,
            StorageFailurePolicy::FailClosed => {
                let blocked = config.handlers.handler_for(HandlerRole::Blocked);
                if blocked.is_none() {
                    log::warn!("fail_closed policy without a blocked handler, using default");
                }
                blocked.map(str::to_string)
            }
        };
        InboundResponse {
            call_inbound: InboundDirectives {
                override_agent_id,
                dynamic_variables: None,
            },
        }
    }

    pub fn handle_call_ended(&self, payload: &CallEndedWebhook) -> WebhookAck {
        let call = &payload.call;
        if payload.event != CALL_ENDED_EVENT {
            log::warn!(
                "Ignoring webhook event '{}' for call {}",
                payload.event,
                call.call_id
            );
            return WebhookAck::new("ignored");
        }

        let reason = DisconnectReason::from_provider(&call.disconnection_reason);
        match self.coordinator.record_call_ended(
            &call.call_id,
            &call.from_number,
            &call.agent_id,
            call.duration_ms,
            &reason,
        ) {
            Ok(CallEndOutcome::Concluded { .. }) => WebhookAck::new("concluded"),
            Ok(CallEndOutcome::AutoWhitelisted { .. }) => WebhookAck::new("auto_whitelisted"),
            Ok(CallEndOutcome::UnknownCorrelation) => WebhookAck::new("unknown_call"),
            Ok(CallEndOutcome::AlreadyConcluded { .. }) => WebhookAck::new("duplicate"),
            Err(e) => {
                log::error!(
                    "{CALL_ENDED_EVENT} processing failed for call {}: {e}",
                    call.call_id
                );
                WebhookAck::new("error")
            }
        }
    }

    pub fn handle_call_ended_json(&self, body: &str) -> WebhookAck {
        match serde_json::from_str::<CallEndedWebhook>(body) {
            Ok(payload) => self.handle_call_ended(&payload),
            Err(e) => {
                log::error!("Malformed {CALL_ENDED_EVENT} webhook: {e}");
                WebhookAck::new("error")
            }
        }
    }
}
