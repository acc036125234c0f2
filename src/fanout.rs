//! Live event fan-out to connected dashboard clients.
//!
//! Each subscriber owns a bounded queue. Broadcasting never waits on a slow
//! reader: a full queue loses that event for that subscriber only, and a
//! queue whose receiver is gone is detached from the registry.

use crate::models::CallRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallEvent {
    CallDecided {
        record: CallRecord,
        caller_label: Option<String>,
    },
    AutoWhitelisted {
        phone_number: String,
        store: Option<String>,
        duration_seconds: i64,
        timestamp: DateTime<Utc>,
    },
}

impl CallEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            CallEvent::CallDecided { .. } => "call_decided",
            CallEvent::AutoWhitelisted { .. } => "auto_whitelisted",
        }
    }

    /// Server-sent-events frame: `data: <json>` followed by a blank line.
    pub fn to_sse_frame(&self) -> serde_json::Result<String> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// Receiving half handed to a connected client.
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<CallEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub detached: usize,
}

pub struct Fanout {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<CallEvent>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Fanout {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<CallEvent>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry().insert(id, sender);
        log::debug!("Subscriber {id} attached");
        Subscription { id, receiver }
    }

    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = self.registry().remove(&id).is_some();
        if removed {
            log::debug!("Subscriber {id} detached");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().len()
    }

    /// Deliver `event` to every subscriber attached at the time of the call.
    pub fn broadcast(&self, event: &CallEvent) -> BroadcastReport {
        let snapshot: Vec<(u64, mpsc::Sender<CallEvent>)> = self
            .registry()
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut report = BroadcastReport::default();
        let mut closed = Vec::new();
        for (id, sender) in snapshot {
            match sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    report.dropped += 1;
                    log::warn!(
                        "Subscriber {id} is not keeping up, dropped {} event",
                        event.event_type()
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(id),
            }
        }

        if !closed.is_empty() {
            let mut registry = self.registry();
            for id in &closed {
                registry.remove(id);
            }
            report.detached = closed.len();
            log::debug!("Detached {} closed subscribers", closed.len());
        }
        report
    }
}

impl Default for Fanout {
    fn default() -> Self {
        Self::new(crate::config::FanoutConfig::default().subscriber_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist_event(n: i64) -> CallEvent {
        CallEvent::AutoWhitelisted {
            phone_number: "+1-201-637-4059".to_string(),
            store: Some("Store #1042 - Atlanta".to_string()),
            duration_seconds: n,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let fanout = Fanout::new(8);
        let mut a = fanout.subscribe();
        let mut b = fanout.subscribe();
        assert_ne!(a.id, b.id);

        let report = fanout.broadcast(&whitelist_event(20));
        assert_eq!(report.delivered, 2);
        assert_eq!(a.receiver.try_recv().unwrap(), b.receiver.try_recv().unwrap());
    }

    #[test]
    fn test_closed_subscriber_is_detached() {
        let fanout = Fanout::new(8);
        let mut alive = fanout.subscribe();
        let gone = fanout.subscribe();
        drop(gone);

        let report = fanout.broadcast(&whitelist_event(20));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.detached, 1);
        assert_eq!(fanout.subscriber_count(), 1);
        assert!(alive.receiver.try_recv().is_ok());
    }

    #[test]
    fn test_full_subscriber_does_not_block_others() {
        let fanout = Fanout::new(1);
        let _slow = fanout.subscribe();
        let mut fast = fanout.subscribe();

        fanout.broadcast(&whitelist_event(1));
        assert!(fast.receiver.try_recv().is_ok());

        let report = fanout.broadcast(&whitelist_event(2));
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(fanout.subscriber_count(), 2);
        match fast.receiver.try_recv().unwrap() {
            CallEvent::AutoWhitelisted {
                duration_seconds, ..
            } => assert_eq!(duration_seconds, 2),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let fanout = Fanout::default();
        assert_eq!(fanout.broadcast(&whitelist_event(1)), BroadcastReport::default());
    }

    #[test]
    fn test_unsubscribe() {
        let fanout = Fanout::new(4);
        let sub = fanout.subscribe();
        assert!(fanout.unsubscribe(sub.id));
        assert!(!fanout.unsubscribe(sub.id));
        assert_eq!(fanout.subscriber_count(), 0);
    }

    #[test]
    fn test_sse_frame_shape() {
        let frame = whitelist_event(42).to_sse_frame().unwrap();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        let json: serde_json::Value =
            serde_json::from_str(frame.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(json["type"], "auto_whitelisted");
        assert_eq!(json["duration_seconds"], 42);
    }
}
