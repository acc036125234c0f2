use callscreen::config::{Config, HandlerConfig};
use callscreen::fanout::Fanout;
use callscreen::lifecycle::{CallCoordinator, DisconnectReason};
use callscreen::lists::PhoneLists;
use callscreen::store::SqliteStore;
use std::sync::Arc;

fn main() {
    println!("Testing unknown caller -> screening -> auto-whitelist flow");

    let config = Config {
        lists: vec![],
        handlers: HandlerConfig {
            blocked: Some("agent_blocked".to_string()),
            assistant: Some("agent_assistant".to_string()),
            screening: Some("agent_screening".to_string()),
        },
        ..Config::default()
    };
    let store = match SqliteStore::open_in_memory(&config) {
        Ok(store) => store,
        Err(e) => {
            println!("❌ Failed to open store: {e}");
            std::process::exit(1);
        }
    };
    let fanout = Arc::new(Fanout::new(16));
    let mut feed = fanout.subscribe();
    let coordinator = CallCoordinator::new(Arc::new(store), fanout, Arc::new(config));

    let caller = "+1 (555) 010-7788";
    let inbound = match coordinator.classify_and_record_inbound(caller, "+14045550100", "call_flow_1")
    {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("❌ Inbound failed: {e}");
            std::process::exit(1);
        }
    };
    println!(
        "Inbound: {} -> {} via {}",
        inbound.record.from_number,
        inbound.record.classification,
        inbound.routing_override.as_deref().unwrap_or("default handler")
    );

    let reason = DisconnectReason::from_provider("user_hangup");
    for attempt in 1..=2 {
        match coordinator.record_call_ended("call_flow_1", caller, "agent_screening", 20_000, &reason)
        {
            Ok(outcome) => println!("Call end #{attempt}: {outcome:?}"),
            Err(e) => println!("❌ Call end #{attempt} failed: {e}"),
        }
    }

    match coordinator.store().find_call(inbound.record.id) {
        Ok(Some(record)) => println!(
            "Record: {} / auto_whitelisted={} / duration={:?}s",
            record.classification, record.auto_whitelisted, record.duration_seconds
        ),
        Ok(None) => println!("❌ Record disappeared"),
        Err(e) => println!("❌ Lookup failed: {e}"),
    }

    match PhoneLists::lookup(coordinator.store(), caller) {
        Ok(verdict) => println!("List status: {}", verdict.caller_status()),
        Err(e) => println!("❌ List lookup failed: {e}"),
    }

    let mut events = Vec::new();
    while let Ok(event) = feed.receiver.try_recv() {
        events.push(event.event_type());
    }
    println!("Events: {events:?}");

    if events == ["call_decided", "auto_whitelisted"] {
        println!("✅ Flow behaved as expected");
    } else {
        println!("❌ Unexpected event sequence");
        std::process::exit(1);
    }
}
