//! Synthetic call traffic for demos and load.
//!
//! Generated calls go through the same classification and recording path as
//! real inbound calls and are marked as simulated.

use crate::error::{Result, ScreenError};
use crate::lifecycle::CallCoordinator;
use crate::models::{Behavior, CallRecord, SimulationProfile};
use crate::rules::CandidateCall;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

pub const MIN_INTERVAL_MS: u64 = 1_000;
pub const MAX_INTERVAL_MS: u64 = 10_000;

/// Single-store callers ring their home store this often.
const HOME_STORE_RATE: f64 = 0.85;
const MIXED_IVR_PASS_RATE: f64 = 0.7;
const MIXED_NORMAL_CALL_RATE: f64 = 0.6;

/// Build the attributes of one call for `profile`.
pub fn synthesize<R: Rng + ?Sized>(
    profile: &SimulationProfile,
    stores: &[String],
    rng: &mut R,
) -> CandidateCall {
    let (duration, passes_ivr) = match profile.behavior {
        Behavior::Robocaller => (rng.gen_range(0..5), profile.passes_ivr),
        Behavior::Legitimate => (
            varied_duration(profile.avg_duration_seconds, rng),
            profile.passes_ivr,
        ),
        Behavior::Mixed => {
            let passes = rng.gen_bool(MIXED_IVR_PASS_RATE);
            let duration = if rng.gen_bool(MIXED_NORMAL_CALL_RATE) {
                rng.gen_range(10..50)
            } else {
                rng.gen_range(1..5)
            };
            (duration, passes)
        }
    };

    CandidateCall {
        from_number: profile.phone_number.clone(),
        to_store: pick_store(profile, stores, rng),
        duration_seconds: Some(duration),
        passes_ivr: Some(passes_ivr),
    }
}

fn varied_duration<R: Rng + ?Sized>(average: i64, rng: &mut R) -> i64 {
    let variance = average * 2 / 5;
    if variance <= 0 {
        return average.max(1);
    }
    (average + rng.gen_range(-variance..variance)).max(1)
}

fn pick_store<R: Rng + ?Sized>(
    profile: &SimulationProfile,
    stores: &[String],
    rng: &mut R,
) -> Option<String> {
    let home = stores.first()?;
    if !profile.targets_multiple_stores && rng.gen_bool(HOME_STORE_RATE) {
        return Some(home.clone());
    }
    stores.choose(rng).cloned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorStatus {
    pub running: bool,
    pub call_count: u64,
    pub interval_ms: Option<u64>,
}

struct GeneratorInner {
    coordinator: Arc<CallCoordinator>,
    stores: Vec<String>,
    call_count: AtomicU64,
}

impl GeneratorInner {
    fn generate_call(&self, profile_id: Option<i64>) -> Result<CallRecord> {
        let store = self.coordinator.store();
        let profile = match profile_id {
            Some(id) => store
                .find_profile(id)?
                .ok_or_else(|| ScreenError::not_found("Profile", id))?,
            None => store
                .random_profile()?
                .ok_or_else(|| ScreenError::not_found("Profile", "any"))?,
        };

        let candidate = synthesize(&profile, &self.stores, &mut rand::thread_rng());
        let record = self.coordinator.record_simulated(&candidate)?;
        self.call_count.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "Simulated {} ({}) → {}: {}",
            profile.label,
            profile.behavior.as_str(),
            record.to_store.as_deref().unwrap_or("-"),
            record.classification
        );
        Ok(record)
    }
}

/// Owned generator instance; several can run side by side.
pub struct TrafficGenerator {
    inner: Arc<GeneratorInner>,
    task: Mutex<Option<(JoinHandle<()>, u64)>>,
    default_interval_ms: u64,
}

impl TrafficGenerator {
    pub fn new(coordinator: Arc<CallCoordinator>) -> Self {
        let stores = coordinator.config().store_names();
        let default_interval_ms = coordinator.config().generator.default_interval_ms;
        Self {
            inner: Arc::new(GeneratorInner {
                coordinator,
                stores,
                call_count: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
            default_interval_ms,
        }
    }

    fn task(&self) -> MutexGuard<'_, Option<(JoinHandle<()>, u64)>> {
        self.task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One synthetic call, from the given profile or a random one.
    pub fn generate_call(&self, profile_id: Option<i64>) -> Result<CallRecord> {
        self.inner.generate_call(profile_id)
    }

    /// Start the periodic timer. Returns `false` when already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval_ms: Option<u64>) -> Result<bool> {
        let interval_ms = interval_ms.unwrap_or(self.default_interval_ms);
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval_ms) {
            return Err(ScreenError::invalid(format!(
                "interval must be between {MIN_INTERVAL_MS} and {MAX_INTERVAL_MS} ms, got {interval_ms}"
            )));
        }

        let mut task = self.task();
        if task.as_ref().is_some_and(|(handle, _)| !handle.is_finished()) {
            return Ok(false);
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Storage calls block; keep them off the runtime's worker threads.
                let tick_inner = Arc::clone(&inner);
                match tokio::task::spawn_blocking(move || tick_inner.generate_call(None)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => log::error!("Traffic generator tick failed: {e}"),
                    Err(e) => log::error!("Traffic generator tick panicked: {e}"),
                }
            }
        });
        *task = Some((handle, interval_ms));
        log::info!("Traffic generator started ({interval_ms} ms interval)");
        Ok(true)
    }

    /// Returns `false` when it was not running.
    pub fn stop(&self) -> bool {
        match self.task().take() {
            Some((handle, _)) => {
                handle.abort();
                log::info!(
                    "Traffic generator stopped after {} calls",
                    self.inner.call_count.load(Ordering::Relaxed)
                );
                true
            }
            None => false,
        }
    }

    pub fn status(&self) -> GeneratorStatus {
        let task = self.task();
        let running = task.as_ref().filter(|(handle, _)| !handle.is_finished());
        GeneratorStatus {
            running: running.is_some(),
            call_count: self.inner.call_count.load(Ordering::Relaxed),
            interval_ms: running.map(|(_, ms)| *ms),
        }
    }
}

impl Drop for TrafficGenerator {
    fn drop(&mut self) {
        if let Some((handle, _)) = self.task().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fanout::Fanout;
    use crate::store::SqliteStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn profile(behavior: Behavior, avg: i64, multi: bool) -> SimulationProfile {
        SimulationProfile {
            id: 1,
            phone_number: "+1-888-555-0101".to_string(),
            behavior,
            avg_duration_seconds: avg,
            targets_multiple_stores: multi,
            passes_ivr: false,
            label: "Test".to_string(),
        }
    }

    fn stores() -> Vec<String> {
        Config::default().store_names()
    }

    fn generator() -> TrafficGenerator {
        let config = Config::default();
        let store = SqliteStore::open_in_memory(&config).unwrap();
        let coordinator = CallCoordinator::new(
            Arc::new(store),
            Arc::new(Fanout::new(16)),
            Arc::new(config),
        );
        TrafficGenerator::new(Arc::new(coordinator))
    }

    #[test]
    fn test_robocaller_calls_are_very_short() {
        let mut rng = StdRng::seed_from_u64(7);
        let robo = profile(Behavior::Robocaller, 2, true);
        for _ in 0..200 {
            let call = synthesize(&robo, &stores(), &mut rng);
            let duration = call.duration_seconds.unwrap();
            assert!((0..=4).contains(&duration), "duration {duration}");
            assert_eq!(call.passes_ivr, Some(false));
        }
    }

    #[test]
    fn test_legitimate_duration_varies_around_average() {
        let mut rng = StdRng::seed_from_u64(11);
        let legit = profile(Behavior::Legitimate, 100, false);
        for _ in 0..200 {
            let duration = synthesize(&legit, &stores(), &mut rng)
                .duration_seconds
                .unwrap();
            assert!((60..140).contains(&duration), "duration {duration}");
        }
        let tiny = profile(Behavior::Legitimate, 1, false);
        assert_eq!(synthesize(&tiny, &stores(), &mut rng).duration_seconds, Some(1));
    }

    #[test]
    fn test_mixed_profile_randomises_ivr_and_duration() {
        let mut rng = StdRng::seed_from_u64(3);
        let mixed = profile(Behavior::Mixed, 30, false);
        let mut passed = 0;
        let mut short = 0;
        for _ in 0..1000 {
            let call = synthesize(&mixed, &stores(), &mut rng);
            let duration = call.duration_seconds.unwrap();
            assert!(
                (1..=4).contains(&duration) || (10..=49).contains(&duration),
                "duration {duration}"
            );
            if duration < 5 {
                short += 1;
            }
            if call.passes_ivr == Some(true) {
                passed += 1;
            }
        }
        assert!((600..800).contains(&passed), "passed {passed}");
        assert!((300..500).contains(&short), "short {short}");
    }

    #[test]
    fn test_single_store_profile_prefers_home_store() {
        let mut rng = StdRng::seed_from_u64(5);
        let stores = stores();
        let legit = profile(Behavior::Legitimate, 60, false);
        let home = (0..1000)
            .filter(|_| synthesize(&legit, &stores, &mut rng).to_store.as_ref() == Some(&stores[0]))
            .count();
        assert!(home > 800, "home {home}");
    }

    #[test]
    fn test_no_stores_means_no_destination() {
        let mut rng = StdRng::seed_from_u64(1);
        let call = synthesize(&profile(Behavior::Robocaller, 2, true), &[], &mut rng);
        assert_eq!(call.to_store, None);
    }

    #[test]
    fn test_generate_call_records_simulated_call() {
        let generator = generator();
        let record = generator.generate_call(None).unwrap();
        assert!(record.is_simulated);
        assert!(record.duration_seconds.is_some());
        assert_eq!(generator.status().call_count, 1);
    }

    #[test]
    fn test_generate_call_unknown_profile() {
        let generator = generator();
        assert!(matches!(
            generator.generate_call(Some(9_999)),
            Err(ScreenError::NotFound { .. })
        ));
        assert_eq!(generator.status().call_count, 0);
    }

    #[test]
    fn test_blacklisted_profile_is_blocked() {
        let generator = generator();
        // Profile 4 is the seeded blacklisted recall scam.
        let record = generator.generate_call(Some(4)).unwrap();
        assert_eq!(record.classification, crate::models::Classification::Blacklisted);
    }

    #[tokio::test]
    async fn test_start_rejects_out_of_range_interval() {
        let generator = generator();
        assert!(matches!(
            generator.start(Some(999)),
            Err(ScreenError::InvalidInput(_))
        ));
        assert!(matches!(
            generator.start(Some(10_001)),
            Err(ScreenError::InvalidInput(_))
        ));
        assert!(!generator.status().running);
    }

    #[tokio::test]
    async fn test_start_and_stop_are_idempotent() {
        let generator = generator();
        assert!(!generator.stop());
        assert!(generator.start(Some(MIN_INTERVAL_MS)).unwrap());
        assert!(!generator.start(Some(5_000)).unwrap());

        let status = generator.status();
        assert!(status.running);
        assert_eq!(status.interval_ms, Some(MIN_INTERVAL_MS));

        assert!(generator.stop());
        assert!(!generator.stop());
        assert!(!generator.status().running);
    }

    #[tokio::test]
    async fn test_running_generator_produces_calls() {
        let generator = generator();
        generator.start(Some(MIN_INTERVAL_MS)).unwrap();
        tokio::time::sleep(Duration::from_millis(2_300)).await;
        generator.stop();
        assert!(generator.status().call_count >= 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_ticks_reach_live_subscribers() {
        let generator = generator();
        let mut feed = generator.inner.coordinator.fanout().subscribe();
        generator.start(Some(MIN_INTERVAL_MS)).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), feed.receiver.recv())
            .await
            .unwrap()
            .unwrap();
        generator.stop();
        assert_eq!(event.event_type(), "call_decided");
        assert!(generator.status().call_count >= 1);
    }
}
