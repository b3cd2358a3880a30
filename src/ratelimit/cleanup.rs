//! Registry cleanup triggers and the periodic sweeper task.
//!
//! The limiter prunes a client's window every time that client is seen, but
//! clients that go quiet leave their entries behind. A sweep walks the whole
//! registry and drops those. By default a sweep piggybacks on a small fraction
//! of requests; alternatively a background task sweeps on a fixed interval.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::limiter::SlidingWindowLimiter;

/// Decides, once per `check`, whether a full registry sweep should run.
pub trait CleanupTrigger: Send + Sync {
    fn should_sweep(&self) -> bool;
}

/// Fires with a fixed probability per call.
pub struct ProbabilisticTrigger {
    probability: f64,
    /// Set only for seeded triggers; otherwise each thread uses its own RNG.
    seeded: Option<Mutex<StdRng>>,
}

impl ProbabilisticTrigger {
    /// Create a trigger backed by the thread-local RNG.
    ///
    /// Probabilities outside `[0, 1]` are clamped; NaN is treated as zero.
    pub fn new(probability: f64) -> Self {
        Self {
            probability: clamp_probability(probability),
            seeded: None,
        }
    }

    /// Create a trigger with a fixed seed, for reproducible runs.
    ///
    /// All callers share one RNG behind a lock.
    pub fn with_seed(probability: f64, seed: u64) -> Self {
        Self {
            probability: clamp_probability(probability),
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded.is_some()
    }
}

fn clamp_probability(probability: f64) -> f64 {
    if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    }
}

impl CleanupTrigger for ProbabilisticTrigger {
    fn should_sweep(&self) -> bool {
        match &self.seeded {
            Some(rng) => rng.lock().gen_bool(self.probability),
            None => rand::thread_rng().gen_bool(self.probability),
        }
    }
}

/// Never sweeps on the request path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSweep;

impl CleanupTrigger for NeverSweep {
    fn should_sweep(&self) -> bool {
        false
    }
}

/// Sweeps on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSweep;

impl CleanupTrigger for AlwaysSweep {
    fn should_sweep(&self) -> bool {
        true
    }
}

/// Spawn a task that sweeps the limiter every `interval` until `shutdown`
/// resolves.
///
/// The first sweep happens one full interval after spawning.
pub fn spawn_sweeper<F>(
    limiter: Arc<SlidingWindowLimiter>,
    interval: Duration,
    shutdown: F,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Starting periodic registry sweeper");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.sweep(limiter.now_ms());
                    debug!(
                        removed = removed,
                        remaining = limiter.client_count(),
                        "Periodic sweep finished"
                    );
                }
                _ = &mut shutdown => {
                    info!("Periodic registry sweeper stopped");
                    break;
                }
            }
        }
    })
}
