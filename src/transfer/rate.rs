//! Exponentially weighted throughput estimation

use crate::error::{AppError, Result};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// EWMA of instantaneous throughput in bytes per second.
///
/// The first observation seeds the estimate directly; later ones blend as
/// `alpha * instantaneous + (1 - alpha) * previous`.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    alpha: f64,
    estimate: f64,
    initialized: bool,
}

impl RateEstimator {
    /// Estimator with the default smoothing factor of 0.1
    pub fn new() -> Self {
        Self {
            alpha: crate::defaults::RATE_SMOOTHING_FACTOR,
            estimate: 0.0,
            initialized: false,
        }
    }

    /// Estimator with a custom smoothing factor in (0, 1]
    pub fn with_smoothing(alpha: f64) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(AppError::validation(format!(
                "Smoothing factor must be in (0, 1], got {}",
                alpha
            )));
        }
        Ok(Self { alpha, ..Self::new() })
    }

    /// Feed `delta_bytes` transferred over `elapsed` and return the new estimate.
    ///
    /// Zero bytes or zero elapsed time leave the estimate untouched.
    pub fn observe(&mut self, delta_bytes: u64, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if delta_bytes == 0 || secs <= 0.0 {
            return self.estimate;
        }

        let instantaneous = delta_bytes as f64 / secs;
        if self.initialized {
            self.estimate = self.alpha * instantaneous + (1.0 - self.alpha) * self.estimate;
        } else {
            self.estimate = instantaneous;
            self.initialized = true;
        }
        self.estimate
    }

    /// Latest estimate, 0.0 before the first observation
    pub fn current(&self) -> f64 {
        self.estimate
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn smoothing_factor(&self) -> f64 {
        self.alpha
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct RateState {
    estimator: RateEstimator,
    total_bytes: u64,
    last_observation: Instant,
    /// Bytes recorded at the same instant as the previous observation,
    /// folded into the next one that has measurable elapsed time
    pending_bytes: u64,
}

/// Estimator and byte total shared by all workers of one transfer test.
///
/// Every update runs under a single lock so each blend uses the estimate
/// left by the immediately preceding update.
#[derive(Debug)]
pub struct SharedRate {
    state: Mutex<RateState>,
}

impl SharedRate {
    /// Start measuring from `start`
    pub fn new(start: Instant) -> Self {
        Self::with_estimator(RateEstimator::new(), start)
    }

    pub fn with_estimator(estimator: RateEstimator, start: Instant) -> Self {
        Self {
            state: Mutex::new(RateState {
                estimator,
                total_bytes: 0,
                last_observation: start,
                pending_bytes: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RateState> {
        // A panicked worker cannot leave the state half-updated, so recover it
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record `delta_bytes` that just arrived and return the updated estimate
    pub fn record(&self, delta_bytes: u64) -> f64 {
        self.record_at(delta_bytes, Instant::now())
    }

    /// Record bytes observed at `now`
    pub fn record_at(&self, delta_bytes: u64, now: Instant) -> f64 {
        let mut state = self.lock();
        if delta_bytes == 0 {
            return state.estimator.current();
        }

        state.total_bytes += delta_bytes;

        let elapsed = now.saturating_duration_since(state.last_observation);
        if elapsed.is_zero() {
            state.pending_bytes += delta_bytes;
            return state.estimator.current();
        }

        let delta = delta_bytes + std::mem::take(&mut state.pending_bytes);
        state.last_observation = now;
        state.estimator.observe(delta, elapsed)
    }

    /// Current smoothed rate in bytes per second
    pub fn current(&self) -> f64 {
        self.lock().estimator.current()
    }

    pub fn total_bytes(&self) -> u64 {
        self.lock().total_bytes
    }

    /// Rate and byte total read under one lock
    pub fn snapshot(&self) -> (f64, u64) {
        let state = self.lock();
        (state.estimator.current(), state.total_bytes)
    }
}
