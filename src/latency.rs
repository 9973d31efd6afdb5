//! Round-trip-time estimation.
//!
//! An exponentially-weighted moving average/variance tracker over ping round
//! trips. Pure numeric state, no I/O; samples are fed in by the engine when a
//! [`PingReply`](crate::Message::PingReply) arrives.

/// Default decay factor for the exponentially-weighted estimator.
const DEFAULT_DECAY: f64 = 0.2;

/// Configuration for the round-trip-time estimator.
///
/// # Example
///
/// ```
/// use netplay_rollback::LatencyConfig;
///
/// // React faster to network changes (noisier estimate)
/// let responsive = LatencyConfig { decay: 0.4 };
///
/// // Default smoothing
/// let config = LatencyConfig::default();
/// assert_eq!(config.decay, 0.2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyConfig {
    /// The weight given to each new sample, in `(0, 1]`. A larger decay
    /// reacts faster to network changes but produces a noisier estimate; a
    /// smaller decay smooths jitter but adapts slowly.
    pub decay: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            decay: DEFAULT_DECAY,
        }
    }
}

impl LatencyConfig {
    /// Creates a new `LatencyConfig` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration preset for responsive estimation.
    #[must_use]
    pub fn responsive() -> Self {
        Self { decay: 0.4 }
    }

    /// Configuration preset for smooth estimation.
    #[must_use]
    pub fn smooth() -> Self {
        Self { decay: 0.1 }
    }
}

/// Exponentially-weighted mean and standard deviation over round-trip
/// samples.
///
/// The first sample initializes the mean directly; every later sample folds
/// in with the configured decay. No persistence across sessions.
#[derive(Debug, Clone)]
pub struct LatencyEstimator {
    decay: f64,
    mean: f64,
    variance: f64,
    initialized: bool,
}

impl Default for LatencyEstimator {
    fn default() -> Self {
        Self::with_config(LatencyConfig::default())
    }
}

impl LatencyEstimator {
    /// Creates a new estimator with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new estimator with the given configuration.
    #[must_use]
    pub fn with_config(config: LatencyConfig) -> Self {
        let decay = config.decay.clamp(f64::EPSILON, 1.0);
        Self {
            decay,
            mean: 0.0,
            variance: 0.0,
            initialized: false,
        }
    }

    /// Folds a new round-trip sample (in milliseconds) into the running
    /// mean/variance.
    pub fn update(&mut self, sample_ms: f64) {
        if !self.initialized {
            self.mean = sample_ms;
            self.variance = 0.0;
            self.initialized = true;
            return;
        }
        let delta = sample_ms - self.mean;
        self.mean += self.decay * delta;
        self.variance = (1.0 - self.decay) * (self.variance + self.decay * delta * delta);
    }

    /// The current round-trip mean estimate in milliseconds (0.0 before the
    /// first sample).
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// The current round-trip standard deviation estimate in milliseconds.
    ///
    /// Non-negative; 0.0 at (and before) the first sample.
    #[must_use]
    pub fn stddev(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }

    /// Whether at least one sample has been folded in.
    #[must_use]
    pub fn has_samples(&self) -> bool {
        self.initialized
    }
}

// #########
// # TESTS #
// #########

#[cfg(test)]
mod latency_tests {
    use super::*;

    #[test]
    fn first_sample_sets_mean_with_zero_stddev() {
        let mut estimator = LatencyEstimator::new();
        assert!(!estimator.has_samples());
        estimator.update(50.0);
        assert!((estimator.mean() - 50.0).abs() < f64::EPSILON);
        assert_eq!(estimator.stddev(), 0.0);
        assert!(estimator.has_samples());
    }

    #[test]
    fn constant_samples_converge() {
        let mut estimator = LatencyEstimator::new();
        for _ in 0..20 {
            estimator.update(80.0);
        }
        assert!((estimator.mean() - 80.0).abs() < 1e-9);
        assert!(estimator.stddev() < 1e-9);
    }

    #[test]
    fn converges_after_level_change() {
        let mut estimator = LatencyEstimator::new();
        for _ in 0..5 {
            estimator.update(20.0);
        }
        for _ in 0..100 {
            estimator.update(120.0);
        }
        assert!((estimator.mean() - 120.0).abs() < 0.1);
        assert!(estimator.stddev() < 1.0);
    }

    #[test]
    fn jittery_samples_produce_positive_stddev() {
        let mut estimator = LatencyEstimator::new();
        for i in 0..40 {
            let sample = if i % 2 == 0 { 40.0 } else { 60.0 };
            estimator.update(sample);
        }
        assert!(estimator.mean() > 40.0 && estimator.mean() < 60.0);
        assert!(estimator.stddev() > 1.0);
    }

    #[test]
    fn higher_decay_reacts_faster() {
        let mut smooth = LatencyEstimator::with_config(LatencyConfig::smooth());
        let mut responsive = LatencyEstimator::with_config(LatencyConfig::responsive());
        smooth.update(10.0);
        responsive.update(10.0);
        for _ in 0..3 {
            smooth.update(100.0);
            responsive.update(100.0);
        }
        assert!(responsive.mean() > smooth.mean());
    }

    #[test]
    fn degenerate_decay_is_clamped() {
        let mut estimator = LatencyEstimator::with_config(LatencyConfig { decay: 0.0 });
        estimator.update(10.0);
        estimator.update(30.0);
        // A zero decay would freeze the estimate forever; clamping keeps it live.
        assert!(estimator.mean() >= 10.0);
        assert!(estimator.stddev() >= 0.0);
    }
}
