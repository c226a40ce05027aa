//! Injected transient faults for service B

use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Source of uniform samples in `[0, 1)`
pub trait ProbabilitySource: Send + Sync {
    fn sample(&self) -> f64;
}

/// Samples from the thread-local RNG
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRngSource;

impl ProbabilitySource for ThreadRngSource {
    fn sample(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Replays a fixed sequence of samples, then repeats `fallback`
#[derive(Debug)]
pub struct FixedSamples {
    samples: Mutex<VecDeque<f64>>,
    fallback: f64,
}

impl FixedSamples {
    pub fn new(samples: impl IntoIterator<Item = f64>, fallback: f64) -> Self {
        Self {
            samples: Mutex::new(samples.into_iter().collect()),
            fallback,
        }
    }
}

impl ProbabilitySource for FixedSamples {
    fn sample(&self) -> f64 {
        self.samples
            .lock()
            .ok()
            .and_then(|mut samples| samples.pop_front())
            .unwrap_or(self.fallback)
    }
}

/// Decides per request whether to answer with a simulated failure
#[derive(Clone)]
pub struct FaultInjector {
    probability: f64,
    source: Arc<dyn ProbabilitySource>,
}

impl FaultInjector {
    pub fn new(probability: f64, source: Arc<dyn ProbabilitySource>) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
            source,
        }
    }

    /// Fail with `probability` using the thread RNG
    pub fn random(probability: f64) -> Self {
        Self::new(probability, Arc::new(ThreadRngSource))
    }

    pub fn disabled() -> Self {
        Self::random(0.0)
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn should_fail(&self) -> bool {
        self.source.sample() < self.probability
    }
}

impl std::fmt::Debug for FaultInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjector")
            .field("probability", &self.probability)
            .finish_non_exhaustive()
    }
}
