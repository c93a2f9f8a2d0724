//! Analysis metric generation.
//!
//! A completed analysis produces a quality score, a confidence value and
//! four lab parameters, each drawn uniformly from a fixed range:
//!
//! | Metric | Range |
//! |--------|-------|
//! | `quality_score` | 60–100 (integer) |
//! | `confidence` | 0.7–1.0 |
//! | `purity`, `potency`, `stability` | 80–100 |
//! | `contamination` | 0–5 |
//!
//! The random source is injectable: [`RandomSampler::seeded`] gives a
//! reproducible sequence for tests and demos, [`RandomSampler::from_entropy`]
//! gives a fresh one.

use std::ops::RangeInclusive;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{AnalysisMetrics, QualityParameters};

pub const QUALITY_SCORE_RANGE: RangeInclusive<u8> = 60..=100;
pub const CONFIDENCE_RANGE: RangeInclusive<f64> = 0.7..=1.0;
pub const PARAMETER_RANGE: RangeInclusive<f64> = 80.0..=100.0;
pub const CONTAMINATION_RANGE: RangeInclusive<f64> = 0.0..=5.0;

/// Draw one set of metrics from `rng`.
pub fn sample_metrics<R: Rng + ?Sized>(rng: &mut R) -> AnalysisMetrics {
    let score = rng.gen_range(QUALITY_SCORE_RANGE);
    let confidence = rng.gen_range(CONFIDENCE_RANGE);
    let parameters = QualityParameters {
        purity: rng.gen_range(PARAMETER_RANGE),
        potency: rng.gen_range(PARAMETER_RANGE),
        stability: rng.gen_range(PARAMETER_RANGE),
        contamination: rng.gen_range(CONTAMINATION_RANGE),
    };
    AnalysisMetrics::new(score, confidence, parameters)
}

/// Source of final analysis metrics.
///
/// The job manager calls [`sample`](MetricSampler::sample) once per
/// completed job. Implementations must stay inside the documented ranges.
pub trait MetricSampler: Send + Sync {
    fn sample(&self) -> AnalysisMetrics;
}

/// [`MetricSampler`] backed by a `StdRng`.
pub struct RandomSampler {
    rng: Mutex<StdRng>,
}

impl RandomSampler {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Seeded when `seed` is given, otherwise from entropy.
    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(s) => Self::seeded(s),
            None => Self::from_entropy(),
        }
    }
}

impl MetricSampler for RandomSampler {
    fn sample(&self) -> AnalysisMetrics {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        sample_metrics(&mut *rng)
    }
}

/// Returns the same metrics every time. Useful when a test needs a known tier.
pub struct FixedSampler(pub AnalysisMetrics);

impl MetricSampler for FixedSampler {
    fn sample(&self) -> AnalysisMetrics {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QualityTier;

    #[test]
    fn metrics_stay_in_range_over_many_draws() {
        let sampler = RandomSampler::seeded(42);
        for _ in 0..10_000 {
            let m = sampler.sample();
            assert!(QUALITY_SCORE_RANGE.contains(&m.quality_score), "score {}", m.quality_score);
            assert!(CONFIDENCE_RANGE.contains(&m.confidence), "confidence {}", m.confidence);
            assert!(PARAMETER_RANGE.contains(&m.parameters.purity));
            assert!(PARAMETER_RANGE.contains(&m.parameters.potency));
            assert!(PARAMETER_RANGE.contains(&m.parameters.stability));
            assert!(
                CONTAMINATION_RANGE.contains(&m.parameters.contamination),
                "contamination {}",
                m.parameters.contamination
            );
            assert_eq!(m.quality_tier, QualityTier::from_score(m.quality_score));
        }
    }

    #[test]
    fn seeded_samplers_repeat() {
        let a = RandomSampler::seeded(7);
        let b = RandomSampler::seeded(7);
        for _ in 0..50 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn score_range_is_covered() {
        let sampler = RandomSampler::seeded(1);
        let scores: Vec<u8> = (0..10_000).map(|_| sampler.sample().quality_score).collect();
        assert_eq!(*scores.iter().min().unwrap(), 60);
        assert_eq!(*scores.iter().max().unwrap(), 100);
    }

    #[test]
    fn every_tier_is_reachable() {
        let sampler = RandomSampler::seeded(3);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10_000 {
            seen.insert(sampler.sample().quality_tier);
        }
        assert_eq!(seen.len(), QualityTier::ALL.len());
    }
}
