//! Aggregation report over the catalog and the job table.
//!
//! [`Summary::build`] is a pure projection: it owns no state and never
//! fails. Averages over an empty set are 0.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{CatalogItem, ItemStatus, JobState, QualityTier};

/// Item counts per [`ItemStatus`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
}

/// Job counts per [`JobState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub queued: usize,
    pub running: usize,
    pub done: usize,
}

/// Read-only snapshot of the catalog and its analysis jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub total_items: usize,
    pub items_by_status: StatusCounts,
    pub jobs_by_state: JobCounts,
    /// Mean quality score over Completed items, 0 if none.
    pub average_quality_score: f64,
    /// Mean confidence over Completed items, 0 if none.
    pub average_confidence: f64,
    /// Jobs whose workload failed and returned their item to Pending.
    pub failed_analyses: usize,
    /// Completed items per tier. Every tier is present, best first.
    pub tiers: BTreeMap<QualityTier, usize>,
}

impl Summary {
    pub fn build(items: &[CatalogItem], jobs: &[JobState], failed_analyses: usize) -> Self {
        let mut summary = Summary {
            total_items: items.len(),
            failed_analyses,
            tiers: QualityTier::ALL.iter().map(|t| (*t, 0)).collect(),
            ..Default::default()
        };

        let mut score_sum = 0u64;
        let mut confidence_sum = 0.0f64;
        for item in items {
            match item.status {
                ItemStatus::Pending => summary.items_by_status.pending += 1,
                ItemStatus::Processing => summary.items_by_status.processing += 1,
                ItemStatus::Completed => summary.items_by_status.completed += 1,
            }
            if let Some(m) = &item.metrics {
                score_sum += u64::from(m.quality_score);
                confidence_sum += m.confidence;
                *summary.tiers.entry(m.quality_tier).or_insert(0) += 1;
            }
        }

        for state in jobs {
            match state {
                JobState::Queued => summary.jobs_by_state.queued += 1,
                JobState::Running => summary.jobs_by_state.running += 1,
                JobState::Done => summary.jobs_by_state.done += 1,
            }
        }

        let completed = summary.items_by_status.completed;
        if completed > 0 {
            summary.average_quality_score = score_sum as f64 / completed as f64;
            summary.average_confidence = confidence_sum / completed as f64;
        }
        summary
    }
}
