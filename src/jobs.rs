//! Analysis job manager.
//!
//! Drives catalog items from Pending to Completed on background tasks,
//! one tokio task per job, and guarantees at most one active job per item.
//!
//! # Lifecycle
//!
//! ```text
//! start_analysis ──▶ Queued ──▶ Running (0 → 100) ──▶ Done
//!                      │            │                    │
//!                      │            ├─ workload error ──▶ Failed, item back to Pending
//!                      └────────────┴─ cancel ──────────▶ Cancelled, item back to Pending
//! ```
//!
//! # Completion vs. cancellation
//!
//! The job table sits behind one async mutex. A finishing job takes the
//! lock, forces progress to 100, writes its metrics to the store, and
//! removes itself from the table before releasing it. `cancel_analysis`
//! takes the same lock, so it either removes the job first (the job then
//! writes nothing) or finds the job gone and the item Completed, in which
//! case it fails with `AlreadyCompleted`. A completed result is never
//! discarded.
//!
//! Workloads can report at most 99. Progress 100 is published under the
//! table lock, so a job observed at 100 can no longer be cancelled.
//!
//! # Observation
//!
//! Each job publishes a [`JobSnapshot`] on a `tokio::sync::watch` channel.
//! [`JobHandle::progress`] polls it, [`JobHandle::wait`] and
//! [`JobHandle::subscribe`] follow it to completion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use medlab_core::analysis::MetricSampler;
use medlab_core::models::{AnalysisMetrics, CatalogItem, ItemStatus, JobState, QualityTier};
use medlab_core::report::Summary;
use medlab_core::store::{CatalogStore, ItemMutation};
use medlab_core::{CatalogError, CatalogResult};

use crate::progress::{JobProgressEvent, JobProgressReporter, NoProgress};

/// How a finished job ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobOutcome {
    Completed {
        quality_score: u8,
        quality_tier: QualityTier,
    },
    Cancelled,
    Failed {
        reason: String,
    },
}

/// Point-in-time view of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub item_id: String,
    pub state: JobState,
    pub progress: u8,
    /// Set once `state == Done`.
    pub outcome: Option<JobOutcome>,
}

/// Archived record of the last finished job for an item.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: String,
    pub item_id: String,
    pub progress: u8,
    pub outcome: JobOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Caller's handle on a started job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job_id: String,
    item_id: String,
    rx: watch::Receiver<JobSnapshot>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    /// Current progress, 0–100.
    pub fn progress(&self) -> u8 {
        self.rx.borrow().progress
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.rx.borrow().clone()
    }

    /// A receiver that yields every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.rx.clone()
    }

    /// Wait until the job is Done.
    ///
    /// Returns the outcome for completed and cancelled jobs, and
    /// `AnalysisFailed` when the workload failed.
    pub async fn wait(mut self) -> CatalogResult<JobOutcome> {
        loop {
            let current = self.rx.borrow_and_update().outcome.clone();
            if let Some(outcome) = current {
                return outcome_result(self.item_id, outcome);
            }
            if self.rx.changed().await.is_err() {
                // Sender gone; the final snapshot is already visible.
                let last = self.rx.borrow().outcome.clone();
                return match last {
                    Some(outcome) => outcome_result(self.item_id, outcome),
                    None => Err(CatalogError::InvalidState(format!(
                        "analysis job {} ended without an outcome",
                        self.job_id
                    ))),
                };
            }
        }
    }
}

fn outcome_result(item_id: String, outcome: JobOutcome) -> CatalogResult<JobOutcome> {
    match outcome {
        JobOutcome::Failed { reason } => Err(CatalogError::AnalysisFailed { item_id, reason }),
        other => Ok(other),
    }
}

/// Publishes monotonic progress for one running job.
///
/// Workloads can take progress up to [`ProgressSink::WORKLOAD_CEILING`].
/// Only the manager publishes 100, and only once it holds the job table
/// and has confirmed the job was not cancelled.
pub struct ProgressSink {
    item_id: String,
    name: String,
    tx: Arc<watch::Sender<JobSnapshot>>,
    reporter: Arc<dyn JobProgressReporter>,
}

impl ProgressSink {
    /// Highest progress a workload can report.
    pub const WORKLOAD_CEILING: u8 = 99;

    pub fn progress(&self) -> u8 {
        self.tx.borrow().progress
    }

    /// Move progress to `pct` (capped at [`Self::WORKLOAD_CEILING`]).
    /// Lower values are ignored.
    pub fn advance_to(&self, pct: u8) {
        self.publish(pct.min(Self::WORKLOAD_CEILING));
    }

    pub fn advance_by(&self, step: u8) {
        self.advance_to(self.progress().saturating_add(step));
    }

    fn finish(&self) {
        self.publish(100);
    }

    fn publish(&self, pct: u8) {
        let moved = self.tx.send_if_modified(|s| {
            if pct > s.progress {
                s.progress = pct;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(item_id = %self.item_id, progress = pct, "analysis progress");
            self.reporter.report(JobProgressEvent::Advanced {
                item_id: self.item_id.clone(),
                name: self.name.clone(),
                progress: pct,
            });
        }
    }
}

/// The work performed by an analysis job.
///
/// Implementations report progress through the sink and return the final
/// metrics. Returning an error fails the job and returns the item to
/// Pending.
#[async_trait]
pub trait AnalysisWorkload: Send + Sync {
    async fn run(&self, item: &CatalogItem, progress: &ProgressSink) -> Result<AnalysisMetrics>;
}

/// Fixed-interval workload that advances by `step` points per tick and
/// draws the final metrics from a [`MetricSampler`].
pub struct SimulatedWorkload {
    interval: Duration,
    step: u8,
    sampler: Arc<dyn MetricSampler>,
}

impl SimulatedWorkload {
    pub fn new(interval: Duration, step: u8, sampler: Arc<dyn MetricSampler>) -> Self {
        Self {
            interval,
            step: step.max(1),
            sampler,
        }
    }
}

#[async_trait]
impl AnalysisWorkload for SimulatedWorkload {
    async fn run(&self, _item: &CatalogItem, progress: &ProgressSink) -> Result<AnalysisMetrics> {
        while progress.progress() < ProgressSink::WORKLOAD_CEILING {
            tokio::time::sleep(self.interval).await;
            progress.advance_by(self.step);
        }
        Ok(self.sampler.sample())
    }
}

struct ActiveJob {
    job_id: String,
    tx: Arc<watch::Sender<JobSnapshot>>,
    abort: Option<AbortHandle>,
}

#[derive(Default)]
struct JobTable {
    active: HashMap<String, ActiveJob>,
    finished: HashMap<String, JobRecord>,
    failed: usize,
}

impl JobTable {
    fn archive(&mut self, snapshot: &JobSnapshot, outcome: JobOutcome) {
        if matches!(outcome, JobOutcome::Failed { .. }) {
            self.failed += 1;
        }
        self.finished.insert(
            snapshot.item_id.clone(),
            JobRecord {
                job_id: snapshot.job_id.clone(),
                item_id: snapshot.item_id.clone(),
                progress: snapshot.progress,
                outcome,
                finished_at: Utc::now(),
            },
        );
    }
}

struct Shared {
    store: Arc<dyn CatalogStore>,
    workload: Arc<dyn AnalysisWorkload>,
    reporter: Arc<dyn JobProgressReporter>,
    table: Mutex<JobTable>,
}

/// Creates, advances, cancels, and completes analysis jobs.
#[derive(Clone)]
pub struct JobManager {
    shared: Arc<Shared>,
}

impl JobManager {
    pub fn new(store: Arc<dyn CatalogStore>, workload: Arc<dyn AnalysisWorkload>) -> Self {
        Self::with_reporter(store, workload, Arc::new(NoProgress))
    }

    pub fn with_reporter(
        store: Arc<dyn CatalogStore>,
        workload: Arc<dyn AnalysisWorkload>,
        reporter: Arc<dyn JobProgressReporter>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                workload,
                reporter,
                table: Mutex::new(JobTable::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.shared.store
    }

    /// Start analysing a Pending item.
    ///
    /// Fails with `InvalidState` if the item is unknown or not Pending, and
    /// with `AlreadyRunning` if a job for it is still active.
    pub async fn start_analysis(&self, item_id: &str) -> CatalogResult<JobHandle> {
        let shared = &self.shared;
        let mut table = shared.table.lock().await;

        match shared.store.get(item_id).await {
            Ok(_) => {}
            Err(CatalogError::NotFound(_)) => {
                return Err(CatalogError::InvalidState(format!(
                    "cannot analyse unknown item {}",
                    item_id
                )))
            }
            Err(e) => return Err(e),
        }
        if table.active.contains_key(item_id) {
            return Err(CatalogError::AlreadyRunning(item_id.to_string()));
        }
        let item = shared
            .store
            .update(item_id, ItemMutation::BeginAnalysis)
            .await?;

        let job_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = watch::channel(JobSnapshot {
            job_id: job_id.clone(),
            item_id: item_id.to_string(),
            state: JobState::Queued,
            progress: 0,
            outcome: None,
        });
        let tx = Arc::new(tx);

        let task = tokio::spawn(run_job(
            self.shared.clone(),
            item.clone(),
            job_id.clone(),
            tx.clone(),
        ));
        table.active.insert(
            item_id.to_string(),
            ActiveJob {
                job_id: job_id.clone(),
                tx,
                abort: Some(task.abort_handle()),
            },
        );
        drop(table);

        info!(item_id = %item_id, job_id = %job_id, name = %item.name, "analysis queued");
        Ok(JobHandle {
            job_id,
            item_id: item_id.to_string(),
            rx,
        })
    }

    /// Cancel the active job for an item and return the item to Pending.
    ///
    /// Fails with `AlreadyCompleted` when the job already wrote its result,
    /// and with `NotFound` when there is no job to cancel.
    pub async fn cancel_analysis(&self, item_id: &str) -> CatalogResult<()> {
        let shared = &self.shared;
        let mut table = shared.table.lock().await;

        let removed = table.active.remove(item_id);
        let Some(job) = removed else {
            drop(table);
            return match shared.store.get(item_id).await {
                Ok(item) if item.status == ItemStatus::Completed => {
                    Err(CatalogError::AlreadyCompleted(item_id.to_string()))
                }
                Ok(_) => Err(CatalogError::NotFound(format!(
                    "no active analysis job for item {}",
                    item_id
                ))),
                Err(e) => Err(e),
            };
        };

        if let Some(abort) = &job.abort {
            abort.abort();
        }
        let reset = shared.store.update(item_id, ItemMutation::Reset).await;

        job.tx.send_modify(|s| {
            s.state = JobState::Done;
            s.outcome = Some(JobOutcome::Cancelled);
        });
        let snapshot = job.tx.borrow().clone();
        table.archive(&snapshot, JobOutcome::Cancelled);
        drop(table);

        let item = reset?;
        info!(
            item_id = %item_id,
            job_id = %job.job_id,
            progress = snapshot.progress,
            "analysis cancelled"
        );
        shared.reporter.report(JobProgressEvent::Cancelled {
            item_id: item_id.to_string(),
            name: item.name,
        });
        Ok(())
    }

    /// Snapshot of the active job for an item, if any.
    pub async fn active_job(&self, item_id: &str) -> Option<JobSnapshot> {
        let table = self.shared.table.lock().await;
        table.active.get(item_id).map(|j| j.tx.borrow().clone())
    }

    /// Snapshots of every active job.
    pub async fn active_jobs(&self) -> Vec<JobSnapshot> {
        let table = self.shared.table.lock().await;
        table
            .active
            .values()
            .map(|j| j.tx.borrow().clone())
            .collect()
    }

    /// The archived record of the last finished job for an item.
    pub async fn last_outcome(&self, item_id: &str) -> Option<JobRecord> {
        let table = self.shared.table.lock().await;
        table.finished.get(item_id).cloned()
    }

    /// Number of jobs that ended with a workload failure.
    pub async fn failed_count(&self) -> usize {
        self.shared.table.lock().await.failed
    }

    /// Aggregate the catalog and the job table.
    ///
    /// The table lock is held while the store is read, so no job can
    /// complete between the two reads.
    pub async fn summary(&self) -> CatalogResult<Summary> {
        let table = self.shared.table.lock().await;
        let states: Vec<JobState> = table.active.values().map(|j| j.tx.borrow().state).collect();
        let items = self.shared.store.list().await?;
        Ok(Summary::build(&items, &states, table.failed))
    }
}

async fn run_job(
    shared: Arc<Shared>,
    item: CatalogItem,
    job_id: String,
    tx: Arc<watch::Sender<JobSnapshot>>,
) {
    tx.send_modify(|s| s.state = JobState::Running);
    shared.reporter.report(JobProgressEvent::Started {
        item_id: item.id.clone(),
        name: item.name.clone(),
    });

    let sink = ProgressSink {
        item_id: item.id.clone(),
        name: item.name.clone(),
        tx: tx.clone(),
        reporter: shared.reporter.clone(),
    };
    let result = shared.workload.run(&item, &sink).await;

    let mut table = shared.table.lock().await;
    let still_ours = table
        .active
        .get(&item.id)
        .map(|j| j.job_id == job_id)
        .unwrap_or(false);
    if !still_ours {
        // Cancelled while the workload was finishing.
        return;
    }

    let outcome = match result {
        Ok(metrics) => {
            sink.finish();
            let completed = JobOutcome::Completed {
                quality_score: metrics.quality_score,
                quality_tier: metrics.quality_tier,
            };
            match shared
                .store
                .update(&item.id, ItemMutation::Complete(metrics))
                .await
            {
                Ok(_) => completed,
                Err(e) => {
                    reset_after_failure(shared.store.as_ref(), &item.id).await;
                    JobOutcome::Failed {
                        reason: format!("could not store result: {}", e),
                    }
                }
            }
        }
        Err(e) => {
            reset_after_failure(shared.store.as_ref(), &item.id).await;
            JobOutcome::Failed {
                reason: format!("{:#}", e),
            }
        }
    };

    table.active.remove(&item.id);
    tx.send_modify(|s| {
        s.state = JobState::Done;
        s.outcome = Some(outcome.clone());
    });
    let snapshot = tx.borrow().clone();
    table.archive(&snapshot, outcome.clone());
    drop(table);

    match outcome {
        JobOutcome::Completed {
            quality_score,
            quality_tier,
        } => {
            info!(
                item_id = %item.id,
                job_id = %job_id,
                quality_score,
                tier = %quality_tier,
                "analysis completed"
            );
            shared.reporter.report(JobProgressEvent::Completed {
                item_id: item.id,
                name: item.name,
                quality_score,
                quality_tier,
            });
        }
        JobOutcome::Failed { reason } => {
            warn!(item_id = %item.id, job_id = %job_id, reason = %reason, "analysis failed");
            shared.reporter.report(JobProgressEvent::Failed {
                item_id: item.id,
                name: item.name,
                reason,
            });
        }
        JobOutcome::Cancelled => {}
    }
}

async fn reset_after_failure(store: &dyn CatalogStore, item_id: &str) {
    if let Err(e) = store.update(item_id, ItemMutation::Reset).await {
        warn!(item_id = %item_id, error = %e, "could not reset item after failure");
    }
}
