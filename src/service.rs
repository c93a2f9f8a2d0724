//! Application service shared by the CLI and the HTTP server.
//!
//! [`LabService`] wires the catalog store, the job manager, and the
//! recognizer together and exposes the library operations in one place:
//!
//! | Operation | Backed by |
//! |-----------|-----------|
//! | `create_item`, `get_item`, `list_items`, `attach_report` | [`CatalogStore`] |
//! | `start_analysis`, `cancel_analysis`, `analysis_status` | [`JobManager`] |
//! | `search` | [`medlab_core::search::search`] |
//! | `summary` | [`JobManager::summary`] |
//!
//! Cloning is cheap; every clone shares the same catalog and job table.

use std::sync::Arc;

use serde::Serialize;

use medlab_core::analysis::RandomSampler;
use medlab_core::models::{CatalogItem, LabReport, NewItem};
use medlab_core::recognition::Recognizer;
use medlab_core::report::Summary;
use medlab_core::search::{self, SearchQuery};
use medlab_core::store::memory::InMemoryCatalog;
use medlab_core::store::{CatalogStore, ItemMutation};
use medlab_core::{CatalogError, CatalogResult};

use crate::config::Config;
use crate::jobs::{JobHandle, JobManager, JobRecord, JobSnapshot, SimulatedWorkload};
use crate::progress::JobProgressReporter;
use crate::recognition::SimulatedRecognizer;

/// Analysis view for one item: the active job, or the last finished one.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum AnalysisStatus {
    Active(JobSnapshot),
    Finished(JobRecord),
}

#[derive(Clone)]
pub struct LabService {
    store: Arc<dyn CatalogStore>,
    jobs: JobManager,
    recognizer: Option<Arc<dyn Recognizer>>,
}

impl LabService {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        jobs: JobManager,
        recognizer: Option<Arc<dyn Recognizer>>,
    ) -> Self {
        Self {
            store,
            jobs,
            recognizer,
        }
    }

    /// Build the default stack from config: in-memory catalog, simulated
    /// workload and recognizer, RNG seeded from `analysis.seed` when set.
    pub fn from_config(config: &Config, reporter: Arc<dyn JobProgressReporter>) -> Self {
        let store: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalog::new());
        let workload = Arc::new(SimulatedWorkload::new(
            config.analysis.tick_interval(),
            config.analysis.progress_step,
            Arc::new(RandomSampler::new(config.analysis.seed)),
        ));
        let jobs = JobManager::with_reporter(store.clone(), workload, reporter);
        let recognizer: Arc<dyn Recognizer> =
            Arc::new(SimulatedRecognizer::new(config.search.recognition_latency()));
        Self::new(store, jobs, Some(recognizer))
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub async fn create_item(&self, fields: NewItem) -> CatalogResult<CatalogItem> {
        let id = self.store.add(fields).await?;
        self.store.get(&id).await
    }

    pub async fn get_item(&self, id: &str) -> CatalogResult<CatalogItem> {
        self.store.get(id).await
    }

    pub async fn list_items(&self) -> CatalogResult<Vec<CatalogItem>> {
        self.store.list().await
    }

    pub async fn attach_report(&self, id: &str, report: LabReport) -> CatalogResult<CatalogItem> {
        self.store
            .update(id, ItemMutation::AttachReport(report))
            .await
    }

    pub async fn start_analysis(&self, id: &str) -> CatalogResult<JobHandle> {
        self.jobs.start_analysis(id).await
    }

    pub async fn cancel_analysis(&self, id: &str) -> CatalogResult<()> {
        self.jobs.cancel_analysis(id).await
    }

    /// The active job for an item, else its last finished job.
    ///
    /// `NotFound` when the item is unknown or has never been analysed.
    pub async fn analysis_status(&self, id: &str) -> CatalogResult<AnalysisStatus> {
        self.store.get(id).await?;
        if let Some(snapshot) = self.jobs.active_job(id).await {
            return Ok(AnalysisStatus::Active(snapshot));
        }
        self.jobs
            .last_outcome(id)
            .await
            .map(AnalysisStatus::Finished)
            .ok_or_else(|| CatalogError::NotFound(format!("no analysis job for item {}", id)))
    }

    pub async fn search(&self, query: &SearchQuery) -> CatalogResult<Vec<CatalogItem>> {
        search::search(self.store.as_ref(), query, self.recognizer.as_deref()).await
    }

    pub async fn summary(&self) -> CatalogResult<Summary> {
        self.jobs.summary().await
    }
}
