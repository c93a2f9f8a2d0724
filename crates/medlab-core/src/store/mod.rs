//! Catalog storage abstraction.
//!
//! The [`CatalogStore`] trait is the single source of truth for catalog
//! items. The job manager writes through it, the search engine and the
//! aggregation report read through it. Implementations must be
//! `Send + Sync` so one instance can be shared behind an `Arc`.

pub mod memory;

use async_trait::async_trait;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{AnalysisMetrics, CatalogItem, ItemStatus, LabReport, NewItem};

/// A state change applied to one item by [`CatalogStore::update`].
///
/// `update` is the only way status, metrics, or reports change, and each
/// mutation is applied in full or not at all.
#[derive(Debug, Clone)]
pub enum ItemMutation {
    /// Pending → Processing.
    BeginAnalysis,
    /// Processing → Completed, writing every derived field at once.
    Complete(AnalysisMetrics),
    /// Processing → Pending, used on cancellation and failure.
    Reset,
    /// Append a lab report. Allowed in any status.
    AttachReport(LabReport),
}

impl ItemMutation {
    /// Apply this mutation to `item`, enforcing the status state machine.
    ///
    /// On error the item is left untouched.
    pub fn apply(self, item: &mut CatalogItem) -> CatalogResult<()> {
        match self {
            ItemMutation::BeginAnalysis => {
                expect_status(item, ItemStatus::Pending, "begin analysis")?;
                item.status = ItemStatus::Processing;
            }
            ItemMutation::Complete(metrics) => {
                expect_status(item, ItemStatus::Processing, "complete analysis")?;
                item.metrics = Some(metrics);
                item.status = ItemStatus::Completed;
            }
            ItemMutation::Reset => {
                expect_status(item, ItemStatus::Processing, "reset analysis")?;
                item.metrics = None;
                item.status = ItemStatus::Pending;
            }
            ItemMutation::AttachReport(report) => {
                if report.result.trim().is_empty() {
                    return Err(CatalogError::Validation(
                        "report result must not be empty".into(),
                    ));
                }
                item.reports.push(report);
            }
        }
        Ok(())
    }
}

fn expect_status(item: &CatalogItem, expected: ItemStatus, action: &str) -> CatalogResult<()> {
    if item.status != expected {
        return Err(CatalogError::InvalidState(format!(
            "cannot {} for item {}: status is {}, expected {}",
            action, item.id, item.status, expected
        )));
    }
    Ok(())
}

/// Abstract catalog backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](CatalogStore::add) | Validate and insert a new Pending item |
/// | [`get`](CatalogStore::get) | Fetch one item by id |
/// | [`update`](CatalogStore::update) | Apply an [`ItemMutation`] atomically |
/// | [`list`](CatalogStore::list) | All items in insertion order |
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Insert a new item, returning its freshly assigned id.
    async fn add(&self, fields: NewItem) -> CatalogResult<String>;

    /// Retrieve an item by id.
    async fn get(&self, id: &str) -> CatalogResult<CatalogItem>;

    /// Apply `mutation` to the item and return the updated copy.
    ///
    /// Readers never observe a partially applied mutation.
    async fn update(&self, id: &str, mutation: ItemMutation) -> CatalogResult<CatalogItem>;

    /// All items, in insertion order.
    async fn list(&self) -> CatalogResult<Vec<CatalogItem>>;

    /// Number of stored items.
    async fn len(&self) -> CatalogResult<usize> {
        Ok(self.list().await?.len())
    }

    async fn is_empty(&self) -> CatalogResult<bool> {
        Ok(self.len().await? == 0)
    }
}
