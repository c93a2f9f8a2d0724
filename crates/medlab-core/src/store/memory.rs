//! In-memory [`CatalogStore`] implementation.
//!
//! Items live in a `Vec` (insertion order) with a `HashMap` index from id
//! to position, both behind one `std::sync::RwLock`. Every mutation runs
//! under the write lock, which is what makes `update` atomic for readers.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogItem, NewItem};

use super::{CatalogStore, ItemMutation};

#[derive(Default)]
struct Inner {
    items: Vec<CatalogItem>,
    index: HashMap<String, usize>,
}

/// In-memory catalog for the service, the CLI, and tests.
pub struct InMemoryCatalog {
    inner: RwLock<Inner>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    // A panic while holding the lock cannot leave an item half-mutated:
    // `ItemMutation::apply` only assigns after validation succeeds.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(id: &str) -> CatalogError {
    CatalogError::NotFound(format!("no catalog item with id {}", id))
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn add(&self, fields: NewItem) -> CatalogResult<String> {
        fields.validate()?;
        let item = CatalogItem::pending(fields);
        let id = item.id.clone();
        let mut inner = self.write();
        let pos = inner.items.len();
        inner.items.push(item);
        inner.index.insert(id.clone(), pos);
        Ok(id)
    }

    async fn get(&self, id: &str) -> CatalogResult<CatalogItem> {
        let inner = self.read();
        inner
            .index
            .get(id)
            .map(|&pos| inner.items[pos].clone())
            .ok_or_else(|| not_found(id))
    }

    async fn update(&self, id: &str, mutation: ItemMutation) -> CatalogResult<CatalogItem> {
        let mut inner = self.write();
        let pos = *inner.index.get(id).ok_or_else(|| not_found(id))?;
        // Work on a copy so a rejected mutation leaves the stored item as it was.
        let mut updated = inner.items[pos].clone();
        mutation.apply(&mut updated)?;
        inner.items[pos] = updated.clone();
        Ok(updated)
    }

    async fn list(&self) -> CatalogResult<Vec<CatalogItem>> {
        Ok(self.read().items.clone())
    }

    async fn len(&self) -> CatalogResult<usize> {
        Ok(self.read().items.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemStatus, LabReport};
    use std::sync::Arc;

    #[tokio::test]
    async fn add_assigns_unique_ids() {
        let store = InMemoryCatalog::new();
        let a = store
            .add(NewItem::new("Paracetamol", "Painkiller", "GSK"))
            .await
            .unwrap();
        let b = store
            .add(NewItem::new("Paracetamol", "Painkiller", "GSK"))
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn add_rejects_missing_fields() {
        let store = InMemoryCatalog::new();
        let err = store.add(NewItem::new("", "Painkiller", "GSK")).await;
        assert!(matches!(err, Err(CatalogError::Validation(_))));
        let err = store.add(NewItem::new("Paracetamol", "  ", "GSK")).await;
        assert!(matches!(err, Err(CatalogError::Validation(_))));
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let store = InMemoryCatalog::new();
        assert!(matches!(
            store.get("nope").await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            store.update("nope", ItemMutation::BeginAnalysis).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_preserves_insertion_order() {
        let store = InMemoryCatalog::new();
        for name in ["Zinc", "Amoxicillin", "Metformin"] {
            store.add(NewItem::new(name, "Generic", "Acme")).await.unwrap();
        }
        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Zinc", "Amoxicillin", "Metformin"]);
    }

    #[tokio::test]
    async fn rejected_update_leaves_item_unchanged() {
        let store = InMemoryCatalog::new();
        let id = store
            .add(NewItem::new("Ibuprofen", "Anti-inflammatory", "Acme"))
            .await
            .unwrap();
        let before = store.get(&id).await.unwrap();
        let err = store.update(&id, ItemMutation::Reset).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidState(_)));
        assert_eq!(store.get(&id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn reports_attach_in_order() {
        let store = InMemoryCatalog::new();
        let id = store
            .add(NewItem::new("Ibuprofen", "Anti-inflammatory", "Acme"))
            .await
            .unwrap();
        store
            .update(&id, ItemMutation::AttachReport(LabReport::new("S-1", "peak at 254nm", "ok")))
            .await
            .unwrap();
        let item = store
            .update(
                &id,
                ItemMutation::AttachReport(LabReport::new("S-2", "trace impurity", "recheck")),
            )
            .await
            .unwrap();
        assert_eq!(item.reports.len(), 2);
        assert_eq!(item.reports[1].sample_id, "S-2");
        assert_eq!(item.status, ItemStatus::Pending);
    }

    #[tokio::test]
    async fn concurrent_begin_has_one_winner() {
        let store = Arc::new(InMemoryCatalog::new());
        let id = store
            .add(NewItem::new("Cetirizine", "Antihistamine", "Acme"))
            .await
            .unwrap();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store.update(&id, ItemMutation::BeginAnalysis).await.is_ok()
            }));
        }
        let mut wins = 0;
        for h in handles {
            if h.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
