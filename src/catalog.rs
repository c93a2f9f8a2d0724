//! Catalog seeding from the `[[catalog.items]]` config section.

use anyhow::{Context, Result};
use tracing::info;

use medlab_core::models::NewItem;
use medlab_core::store::CatalogStore;

use crate::config::Config;

/// Add every configured seed item to `store`, in file order.
///
/// Returns the new ids. Seeded items start Pending like any other.
pub async fn seed_catalog(store: &dyn CatalogStore, config: &Config) -> Result<Vec<String>> {
    let mut ids = Vec::with_capacity(config.catalog.items.len());
    for (i, seed) in config.catalog.items.iter().enumerate() {
        let id = store
            .add(NewItem::new(&seed.name, &seed.category, &seed.manufacturer))
            .await
            .with_context(|| format!("catalog.items[{}] ({})", i, seed.name))?;
        ids.push(id);
    }
    info!(count = ids.len(), "catalog seeded");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use medlab_core::models::ItemStatus;
    use medlab_core::store::memory::InMemoryCatalog;

    #[tokio::test]
    async fn seeds_items_in_file_order() {
        let config = parse_config(
            r#"
[[catalog.items]]
name = "Paracetamol 500mg"
category = "Painkiller"
manufacturer = "GSK"

[[catalog.items]]
name = "Ibuprofen 400mg"
category = "Anti-inflammatory"
manufacturer = "Abbott"
"#,
        )
        .unwrap();
        let store = InMemoryCatalog::new();
        let ids = seed_catalog(&store, &config).await.unwrap();
        assert_eq!(ids.len(), 2);

        let items = store.list().await.unwrap();
        assert_eq!(items[0].name, "Paracetamol 500mg");
        assert_eq!(items[1].manufacturer, "Abbott");
        assert!(items.iter().all(|i| i.status == ItemStatus::Pending));
    }

    #[tokio::test]
    async fn empty_catalog_section_seeds_nothing() {
        let store = InMemoryCatalog::new();
        let ids = seed_catalog(&store, &Config::minimal()).await.unwrap();
        assert!(ids.is_empty());
        assert!(store.is_empty().await.unwrap());
    }
}
