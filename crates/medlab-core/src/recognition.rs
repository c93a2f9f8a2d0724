//! Image recognition seam for image-derived search.
//!
//! An image query is turned into an [`ItemPredicate`] by a [`Recognizer`].
//! The search engine only ever sees the predicate, so a real recognition
//! backend can replace the simulated one without touching the engine.
//!
//! Concrete recognizers live in the `medlab` app crate.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{CatalogItem, QualityTier};

/// Raw image submitted with an image-derived query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    /// MIME type, when the caller knows it (e.g. `"image/png"`).
    pub media_type: Option<String>,
}

impl ImageInput {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            media_type: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A match predicate over catalog items, produced by recognition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPredicate {
    /// Every item matches.
    MatchAll,
    /// Case-insensitive substring of name, manufacturer, or category.
    TextContains { text: String },
    /// Item's derived tier is one of `tiers`. Items without a tier never match.
    TierIn { tiers: Vec<QualityTier> },
    /// Exact category match.
    CategoryIs { category: String },
}

impl ItemPredicate {
    /// The top `n` tiers, best first.
    pub fn top_tiers(n: usize) -> Self {
        ItemPredicate::TierIn {
            tiers: QualityTier::ALL.iter().take(n).copied().collect(),
        }
    }

    pub fn matches(&self, item: &CatalogItem) -> bool {
        match self {
            ItemPredicate::MatchAll => true,
            ItemPredicate::TextContains { text } => text_matches(item, text),
            ItemPredicate::TierIn { tiers } => item
                .quality_tier()
                .map(|t| tiers.contains(&t))
                .unwrap_or(false),
            ItemPredicate::CategoryIs { category } => item.category == *category,
        }
    }
}

/// Case-insensitive substring match over name, manufacturer, and category.
///
/// Blank text matches everything.
pub fn text_matches(item: &CatalogItem, text: &str) -> bool {
    if text.trim().is_empty() {
        return true;
    }
    let needle = text.to_lowercase();
    [&item.name, &item.manufacturer, &item.category]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

/// Turns an image into an item predicate.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short identifier used in logs (e.g. `"simulated"`).
    fn name(&self) -> &str;

    /// Derive a predicate from `image`.
    async fn recognize(&self, image: &ImageInput) -> Result<ItemPredicate>;
}
