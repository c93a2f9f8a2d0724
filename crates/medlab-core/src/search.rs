//! Faceted catalog search.
//!
//! A [`SearchQuery`] combines one match predicate with any number of facet
//! constraints:
//!
//! 1. Resolve the predicate. Text mode uses a case-insensitive substring
//!    match over name, manufacturer and category. Image mode asks the
//!    [`Recognizer`] to turn the image into an [`ItemPredicate`].
//! 2. Read the current catalog through the [`CatalogStore`].
//! 3. Keep items matching the predicate and every active facet (AND).
//!    Facet values compare exactly and case-sensitively.
//!
//! Results keep catalog insertion order. No ranking is applied. The
//! engine never writes to the store and never caches between calls.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};
use crate::models::{CatalogItem, ItemStatus, QualityTier};
use crate::recognition::{ImageInput, ItemPredicate, Recognizer};
use crate::store::CatalogStore;

/// Sentinel facet value accepting every item.
pub const ANY: &str = "any";

/// How the match predicate of a query is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Text,
    ImageDerived,
}

impl FromStr for SearchMode {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(SearchMode::Text),
            "image" | "image_derived" => Ok(SearchMode::ImageDerived),
            other => Err(CatalogError::Validation(format!(
                "unknown search mode '{}': use text or image",
                other
            ))),
        }
    }
}

/// A single-valued facet constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Facet<T> {
    Any,
    Is(T),
}

impl<T> Default for Facet<T> {
    fn default() -> Self {
        Facet::Any
    }
}

impl<T> Facet<T> {
    fn accepts_with(&self, check: impl FnOnce(&T) -> bool) -> bool {
        match self {
            Facet::Any => true,
            Facet::Is(expected) => check(expected),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Facet::Any)
    }
}

impl<T: FromStr<Err = CatalogError>> Facet<T> {
    /// Parse a facet value, treating `"any"` as the wildcard.
    pub fn parse(value: &str) -> CatalogResult<Self> {
        if value == ANY {
            Ok(Facet::Any)
        } else {
            value.parse().map(Facet::Is)
        }
    }
}

impl<T: fmt::Display> fmt::Display for Facet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Facet::Any => f.write_str(ANY),
            Facet::Is(v) => v.fmt(f),
        }
    }
}

/// Plain-string facet value; parsing never fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exact(pub String);

impl FromStr for Exact {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Exact(s.to_string()))
    }
}

impl fmt::Display for Exact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Facet constraints of a query, combined with logical AND.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Facets {
    pub category: Facet<Exact>,
    pub quality_tier: Facet<QualityTier>,
    pub manufacturer: Facet<Exact>,
    pub status: Facet<ItemStatus>,
}

impl Facets {
    /// No constraints.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Facet::Is(Exact(category.into()));
        self
    }

    pub fn quality_tier(mut self, tier: QualityTier) -> Self {
        self.quality_tier = Facet::Is(tier);
        self
    }

    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Facet::Is(Exact(manufacturer.into()));
        self
    }

    pub fn status(mut self, status: ItemStatus) -> Self {
        self.status = Facet::Is(status);
        self
    }

    /// Build facets from a name → value map, as received over the API.
    ///
    /// Accepted names: `category`, `qualityTier` (or `quality_tier`),
    /// `manufacturer`, `status`. Unknown names are rejected.
    pub fn from_map(map: &BTreeMap<String, String>) -> CatalogResult<Self> {
        let mut facets = Facets::any();
        for (name, value) in map {
            match name.as_str() {
                "category" => facets.category = Facet::parse(value)?,
                "qualityTier" | "quality_tier" => facets.quality_tier = Facet::parse(value)?,
                "manufacturer" => facets.manufacturer = Facet::parse(value)?,
                "status" => facets.status = Facet::parse(value)?,
                other => {
                    return Err(CatalogError::Validation(format!(
                        "unknown facet '{}': use category, qualityTier, manufacturer, or status",
                        other
                    )))
                }
            }
        }
        Ok(facets)
    }

    /// True when `item` satisfies every active facet.
    pub fn accepts(&self, item: &CatalogItem) -> bool {
        self.category.accepts_with(|c| c.0 == item.category)
            && self
                .quality_tier
                .accepts_with(|t| item.quality_tier() == Some(*t))
            && self.manufacturer.accepts_with(|m| m.0 == item.manufacturer)
            && self.status.accepts_with(|s| *s == item.status)
    }
}

/// Bundles all inputs for a single search call.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub mode: SearchMode,
    /// Used in text mode; ignored otherwise.
    pub text: String,
    /// Required in image mode; ignored otherwise.
    pub image: Option<ImageInput>,
    pub facets: Facets,
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            mode: SearchMode::Text,
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn image(image: ImageInput) -> Self {
        Self {
            mode: SearchMode::ImageDerived,
            image: Some(image),
            ..Default::default()
        }
    }

    pub fn with_facets(mut self, facets: Facets) -> Self {
        self.facets = facets;
        self
    }
}

/// Resolve the match predicate for `query`.
///
/// Image mode fails with `Validation` when no image or no recognizer is
/// available, and with `Recognition` when the recognizer errors.
pub async fn resolve_predicate(
    query: &SearchQuery,
    recognizer: Option<&dyn Recognizer>,
) -> CatalogResult<ItemPredicate> {
    match query.mode {
        SearchMode::Text => {
            if query.text.trim().is_empty() {
                Ok(ItemPredicate::MatchAll)
            } else {
                Ok(ItemPredicate::TextContains {
                    text: query.text.clone(),
                })
            }
        }
        SearchMode::ImageDerived => {
            let image = query
                .image
                .as_ref()
                .filter(|img| !img.is_empty())
                .ok_or_else(|| {
                    CatalogError::Validation("image mode requires a non-empty image".into())
                })?;
            let recognizer = recognizer.ok_or_else(|| {
                CatalogError::Validation("image search is not available: no recognizer".into())
            })?;
            recognizer
                .recognize(image)
                .await
                .map_err(|e| CatalogError::Recognition(format!("{}: {:#}", recognizer.name(), e)))
        }
    }
}

/// Run a faceted search against a [`CatalogStore`].
///
/// This is the function every frontend (CLI, HTTP) delegates to.
pub async fn search<S: CatalogStore + ?Sized>(
    store: &S,
    query: &SearchQuery,
    recognizer: Option<&dyn Recognizer>,
) -> CatalogResult<Vec<CatalogItem>> {
    let predicate = resolve_predicate(query, recognizer).await?;
    Ok(filter_items(store.list().await?, &predicate, &query.facets))
}

/// Keep the items matching `predicate` and `facets`, in their given order.
pub fn filter_items(
    items: Vec<CatalogItem>,
    predicate: &ItemPredicate,
    facets: &Facets,
) -> Vec<CatalogItem> {
    items
        .into_iter()
        .filter(|item| predicate.matches(item) && facets.accepts(item))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisMetrics, NewItem, QualityParameters};
    use crate::store::memory::InMemoryCatalog;
    use crate::store::ItemMutation;
    use anyhow::Result;
    use async_trait::async_trait;

    struct TopTwo;

    #[async_trait]
    impl Recognizer for TopTwo {
        fn name(&self) -> &str {
            "top-two"
        }

        async fn recognize(&self, _image: &ImageInput) -> Result<ItemPredicate> {
            Ok(ItemPredicate::top_tiers(2))
        }
    }

    struct Broken;

    #[async_trait]
    impl Recognizer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn recognize(&self, _image: &ImageInput) -> Result<ItemPredicate> {
            anyhow::bail!("camera offline")
        }
    }

    async fn complete(store: &InMemoryCatalog, id: &str, score: u8) {
        store.update(id, ItemMutation::BeginAnalysis).await.unwrap();
        store
            .update(
                id,
                ItemMutation::Complete(AnalysisMetrics::new(
                    score,
                    0.85,
                    QualityParameters {
                        purity: 92.0,
                        potency: 93.0,
                        stability: 94.0,
                        contamination: 2.0,
                    },
                )),
            )
            .await
            .unwrap();
    }

    async fn fixture() -> (InMemoryCatalog, Vec<String>) {
        let store = InMemoryCatalog::new();
        let mut ids = Vec::new();
        for (name, category, maker) in [
            ("Paracetamol 500mg", "Painkiller", "GSK"),
            ("Ibuprofen 400mg", "Anti-inflammatory", "Abbott"),
            ("Cetirizine 10mg", "Antihistamine", "Cipla"),
            ("Aspirin 75mg", "Painkiller", "Bayer"),
        ] {
            ids.push(store.add(NewItem::new(name, category, maker)).await.unwrap());
        }
        complete(&store, &ids[0], 96).await;
        complete(&store, &ids[1], 91).await;
        complete(&store, &ids[2], 84).await;
        (store, ids)
    }

    fn names(items: &[CatalogItem]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[tokio::test]
    async fn empty_text_returns_everything_in_order() {
        let (store, _) = fixture().await;
        let results = search(&store, &SearchQuery::text(""), None).await.unwrap();
        assert_eq!(
            names(&results),
            vec![
                "Paracetamol 500mg",
                "Ibuprofen 400mg",
                "Cetirizine 10mg",
                "Aspirin 75mg"
            ]
        );
    }

    #[tokio::test]
    async fn text_is_case_insensitive() {
        let (store, _) = fixture().await;
        let results = search(&store, &SearchQuery::text("paracetamol"), None)
            .await
            .unwrap();
        assert_eq!(names(&results), vec!["Paracetamol 500mg"]);
    }

    #[tokio::test]
    async fn text_matches_manufacturer_and_category() {
        let (store, _) = fixture().await;
        let by_maker = search(&store, &SearchQuery::text("bayer"), None).await.unwrap();
        assert_eq!(names(&by_maker), vec!["Aspirin 75mg"]);
        let by_category = search(&store, &SearchQuery::text("ANTIHIST"), None)
            .await
            .unwrap();
        assert_eq!(names(&by_category), vec!["Cetirizine 10mg"]);
    }

    #[tokio::test]
    async fn category_facet_is_exact_and_case_sensitive() {
        let (store, _) = fixture().await;
        let q = SearchQuery::text("").with_facets(Facets::any().category("Painkiller"));
        let results = search(&store, &q, None).await.unwrap();
        assert_eq!(names(&results), vec!["Paracetamol 500mg", "Aspirin 75mg"]);

        let q = SearchQuery::text("").with_facets(Facets::any().category("painkiller"));
        assert!(search(&store, &q, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn facets_combine_with_and() {
        let (store, _) = fixture().await;
        let q = SearchQuery::text("").with_facets(
            Facets::any()
                .category("Painkiller")
                .quality_tier(QualityTier::APlus),
        );
        let results = search(&store, &q, None).await.unwrap();
        assert_eq!(names(&results), vec!["Paracetamol 500mg"]);

        let q = SearchQuery::text("ibuprofen").with_facets(Facets::any().category("Painkiller"));
        assert!(search(&store, &q, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tier_facet_skips_unanalyzed_items() {
        let (store, _) = fixture().await;
        let q = SearchQuery::text("").with_facets(Facets::any().quality_tier(QualityTier::C));
        assert!(search(&store, &q, None).await.unwrap().is_empty());
        let q = SearchQuery::text("").with_facets(Facets::any().status(ItemStatus::Pending));
        assert_eq!(names(&search(&store, &q, None).await.unwrap()), vec!["Aspirin 75mg"]);
    }

    #[tokio::test]
    async fn image_mode_uses_recognizer_predicate() {
        let (store, _) = fixture().await;
        let q = SearchQuery::image(ImageInput::new(vec![0x89, 0x50, 0x4e, 0x47]));
        let results = search(&store, &q, Some(&TopTwo)).await.unwrap();
        assert_eq!(names(&results), vec!["Paracetamol 500mg", "Ibuprofen 400mg"]);

        let q = q.with_facets(Facets::any().category("Anti-inflammatory"));
        let results = search(&store, &q, Some(&TopTwo)).await.unwrap();
        assert_eq!(names(&results), vec!["Ibuprofen 400mg"]);
    }

    #[tokio::test]
    async fn image_mode_ignores_text() {
        let (store, _) = fixture().await;
        let mut q = SearchQuery::image(ImageInput::new(vec![1]));
        q.text = "cetirizine".into();
        let results = search(&store, &q, Some(&TopTwo)).await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn image_mode_errors() {
        let (store, _) = fixture().await;
        let missing = SearchQuery {
            mode: SearchMode::ImageDerived,
            ..Default::default()
        };
        assert!(matches!(
            search(&store, &missing, Some(&TopTwo)).await,
            Err(CatalogError::Validation(_))
        ));

        let q = SearchQuery::image(ImageInput::new(vec![1]));
        assert!(matches!(
            search(&store, &q, None).await,
            Err(CatalogError::Validation(_))
        ));
        match search(&store, &q, Some(&Broken)).await {
            Err(CatalogError::Recognition(msg)) => assert!(msg.contains("camera offline")),
            other => panic!("expected recognition error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn search_reflects_current_state() {
        let (store, ids) = fixture().await;
        let q = SearchQuery::text("").with_facets(Facets::any().quality_tier(QualityTier::C));
        assert!(search(&store, &q, None).await.unwrap().is_empty());
        complete(&store, &ids[3], 61).await;
        assert_eq!(names(&search(&store, &q, None).await.unwrap()), vec!["Aspirin 75mg"]);
    }

    #[test]
    fn facets_from_map() {
        let mut map = BTreeMap::new();
        map.insert("category".to_string(), "Painkiller".to_string());
        map.insert("qualityTier".to_string(), "any".to_string());
        let facets = Facets::from_map(&map).unwrap();
        assert_eq!(facets, Facets::any().category("Painkiller"));

        map.insert("qualityTier".to_string(), "B+".to_string());
        let facets = Facets::from_map(&map).unwrap();
        assert_eq!(facets.quality_tier, Facet::Is(QualityTier::BPlus));

        map.insert("color".to_string(), "red".to_string());
        assert!(matches!(
            Facets::from_map(&map),
            Err(CatalogError::Validation(_))
        ));
    }

    #[test]
    fn facet_tier_must_parse() {
        let mut map = BTreeMap::new();
        map.insert("qualityTier".to_string(), "Z".to_string());
        assert!(Facets::from_map(&map).is_err());
    }

    #[test]
    fn mode_parse() {
        assert_eq!("text".parse::<SearchMode>().unwrap(), SearchMode::Text);
        assert_eq!("image".parse::<SearchMode>().unwrap(), SearchMode::ImageDerived);
        assert!("fuzzy".parse::<SearchMode>().is_err());
    }
}
