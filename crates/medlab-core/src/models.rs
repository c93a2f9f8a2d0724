//! Core data models for the catalog and its analysis results.
//!
//! A [`CatalogItem`] carries static identity (name, category,
//! manufacturer) set once at creation, plus analysis-derived metrics that
//! appear only when an analysis job completes. The derived fields are held
//! together in a single `Option<AnalysisMetrics>` so an item can never be
//! Completed with a missing score, or Pending with a stale one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

/// Lifecycle status of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 3] = [
        ItemStatus::Pending,
        ItemStatus::Processing,
        ItemStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "processing" => Ok(ItemStatus::Processing),
            "completed" => Ok(ItemStatus::Completed),
            other => Err(CatalogError::Validation(format!(
                "unknown status '{}': use pending, processing, or completed",
                other
            ))),
        }
    }
}

/// Letter-grade banding of a quality score.
///
/// | Score | Tier |
/// |-------|------|
/// | 95–100 | A+ |
/// | 90–94 | A |
/// | 80–89 | B+ |
/// | 70–79 | B |
/// | < 70 | C |
///
/// A+ and A together form the top numeric band (≥ 90); each of the other
/// letters maps to exactly one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QualityTier {
    #[serde(rename = "A+")]
    APlus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "C")]
    C,
}

impl QualityTier {
    /// Best to worst.
    pub const ALL: [QualityTier; 5] = [
        QualityTier::APlus,
        QualityTier::A,
        QualityTier::BPlus,
        QualityTier::B,
        QualityTier::C,
    ];

    pub fn from_score(score: u8) -> Self {
        match score {
            95.. => QualityTier::APlus,
            90..=94 => QualityTier::A,
            80..=89 => QualityTier::BPlus,
            70..=79 => QualityTier::B,
            _ => QualityTier::C,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::APlus => "A+",
            QualityTier::A => "A",
            QualityTier::BPlus => "B+",
            QualityTier::B => "B",
            QualityTier::C => "C",
        }
    }

    /// Zero-based rank, 0 being the best tier.
    pub fn rank(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QualityTier {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A+" => Ok(QualityTier::APlus),
            "A" => Ok(QualityTier::A),
            "B+" => Ok(QualityTier::BPlus),
            "B" => Ok(QualityTier::B),
            "C" => Ok(QualityTier::C),
            other => Err(CatalogError::Validation(format!(
                "unknown quality tier '{}': use A+, A, B+, B, or C",
                other
            ))),
        }
    }
}

/// Per-parameter lab measurements, each a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityParameters {
    pub purity: f64,
    pub potency: f64,
    pub stability: f64,
    pub contamination: f64,
}

/// The derived result of a completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetrics {
    pub quality_tier: QualityTier,
    pub quality_score: u8,
    pub confidence: f64,
    pub parameters: QualityParameters,
}

impl AnalysisMetrics {
    /// Build metrics; the tier is always derived from the score.
    pub fn new(quality_score: u8, confidence: f64, parameters: QualityParameters) -> Self {
        Self {
            quality_tier: QualityTier::from_score(quality_score),
            quality_score,
            confidence,
            parameters,
        }
    }
}

/// A lab report uploaded against a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabReport {
    pub sample_id: String,
    pub result: String,
    pub interpretation: String,
    pub submitted_at: DateTime<Utc>,
}

impl LabReport {
    pub fn new(
        sample_id: impl Into<String>,
        result: impl Into<String>,
        interpretation: impl Into<String>,
    ) -> Self {
        Self {
            sample_id: sample_id.into(),
            result: result.into(),
            interpretation: interpretation.into(),
            submitted_at: Utc::now(),
        }
    }
}

/// State of an analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Done,
}

impl JobState {
    pub const ALL: [JobState; 3] = [JobState::Queued, JobState::Running, JobState::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Done => "done",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied fields for a new catalog item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub manufacturer: String,
}

impl NewItem {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        manufacturer: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            manufacturer: manufacturer.into(),
        }
    }

    /// Reject items missing a name or a category.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::Validation("name must not be empty".into()));
        }
        if self.category.trim().is_empty() {
            return Err(CatalogError::Validation(
                "category must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// A medicine or sample record held by the catalog store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub manufacturer: String,
    pub status: ItemStatus,
    /// Present iff `status == Completed`.
    #[serde(flatten)]
    pub metrics: Option<AnalysisMetrics>,
    #[serde(default)]
    pub reports: Vec<LabReport>,
    pub created_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Create a Pending item with a fresh UUID.
    pub fn pending(fields: NewItem) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: fields.name.trim().to_string(),
            category: fields.category.trim().to_string(),
            manufacturer: fields.manufacturer.trim().to_string(),
            status: ItemStatus::Pending,
            metrics: None,
            reports: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn quality_tier(&self) -> Option<QualityTier> {
        self.metrics.as_ref().map(|m| m.quality_tier)
    }

    pub fn quality_score(&self) -> Option<u8> {
        self.metrics.as_ref().map(|m| m.quality_score)
    }

    pub fn confidence(&self) -> Option<f64> {
        self.metrics.as_ref().map(|m| m.confidence)
    }

    pub fn parameters(&self) -> Option<&QualityParameters> {
        self.metrics.as_ref().map(|m| &m.parameters)
    }
}
