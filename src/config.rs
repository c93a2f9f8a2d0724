use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Delay between progress steps of the simulated workload.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Percentage points added per step.
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
    /// Fixed RNG seed for reproducible metrics. Random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            progress_step: default_progress_step(),
            seed: None,
        }
    }
}

impl AnalysisConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

fn default_tick_interval_ms() -> u64 {
    200
}
fn default_progress_step() -> u8 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Simulated image recognition latency.
    #[serde(default = "default_recognition_latency_ms")]
    pub recognition_latency_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            recognition_latency_ms: default_recognition_latency_ms(),
        }
    }
}

impl SearchConfig {
    pub fn recognition_latency(&self) -> Duration {
        Duration::from_millis(self.recognition_latency_ms)
    }
}

fn default_recognition_latency_ms() -> u64 {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// Items added to the catalog at startup.
    #[serde(default)]
    pub items: Vec<SeedItem>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SeedItem {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub manufacturer: String,
}

impl Config {
    /// Defaults only, with an empty catalog. Used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    validate(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

fn validate(config: &Config) -> Result<()> {
    // Validate analysis
    if config.analysis.progress_step == 0 || config.analysis.progress_step > 100 {
        anyhow::bail!("analysis.progress_step must be in [1, 100]");
    }

    // Validate catalog seed
    for (i, item) in config.catalog.items.iter().enumerate() {
        if item.name.trim().is_empty() || item.category.trim().is_empty() {
            anyhow::bail!("catalog.items[{}] must have a name and a category", i);
        }
    }

    if config.server.bind.trim().is_empty() {
        anyhow::bail!("server.bind must not be empty");
    }

    Ok(())
}
