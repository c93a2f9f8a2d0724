//! Simulated image recognizer.
//!
//! Stands in for a real recognition backend: it waits a fixed latency and
//! then answers "items in the top two quality tiers" for any image.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use medlab_core::recognition::{ImageInput, ItemPredicate, Recognizer};

pub struct SimulatedRecognizer {
    latency: Duration,
}

impl SimulatedRecognizer {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl Recognizer for SimulatedRecognizer {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn recognize(&self, image: &ImageInput) -> Result<ItemPredicate> {
        debug!(
            bytes = image.bytes.len(),
            latency_ms = self.latency.as_millis() as u64,
            "recognizing image"
        );
        tokio::time::sleep(self.latency).await;
        Ok(ItemPredicate::top_tiers(2))
    }
}
