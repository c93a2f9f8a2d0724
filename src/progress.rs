//! Analysis progress reporting.
//!
//! Reports observable progress while analysis jobs run, so a CLI user sees
//! which samples are being analyzed, how far along each one is, and how it
//! ended. Progress is emitted on **stderr** so stdout remains parseable for
//! scripts.

use std::io::Write;
use std::sync::Arc;

use medlab_core::models::QualityTier;

/// A single progress event for one analysis job.
#[derive(Clone, Debug, PartialEq)]
pub enum JobProgressEvent {
    /// The job left the queue and its workload started.
    Started { item_id: String, name: String },
    /// Progress moved forward.
    Advanced {
        item_id: String,
        name: String,
        progress: u8,
    },
    /// Metrics were written back to the catalog.
    Completed {
        item_id: String,
        name: String,
        quality_score: u8,
        quality_tier: QualityTier,
    },
    /// The workload failed; the item is Pending again.
    Failed {
        item_id: String,
        name: String,
        reason: String,
    },
    /// The job was cancelled; the item is Pending again.
    Cancelled { item_id: String, name: String },
}

/// Reports job progress. Implementations write to stderr (human or JSON).
pub trait JobProgressReporter: Send + Sync {
    /// Emit a progress event. Called from job tasks.
    fn report(&self, event: JobProgressEvent);
}

/// Human-friendly progress on stderr: "analyze Paracetamol  [####------]  40%".
pub struct StderrProgress;

impl JobProgressReporter for StderrProgress {
    fn report(&self, event: JobProgressEvent) {
        let line = match &event {
            JobProgressEvent::Started { name, .. } => format!("analyze {}  started\n", name),
            JobProgressEvent::Advanced { name, progress, .. } => {
                format!("analyze {}  {}  {:>3}%\n", name, format_bar(*progress), progress)
            }
            JobProgressEvent::Completed {
                name,
                quality_score,
                quality_tier,
                ..
            } => format!(
                "analyze {}  completed  score {} ({})\n",
                name, quality_score, quality_tier
            ),
            JobProgressEvent::Failed { name, reason, .. } => {
                format!("analyze {}  failed: {}\n", name, reason)
            }
            JobProgressEvent::Cancelled { name, .. } => format!("analyze {}  cancelled\n", name),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JobProgressReporter for JsonProgress {
    fn report(&self, event: JobProgressEvent) {
        let obj = match &event {
            JobProgressEvent::Started { item_id, name } => serde_json::json!({
                "event": "started",
                "item_id": item_id,
                "name": name
            }),
            JobProgressEvent::Advanced {
                item_id,
                name,
                progress,
            } => serde_json::json!({
                "event": "progress",
                "item_id": item_id,
                "name": name,
                "progress": progress
            }),
            JobProgressEvent::Completed {
                item_id,
                name,
                quality_score,
                quality_tier,
            } => serde_json::json!({
                "event": "completed",
                "item_id": item_id,
                "name": name,
                "quality_score": quality_score,
                "quality_tier": quality_tier
            }),
            JobProgressEvent::Failed {
                item_id,
                name,
                reason,
            } => serde_json::json!({
                "event": "failed",
                "item_id": item_id,
                "name": name,
                "reason": reason
            }),
            JobProgressEvent::Cancelled { item_id, name } => serde_json::json!({
                "event": "cancelled",
                "item_id": item_id,
                "name": name
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl JobProgressReporter for NoProgress {
    fn report(&self, _event: JobProgressEvent) {}
}

/// Ten-cell bar, one cell per 10 percentage points.
fn format_bar(progress: u8) -> String {
    let filled = usize::from(progress.min(100)) / 10;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(10 - filled))
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller hands it to the job manager.
    pub fn reporter(&self) -> Arc<dyn JobProgressReporter> {
        match self {
            ProgressMode::Off => Arc::new(NoProgress),
            ProgressMode::Human => Arc::new(StderrProgress),
            ProgressMode::Json => Arc::new(JsonProgress),
        }
    }
}
