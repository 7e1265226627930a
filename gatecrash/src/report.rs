//! Durable record of one run.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Sentinel recorded instead of a code when a step was advanced through the
/// router bypass.
pub const BYPASS_SENTINEL: &str = "ROUTER_BYPASS";

/// How a step was advanced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceMethod {
    CodeSubmission,
    RouterBypass,
}

/// One successfully advanced step. Appended in order, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub step: u32,
    pub code: String,
    pub duration_ms: u64,
    pub method: AdvanceMethod,
}

/// Fixed metrics block stating that the run used no metered external APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiUsage {
    pub llm_calls: u32,
    pub tokens_used: u64,
    pub cost_usd: f64,
}

impl ApiUsage {
    pub fn none() -> Self {
        Self {
            llm_calls: 0,
            tokens_used: 0,
            cost_usd: 0.0,
        }
    }
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in seconds, 2-decimal precision.
    pub duration_seconds: f64,
    pub steps_completed: u32,
    pub total_steps: u32,
    pub success: bool,
    pub attempts: Vec<AttemptRecord>,
    pub api_usage: ApiUsage,
}

impl RunSummary {
    /// Build the final aggregate. Called exactly once per run, success or
    /// exhaustion alike.
    pub fn finalize(
        started_at: DateTime<Utc>,
        attempts: Vec<AttemptRecord>,
        total_steps: u32,
        success: bool,
    ) -> Self {
        let finished_at = Utc::now();
        let elapsed_ms = (finished_at - started_at).num_milliseconds().max(0);
        Self {
            started_at,
            finished_at,
            duration_seconds: (elapsed_ms as f64 / 10.0).round() / 100.0,
            steps_completed: attempts.len() as u32,
            total_steps,
            success,
            attempts,
            api_usage: ApiUsage::none(),
        }
    }
}

/// Write the summary JSON artifact.
pub fn write_summary(path: &Path, summary: &RunSummary) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, body)?;
    info!(path = %path.display(), "run summary written");
    Ok(())
}

/// Write the final page capture.
pub fn save_screenshot(path: &Path, png: &[u8]) -> anyhow::Result<()> {
    std::fs::write(path, png)?;
    info!(path = %path.display(), bytes = png.len(), "final page capture written");
    Ok(())
}
