//! PollingOrchestrator types

use crate::payload::MissingFieldPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay between cycles
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Default per-source processing budget
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(120);

/// Loop settings
#[derive(Debug, Clone)]
pub struct PollingSettings {
    /// Delay applied after every cycle
    pub interval: Duration,
    /// Upper bound for fetch + inference + upload of one source
    pub source_timeout: Duration,
    pub missing_field_policy: MissingFieldPolicy,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
            missing_field_policy: MissingFieldPolicy::default(),
        }
    }
}

/// Result of polling one source in one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// Path has no entries
    NoData,
    /// Latest key already processed
    Unchanged { key: String },
    /// New entry processed and committed
    Processed { key: String, uploads: usize },
    /// Processing failed; key not committed
    Failed { error_code: String, reason: String },
}

impl SourceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SourceOutcome::Failed { .. })
    }
}

/// Per-source line of a cycle report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub source_id: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

/// Summary of one poll cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    pub fn outcome(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|r| r.source_id == source_id)
            .map(|r| &r.outcome)
    }

    pub fn processed_count(&self) -> usize {
        self.sources
            .iter()
            .filter(|r| matches!(r.outcome, SourceOutcome::Processed { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.sources.iter().filter(|r| r.outcome.is_failure()).count()
    }

    pub fn upload_count(&self) -> usize {
        self.sources
            .iter()
            .map(|r| match r.outcome {
                SourceOutcome::Processed { uploads, .. } => uploads,
                _ => 0,
            })
            .sum()
    }
}
