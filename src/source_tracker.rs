//! Source Tracker
//!
//! Remembers, per source, the key of the last observation whose
//! predictions were written, and answers "is this entry new?".
//! Also tracks per-source health so only transitions are logged.
//!
//! State lives in memory only and is lost on restart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Source processing health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceHealth {
    /// Never attempted
    Unknown,
    /// Last attempt succeeded (processed, unchanged or no data)
    Healthy,
    /// Last attempt failed
    Failing,
}

/// Health transition event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceHealthEvent {
    /// Healthy/Unknown -> Failing
    Degraded,
    /// Failing -> Healthy
    Recovered,
}

/// Per-source view for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub source_id: String,
    pub last_key: Option<String>,
    pub health: SourceHealth,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone)]
struct HealthEntry {
    health: SourceHealth,
    consecutive_failures: u32,
}

impl Default for HealthEntry {
    fn default() -> Self {
        Self {
            health: SourceHealth::Unknown,
            consecutive_failures: 0,
        }
    }
}

/// Tracks last-processed keys and source health
pub struct SourceTracker {
    /// source_id -> last committed key
    last_keys: RwLock<HashMap<String, String>>,
    /// source_id -> health
    health: RwLock<HashMap<String, HealthEntry>>,
}

impl SourceTracker {
    /// Create new tracker
    pub fn new() -> Self {
        Self {
            last_keys: RwLock::new(HashMap::new()),
            health: RwLock::new(HashMap::new()),
        }
    }

    /// True when `key` differs from the committed key, or nothing is committed
    pub async fn is_new(&self, source_id: &str, key: &str) -> bool {
        self.last_keys
            .read()
            .await
            .get(source_id)
            .map_or(true, |last| last != key)
    }

    /// Record `key` as processed. Call only after the prediction write succeeded.
    pub async fn commit(&self, source_id: &str, key: &str) {
        self.last_keys
            .write()
            .await
            .insert(source_id.to_string(), key.to_string());

        tracing::debug!(source_id = %source_id, key = %key, "Source key committed");
    }

    /// Last committed key for a source
    pub async fn last_key(&self, source_id: &str) -> Option<String> {
        self.last_keys.read().await.get(source_id).cloned()
    }

    /// Record the result of one attempt and return a transition event if any
    ///
    /// Returns:
    /// - `Some(Degraded)` on the first failure after Unknown/Healthy
    /// - `Some(Recovered)` on success after Failing
    /// - `None` otherwise
    pub async fn record_attempt(&self, source_id: &str, ok: bool) -> Option<SourceHealthEvent> {
        let mut health = self.health.write().await;
        let entry = health.entry(source_id.to_string()).or_default();
        let prev = entry.health;

        if ok {
            entry.health = SourceHealth::Healthy;
            entry.consecutive_failures = 0;
        } else {
            entry.health = SourceHealth::Failing;
            entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
        }

        match (prev, entry.health) {
            (SourceHealth::Failing, SourceHealth::Healthy) => {
                tracing::info!(source_id = %source_id, "Source recovered");
                Some(SourceHealthEvent::Recovered)
            }
            (SourceHealth::Unknown | SourceHealth::Healthy, SourceHealth::Failing) => {
                tracing::warn!(source_id = %source_id, "Source failing");
                Some(SourceHealthEvent::Degraded)
            }
            _ => None,
        }
    }

    /// Current health for a source
    pub async fn health(&self, source_id: &str) -> SourceHealth {
        self.health
            .read()
            .await
            .get(source_id)
            .map(|e| e.health)
            .unwrap_or(SourceHealth::Unknown)
    }

    /// Status for each id in `source_ids`, in the given order
    pub async fn snapshot(&self, source_ids: &[String]) -> Vec<SourceStatus> {
        let last_keys = self.last_keys.read().await;
        let health = self.health.read().await;

        source_ids
            .iter()
            .map(|id| {
                let entry = health.get(id).cloned().unwrap_or_default();
                SourceStatus {
                    source_id: id.clone(),
                    last_key: last_keys.get(id).cloned(),
                    health: entry.health,
                    consecutive_failures: entry.consecutive_failures,
                }
            })
            .collect()
    }
}

impl Default for SourceTracker {
    fn default() -> Self {
        Self::new()
    }
}
