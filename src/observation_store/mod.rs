//! ObservationStore - read/write access to the remote key-ordered store
//!
//! ## Responsibilities
//!
//! - Fetch the latest entry under a path
//! - Append a new record under a path
//!
//! The orchestrator only sees the `ObservationStore` trait; the Realtime
//! Database client in `rtdb` is the production implementation.

mod rtdb;

pub use rtdb::RtdbClient;

use crate::error::Result;
use async_trait::async_trait;
use std::cmp::Ordering;

/// One entry under a store path
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Store-assigned key, unique and monotonic within a path
    pub key: String,
    /// Source-specific payload, typed later by `payload::decode`
    pub payload: serde_json::Value,
}

impl Observation {
    pub fn new(key: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

/// Store contract consumed by the orchestrator
#[async_trait]
pub trait ObservationStore: Send + Sync {
    /// Latest (maximum key) entry under `path`, `None` when the path is empty
    async fn get_latest(&self, path: &str) -> Result<Option<Observation>>;

    /// Append `record` under `path`, returning the new entry's key
    async fn append(&self, path: &str, record: &serde_json::Value) -> Result<String>;
}

/// Key ordering used to pick "latest"
///
/// Integer-like keys compare numerically and sort before non-numeric keys,
/// which compare lexicographically.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i128>(), b.parse::<i128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Latest key among a path's children
pub fn latest_key<'a>(keys: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    keys.into_iter().max_by(|a, b| compare_keys(a, b))
}
