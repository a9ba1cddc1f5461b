//! ml-predictor library
//!
//! Realtime prediction loop over a remote observation store.
//!
//! ## Components
//!
//! 1. SourceRegistry - which sources to poll and where predictions go
//! 2. ObservationStore - latest-entry reads and appends (Firebase RTDB)
//! 3. Payload - raw observation to typed reading
//! 4. AIClient - inference server adapter (classifier + detectors)
//! 5. SourceTracker - last processed key and health per source
//! 6. PollingOrchestrator - sequential poll / infer / upload / commit loop
//! 7. WebAPI - health, source status, ad-hoc prediction

pub mod ai_client;
pub mod error;
pub mod models;
pub mod observation_store;
pub mod payload;
pub mod polling_orchestrator;
pub mod source_registry;
pub mod source_tracker;
pub mod state;
pub mod web_api;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use state::AppState;
