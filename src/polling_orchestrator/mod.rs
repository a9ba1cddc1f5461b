//! PollingOrchestrator - change-detection polling loop
//!
//! ## Responsibilities
//!
//! - Visit every configured source in order, one at a time
//! - Skip sources whose latest key was already processed
//! - Decode, run inference, upload predictions
//! - Commit the key only after every upload for that source succeeded
//! - Contain per-source failures; drive one-shot or continuous runs

mod types;

pub use types::*;

use crate::ai_client::{Classifier, DetectorBinding};
use crate::error::{Error, Result};
use crate::models::{DetectionPrediction, WaterPrediction};
use crate::observation_store::{Observation, ObservationStore};
use crate::payload::{self, CameraFrame, ObservedAt, Reading, SensorReading};
use crate::source_registry::Source;
use crate::source_tracker::SourceTracker;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::RwLock;

/// PollingOrchestrator instance
pub struct PollingOrchestrator {
    store: Arc<dyn ObservationStore>,
    classifier: Arc<dyn Classifier>,
    detectors: Vec<DetectorBinding>,
    sources: Vec<Source>,
    tracker: Arc<SourceTracker>,
    settings: PollingSettings,
    running: Arc<RwLock<bool>>,
    last_report: RwLock<Option<CycleReport>>,
}

impl PollingOrchestrator {
    /// Create new PollingOrchestrator
    pub fn new(
        store: Arc<dyn ObservationStore>,
        classifier: Arc<dyn Classifier>,
        detectors: Vec<DetectorBinding>,
        sources: Vec<Source>,
        tracker: Arc<SourceTracker>,
        settings: PollingSettings,
    ) -> Self {
        Self {
            store,
            classifier,
            detectors,
            sources,
            tracker,
            settings,
            running: Arc::new(RwLock::new(false)),
            last_report: RwLock::new(None),
        }
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn tracker(&self) -> &Arc<SourceTracker> {
        &self.tracker
    }

    /// Report of the most recent completed cycle
    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    /// Run exactly one cycle (one-shot mode)
    pub async fn run_once(&self) -> CycleReport {
        self.run_cycle().await
    }

    /// Run cycles back-to-back until `stop` is called
    ///
    /// Each cycle runs in its own task so a panic inside a cycle is
    /// reported and the loop carries on after the usual delay.
    pub async fn run_forever(self: Arc<Self>) {
        {
            let mut running = self.running.write().await;
            if *running {
                tracing::warn!("Polling already running");
                return;
            }
            *running = true;
        }

        tracing::info!(
            interval_ms = self.settings.interval.as_millis() as u64,
            sources = self.sources.len(),
            "Starting realtime prediction loop"
        );

        loop {
            if !*self.running.read().await {
                break;
            }

            let this = self.clone();
            if let Err(e) = tokio::spawn(async move { this.run_cycle().await }).await {
                tracing::error!(error = %e, "Prediction cycle aborted");
            }

            tokio::time::sleep(self.settings.interval).await;
        }

        tracing::info!("Prediction loop stopped");
    }

    /// Spawn `run_forever` in the background
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run_forever())
    }

    /// Stop the loop after the current cycle
    pub async fn stop(&self) {
        let mut running = self.running.write().await;
        *running = false;
        tracing::info!("Stopping prediction loop");
    }

    /// One pass over all sources, in configured order
    pub async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        tracing::info!("Prediction cycle started");

        let mut reports = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            let guarded = AssertUnwindSafe(self.poll_source(source)).catch_unwind();
            let result = match tokio::time::timeout(self.settings.source_timeout, guarded).await {
                Ok(Ok(result)) => result,
                Ok(Err(panic)) => Err(Error::Internal(format!(
                    "Source processing panicked: {}",
                    panic_message(panic.as_ref())
                ))),
                Err(_) => Err(Error::Timeout(self.settings.source_timeout.as_secs())),
            };

            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        source_id = %source.id,
                        store_path = %source.store_path,
                        error_code = e.code(),
                        error = %e,
                        "Source poll failed"
                    );
                    SourceOutcome::Failed {
                        error_code: e.code().to_string(),
                        reason: e.to_string(),
                    }
                }
            };

            self.tracker
                .record_attempt(&source.id, !outcome.is_failure())
                .await;

            reports.push(SourceReport {
                source_id: source.id.clone(),
                outcome,
            });
        }

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            sources: reports,
        };

        tracing::info!(
            processed = report.processed_count(),
            uploads = report.upload_count(),
            failed = report.failed_count(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Prediction cycle finished"
        );

        *self.last_report.write().await = Some(report.clone());
        report
    }

    /// Poll a single source
    async fn poll_source(&self, source: &Source) -> Result<SourceOutcome> {
        let Some(observation) = self.store.get_latest(&source.store_path).await? else {
            tracing::info!(source_id = %source.id, "No data found");
            return Ok(SourceOutcome::NoData);
        };

        if !self.tracker.is_new(&source.id, &observation.key).await {
            tracing::debug!(source_id = %source.id, key = %observation.key, "No new data");
            return Ok(SourceOutcome::Unchanged {
                key: observation.key,
            });
        }

        let Observation { key, payload: raw } = observation;

        // Decode on the blocking pool so the source timeout also covers it
        let kind = source.kind;
        let policy = self.settings.missing_field_policy;
        let reading = tokio::task::spawn_blocking(move || payload::decode(kind, &raw, policy))
            .await
            .map_err(|e| Error::Internal(format!("Decode worker failed: {}", e)))??;

        let uploads = match reading {
            Reading::Sensor(reading) => self.process_sensor(source, reading).await?,
            Reading::Frame(frame) => self.process_frame(source, frame).await?,
        };

        self.tracker.commit(&source.id, &key).await;

        Ok(SourceOutcome::Processed { key, uploads })
    }

    /// Classify one sensor reading and upload the prediction
    async fn process_sensor(&self, source: &Source, reading: SensorReading) -> Result<usize> {
        let path = source.prediction_path.as_deref().ok_or_else(|| {
            Error::Config(format!("Source {} has no prediction_path", source.id))
        })?;

        let result = self.classifier.classify(reading.features).await?;
        let timestamp = reading.observed_at.unwrap_or_else(ObservedAt::now);
        let prediction = WaterPrediction::new(reading.features, result, timestamp);

        self.store
            .append(path, &serde_json::to_value(&prediction)?)
            .await?;

        tracing::info!(
            source_id = %source.id,
            ph = prediction.ph,
            tds = prediction.tds,
            potability = prediction.potability,
            probability_good = prediction.probability_good,
            "Water prediction uploaded"
        );

        Ok(1)
    }

    /// Run every detector on one frame, then upload one prediction per detector
    async fn process_frame(&self, source: &Source, frame: CameraFrame) -> Result<usize> {
        let timestamp = frame.observed_at.unwrap_or_else(ObservedAt::now);

        // No upload until every detector has produced a result
        let mut pending = Vec::with_capacity(self.detectors.len());
        for binding in &self.detectors {
            let detections = binding.detector.detect(&frame.image).await?;
            pending.push((
                binding,
                DetectionPrediction {
                    predictions: detections,
                    timestamp: timestamp.clone(),
                },
            ));
        }

        for (binding, prediction) in &pending {
            let path = binding.path_for(&source.id);
            self.store
                .append(&path, &serde_json::to_value(prediction)?)
                .await?;

            tracing::info!(
                source_id = %source.id,
                detector = %binding.name,
                detections = prediction.predictions.len(),
                path = %path,
                "Detection prediction uploaded"
            );
        }

        Ok(pending.len())
    }
}

/// Best-effort text of a caught panic payload
fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    }
}
