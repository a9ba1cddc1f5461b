//! AIClient - Inference adapter contracts and remote model server client
//!
//! ## Responsibilities
//!
//! - `Classifier`: water features -> potability label + probability
//! - `Detector`: image -> bounding-box detections
//! - HTTP implementation against the inference server
//!
//! Models are opaque. Adapters are built once at startup and shared
//! read-only across cycles.

mod remote;

pub use remote::{InferenceClient, RemoteDetector};

use crate::error::{Error, Result};
use crate::payload::DecodedImage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Classifier input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaterFeatures {
    pub ph: f64,
    pub tds: f64,
}

/// Classifier output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Predicted class (1 = potable)
    pub label: i64,
    /// Probability of the positive class
    pub probability: f64,
}

/// One detected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Category id from the model's label set
    pub label: i64,
    pub confidence: f32,
    /// x1, y1, x2, y2 in pixels
    pub bbox: [f32; 4],
}

impl Detection {
    /// Reject values a well-behaved model never returns
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(Error::Inference(format!(
                "Detection confidence out of range: {}",
                self.confidence
            )));
        }
        if self.bbox.iter().any(|v| !v.is_finite()) {
            return Err(Error::Inference("Detection bbox is not finite".to_string()));
        }
        Ok(())
    }
}

/// Classification adapter contract
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, features: WaterFeatures) -> Result<Classification>;
}

/// Detection adapter contract
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &DecodedImage) -> Result<Vec<Detection>>;
}

/// A detector together with its adapter name and prediction root
#[derive(Clone)]
pub struct DetectorBinding {
    pub name: String,
    pub prediction_root: String,
    pub detector: Arc<dyn Detector>,
}

impl DetectorBinding {
    pub fn new(name: &str, prediction_root: &str, detector: Arc<dyn Detector>) -> Self {
        Self {
            name: name.to_string(),
            prediction_root: prediction_root.to_string(),
            detector,
        }
    }

    /// Sub-path for one camera source
    pub fn path_for(&self, source_id: &str) -> String {
        format!("{}/{}", self.prediction_root.trim_end_matches('/'), source_id)
    }
}

impl std::fmt::Debug for DetectorBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorBinding")
            .field("name", &self.name)
            .field("prediction_root", &self.prediction_root)
            .finish()
    }
}
