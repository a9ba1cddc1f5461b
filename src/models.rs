//! Shared models and types
//!
//! Prediction records written back to the store and HTTP response
//! bodies shared between the orchestrator and the web API.

use crate::ai_client::{Classification, Detection, WaterFeatures};
use crate::payload::ObservedAt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Water quality prediction record
///
/// Written to the source's prediction path. `timestamp` is copied from
/// the triggering observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterPrediction {
    pub ph: f64,
    pub tds: f64,
    pub potability: i64,
    pub probability_good: f64,
    pub timestamp: ObservedAt,
}

impl WaterPrediction {
    pub fn new(features: WaterFeatures, result: Classification, timestamp: ObservedAt) -> Self {
        Self {
            ph: features.ph,
            tds: features.tds,
            potability: result.label,
            probability_good: result.probability,
            timestamp,
        }
    }
}

/// Detection prediction record, one per detector per frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionPrediction {
    pub predictions: Vec<Detection>,
    pub timestamp: ObservedAt,
}

/// `/predict` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictResponse {
    pub status: String,
    /// detector name -> detections
    pub predictions: BTreeMap<String, Vec<Detection>>,
    /// Submitted image, base64
    pub image: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_sec: u64,
    pub inference_connected: bool,
}

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
        }
    }
}
