//! SourceRegistry data types

use serde::{Deserialize, Serialize};

/// Kind of input stream, selects the inference pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Numeric sensor readings (pH / TDS)
    ScalarSensor,
    /// Base64-encoded camera frames
    ImageFrame,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScalarSensor => write!(f, "scalar_sensor"),
            Self::ImageFrame => write!(f, "image_frame"),
        }
    }
}

/// An independently tracked input stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub store_path: String,
    pub kind: SourceKind,
    /// Where scalar predictions are appended. Image sources write under
    /// each detector's `prediction_root` instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction_path: Option<String>,
}

impl Source {
    pub fn scalar(id: &str, store_path: &str, prediction_path: &str) -> Self {
        Self {
            id: id.to_string(),
            store_path: store_path.to_string(),
            kind: SourceKind::ScalarSensor,
            prediction_path: Some(prediction_path.to_string()),
        }
    }

    pub fn camera(id: &str) -> Self {
        Self {
            id: id.to_string(),
            store_path: format!("/camera/latest/{}", id),
            kind: SourceKind::ImageFrame,
            prediction_path: None,
        }
    }
}

/// A detection model and the store subtree its predictions go to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Adapter name, e.g. "health"
    pub name: String,
    /// Model identifier on the inference server
    pub model: String,
    /// Prediction root, e.g. "/predictions/plant_health"
    pub prediction_root: String,
}

impl DetectorConfig {
    pub fn new(name: &str, model: &str, prediction_root: &str) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            prediction_root: prediction_root.to_string(),
        }
    }
}

/// On-disk layout of `SOURCES_FILE`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<Source>,
    #[serde(default)]
    pub detectors: Option<Vec<DetectorConfig>>,
}
