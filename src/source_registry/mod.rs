//! SourceRegistry - static source and detector configuration
//!
//! ## Responsibilities
//!
//! - Build the ordered source list (water sensor first, then cameras)
//! - Load an override list from a JSON file
//! - Validate ids and paths before any cycle runs
//!
//! Built once at startup; immutable afterwards.

mod types;

pub use types::*;

use crate::error::{Error, Result};
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_WATER_SOURCE_ID: &str = "water_quality";
pub const DEFAULT_WATER_PATH: &str = "/water_quality";
pub const DEFAULT_WATER_PREDICTION_PATH: &str = "/predictions/water_quality";

/// Validated, ordered source configuration
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
    detectors: Vec<DetectorConfig>,
}

impl SourceRegistry {
    /// Create and validate a registry
    pub fn new(sources: Vec<Source>, detectors: Vec<DetectorConfig>) -> Result<Self> {
        let registry = Self { sources, detectors };
        registry.validate()?;
        Ok(registry)
    }

    /// Water sensor followed by one image source per camera
    pub fn with_defaults(water_path: &str, cameras: &[String]) -> Result<Self> {
        let mut sources = vec![Source::scalar(
            DEFAULT_WATER_SOURCE_ID,
            water_path,
            DEFAULT_WATER_PREDICTION_PATH,
        )];
        sources.extend(cameras.iter().map(|cam| Source::camera(cam)));
        Self::new(sources, default_detectors())
    }

    /// Load from a JSON sources file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read sources file {}: {}", path.display(), e))
        })?;
        let file: SourcesFile = serde_json::from_str(&raw).map_err(|e| {
            Error::Config(format!("Invalid sources file {}: {}", path.display(), e))
        })?;
        Self::new(file.sources, file.detectors.unwrap_or_else(default_detectors))
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn detectors(&self) -> &[DetectorConfig] {
        &self.detectors
    }

    fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(Error::Config("No sources configured".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(Error::Config("Source id must not be empty".to_string()));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(Error::Config(format!("Duplicate source id: {}", source.id)));
            }
            if source.store_path.trim().is_empty() {
                return Err(Error::Config(format!(
                    "Source {} has an empty store_path",
                    source.id
                )));
            }
            if source.kind == SourceKind::ScalarSensor
                && source.prediction_path.as_deref().map_or(true, |p| p.trim().is_empty())
            {
                return Err(Error::Config(format!(
                    "Scalar source {} needs a prediction_path",
                    source.id
                )));
            }
        }

        let has_images = self.sources.iter().any(|s| s.kind == SourceKind::ImageFrame);
        if has_images && self.detectors.is_empty() {
            return Err(Error::Config(
                "Image sources configured but no detectors".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for detector in &self.detectors {
            if !names.insert(detector.name.as_str()) {
                return Err(Error::Config(format!(
                    "Duplicate detector name: {}",
                    detector.name
                )));
            }
        }

        Ok(())
    }
}

/// Plant health and growth detectors
pub fn default_detectors() -> Vec<DetectorConfig> {
    vec![
        DetectorConfig::new("health", "health_yolov11_custom", "/predictions/plant_health"),
        DetectorConfig::new("growth", "growth_yolov11_custom", "/predictions/plant_growth"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_order_and_paths() {
        let cams = vec!["camA".to_string(), "camB".to_string()];
        let registry = SourceRegistry::with_defaults(DEFAULT_WATER_PATH, &cams).unwrap();

        let ids: Vec<_> = registry.sources().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["water_quality", "camA", "camB"]);
        assert_eq!(registry.sources()[1].store_path, "/camera/latest/camA");
        assert_eq!(registry.detectors().len(), 2);
        assert_eq!(registry.detectors()[0].prediction_root, "/predictions/plant_health");
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let sources = vec![Source::camera("camA"), Source::camera("camA")];
        let err = SourceRegistry::new(sources, default_detectors()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_images_without_detectors_rejected() {
        let err = SourceRegistry::new(vec![Source::camera("camA")], vec![]).unwrap_err();
        assert!(err.to_string().contains("no detectors"));
    }

    #[test]
    fn test_scalar_requires_prediction_path() {
        let mut source = Source::scalar("water", "/water_quality", "/predictions/water");
        source.prediction_path = None;
        assert!(SourceRegistry::new(vec![source], vec![]).is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "sources": [
                    {{"id": "tank1", "store_path": "/tanks/1", "kind": "scalar_sensor",
                      "prediction_path": "/predictions/tanks/1"}},
                    {{"id": "cam9", "store_path": "/camera/latest/cam9", "kind": "image_frame"}}
                ]
            }}"#
        )
        .unwrap();

        let registry = SourceRegistry::from_file(file.path()).unwrap();
        assert_eq!(registry.sources().len(), 2);
        assert_eq!(registry.sources()[0].kind, SourceKind::ScalarSensor);
        assert_eq!(registry.detectors(), default_detectors().as_slice());
    }

    #[test]
    fn test_from_file_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = SourceRegistry::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
