//! HTTP client for the inference server
//!
//! Endpoints:
//! - `POST /v1/classify/water` (JSON `{ph, tds}`)
//! - `POST /v1/detect/{model}` (multipart `image`)
//! - `GET /healthz`

use super::{Classification, Classifier, Detection, Detector, WaterFeatures};
use crate::error::{Error, Result};
use crate::payload::DecodedImage;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Detection endpoint response
#[derive(Debug, Deserialize)]
struct DetectResponse {
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Inference server client
pub struct InferenceClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl InferenceClient {
    /// Create new client with the default 30s timeout
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create new client with custom timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create inference HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Check inference server health
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Run a detection model on an image
    pub async fn detect(&self, model: &str, image: &DecodedImage) -> Result<Vec<Detection>> {
        let url = format!("{}/v1/detect/{}", self.base_url, model);

        let part = Part::bytes(image.bytes.clone())
            .file_name(format!("frame.{}", image.extension()))
            .mime_str(image.mime_type())
            .map_err(|e| Error::Inference(format!("Invalid image mime type: {}", e)))?;
        let form = Form::new().part("image", part);

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Detect request to {} failed: {}", model, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Model {} failed: {} - {}",
                model, status, body
            )));
        }

        let result: DetectResponse = resp
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Model {} returned bad body: {}", model, e)))?;

        for detection in &result.detections {
            detection.validate()?;
        }

        Ok(result.detections)
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Classifier for InferenceClient {
    async fn classify(&self, features: WaterFeatures) -> Result<Classification> {
        let url = format!("{}/v1/classify/water", self.base_url);

        let resp = self
            .client
            .post(&url)
            .json(&features)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Classify request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Water classifier failed: {} - {}",
                status, body
            )));
        }

        let result: Classification = resp
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Classifier returned bad body: {}", e)))?;

        if !(0.0..=1.0).contains(&result.probability) {
            return Err(Error::Inference(format!(
                "Classifier probability out of range: {}",
                result.probability
            )));
        }

        Ok(result)
    }
}

/// `Detector` bound to one model on a shared `InferenceClient`
pub struct RemoteDetector {
    client: Arc<InferenceClient>,
    model: String,
}

impl RemoteDetector {
    pub fn new(client: Arc<InferenceClient>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl Detector for RemoteDetector {
    async fn detect(&self, image: &DecodedImage) -> Result<Vec<Detection>> {
        self.client.detect(&self.model, image).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_response_defaults() {
        let resp: DetectResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.detections.is_empty());

        let resp: DetectResponse = serde_json::from_str(
            r#"{"detections": [{"label": 1, "confidence": 0.9, "bbox": [1, 2, 3, 4]}]}"#,
        )
        .unwrap();
        assert_eq!(resp.detections[0].bbox, [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_base_url_trimmed() {
        let client = InferenceClient::new("http://localhost:9000/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_inference_error() {
        let client =
            InferenceClient::with_timeout("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client
            .classify(WaterFeatures { ph: 7.0, tds: 100.0 })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
        assert!(!client.health_check().await);
    }
}
