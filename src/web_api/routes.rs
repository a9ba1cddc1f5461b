//! API Routes

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde_json::json;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::models::{ApiResponse, PredictResponse};
use crate::payload::DecodedImage;
use crate::state::AppState;

/// Upload limit for /predict
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(super::health_check))
        .route("/api/sources", get(list_sources))
        .route(
            "/predict",
            post(predict).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .with_state(state)
}

/// Tracker state and last cycle outcome per source
async fn list_sources(State(state): State<AppState>) -> impl IntoResponse {
    let ids: Vec<String> = state
        .orchestrator
        .sources()
        .iter()
        .map(|s| s.id.clone())
        .collect();
    let statuses = state.orchestrator.tracker().snapshot(&ids).await;
    let last_cycle = state.orchestrator.last_report().await;

    Json(ApiResponse::success(json!({
        "sources": statuses,
        "last_cycle": last_cycle,
    })))
}

/// Run every detector on one uploaded image
async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictResponse>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| Error::Validation(format!("Failed to read file: {}", e)))?;
            upload = Some(bytes.to_vec());
            break;
        }
    }

    let bytes = upload.ok_or_else(|| Error::Validation("Missing 'file' field".to_string()))?;
    let image = DecodedImage::from_bytes(bytes)?;

    let mut predictions = BTreeMap::new();
    for binding in &state.detectors {
        let detections = binding.detector.detect(&image).await?;
        predictions.insert(binding.name.clone(), detections);
    }

    let response = PredictResponse {
        status: "ok".to_string(),
        predictions,
        image: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
    };

    tracing::info!(
        width = image.width,
        height = image.height,
        detectors = response.predictions.len(),
        "Ad-hoc prediction served"
    );

    if let Some(url) = &state.forward_url {
        match state.http.post(url).json(&response).send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(url = %url, "Prediction forwarded");
            }
            Ok(resp) => {
                tracing::warn!(url = %url, status = %resp.status(), "Prediction forward rejected");
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Prediction forward failed");
            }
        }
    }

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_client::{DetectorBinding, InferenceClient};
    use crate::payload::tests::sample_png;
    use crate::polling_orchestrator::{PollingOrchestrator, PollingSettings};
    use crate::source_registry::Source;
    use crate::source_tracker::SourceTracker;
    use crate::testing::{FakeClassifier, FakeDetector, FakeStore};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tower::ServiceExt;

    const BOUNDARY: &str = "predict-test-boundary";

    fn app() -> (Router, Arc<FakeStore>, Arc<FakeDetector>) {
        let store = Arc::new(FakeStore::default());
        let detector = Arc::new(FakeDetector::default());
        let detectors = vec![
            DetectorBinding::new("health", "/predictions/plant_health", detector.clone()),
            DetectorBinding::new("growth", "/predictions/plant_growth", detector.clone()),
        ];
        let orchestrator = Arc::new(PollingOrchestrator::new(
            store.clone(),
            Arc::new(FakeClassifier::default()),
            detectors.clone(),
            vec![
                Source::scalar("water_quality", "/water_quality", "/predictions/water_quality"),
                Source::camera("camA"),
            ],
            Arc::new(SourceTracker::new()),
            PollingSettings::default(),
        ));
        let inference = Arc::new(
            InferenceClient::with_timeout("http://127.0.0.1:9", Duration::from_millis(200))
                .unwrap(),
        );

        let state = AppState {
            orchestrator,
            inference,
            detectors,
            http: reqwest::Client::new(),
            forward_url: None,
            started_at: Instant::now(),
        };
        (create_router(state), store, detector)
    }

    fn multipart_request(field: &str, content: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"leaf.png\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_predict_runs_every_detector() {
        let (app, store, detector) = app();

        let resp = app
            .oneshot(multipart_request("file", &sample_png()))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["predictions"]["health"].as_array().unwrap().len(), 1);
        assert_eq!(body["predictions"]["growth"].as_array().unwrap().len(), 1);
        assert!(!body["image"].as_str().unwrap().is_empty());
        assert_eq!(detector.calls(), 2);
        // stateless: nothing written to the store
        assert!(store.appended().is_empty());
    }

    #[tokio::test]
    async fn test_predict_without_file_field() {
        let (app, _, detector) = app();

        let resp = app
            .oneshot(multipart_request("attachment", &sample_png()))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(detector.calls(), 0);
    }

    #[tokio::test]
    async fn test_predict_rejects_non_image() {
        let (app, _, _) = app();

        let resp = app
            .oneshot(multipart_request("file", b"plain text"))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = json_body(resp).await;
        assert_eq!(body["error_code"], "DECODE_ERROR");
    }

    #[tokio::test]
    async fn test_list_sources() {
        let (app, _, _) = app();

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/api/sources")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["ok"], true);
        let sources = body["data"]["sources"].as_array().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0]["source_id"], "water_quality");
        assert_eq!(sources[0]["health"], "unknown");
        assert!(body["data"]["last_cycle"].is_null());
    }

    #[tokio::test]
    async fn test_healthz_reports_unreachable_inference() {
        let (app, _, _) = app();

        let resp = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["inference_connected"], false);
    }
}
