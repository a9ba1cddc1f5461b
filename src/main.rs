//! ml-predictor - realtime prediction loop
//!
//! Main entry point: polls the observation store, runs inference and
//! uploads predictions. Optionally serves the HTTP front-end.

use clap::Parser;
use ml_predictor::{
    ai_client::{DetectorBinding, InferenceClient, RemoteDetector},
    observation_store::RtdbClient,
    polling_orchestrator::PollingOrchestrator,
    source_tracker::SourceTracker,
    state::{AppConfig, AppState, Args},
    web_api,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing (stdout, plus a log file when LOG_DIR is set)
    let (file_layer, _log_guard) = match &args.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "ml_predictions.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ml_predictor=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    tracing::info!("Starting ml-predictor v{}", env!("CARGO_PKG_VERSION"));

    let config = match AppConfig::from_args(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    tracing::info!(
        store_url = %config.store_url,
        inference_url = %config.inference_url,
        sources = config.registry.sources().len(),
        detectors = config.registry.detectors().len(),
        interval_ms = config.polling.interval.as_millis() as u64,
        "Configuration loaded"
    );

    let store = Arc::new(RtdbClient::new(
        &config.store_url,
        config.store_auth.clone(),
        config.http_timeout,
    )?);
    let inference = Arc::new(InferenceClient::with_timeout(
        &config.inference_url,
        config.http_timeout,
    )?);

    let detectors: Vec<DetectorBinding> = config
        .registry
        .detectors()
        .iter()
        .map(|detector| {
            DetectorBinding::new(
                &detector.name,
                &detector.prediction_root,
                Arc::new(RemoteDetector::new(inference.clone(), &detector.model)),
            )
        })
        .collect();

    let tracker = Arc::new(SourceTracker::new());
    let orchestrator = Arc::new(PollingOrchestrator::new(
        store,
        inference.clone(),
        detectors.clone(),
        config.registry.sources().to_vec(),
        tracker,
        config.polling.clone(),
    ));
    tracing::info!("PollingOrchestrator initialized");

    if config.once {
        if config.listen_addr.is_some() {
            tracing::warn!("--listen ignored in one-shot mode");
        }
        let report = orchestrator.run_once().await;
        tracing::info!(
            processed = report.processed_count(),
            failed = report.failed_count(),
            uploads = report.upload_count(),
            "One-shot cycle finished"
        );
        return Ok(());
    }

    let poll_handle = orchestrator.clone().start();

    if let Some(addr) = &config.listen_addr {
        let state = AppState {
            orchestrator: orchestrator.clone(),
            inference,
            detectors,
            http: reqwest::Client::builder()
                .timeout(config.http_timeout)
                .build()?,
            forward_url: config.forward_url.clone(),
            started_at: Instant::now(),
        };

        let app = web_api::create_router(state)
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "HTTP server stopped");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    orchestrator.stop().await;

    let grace = config.polling.interval + config.polling.source_timeout;
    if tokio::time::timeout(grace, poll_handle).await.is_err() {
        tracing::warn!("Prediction loop did not finish in time, exiting anyway");
    }

    Ok(())
}
