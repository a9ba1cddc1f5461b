//! Application configuration and shared state

use crate::ai_client::{DetectorBinding, InferenceClient};
use crate::error::{Error, Result};
use crate::payload::MissingFieldPolicy;
use crate::polling_orchestrator::{PollingOrchestrator, PollingSettings};
use crate::source_registry::SourceRegistry;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Command-line arguments (each also readable from the environment)
#[derive(Debug, Clone, Parser)]
#[command(name = "ml-predictor", version, about)]
pub struct Args {
    /// Run a single poll cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Observation store base URL
    #[arg(long, env = "STORE_URL")]
    pub store_url: Option<String>,

    /// Observation store credential (sent as the `auth` query parameter)
    #[arg(long, env = "STORE_AUTH", hide_env_values = true)]
    pub store_auth: Option<String>,

    /// Inference server base URL
    #[arg(long, env = "INFERENCE_URL")]
    pub inference_url: Option<String>,

    /// Delay between poll cycles (ms)
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 2000)]
    pub poll_interval_ms: u64,

    /// Per-source processing timeout (s)
    #[arg(long, env = "SOURCE_TIMEOUT_SECS", default_value_t = 120)]
    pub source_timeout_secs: u64,

    /// HTTP request timeout for store and inference calls (s)
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Camera ids, comma separated
    #[arg(long, env = "CAMERAS", value_delimiter = ',', default_value = "camA,camB")]
    pub cameras: Vec<String>,

    /// Store path of the water quality sensor
    #[arg(long, env = "WATER_QUALITY_PATH", default_value = "/water_quality")]
    pub water_quality_path: String,

    /// JSON file replacing the built-in source list
    #[arg(long, env = "SOURCES_FILE")]
    pub sources_file: Option<PathBuf>,

    /// Missing sensor fields: "zero" or "strict"
    #[arg(long, env = "MISSING_FIELD_POLICY", default_value = "zero")]
    pub missing_field_policy: String,

    /// Enable the HTTP front-end on this address
    #[arg(long = "listen", env = "LISTEN_ADDR")]
    pub listen_addr: Option<String>,

    /// Forward /predict results to this URL
    #[arg(long, env = "FORWARD_URL")]
    pub forward_url: Option<String>,

    /// Also write logs to <dir>/ml_predictions.log
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Validated application configuration
#[derive(Clone)]
pub struct AppConfig {
    pub store_url: String,
    pub store_auth: Option<String>,
    pub inference_url: String,
    pub http_timeout: Duration,
    pub polling: PollingSettings,
    pub registry: SourceRegistry,
    pub once: bool,
    pub listen_addr: Option<String>,
    pub forward_url: Option<String>,
}

impl AppConfig {
    /// Validate arguments; any problem is a fatal `Error::Config`
    pub fn from_args(args: &Args) -> Result<Self> {
        let store_url = required(&args.store_url, "STORE_URL")?;
        let inference_url = required(&args.inference_url, "INFERENCE_URL")?;

        if args.source_timeout_secs == 0 {
            return Err(Error::Config("SOURCE_TIMEOUT_SECS must be > 0".to_string()));
        }
        if args.http_timeout_secs == 0 {
            return Err(Error::Config("HTTP_TIMEOUT_SECS must be > 0".to_string()));
        }

        let missing_field_policy: MissingFieldPolicy = args.missing_field_policy.parse()?;

        let registry = match &args.sources_file {
            Some(path) => SourceRegistry::from_file(path)?,
            None => {
                let cameras: Vec<String> = args
                    .cameras
                    .iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                SourceRegistry::with_defaults(&args.water_quality_path, &cameras)?
            }
        };

        Ok(Self {
            store_url,
            store_auth: args.store_auth.clone().filter(|s| !s.is_empty()),
            inference_url,
            http_timeout: Duration::from_secs(args.http_timeout_secs),
            polling: PollingSettings {
                interval: Duration::from_millis(args.poll_interval_ms),
                source_timeout: Duration::from_secs(args.source_timeout_secs),
                missing_field_policy,
            },
            registry,
            once: args.once,
            listen_addr: args.listen_addr.clone(),
            forward_url: args.forward_url.clone(),
        })
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| Error::Config(format!("{} is required", name)))
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Poll loop (read-only access to tracker and last report)
    pub orchestrator: Arc<PollingOrchestrator>,
    /// Inference server client (health check)
    pub inference: Arc<InferenceClient>,
    /// Detectors used by /predict
    pub detectors: Vec<DetectorBinding>,
    /// HTTP client for result forwarding
    pub http: reqwest::Client,
    pub forward_url: Option<String>,
    pub started_at: Instant,
}
