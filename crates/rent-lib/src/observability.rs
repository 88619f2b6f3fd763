//! Observability for the rent predictor
//!
//! Provides:
//! - Prometheus metrics for training runs and prediction traffic, kept in a
//!   registry owned by the service rather than the process-global one
//! - Structured event logging with tracing
//! - Tracing subscriber setup from [`Settings`]

use crate::pipeline::ModelSummary;
use crate::settings::{LogFormat, Settings};
use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Latency buckets for single predictions (in seconds)
const PREDICTION_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1,
];

/// Duration buckets for full training runs (in seconds)
const TRAINING_BUCKETS: &[f64] = &[0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Install the global tracing subscriber; `RUST_LOG` overrides `log_level`
pub fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match settings.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).init(),
    }
}

/// Service metrics for Prometheus exposition
///
/// Clones share the same underlying metrics and registry.
#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    training_runs: IntCounterVec,
    training_duration_seconds: Histogram,
    model_holdout_r2: Gauge,
    model_info: GaugeVec,
    predictions: IntCounter,
    prediction_errors: IntCounter,
    prediction_latency_seconds: Histogram,
}

impl ServiceMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("rent".to_string()), None)?;

        let training_runs = IntCounterVec::new(
            Opts::new("training_runs_total", "Training runs by outcome"),
            &["outcome"],
        )?;
        let training_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "training_duration_seconds",
                "Wall time of a full training run including grid search",
            )
            .buckets(TRAINING_BUCKETS.to_vec()),
        )?;
        let model_holdout_r2 = Gauge::new(
            "model_holdout_r2",
            "Holdout R² of the currently loaded model",
        )?;
        let model_info = GaugeVec::new(
            Opts::new("model_info", "Hyperparameters of the currently loaded model"),
            &["n_estimators", "max_depth", "seed"],
        )?;
        let predictions = IntCounter::new("predictions_total", "Predictions served")?;
        let prediction_errors =
            IntCounter::new("prediction_errors_total", "Prediction requests that failed")?;
        let prediction_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "prediction_latency_seconds",
                "Time spent running the forest for one prediction",
            )
            .buckets(PREDICTION_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(training_runs.clone()))?;
        registry.register(Box::new(training_duration_seconds.clone()))?;
        registry.register(Box::new(model_holdout_r2.clone()))?;
        registry.register(Box::new(model_info.clone()))?;
        registry.register(Box::new(predictions.clone()))?;
        registry.register(Box::new(prediction_errors.clone()))?;
        registry.register(Box::new(prediction_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            training_runs,
            training_duration_seconds,
            model_holdout_r2,
            model_info,
            predictions,
            prediction_errors,
            prediction_latency_seconds,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record a finished training run
    pub fn record_training(&self, success: bool, duration_secs: f64) {
        let outcome = if success { "success" } else { "failure" };
        self.training_runs.with_label_values(&[outcome]).inc();
        self.training_duration_seconds.observe(duration_secs);
    }

    /// Publish the loaded model's description
    pub fn set_model(&self, summary: &ModelSummary) {
        self.model_info.reset();
        let max_depth = summary
            .max_depth
            .map(|d| d.to_string())
            .unwrap_or_else(|| "none".to_string());
        self.model_info
            .with_label_values(&[
                &summary.n_estimators.to_string(),
                &max_depth,
                &summary.seed.to_string(),
            ])
            .set(1.0);
        self.model_holdout_r2.set(summary.holdout_score);
    }

    pub fn observe_prediction(&self, duration_secs: f64) {
        self.predictions.inc();
        self.prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_prediction_errors(&self) {
        self.prediction_errors.inc();
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, bind_addr: &str) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            bind_addr = %bind_addr,
            "Rent predictor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Rent predictor shutting down"
        );
    }

    pub fn log_training_completed(&self, summary: &ModelSummary, duration_secs: f64) {
        info!(
            event = "training_completed",
            service = %self.service,
            n_estimators = summary.n_estimators,
            max_depth = ?summary.max_depth,
            holdout_r2 = summary.holdout_score,
            cv_r2 = summary.cv_score,
            seed = summary.seed,
            n_train = summary.n_train,
            duration_secs = duration_secs,
            "Model training completed"
        );
    }

    pub fn log_training_failed(&self, error: &str) {
        warn!(
            event = "training_failed",
            service = %self.service,
            error = %error,
            "Model training failed"
        );
    }

    pub fn log_model_loaded(&self, summary: &ModelSummary, path: &str, outcome: &str) {
        info!(
            event = "model_loaded",
            service = %self.service,
            path = %path,
            outcome = %outcome,
            n_estimators = summary.n_estimators,
            max_depth = ?summary.max_depth,
            holdout_r2 = summary.holdout_score,
            trained_at = %summary.trained_at.to_rfc3339(),
            "Model loaded"
        );
    }

    pub fn log_prediction(&self, prediction: f64, latency_us: u64) {
        info!(
            event = "prediction_served",
            service = %self.service,
            prediction = prediction,
            latency_us = latency_us,
            "Served rent prediction"
        );
    }
}
