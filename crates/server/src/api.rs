//! HTTP API: rent predictions, model summary, health checks and metrics

use crate::error::{ApiError, Result};
use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rent_lib::{
    health::{ComponentStatus, HealthRegistry},
    ApartmentFeatures, LoadOutcome, ModelService, ModelSummary, PipelineError, PredictionResponse,
    ServiceMetrics,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ModelService>,
    pub health_registry: HealthRegistry,
    pub metrics: ServiceMetrics,
}

impl AppState {
    pub fn new(
        service: Arc<ModelService>,
        health_registry: HealthRegistry,
        metrics: ServiceMetrics,
    ) -> Self {
        Self {
            service,
            health_registry,
            metrics,
        }
    }

    /// Load or train the model and reflect the result in health and readiness
    pub async fn load_model(&self) -> std::result::Result<LoadOutcome, PipelineError> {
        match self.service.ensure_loaded().await {
            Ok(outcome) => {
                if let Some(model) = self.service.model().await {
                    self.health_registry.model_loaded(&model.summary()).await;
                }
                info!(outcome = %outcome, "Model ready for inference");
                Ok(outcome)
            }
            Err(e) => {
                self.health_registry.load_failed(&e).await;
                warn!(error = %e, "Model could not be loaded; serving without a model");
                Err(e)
            }
        }
    }
}

async fn predict(state: &AppState, apartment: ApartmentFeatures) -> Result<Json<PredictionResponse>> {
    apartment.validate().map_err(ApiError::BadRequest)?;
    let features = apartment.to_vector();
    let prediction = state.service.predict(&features).await?;
    debug!(features = ?features, prediction, "Prediction served");
    Ok(Json(PredictionResponse {
        prediction: vec![prediction],
    }))
}

/// `GET /pred?area=..&construction_year=..`
async fn predict_query(
    State(state): State<Arc<AppState>>,
    query: std::result::Result<Query<ApartmentFeatures>, QueryRejection>,
) -> Result<Json<PredictionResponse>> {
    let Query(apartment) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    predict(&state, apartment).await
}

/// `POST /pred` with a JSON body
async fn predict_json(
    State(state): State<Arc<AppState>>,
    body: std::result::Result<Json<ApartmentFeatures>, JsonRejection>,
) -> Result<Json<PredictionResponse>> {
    let Json(apartment) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    predict(&state, apartment).await
}

/// Summary of the loaded model
async fn model_summary(State(state): State<Arc<AppState>>) -> Result<Json<ModelSummary>> {
    let model = state
        .service
        .model()
        .await
        .ok_or(PipelineError::ModelNotLoaded)?;
    Ok(Json(model.summary()))
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once a model is loaded
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse> {
    let body = state
        .metrics
        .encode()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    ))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/pred", get(predict_query).post(predict_json))
        .route("/pred/", get(predict_query).post(predict_json))
        .route("/model", get(model_summary))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server, stopping when `shutdown` resolves
pub async fn serve(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
