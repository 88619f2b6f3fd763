//! Integration tests for the rent predictor API endpoints

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use rent_lib::{
    artifact::ArtifactStore,
    health::{Component, HealthRegistry},
    pipeline::ParamGrid,
    source::CsvSource,
    ModelService, ServiceMetrics, Trainer, TrainingConfig,
};
use rent_server::{create_router, AppState};
use std::fmt::Write;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const APARTMENT_JSON: &str = r#"{"area":85,"constraction_year":2015,"bedrooms":2,"garden_area":20,
    "balcony_present":1,"parking_present":1,"furnished":0,"garage_present":0,"storage_present":1}"#;

const APARTMENT_QUERY: &str = "area=85&construction_year=2015&bedrooms=2&garden_area=20\
    &balcony_present=1&parking_present=1&furnished=0&garage_present=0&storage_present=1";

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Rental listings in the legacy CSV layout
fn write_listings(dir: &TempDir, rows: usize) -> std::path::PathBuf {
    let mut csv = String::from(
        "address,area,constraction_year,bedrooms,garden,balcony,parking,furnished,garage,storage,zip,rent\n",
    );
    for i in 0..rows {
        let area = 40 + (i * 7) % 80;
        let year = 1960 + (i * 13) % 60;
        let bedrooms = 1 + i % 4;
        let garden = if i % 3 == 0 {
            "Not present".to_string()
        } else {
            format!("Present ({} m²)", 5 + i % 25)
        };
        let rent = 500 + area * 12 + bedrooms * 100 + (year - 1960) * 3;
        writeln!(
            csv,
            "\"Main Street {i}\",{area},{year},{bedrooms},{garden},{},{},{},{},{},1234AB,{rent}",
            yes_no(i % 2 == 0),
            yes_no(i % 3 != 0),
            yes_no(i % 4 == 0),
            yes_no(i % 5 == 0),
            yes_no(i % 2 == 1),
        )
        .unwrap();
    }
    let path = dir.path().join("rent_apartments.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn quick_trainer() -> Trainer {
    Trainer::new(TrainingConfig::default().with_seed(42).with_grid(ParamGrid {
        n_estimators: vec![5],
        max_depth: vec![3, 6],
    }))
}

async fn setup_app(service: ModelService) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    let metrics = ServiceMetrics::new().unwrap();
    let service = service.with_metrics(metrics.clone());
    let state = Arc::new(AppState::new(Arc::new(service), health_registry, metrics));
    (create_router(state.clone()), state)
}

/// App with a model trained from a small CSV
async fn setup_trained_app() -> (Router, Arc<AppState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let csv = write_listings(&dir, 40);
    let service = ModelService::new(
        ArtifactStore::new(dir.path().join("models"), "rf.bin"),
        quick_trainer(),
        Arc::new(CsvSource::new(csv)),
    );
    let (app, state) = setup_app(service).await;
    state.load_model().await.unwrap();
    (app, state, dir)
}

/// App whose serve-only service has no artifact to load
async fn setup_unloaded_app() -> (Router, Arc<AppState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let service = ModelService::serve_only(ArtifactStore::new(dir.path(), "rf.bin"));
    let (app, state) = setup_app(service).await;
    (app, state, dir)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_post_prediction() {
    let (app, _state, _dir) = setup_trained_app().await;

    let (status, body) = send(app, post_json("/pred", APARTMENT_JSON)).await;

    assert_eq!(status, StatusCode::OK);
    let prediction = body["prediction"].as_array().unwrap();
    assert_eq!(prediction.len(), 1);
    assert!(prediction[0].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_get_and_post_agree() {
    let (app, _state, _dir) = setup_trained_app().await;

    let (_, posted) = send(app.clone(), post_json("/pred/", APARTMENT_JSON)).await;
    let (status, queried) = send(app, get(&format!("/pred?{}", APARTMENT_QUERY))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(posted["prediction"], queried["prediction"]);
}

#[tokio::test]
async fn test_wrong_type_is_bad_request() {
    let (app, _state, _dir) = setup_trained_app().await;
    let body = APARTMENT_JSON.replace("\"area\":85", "\"area\":\"large\"");

    let (status, body) = send(app, post_json("/pred", &body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], true);
    assert!(body.get("prediction").is_none());
}

#[tokio::test]
async fn test_negative_and_missing_values_are_bad_requests() {
    let (app, _state, _dir) = setup_trained_app().await;

    let negative = APARTMENT_JSON.replace("\"bedrooms\":2", "\"bedrooms\":-2");
    let (status, _) = send(app.clone(), post_json("/pred", &negative)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(app.clone(), get("/pred?area=85")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let flag = APARTMENT_JSON.replace("\"furnished\":0", "\"furnished\":3");
    let (status, body) = send(app, post_json("/pred", &flag)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("furnished"));
}

#[tokio::test]
async fn test_model_summary() {
    let (app, _state, _dir) = setup_trained_app().await;

    let (status, body) = send(app, get("/model")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["n_estimators"], 5);
    assert_eq!(body["seed"], 42);
    assert_eq!(body["features"].as_array().unwrap().len(), 9);
    assert_eq!(body["features"][1]["name"], "construction_year");
}

#[tokio::test]
async fn test_ready_after_load() {
    let (app, _state, _dir) = setup_trained_app().await;

    let (status, body) = send(app, get("/readyz")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ready"], true);
}

#[tokio::test]
async fn test_unloaded_model_is_server_error() {
    let (app, _state, _dir) = setup_unloaded_app().await;

    let (status, body) = send(app.clone(), post_json("/pred", APARTMENT_JSON)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], true);
    assert_eq!(body["message"], "model not loaded");

    let (status, _) = send(app, get("/model")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_failed_load_degrades_health() {
    let (app, state, _dir) = setup_unloaded_app().await;

    assert!(state.load_model().await.is_err());

    let (status, body) = send(app.clone(), get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(
        body["components"]["artifact_store"]["status"],
        "degraded"
    );

    let (status, body) = send(app, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state, _dir) = setup_unloaded_app().await;
    state
        .health_registry
        .set_unhealthy(Component::ArtifactStore, "Disk full")
        .await;

    let (status, body) = send(app, get("/healthz")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _state, _dir) = setup_trained_app().await;
    let (status, _) = send(app.clone(), post_json("/pred", APARTMENT_JSON)).await;
    assert_eq!(status, StatusCode::OK);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("rent_predictions_total 1"));
    assert!(text.contains("rent_model_info"));
}
