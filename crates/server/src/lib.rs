//! HTTP inference service for rent predictions
//!
//! Exposes the lifecycle service from `rent-lib` over axum: prediction
//! endpoints, the loaded model's summary, health probes and metrics.

pub mod api;
pub mod config;
pub mod error;

pub use api::{create_router, serve, AppState};
pub use config::ServerConfig;
pub use error::ApiError;
