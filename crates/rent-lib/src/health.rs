//! Health tracking for the inference service
//!
//! Each component of the model lifecycle reports its own status; readiness
//! additionally requires a loaded model, so a process that is still training
//! answers liveness probes but is kept out of rotation.

use crate::error::PipelineError;
use crate::pipeline::ModelSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, but the last operation on this component failed
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Degraded => "degraded",
            ComponentStatus::Unhealthy => "unhealthy",
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

/// Parts of the service that report health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    DataSource,
    Model,
    ArtifactStore,
}

impl Component {
    pub const ALL: [Component; 3] = [
        Component::DataSource,
        Component::Model,
        Component::ArtifactStore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::DataSource => "data_source",
            Component::Model => "model",
            Component::ArtifactStore => "artifact_store",
        }
    }

    /// The component a lifecycle failure is attributed to
    pub fn blamed_for(error: &PipelineError) -> Self {
        match error {
            PipelineError::DataUnavailable { .. }
            | PipelineError::MalformedGardenValue { .. }
            | PipelineError::InsufficientData { .. }
            | PipelineError::MissingColumn { .. } => Component::DataSource,
            PipelineError::ArtifactNotFound { .. }
            | PipelineError::ArtifactCorrupt { .. }
            | PipelineError::LockTimeout { .. }
            | PipelineError::Io(_) => Component::ArtifactStore,
            _ => Component::Model,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last reported state of one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across all components
    pub fn overall<'a>(statuses: impl IntoIterator<Item = &'a ComponentHealth>) -> ComponentStatus {
        statuses
            .into_iter()
            .map(|health| health.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the serving model was trained
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_trained_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct HealthState {
    components: BTreeMap<Component, ComponentHealth>,
    model_trained_at: Option<DateTime<Utc>>,
}

/// Shared view of component health and model readiness
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<HealthState>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    /// Every component starts healthy; the service is not ready until a model loads
    pub fn new() -> Self {
        let components = Component::ALL
            .into_iter()
            .map(|c| (c, ComponentHealth::healthy()))
            .collect();
        Self {
            state: Arc::new(RwLock::new(HealthState {
                components,
                model_trained_at: None,
            })),
        }
    }

    pub async fn set(&self, component: Component, health: ComponentHealth) {
        self.state.write().await.components.insert(component, health);
    }

    pub async fn set_degraded(&self, component: Component, message: impl Into<String>) {
        self.set(component, ComponentHealth::degraded(message)).await;
    }

    pub async fn set_unhealthy(&self, component: Component, message: impl Into<String>) {
        self.set(component, ComponentHealth::unhealthy(message)).await;
    }

    /// A model is serving: clear earlier failures and become ready
    pub async fn model_loaded(&self, summary: &ModelSummary) {
        let mut state = self.state.write().await;
        for health in state.components.values_mut() {
            *health = ComponentHealth::healthy();
        }
        state.model_trained_at = Some(summary.trained_at);
    }

    /// Loading failed: degrade the component at fault and the model
    pub async fn load_failed(&self, error: &PipelineError) {
        let blamed = Component::blamed_for(error);
        let mut state = self.state.write().await;
        state
            .components
            .insert(blamed, ComponentHealth::degraded(error.to_string()));
        if blamed != Component::Model && state.model_trained_at.is_none() {
            state
                .components
                .insert(Component::Model, ComponentHealth::degraded("Model not loaded"));
        }
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;
        HealthResponse {
            status: HealthResponse::overall(state.components.values()),
            components: state
                .components
                .iter()
                .map(|(c, health)| (c.as_str().to_string(), health.clone()))
                .collect(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let state = self.state.read().await;
        let unhealthy = state
            .components
            .iter()
            .find(|(_, health)| health.status == ComponentStatus::Unhealthy)
            .map(|(c, _)| *c);

        let reason = match (state.model_trained_at, unhealthy) {
            (None, _) => Some("Model not loaded".to_string()),
            (Some(_), Some(c)) => Some(format!("Component {} unhealthy", c)),
            (Some(_), None) => None,
        };
        ReadinessResponse {
            ready: reason.is_none(),
            reason,
            model_trained_at: state.model_trained_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn summary() -> ModelSummary {
        ModelSummary {
            n_estimators: 100,
            max_depth: Some(6),
            holdout_score: 0.8,
            cv_score: 0.75,
            seed: 42,
            trained_at: Utc::now(),
            n_train: 80,
            n_holdout: 20,
            schema_version: 1,
            features: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(health.components.len(), 3);
        assert!(health.components.contains_key("artifact_store"));
    }

    #[tokio::test]
    async fn test_not_ready_until_model_loaded() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Model not loaded"));

        let summary = summary();
        registry.model_loaded(&summary).await;
        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert_eq!(readiness.model_trained_at, Some(summary.trained_at));
    }

    #[tokio::test]
    async fn test_load_failure_blames_component() {
        let registry = HealthRegistry::new();
        registry
            .load_failed(&PipelineError::data_unavailable("rent.csv", "no such file"))
            .await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.status.is_operational());
        assert_eq!(health.components["data_source"].status, ComponentStatus::Degraded);
        assert_eq!(
            health.components["model"].message.as_deref(),
            Some("Model not loaded")
        );
        assert_eq!(health.components["artifact_store"].status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_model_loaded_clears_failures() {
        let registry = HealthRegistry::new();
        registry
            .load_failed(&PipelineError::ArtifactCorrupt {
                path: PathBuf::from("models/rf.bin"),
                reason: "checksum mismatch".into(),
            })
            .await;
        registry.model_loaded(&summary()).await;

        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_readiness_names_unhealthy_component() {
        let registry = HealthRegistry::new();
        registry.model_loaded(&summary()).await;
        registry
            .set_unhealthy(Component::ArtifactStore, "Disk full")
            .await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Component artifact_store unhealthy")
        );
        assert_eq!(registry.health().await.status, ComponentStatus::Unhealthy);
    }
}
