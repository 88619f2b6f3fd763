//! API client for a running rent-server

use anyhow::{Context, Result};
use reqwest::{Client, Response};
use rent_lib::{ApartmentFeatures, HealthResponse, ModelSummary, PredictionResponse};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

/// Error body returned by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
}

/// API client for the rent prediction server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Request a prediction for an encoded apartment
    pub async fn predict(&self, apartment: &ApartmentFeatures) -> Result<PredictionResponse> {
        self.post("pred", apartment).await
    }

    /// Summary of the model the server has loaded
    pub async fn model(&self) -> Result<ModelSummary> {
        self.get("model").await
    }

    /// Component health; an unhealthy server still returns a health body
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.base_url.join("healthz").context("Invalid path")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return response.json().await.context("Failed to parse response");
        }
        Self::parse(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rent_lib::ComponentStatus;

    fn apartment() -> ApartmentFeatures {
        ApartmentFeatures {
            area: 85,
            construction_year: 2015,
            bedrooms: 2,
            garden_area: 20,
            balcony_present: 1,
            parking_present: 1,
            furnished: 0,
            garage_present: 0,
            storage_present: 1,
        }
    }

    #[tokio::test]
    async fn test_predict() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/pred")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "area": 85,
                "construction_year": 2015,
                "storage_present": 1
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"prediction":[1432.5]}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let response = client.predict(&apartment()).await.unwrap();

        assert_eq!(response.prediction, vec![1432.5]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_message_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/pred")
            .with_status(500)
            .with_body(r#"{"error":true,"message":"model not loaded"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.predict(&apartment()).await.unwrap_err();

        assert!(err.to_string().contains("model not loaded"));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_unhealthy_server_still_reports_components() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body(
                r#"{"status":"unhealthy","components":{"artifact_store":
                    {"status":"unhealthy","message":"disk full","last_check_timestamp":0}}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();

        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert_eq!(
            health.components["artifact_store"].message.as_deref(),
            Some("disk full")
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
