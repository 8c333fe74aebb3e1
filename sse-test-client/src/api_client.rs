use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn check_health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach the relay")?;

        if !response.status().is_success() {
            anyhow::bail!("Health check failed: {}", response.status());
        }

        Ok(())
    }

    /// Publishes a payload and requires the relay to accept it.
    pub async fn publish(
        &self,
        category: &str,
        session_id: Option<&str>,
        payload: &Value,
    ) -> Result<()> {
        let (status, body) = self.try_publish(category, session_id, payload).await?;

        if !status.is_success() {
            anyhow::bail!("Failed to publish to {}: {} - {}", category, status, body);
        }

        Ok(())
    }

    /// Publishes a payload and reports the response status, success or not.
    pub async fn try_publish(
        &self,
        category: &str,
        session_id: Option<&str>,
        payload: &Value,
    ) -> Result<(StatusCode, String)> {
        let url = format!("{}/events/{}", self.base_url, category);

        let mut request = self.client.post(&url).json(payload);
        if let Some(session_id) = session_id {
            request = request.header("x-session-id", session_id);
        }

        let response = request.send().await.context("Failed to publish event")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());

        Ok((status, body))
    }

    /// Opens a subscriber stream and hands back the live response. The caller
    /// checks the status and keeps the response alive for as long as the
    /// connection should stay attached.
    pub async fn open_stream(
        &self,
        category: &str,
        session_id: Option<&str>,
    ) -> Result<Response> {
        let url = format!("{}/events/{}", self.base_url, category);

        let mut request = self.client.get(&url);
        if let Some(session_id) = session_id {
            request = request.header("x-session-id", session_id);
        }

        request.send().await.context("Failed to open event stream")
    }

    pub async fn stats(&self) -> Result<Value> {
        let url = format!("{}/events/stats", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to get stream stats")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to get stats: {}", response.status());
        }

        response.json().await.context("Failed to parse stats")
    }
}
