use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::analysis_provider::{PromptAnalysis, PromptAnalysisPort},
};

/// REST adapter for the hosted prompt-analysis model API.
#[derive(Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpAnalysisClient {
    pub fn new(base_url: Url, api_key: SecretString, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url,
            api_key,
        }
    }
}

#[async_trait]
impl PromptAnalysisPort for HttpAnalysisClient {
    async fn analyze(&self, prompt: &str) -> AppResult<PromptAnalysis> {
        let url = self
            .base_url
            .join("v1/analyses")
            .map_err(|e| AppError::Internal(format!("Invalid analysis API URL: {}", e)))?;

        let response = self
            .client
            .post(url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| {
                AppError::UpstreamProvider(format!("Analysis provider request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body, "Analysis provider error");
            return Err(AppError::UpstreamProvider(format!(
                "Analysis provider returned {}",
                status
            )));
        }

        response
            .json::<PromptAnalysis>()
            .await
            .map_err(|e| AppError::UpstreamProvider(format!("Invalid analysis response: {}", e)))
    }
}
