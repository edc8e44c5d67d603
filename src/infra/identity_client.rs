use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::identity_provider::{AuthContext, IdentityProviderPort},
};

/// REST adapter for the hosted identity provider.
///
/// Tokens are opaque to this service; the provider verifies them and returns
/// the session's user, organization, and active plan.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl HttpIdentityProvider {
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

#[derive(Debug, Deserialize)]
struct SessionResponse {
    user_id: String,
    org_id: Option<String>,
    plan_name: Option<String>,
}

#[async_trait]
impl IdentityProviderPort for HttpIdentityProvider {
    async fn resolve_token(&self, token: &str) -> AppResult<Option<AuthContext>> {
        let url = self
            .base_url
            .join("v1/sessions/verify")
            .map_err(|e| AppError::Internal(format!("Invalid identity API URL: {}", e)))?;

        let response = self
            .client
            .post(url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|e| {
                AppError::UpstreamProvider(format!("Identity provider request failed: {}", e))
            })?;

        match response.status() {
            StatusCode::OK => {
                let session: SessionResponse = response.json().await.map_err(|e| {
                    AppError::UpstreamProvider(format!("Invalid identity response: {}", e))
                })?;
                Ok(Some(AuthContext {
                    user_id: session.user_id,
                    org_id: session.org_id,
                    plan_name: session.plan_name,
                }))
            }
            // Unknown, expired, or revoked token.
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = %status, body, "Identity provider error");
                Err(AppError::UpstreamProvider(format!(
                    "Identity provider returned {}",
                    status
                )))
            }
        }
    }
}
