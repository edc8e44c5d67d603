use async_trait::async_trait;

use crate::app_error::AppResult;

/// Identity context resolved from an externally issued access token.
///
/// The identity provider owns authentication; this service only ever sees
/// the resolved context. User ids are opaque provider-issued strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub org_id: Option<String>,
    /// Active subscription plan name of the caller's organization, if any.
    pub plan_name: Option<String>,
}

/// Identity provider port - abstracts token resolution.
///
/// Implementations map a bearer token to the provider's session lookup.
#[async_trait]
pub trait IdentityProviderPort: Send + Sync {
    /// Resolve a bearer token to an identity context.
    ///
    /// Returns `Ok(None)` for unknown, expired, or revoked tokens. Transport
    /// failures surface as `UpstreamProvider` so callers can retry.
    async fn resolve_token(&self, token: &str) -> AppResult<Option<AuthContext>>;
}
