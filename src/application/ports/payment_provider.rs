use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::app_error::AppResult;

/// Unique identifier for a customer in the payment provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of creating a checkout session
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    /// URL to redirect the user to for checkout
    pub checkout_url: String,
    /// Session ID for tracking
    pub session_id: String,
}

/// Parameters for a one-time credit pack checkout
#[derive(Debug, Clone)]
pub struct CheckoutParams<'a> {
    /// Provider price for the pack being bought
    pub price_id: &'a str,
    /// Our product id, carried through provider metadata so the webhook
    /// reconciler can map the session back to a credit pack
    pub product_id: &'a str,
    /// Opaque user id, carried as the client reference
    pub user_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

/// Payment provider port - abstracts payment provider operations.
///
/// This trait defines domain-level actions (not provider primitives).
/// Implementations should map these to provider-specific APIs.
#[async_trait]
pub trait PaymentProviderPort: Send + Sync {
    /// Create a hosted checkout session for a one-time credit pack purchase.
    async fn create_checkout_session(&self, params: &CheckoutParams<'_>)
    -> AppResult<CheckoutResult>;

    /// Create a portal session for customer self-service.
    /// Returns None if the provider doesn't support a hosted portal.
    async fn create_portal_session(
        &self,
        customer_id: &CustomerId,
        return_url: &str,
    ) -> AppResult<Option<String>>;
}
