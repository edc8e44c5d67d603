//! Payment provider webhook handler.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use secrecy::ExposeSecret;
use tracing::error;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::billing::ReconcileOutcome,
    infra::stripe_client::StripeClient,
};

/// Determines if a webhook processing error should trigger a provider retry.
///
/// Returns `true` if the error is transient, meaning we should return 5xx so
/// the provider redelivers.
///
/// Returns `false` if the error is non-retryable (expected condition like a
/// malformed payload), meaning we should return 2xx and log.
fn is_retryable_error(error: &AppError) -> bool {
    match error {
        // Transient errors - retry may succeed
        AppError::Database(_) => true,
        AppError::Internal(_) => true,
        AppError::UpstreamProvider(_) => true,
        AppError::RateLimited => true,

        // Expected conditions - won't change with retry
        AppError::NotFound => false,
        AppError::ValidationError(_) => false,
        AppError::Unauthorized => false,
        AppError::Forbidden => false,
        AppError::InsufficientCredits => false,
    }
}

/// POST /api/webhooks/payment
///
/// Acknowledges with 2xx only after the idempotent write has been durably
/// decided; returns 5xx for transient failures so the provider redelivers.
async fn handle_payment_webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::ValidationError(
            "Missing payment provider signature".into(),
        ))?;

    StripeClient::verify_webhook_signature(
        &body,
        signature,
        app_state.config.payment_webhook_secret.expose_secret(),
    )?;

    let event: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| AppError::ValidationError(format!("Invalid webhook payload: {}", e)))?;

    let event_type = event["type"].as_str().unwrap_or("");
    let event_id = event["id"].as_str().unwrap_or("");

    match app_state.billing_use_cases.handle_payment_event(&event).await {
        Ok(outcome) => {
            match &outcome {
                ReconcileOutcome::Granted {
                    credits,
                    new_balance,
                } => {
                    tracing::info!(
                        event_type,
                        event_id,
                        credits,
                        new_balance,
                        "Payment event reconciled"
                    );
                }
                ReconcileOutcome::Deduplicated => {
                    tracing::info!(event_type, event_id, "Duplicate payment event acknowledged");
                }
                ReconcileOutcome::Ignored => {
                    tracing::debug!(event_type, event_id, "Payment event ignored");
                }
            }
            Ok(StatusCode::OK)
        }
        Err(e) if is_retryable_error(&e) => {
            error!(
                error = %e,
                event_type,
                event_id,
                retryable = true,
                "Webhook processing failed, returning 5xx for provider retry"
            );
            Err(e)
        }
        Err(e) => {
            tracing::debug!(
                error = %e,
                event_type,
                event_id,
                retryable = false,
                "Non-retryable webhook failure, acknowledging"
            );
            Ok(StatusCode::OK)
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/payment", post(handle_payment_webhook))
}

#[cfg(test)]
mod webhook_error_tests {
    use super::*;

    #[test]
    fn test_transient_errors_are_retryable() {
        assert!(is_retryable_error(&AppError::Database(
            "connection lost".into()
        )));
        assert!(is_retryable_error(&AppError::Internal("unexpected".into())));
        assert!(is_retryable_error(&AppError::UpstreamProvider(
            "timeout".into()
        )));
        assert!(is_retryable_error(&AppError::RateLimited));
    }

    #[test]
    fn test_expected_conditions_are_not_retryable() {
        assert!(!is_retryable_error(&AppError::NotFound));
        assert!(!is_retryable_error(&AppError::ValidationError(
            "bad data".into()
        )));
        assert!(!is_retryable_error(&AppError::Unauthorized));
        assert!(!is_retryable_error(&AppError::Forbidden));
        assert!(!is_retryable_error(&AppError::InsufficientCredits));
    }
}
