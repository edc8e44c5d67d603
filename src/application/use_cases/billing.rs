use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        identity_provider::AuthContext,
        payment_provider::{CheckoutParams, CheckoutResult, CustomerId, PaymentProviderPort},
    },
    application::use_cases::credits::CreditStoreRepoTrait,
    domain::entities::purchase::PurchaseStatus,
};

// ============================================================================
// Constants
// ============================================================================

/// Bounded retries for the credit grant after a purchase record is written.
pub const MAX_GRANT_ATTEMPTS: u32 = 3;

/// A `pending` purchase older than this is considered abandoned by a crashed
/// worker and may be re-claimed on provider redelivery.
pub const STALE_PENDING_THRESHOLD_SECS: i64 = 900; // 15 minutes

// ============================================================================
// Repository Trait
// ============================================================================

#[derive(Debug, Clone)]
pub struct PurchaseProfile {
    pub id: Uuid,
    pub user_id: String,
    pub product_id: String,
    pub price_id: Option<String>,
    pub payment_intent_id: String,
    pub session_id: String,
    /// Provider customer id from the checkout session, kept for portal access
    pub customer_id: Option<String>,
    pub credits: i64,
    pub status: PurchaseStatus,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct RecordPurchaseInput {
    pub user_id: String,
    pub product_id: String,
    pub price_id: Option<String>,
    pub payment_intent_id: String,
    pub session_id: String,
    pub customer_id: Option<String>,
    pub credits: i64,
}

/// Result of an idempotent insert attempt.
#[derive(Debug, Clone)]
pub struct RecordedPurchase {
    /// True when this call created the record; false when a record with the
    /// same payment intent or session id already existed.
    pub created: bool,
    pub purchase: PurchaseProfile,
}

/// Append-only record of completed one-time purchases.
///
/// `payment_intent_id` and `session_id` are each unique - they are the
/// idempotency keys that make at-least-once webhook delivery safe.
#[async_trait]
pub trait PurchaseLedgerRepoTrait: Send + Sync {
    /// Insert a new purchase keyed by the idempotency pair. If a record with
    /// the same payment intent or session id exists, returns it untouched
    /// with `created: false`.
    async fn record_if_new(&self, input: &RecordPurchaseInput) -> AppResult<RecordedPurchase>;

    /// Atomically re-claim a `failed` purchase (or a `pending` one older
    /// than `stale_after_secs`) for a grant retry. Returns true when this
    /// caller won the claim; at most one concurrent caller can.
    async fn claim_for_grant(
        &self,
        payment_intent_id: &str,
        stale_after_secs: i64,
    ) -> AppResult<bool>;

    /// Transition a purchase to its final status. `complete` is terminal and
    /// is never overwritten.
    async fn finalize(&self, payment_intent_id: &str, status: PurchaseStatus) -> AppResult<()>;

    async fn get_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> AppResult<Option<PurchaseProfile>>;

    /// Purchases of one user, newest first.
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<PurchaseProfile>>;
}

// ============================================================================
// Credit pack catalog
// ============================================================================

/// A purchasable credit pack.
#[derive(Debug, Clone, Deserialize)]
pub struct CreditPack {
    /// Provider price id used at checkout
    pub price_id: String,
    /// Credits granted when the pack is paid
    pub credits: i64,
}

/// Product-id to credit-pack mapping, injected via configuration so pricing
/// changes don't require a redeploy.
#[derive(Debug, Clone)]
pub struct CreditPackCatalog {
    packs: HashMap<String, CreditPack>,
}

impl CreditPackCatalog {
    pub fn new(packs: HashMap<String, CreditPack>) -> Self {
        Self { packs }
    }

    /// Parse from a JSON object:
    /// `{"pack_starter": {"price_id": "price_starter", "credits": 1000}}`.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let packs: HashMap<String, CreditPack> =
            serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
        for (product_id, pack) in &packs {
            if pack.credits <= 0 {
                return Err(format!("pack {product_id}: credits must be positive"));
            }
        }
        Ok(Self { packs })
    }

    pub fn get(&self, product_id: &str) -> Option<&CreditPack> {
        self.packs.get(product_id)
    }
}

impl Default for CreditPackCatalog {
    fn default() -> Self {
        Self {
            packs: HashMap::from([
                (
                    "pack_starter".to_string(),
                    CreditPack {
                        price_id: "price_starter".to_string(),
                        credits: 1000,
                    },
                ),
                (
                    "pack_pro".to_string(),
                    CreditPack {
                        price_id: "price_pro".to_string(),
                        credits: 5000,
                    },
                ),
                (
                    "pack_max".to_string(),
                    CreditPack {
                        price_id: "price_max".to_string(),
                        credits: 12000,
                    },
                ),
            ]),
        }
    }
}

// ============================================================================
// Webhook Reconciler
// ============================================================================

/// Outcome of reconciling one payment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Event already fully processed; acknowledged without side effects.
    Deduplicated,
    /// New purchase recorded and credits granted.
    Granted { credits: i64, new_balance: i64 },
    /// Nothing to reconcile (unhandled event type, malformed payload,
    /// unknown product). Acknowledged so the provider stops redelivering.
    Ignored,
}

#[derive(Clone)]
pub struct BillingUseCases {
    ledger: Arc<dyn PurchaseLedgerRepoTrait>,
    credits: Arc<dyn CreditStoreRepoTrait>,
    payments: Arc<dyn PaymentProviderPort>,
    catalog: CreditPackCatalog,
    app_origin: String,
}

impl BillingUseCases {
    pub fn new(
        ledger: Arc<dyn PurchaseLedgerRepoTrait>,
        credits: Arc<dyn CreditStoreRepoTrait>,
        payments: Arc<dyn PaymentProviderPort>,
        catalog: CreditPackCatalog,
        app_origin: String,
    ) -> Self {
        Self {
            ledger,
            credits,
            payments,
            catalog,
            app_origin,
        }
    }

    /// Reconcile one verified payment provider event.
    ///
    /// State machine per completed-payment event:
    /// Received -> Deduplicated (stop), or
    /// Received -> Granting -> Recorded, or
    /// Received -> Granting -> Failed (retryable by provider redelivery).
    #[instrument(skip(self, event), fields(event_id = event["id"].as_str().unwrap_or("")))]
    pub async fn handle_payment_event(
        &self,
        event: &serde_json::Value,
    ) -> AppResult<ReconcileOutcome> {
        let event_type = event["type"].as_str().unwrap_or("");

        match event_type {
            "checkout.session.completed" => {
                self.reconcile_completed_session(&event["data"]["object"])
                    .await
            }
            _ => {
                tracing::debug!(event_type, "Unhandled payment event type");
                Ok(ReconcileOutcome::Ignored)
            }
        }
    }

    async fn reconcile_completed_session(
        &self,
        session: &serde_json::Value,
    ) -> AppResult<ReconcileOutcome> {
        let session_id = session["id"].as_str().unwrap_or("");
        let payment_intent_id = session["payment_intent"].as_str().unwrap_or("");
        let user_id = session["client_reference_id"].as_str().unwrap_or("");
        let product_id = session["metadata"]["product_id"].as_str().unwrap_or("");
        let customer_id = session["customer"].as_str().map(|s| s.to_string());

        if session_id.is_empty() || payment_intent_id.is_empty() || user_id.is_empty() {
            // Malformed or non-pack session. Nothing we can reconcile, and a
            // retry would see the same payload.
            tracing::warn!(
                session_id,
                payment_intent_id,
                retryable = false,
                "Completed session missing identifiers, skipping"
            );
            return Ok(ReconcileOutcome::Ignored);
        }

        let Some(pack) = self.catalog.get(product_id) else {
            tracing::error!(
                product_id,
                session_id,
                "CONFIGURATION ERROR: no credit pack for product in completed session. \
                 Purchase will not be credited!"
            );
            return Ok(ReconcileOutcome::Ignored);
        };

        let input = RecordPurchaseInput {
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            price_id: Some(pack.price_id.clone()),
            payment_intent_id: payment_intent_id.to_string(),
            session_id: session_id.to_string(),
            customer_id,
            credits: pack.credits,
        };

        let recorded = self.ledger.record_if_new(&input).await?;

        if !recorded.created {
            match recorded.purchase.status {
                PurchaseStatus::Complete => {
                    tracing::info!(
                        payment_intent_id,
                        "Duplicate payment event, already granted"
                    );
                    return Ok(ReconcileOutcome::Deduplicated);
                }
                PurchaseStatus::Pending | PurchaseStatus::Failed => {
                    // A prior delivery recorded the purchase but its grant
                    // didn't complete. Exactly one redelivery wins the claim
                    // and retries the grant; losers treat it as a duplicate.
                    let claimed = self
                        .ledger
                        .claim_for_grant(payment_intent_id, STALE_PENDING_THRESHOLD_SECS)
                        .await?;
                    if !claimed {
                        tracing::info!(
                            payment_intent_id,
                            "Duplicate payment event, grant in flight elsewhere"
                        );
                        return Ok(ReconcileOutcome::Deduplicated);
                    }
                    tracing::warn!(
                        payment_intent_id,
                        previous_status = %recorded.purchase.status,
                        "Re-claimed uncredited purchase for grant retry"
                    );
                }
            }
        }

        self.grant_and_finalize(&recorded.purchase).await
    }

    /// Grant credits for a recorded purchase with bounded retries, then
    /// finalize the record.
    async fn grant_and_finalize(&self, purchase: &PurchaseProfile) -> AppResult<ReconcileOutcome> {
        let payment_intent_id = purchase.payment_intent_id.as_str();

        let mut last_error: Option<AppError> = None;
        for attempt in 1..=MAX_GRANT_ATTEMPTS {
            match self.credits.grant(&purchase.user_id, purchase.credits).await {
                Ok(new_balance) => {
                    self.finalize_complete(payment_intent_id).await;
                    tracing::info!(
                        payment_intent_id,
                        user_id = %purchase.user_id,
                        credits = purchase.credits,
                        new_balance,
                        "Purchase credited"
                    );
                    return Ok(ReconcileOutcome::Granted {
                        credits: purchase.credits,
                        new_balance,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        payment_intent_id,
                        attempt,
                        max_attempts = MAX_GRANT_ATTEMPTS,
                        error = %e,
                        "Credit grant failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        // Retries exhausted: mark the purchase failed so redelivery can
        // re-claim it, and surface for manual reconciliation.
        if let Err(e) = self
            .ledger
            .finalize(payment_intent_id, PurchaseStatus::Failed)
            .await
        {
            tracing::error!(payment_intent_id, error = %e, "Failed to mark purchase as failed");
        }
        tracing::error!(
            payment_intent_id,
            user_id = %purchase.user_id,
            credits = purchase.credits,
            "RECONCILIATION NEEDED: purchase recorded but credits not granted \
             after retries. Awaiting provider redelivery."
        );

        Err(last_error.unwrap_or_else(|| AppError::Internal("credit grant failed".into())))
    }

    /// Finalize to `complete` after a successful grant. The credits are
    /// already granted at this point, so a finalize failure must not bubble
    /// up as retryable - a redelivery would grant twice. Retry once, then
    /// log for manual reconciliation.
    async fn finalize_complete(&self, payment_intent_id: &str) {
        for attempt in 1..=2 {
            match self
                .ledger
                .finalize(payment_intent_id, PurchaseStatus::Complete)
                .await
            {
                Ok(()) => return,
                Err(e) if attempt == 1 => {
                    tracing::warn!(
                        payment_intent_id,
                        error = %e,
                        "Finalizing purchase failed, retrying once"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        payment_intent_id,
                        error = %e,
                        "RECONCILIATION NEEDED: credits granted but purchase left \
                         pending. Manual status fix required."
                    );
                }
            }
        }
    }

    // ========================================================================
    // Checkout, portal & history
    // ========================================================================

    /// Create a hosted checkout session for a configured credit pack.
    #[instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn create_checkout(
        &self,
        ctx: &AuthContext,
        product_id: &str,
    ) -> AppResult<CheckoutResult> {
        let pack = self.catalog.get(product_id).ok_or_else(|| {
            AppError::ValidationError(format!("unknown credit pack: {product_id}"))
        })?;

        let success_url = format!("{}/billing/success", self.app_origin);
        let cancel_url = format!("{}/billing/cancelled", self.app_origin);

        self.payments
            .create_checkout_session(&CheckoutParams {
                price_id: &pack.price_id,
                product_id,
                user_id: &ctx.user_id,
                success_url: &success_url,
                cancel_url: &cancel_url,
            })
            .await
    }

    /// Create a self-service portal session for the caller. Requires at
    /// least one purchase, which is where we learn the provider customer id.
    pub async fn create_portal_session(&self, ctx: &AuthContext) -> AppResult<String> {
        let purchases = self.ledger.list_by_user(&ctx.user_id).await?;
        let customer_id = purchases
            .iter()
            .find_map(|p| p.customer_id.clone())
            .ok_or(AppError::NotFound)?;

        let return_url = format!("{}/billing", self.app_origin);
        self.payments
            .create_portal_session(&CustomerId::new(customer_id), &return_url)
            .await?
            .ok_or_else(|| {
                AppError::UpstreamProvider("provider does not offer a hosted portal".into())
            })
    }

    pub async fn list_purchases(&self, user_id: &str) -> AppResult<Vec<PurchaseProfile>> {
        self.ledger.list_by_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryCreditStore, InMemoryPurchaseLedger, StubPaymentProvider};

    fn completed_session_event(
        payment_intent: &str,
        session: &str,
        user: &str,
        product: &str,
    ) -> serde_json::Value {
        serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": session,
                    "payment_intent": payment_intent,
                    "client_reference_id": user,
                    "customer": "cus_test1",
                    "metadata": { "product_id": product }
                }
            }
        })
    }

    fn billing(
        ledger: Arc<InMemoryPurchaseLedger>,
        credits: Arc<InMemoryCreditStore>,
    ) -> BillingUseCases {
        BillingUseCases::new(
            ledger,
            credits,
            Arc::new(StubPaymentProvider::new()),
            CreditPackCatalog::default(),
            "http://localhost:3000".to_string(),
        )
    }

    #[tokio::test]
    async fn completed_session_grants_credits_once() {
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        let billing = billing(ledger.clone(), credits.clone());

        let event = completed_session_event("pi_1", "cs_1", "user_1", "pack_starter");

        let first = billing.handle_payment_event(&event).await.unwrap();
        assert_eq!(
            first,
            ReconcileOutcome::Granted {
                credits: 1000,
                new_balance: 1000
            }
        );

        // Redelivery of the same payload is deduplicated.
        let second = billing.handle_payment_event(&event).await.unwrap();
        assert_eq!(second, ReconcileOutcome::Deduplicated);

        assert_eq!(credits.get_balance("user_1").await.unwrap(), 1000);
        let purchases = ledger.list_by_user("user_1").await.unwrap();
        assert_eq!(purchases.len(), 1);
        assert_eq!(purchases[0].status, PurchaseStatus::Complete);
        assert_eq!(purchases[0].payment_intent_id, "pi_1");
    }

    #[tokio::test]
    async fn unknown_product_is_ignored_without_side_effects() {
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        let billing = billing(ledger.clone(), credits.clone());

        let event = completed_session_event("pi_1", "cs_1", "user_1", "pack_nonexistent");
        let outcome = billing.handle_payment_event(&event).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Ignored);
        assert_eq!(credits.get_balance("user_1").await.unwrap(), 0);
        assert!(ledger.list_by_user("user_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_identifiers_are_ignored() {
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        let billing = billing(ledger, credits);

        let event = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_1" } }
        });
        assert_eq!(
            billing.handle_payment_event(&event).await.unwrap(),
            ReconcileOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn unhandled_event_types_are_ignored() {
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        let billing = billing(ledger, credits);

        let event = serde_json::json!({"id": "evt_1", "type": "invoice.paid", "data": {"object": {}}});
        assert_eq!(
            billing.handle_payment_event(&event).await.unwrap(),
            ReconcileOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn grant_failure_marks_purchase_failed_and_errors() {
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        // Every grant attempt fails.
        credits.fail_next_grants(MAX_GRANT_ATTEMPTS);
        let billing = billing(ledger.clone(), credits.clone());

        let event = completed_session_event("pi_1", "cs_1", "user_1", "pack_starter");
        let result = billing.handle_payment_event(&event).await;
        assert!(result.is_err());

        let purchase = ledger.get_by_payment_intent("pi_1").await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Failed);
        assert_eq!(credits.get_balance("user_1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn redelivery_recovers_failed_grant() {
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        credits.fail_next_grants(MAX_GRANT_ATTEMPTS);
        let billing = billing(ledger.clone(), credits.clone());

        let event = completed_session_event("pi_1", "cs_1", "user_1", "pack_starter");

        // First delivery exhausts its retries.
        assert!(billing.handle_payment_event(&event).await.is_err());

        // Redelivery re-claims the failed record and grants.
        let outcome = billing.handle_payment_event(&event).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Granted {
                credits: 1000,
                new_balance: 1000
            }
        );

        let purchase = ledger.get_by_payment_intent("pi_1").await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Complete);
        assert_eq!(credits.get_balance("user_1").await.unwrap(), 1000);

        // A third delivery is a pure duplicate.
        assert_eq!(
            billing.handle_payment_event(&event).await.unwrap(),
            ReconcileOutcome::Deduplicated
        );
        assert_eq!(credits.get_balance("user_1").await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn transient_grant_failure_is_retried_within_delivery() {
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        // First attempt fails, second succeeds.
        credits.fail_next_grants(1);
        let billing = billing(ledger.clone(), credits.clone());

        let event = completed_session_event("pi_1", "cs_1", "user_1", "pack_pro");
        let outcome = billing.handle_payment_event(&event).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome::Granted {
                credits: 5000,
                new_balance: 5000
            }
        );
    }

    #[tokio::test]
    async fn same_session_different_users_still_single_record() {
        // Conflicting session id must not create a second record even if the
        // redelivered payload differs.
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        let billing = billing(ledger.clone(), credits.clone());

        let event = completed_session_event("pi_1", "cs_1", "user_1", "pack_starter");
        billing.handle_payment_event(&event).await.unwrap();

        let tampered = completed_session_event("pi_other", "cs_1", "user_2", "pack_starter");
        let outcome = billing.handle_payment_event(&tampered).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Deduplicated);
        assert_eq!(credits.get_balance("user_2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn checkout_rejects_unknown_pack() {
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        let billing = billing(ledger, credits);

        let ctx = AuthContext {
            user_id: "user_1".to_string(),
            org_id: None,
            plan_name: None,
        };
        assert!(matches!(
            billing.create_checkout(&ctx, "pack_bogus").await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn portal_requires_a_purchase() {
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let credits = Arc::new(InMemoryCreditStore::new());
        let billing = billing(ledger.clone(), credits.clone());

        let ctx = AuthContext {
            user_id: "user_1".to_string(),
            org_id: None,
            plan_name: None,
        };
        assert!(matches!(
            billing.create_portal_session(&ctx).await,
            Err(AppError::NotFound)
        ));

        // After a purchase the customer id is known and the portal resolves.
        let event = completed_session_event("pi_1", "cs_1", "user_1", "pack_starter");
        billing.handle_payment_event(&event).await.unwrap();
        let url = billing.create_portal_session(&ctx).await.unwrap();
        assert!(url.starts_with("http"));
    }

    #[test]
    fn catalog_from_json() {
        let catalog = CreditPackCatalog::from_json(
            r#"{"pack_small": {"price_id": "price_1", "credits": 250}}"#,
        )
        .unwrap();
        assert_eq!(catalog.get("pack_small").unwrap().credits, 250);
        assert!(catalog.get("pack_starter").is_none());

        assert!(CreditPackCatalog::from_json(
            r#"{"pack_bad": {"price_id": "p", "credits": 0}}"#
        )
        .is_err());
        assert!(CreditPackCatalog::from_json("nope").is_err());
    }
}
