//! In-memory mock implementations for repository traits and provider ports.
//!
//! The repo mocks mirror the Postgres adapters' semantics, including the
//! atomic conditional decrement and the conflict-keyed insert, so use-case
//! tests exercise the same behavior the database enforces.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        analysis_provider::{PromptAnalysis, PromptAnalysisPort},
        identity_provider::{AuthContext, IdentityProviderPort},
        payment_provider::{CheckoutParams, CheckoutResult, CustomerId, PaymentProviderPort},
    },
    application::use_cases::{
        billing::{PurchaseLedgerRepoTrait, PurchaseProfile, RecordPurchaseInput, RecordedPurchase},
        credits::CreditStoreRepoTrait,
        feedback::{FeedbackProfile, FeedbackRepoTrait},
    },
    domain::entities::{feedback::FeedbackCategory, purchase::PurchaseStatus},
    infra::rate_limit::RateLimiterTrait,
};

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

// ============================================================================
// InMemoryCreditStore
// ============================================================================

#[derive(Default)]
pub struct InMemoryCreditStore {
    pub balances: Mutex<HashMap<String, i64>>,
    // Remaining grant calls that should fail (for retry-path tests).
    failing_grants: Mutex<u32>,
}

impl InMemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(user_id: &str, credits: i64) -> Self {
        let store = Self::default();
        store
            .balances
            .lock()
            .unwrap()
            .insert(user_id.to_string(), credits);
        store
    }

    pub fn with_balances(balances: Vec<(String, i64)>) -> Self {
        Self {
            balances: Mutex::new(balances.into_iter().collect()),
            failing_grants: Mutex::new(0),
        }
    }

    /// Make the next `n` grant calls fail with a database error.
    pub fn fail_next_grants(&self, n: u32) {
        *self.failing_grants.lock().unwrap() = n;
    }
}

#[async_trait]
impl CreditStoreRepoTrait for InMemoryCreditStore {
    async fn get_balance(&self, user_id: &str) -> AppResult<i64> {
        Ok(*self.balances.lock().unwrap().get(user_id).unwrap_or(&0))
    }

    async fn grant(&self, user_id: &str, amount: i64) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "grant amount must be positive".into(),
            ));
        }

        {
            let mut failing = self.failing_grants.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(AppError::Database("injected grant failure".into()));
            }
        }

        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(user_id.to_string()).or_insert(0);
        *balance += amount;
        Ok(*balance)
    }

    async fn consume(&self, user_id: &str, amount: i64) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "consume amount must be positive".into(),
            ));
        }

        // Check-and-decrement under one lock, matching the atomic
        // conditional UPDATE in Postgres.
        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(user_id.to_string()).or_insert(0);
        if *balance < amount {
            return Err(AppError::InsufficientCredits);
        }
        *balance -= amount;
        Ok(*balance)
    }
}

// ============================================================================
// InMemoryPurchaseLedger
// ============================================================================

#[derive(Default)]
pub struct InMemoryPurchaseLedger {
    pub purchases: Mutex<Vec<PurchaseProfile>>,
}

impl InMemoryPurchaseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a purchase directly (for test setup).
    pub fn insert_for_test(&self, purchase: PurchaseProfile) {
        self.purchases.lock().unwrap().push(purchase);
    }
}

#[async_trait]
impl PurchaseLedgerRepoTrait for InMemoryPurchaseLedger {
    async fn record_if_new(&self, input: &RecordPurchaseInput) -> AppResult<RecordedPurchase> {
        let mut purchases = self.purchases.lock().unwrap();

        // Conflict on either idempotency key, like the two unique indexes.
        if let Some(existing) = purchases.iter().find(|p| {
            p.payment_intent_id == input.payment_intent_id || p.session_id == input.session_id
        }) {
            return Ok(RecordedPurchase {
                created: false,
                purchase: existing.clone(),
            });
        }

        let purchase = PurchaseProfile {
            id: Uuid::new_v4(),
            user_id: input.user_id.clone(),
            product_id: input.product_id.clone(),
            price_id: input.price_id.clone(),
            payment_intent_id: input.payment_intent_id.clone(),
            session_id: input.session_id.clone(),
            customer_id: input.customer_id.clone(),
            credits: input.credits,
            status: PurchaseStatus::Pending,
            created_at: Some(now()),
            updated_at: Some(now()),
        };
        purchases.push(purchase.clone());

        Ok(RecordedPurchase {
            created: true,
            purchase,
        })
    }

    async fn claim_for_grant(
        &self,
        payment_intent_id: &str,
        stale_after_secs: i64,
    ) -> AppResult<bool> {
        let mut purchases = self.purchases.lock().unwrap();
        let Some(purchase) = purchases
            .iter_mut()
            .find(|p| p.payment_intent_id == payment_intent_id)
        else {
            return Ok(false);
        };

        let stale_before = now() - chrono::Duration::seconds(stale_after_secs);
        let claimable = match purchase.status {
            PurchaseStatus::Failed => true,
            PurchaseStatus::Pending => purchase
                .updated_at
                .map(|t| t < stale_before)
                .unwrap_or(false),
            PurchaseStatus::Complete => false,
        };

        if claimable {
            purchase.status = PurchaseStatus::Pending;
            purchase.updated_at = Some(now());
        }
        Ok(claimable)
    }

    async fn finalize(&self, payment_intent_id: &str, status: PurchaseStatus) -> AppResult<()> {
        let mut purchases = self.purchases.lock().unwrap();
        if let Some(purchase) = purchases
            .iter_mut()
            .find(|p| p.payment_intent_id == payment_intent_id)
            && purchase.status != PurchaseStatus::Complete
        {
            purchase.status = status;
            purchase.updated_at = Some(now());
        }
        Ok(())
    }

    async fn get_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> AppResult<Option<PurchaseProfile>> {
        Ok(self
            .purchases
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<PurchaseProfile>> {
        let mut result: Vec<_> = self
            .purchases
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

// ============================================================================
// InMemoryFeedbackRepo
// ============================================================================

#[derive(Default)]
pub struct InMemoryFeedbackRepo {
    pub feedback: Mutex<Vec<FeedbackProfile>>,
}

impl InMemoryFeedbackRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored feedback (for test assertions).
    pub fn all(&self) -> Vec<FeedbackProfile> {
        self.feedback.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedbackRepoTrait for InMemoryFeedbackRepo {
    async fn create(
        &self,
        user_id: &str,
        rating: i32,
        category: FeedbackCategory,
        message: &str,
        name: Option<&str>,
        email: Option<&str>,
        allow_public: bool,
    ) -> AppResult<FeedbackProfile> {
        let profile = FeedbackProfile {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            rating,
            category,
            message: message.to_string(),
            name: name.map(|n| n.to_string()),
            email: email.map(|e| e.to_string()),
            allow_public,
            created_at: Some(now()),
        };
        self.feedback.lock().unwrap().push(profile.clone());
        Ok(profile)
    }

    async fn list_public(&self, limit: i64) -> AppResult<Vec<FeedbackProfile>> {
        let mut result: Vec<_> = self
            .feedback
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.allow_public)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result.truncate(limit as usize);
        Ok(result)
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<FeedbackProfile>> {
        let mut result: Vec<_> = self
            .feedback
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

// ============================================================================
// Provider stubs
// ============================================================================

/// Identity stub resolving a fixed token-to-context map.
#[derive(Default)]
pub struct StubIdentityProvider {
    pub tokens: Mutex<HashMap<String, AuthContext>>,
}

impl StubIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: Vec<(String, AuthContext)>) -> Self {
        Self {
            tokens: Mutex::new(tokens.into_iter().collect()),
        }
    }
}

#[async_trait]
impl IdentityProviderPort for StubIdentityProvider {
    async fn resolve_token(&self, token: &str) -> AppResult<Option<AuthContext>> {
        Ok(self.tokens.lock().unwrap().get(token).cloned())
    }
}

/// Payment stub returning canned hosted URLs.
#[derive(Default)]
pub struct StubPaymentProvider;

impl StubPaymentProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PaymentProviderPort for StubPaymentProvider {
    async fn create_checkout_session(
        &self,
        params: &CheckoutParams<'_>,
    ) -> AppResult<CheckoutResult> {
        Ok(CheckoutResult {
            checkout_url: format!("https://checkout.test/c/{}", params.product_id),
            session_id: "cs_test_1".to_string(),
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &CustomerId,
        _return_url: &str,
    ) -> AppResult<Option<String>> {
        Ok(Some(format!("https://portal.test/p/{}", customer_id)))
    }
}

/// Analysis stub echoing the prompt back, with optional failure injection.
pub struct StubAnalysisProvider {
    calls: AtomicUsize,
    failing: bool,
}

impl StubAnalysisProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: false,
        }
    }

    /// A stub whose every call fails with an upstream error.
    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: true,
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StubAnalysisProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PromptAnalysisPort for StubAnalysisProvider {
    async fn analyze(&self, prompt: &str) -> AppResult<PromptAnalysis> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(AppError::UpstreamProvider("model unavailable".into()));
        }
        Ok(PromptAnalysis {
            improved_prompt: format!("Improved: {}", prompt),
            issues: vec!["Missing context about the target language".to_string()],
            score: 72,
        })
    }
}

/// Rate limiter that never rejects (for endpoint tests).
#[derive(Default)]
pub struct InMemoryRateLimiter;

impl InMemoryRateLimiter {
    pub fn permissive() -> Self {
        Self
    }
}

#[async_trait]
impl RateLimiterTrait for InMemoryRateLimiter {
    async fn check(&self, _ip: &str) -> AppResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn credit_store_grant_and_consume() {
        let store = InMemoryCreditStore::new();

        assert_eq!(store.get_balance("u1").await.unwrap(), 0);
        assert_eq!(store.grant("u1", 100).await.unwrap(), 100);
        assert_eq!(store.consume("u1", 40).await.unwrap(), 60);
        assert!(matches!(
            store.consume("u1", 61).await,
            Err(AppError::InsufficientCredits)
        ));
        assert_eq!(store.get_balance("u1").await.unwrap(), 60);
    }

    #[tokio::test]
    async fn credit_store_rejects_non_positive_amounts() {
        let store = InMemoryCreditStore::new();
        assert!(store.grant("u1", 0).await.is_err());
        assert!(store.grant("u1", -5).await.is_err());
        assert!(store.consume("u1", 0).await.is_err());
    }

    #[tokio::test]
    async fn ledger_record_if_new_is_idempotent_on_both_keys() {
        let ledger = InMemoryPurchaseLedger::new();
        let input = RecordPurchaseInput {
            user_id: "u1".to_string(),
            product_id: "pack_starter".to_string(),
            price_id: Some("price_starter".to_string()),
            payment_intent_id: "pi_1".to_string(),
            session_id: "cs_1".to_string(),
            customer_id: None,
            credits: 1000,
        };

        let first = ledger.record_if_new(&input).await.unwrap();
        assert!(first.created);

        // Same payment intent, different session.
        let mut by_intent = input.clone();
        by_intent.session_id = "cs_other".to_string();
        assert!(!ledger.record_if_new(&by_intent).await.unwrap().created);

        // Same session, different payment intent.
        let mut by_session = input.clone();
        by_session.payment_intent_id = "pi_other".to_string();
        assert!(!ledger.record_if_new(&by_session).await.unwrap().created);

        assert_eq!(ledger.purchases.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ledger_claim_rules() {
        let ledger = InMemoryPurchaseLedger::new();
        let input = RecordPurchaseInput {
            user_id: "u1".to_string(),
            product_id: "pack_starter".to_string(),
            price_id: None,
            payment_intent_id: "pi_1".to_string(),
            session_id: "cs_1".to_string(),
            customer_id: None,
            credits: 1000,
        };
        ledger.record_if_new(&input).await.unwrap();

        // Fresh pending is not claimable.
        assert!(!ledger.claim_for_grant("pi_1", 900).await.unwrap());

        // Failed is claimable exactly once per settle.
        ledger
            .finalize("pi_1", PurchaseStatus::Failed)
            .await
            .unwrap();
        assert!(ledger.claim_for_grant("pi_1", 900).await.unwrap());
        assert!(!ledger.claim_for_grant("pi_1", 900).await.unwrap());

        // Complete is never claimable.
        ledger
            .finalize("pi_1", PurchaseStatus::Complete)
            .await
            .unwrap();
        assert!(!ledger.claim_for_grant("pi_1", 900).await.unwrap());
    }

    #[tokio::test]
    async fn ledger_finalize_protects_terminal_status() {
        let ledger = InMemoryPurchaseLedger::new();
        let input = RecordPurchaseInput {
            user_id: "u1".to_string(),
            product_id: "pack_starter".to_string(),
            price_id: None,
            payment_intent_id: "pi_1".to_string(),
            session_id: "cs_1".to_string(),
            customer_id: None,
            credits: 1000,
        };
        ledger.record_if_new(&input).await.unwrap();

        ledger
            .finalize("pi_1", PurchaseStatus::Complete)
            .await
            .unwrap();
        ledger
            .finalize("pi_1", PurchaseStatus::Failed)
            .await
            .unwrap();

        let purchase = ledger.get_by_payment_intent("pi_1").await.unwrap().unwrap();
        assert_eq!(purchase.status, PurchaseStatus::Complete);
    }
}
