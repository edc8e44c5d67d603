//! Test app state builder for HTTP-level integration testing.
//!
//! This module provides `TestAppStateBuilder` which creates a minimal
//! `AppState` with in-memory mocks for testing HTTP endpoints.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::ports::identity_provider::AuthContext,
    application::use_cases::{
        analysis::AnalysisUseCases,
        billing::{BillingUseCases, CreditPackCatalog},
        entitlement::{EntitlementUseCases, PlanTable},
        feedback::FeedbackUseCases,
    },
    infra::{config::AppConfig, rate_limit::RateLimiterTrait},
    test_utils::{
        InMemoryCreditStore, InMemoryFeedbackRepo, InMemoryPurchaseLedger, InMemoryRateLimiter,
        StubAnalysisProvider, StubIdentityProvider, StubPaymentProvider,
    },
};

/// Webhook secret the test config is built with; tests sign payloads with it.
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Handles to the in-memory mocks behind a test `AppState`, for assertions.
pub struct TestMocks {
    pub credits: Arc<InMemoryCreditStore>,
    pub ledger: Arc<InMemoryPurchaseLedger>,
    pub feedback: Arc<InMemoryFeedbackRepo>,
}

/// Builder for creating `AppState` with in-memory mocks for testing.
///
/// # Example
///
/// ```ignore
/// let ctx = create_test_auth_context("user_1", |_| {});
/// let app_state = TestAppStateBuilder::new()
///     .with_token("tok_1", ctx)
///     .with_balance("user_1", 100)
///     .build();
/// ```
pub struct TestAppStateBuilder {
    tokens: Vec<(String, AuthContext)>,
    balances: Vec<(String, i64)>,
    plan_table: PlanTable,
    catalog: CreditPackCatalog,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            tokens: vec![],
            balances: vec![],
            plan_table: PlanTable::default(),
            catalog: CreditPackCatalog::default(),
        }
    }

    /// Register a bearer token resolving to the given identity.
    pub fn with_token(mut self, token: &str, ctx: AuthContext) -> Self {
        self.tokens.push((token.to_string(), ctx));
        self
    }

    /// Seed a user's credit balance.
    pub fn with_balance(mut self, user_id: &str, credits: i64) -> Self {
        self.balances.push((user_id.to_string(), credits));
        self
    }

    /// Override the plan allowance table.
    pub fn with_plan_table(mut self, plan_table: PlanTable) -> Self {
        self.plan_table = plan_table;
        self
    }

    /// Override the credit pack catalog.
    pub fn with_catalog(mut self, catalog: CreditPackCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Build the AppState with all configured mocks.
    pub fn build(self) -> AppState {
        self.build_with_mocks().0
    }

    /// Build the AppState and keep handles to the mocks for assertions.
    pub fn build_with_mocks(self) -> (AppState, TestMocks) {
        let credits = Arc::new(InMemoryCreditStore::with_balances(self.balances));
        let ledger = Arc::new(InMemoryPurchaseLedger::new());
        let feedback = Arc::new(InMemoryFeedbackRepo::new());
        let identity = Arc::new(StubIdentityProvider::with_tokens(self.tokens));
        let payments = Arc::new(StubPaymentProvider::new());
        let analyzer = Arc::new(StubAnalysisProvider::new());

        let entitlement_use_cases = Arc::new(EntitlementUseCases::new(
            credits.clone(),
            self.plan_table,
        ));

        let billing_use_cases = Arc::new(BillingUseCases::new(
            ledger.clone(),
            credits.clone(),
            payments,
            self.catalog,
            "http://localhost:3000".to_string(),
        ));

        let feedback_use_cases = Arc::new(FeedbackUseCases::new(feedback.clone()));

        let analysis_use_cases = Arc::new(AnalysisUseCases::new(
            entitlement_use_cases.clone(),
            analyzer,
            1,
        ));

        // Create minimal config for testing
        let config = Arc::new(AppConfig {
            bind_addr: "127.0.0.1:3001".parse::<SocketAddr>().unwrap(),
            database_url: String::new(),
            redis_url: String::new(),
            app_origin: Url::parse("http://localhost:3000").unwrap(),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            trust_proxy: false,
            rate_limit_window_secs: 60,
            rate_limit_per_ip: 60,
            payment_secret_key: SecretString::new("sk_test_secret".into()),
            payment_webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
            identity_api_url: Url::parse("http://identity.test").unwrap(),
            identity_api_key: SecretString::new("idk_test".into()),
            analysis_api_url: Url::parse("http://analysis.test").unwrap(),
            analysis_api_key: SecretString::new("ank_test".into()),
            provider_timeout_secs: 10,
            analysis_credit_cost: 1,
            plan_allowances: PlanTable::default(),
            credit_packs: CreditPackCatalog::default(),
        });

        let rate_limiter: Arc<dyn RateLimiterTrait> = Arc::new(InMemoryRateLimiter::permissive());

        let app_state = AppState {
            config,
            entitlement_use_cases,
            billing_use_cases,
            feedback_use_cases,
            analysis_use_cases,
            identity,
            rate_limiter,
        };

        (
            app_state,
            TestMocks {
                credits,
                ledger,
                feedback,
            },
        )
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
