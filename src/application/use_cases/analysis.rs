use std::sync::Arc;

use tracing::instrument;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        analysis_provider::{PromptAnalysis, PromptAnalysisPort},
        identity_provider::AuthContext,
    },
    application::use_cases::entitlement::EntitlementUseCases,
    application::validators::is_valid_prompt,
};

/// The consumption entry point: each prompt analysis spends credits before
/// calling the hosted model.
#[derive(Clone)]
pub struct AnalysisUseCases {
    entitlement: Arc<EntitlementUseCases>,
    analyzer: Arc<dyn PromptAnalysisPort>,
    credit_cost: i64,
}

impl AnalysisUseCases {
    pub fn new(
        entitlement: Arc<EntitlementUseCases>,
        analyzer: Arc<dyn PromptAnalysisPort>,
        credit_cost: i64,
    ) -> Self {
        Self {
            entitlement,
            analyzer,
            credit_cost,
        }
    }

    /// Analyze a prompt, consuming credits up front. If the provider call
    /// fails after the consume, the credits are returned so the caller can
    /// retry without being charged twice.
    #[instrument(skip(self, ctx, prompt), fields(user_id = %ctx.user_id))]
    pub async fn analyze(&self, ctx: &AuthContext, prompt: &str) -> AppResult<PromptAnalysis> {
        if !is_valid_prompt(prompt) {
            return Err(AppError::ValidationError(
                "prompt must be non-empty and at most 20000 characters".into(),
            ));
        }

        self.entitlement
            .consume(&ctx.user_id, ctx.plan_name.as_deref(), self.credit_cost)
            .await?;

        match self.analyzer.analyze(prompt.trim()).await {
            Ok(analysis) => Ok(analysis),
            Err(e) => {
                if let Err(refund_err) = self
                    .entitlement
                    .refund(&ctx.user_id, ctx.plan_name.as_deref(), self.credit_cost)
                    .await
                {
                    tracing::error!(
                        user_id = %ctx.user_id,
                        credits = self.credit_cost,
                        error = %refund_err,
                        "RECONCILIATION NEEDED: analysis failed and credit refund also failed"
                    );
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::entitlement::PlanTable;
    use crate::test_utils::{InMemoryCreditStore, StubAnalysisProvider};

    fn ctx(user_id: &str, plan: Option<&str>) -> AuthContext {
        AuthContext {
            user_id: user_id.to_string(),
            org_id: Some("org_1".to_string()),
            plan_name: plan.map(|p| p.to_string()),
        }
    }

    fn analysis(
        store: Arc<InMemoryCreditStore>,
        analyzer: Arc<StubAnalysisProvider>,
    ) -> AnalysisUseCases {
        let entitlement = Arc::new(EntitlementUseCases::new(store, PlanTable::default()));
        AnalysisUseCases::new(entitlement, analyzer, 1)
    }

    #[tokio::test]
    async fn analysis_consumes_one_credit() {
        let store = Arc::new(InMemoryCreditStore::with_balance("user_1", 3));
        let use_cases = analysis(store.clone(), Arc::new(StubAnalysisProvider::new()));

        let result = use_cases
            .analyze(&ctx("user_1", None), "make this faster")
            .await
            .unwrap();
        assert!(!result.improved_prompt.is_empty());
        assert_eq!(store.get_balance("user_1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn insufficient_credits_blocks_before_provider_call() {
        let store = Arc::new(InMemoryCreditStore::new());
        let analyzer = Arc::new(StubAnalysisProvider::new());
        let use_cases = analysis(store, analyzer.clone());

        let result = use_cases.analyze(&ctx("user_1", None), "prompt").await;
        assert!(matches!(result, Err(AppError::InsufficientCredits)));
        assert_eq!(analyzer.call_count(), 0);
    }

    #[tokio::test]
    async fn unlimited_plan_skips_consumption() {
        let store = Arc::new(InMemoryCreditStore::new());
        let use_cases = analysis(store.clone(), Arc::new(StubAnalysisProvider::new()));

        use_cases
            .analyze(&ctx("user_1", Some("Plan User Unlimited")), "prompt")
            .await
            .unwrap();
        assert_eq!(store.get_balance("user_1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn provider_failure_refunds_the_credit() {
        let store = Arc::new(InMemoryCreditStore::with_balance("user_1", 2));
        let analyzer = Arc::new(StubAnalysisProvider::failing());
        let use_cases = analysis(store.clone(), analyzer);

        let result = use_cases.analyze(&ctx("user_1", None), "prompt").await;
        assert!(matches!(result, Err(AppError::UpstreamProvider(_))));
        // Balance restored.
        assert_eq!(store.get_balance("user_1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected_without_spending() {
        let store = Arc::new(InMemoryCreditStore::with_balance("user_1", 2));
        let use_cases = analysis(store.clone(), Arc::new(StubAnalysisProvider::new()));

        let result = use_cases.analyze(&ctx("user_1", None), "   ").await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        assert_eq!(store.get_balance("user_1").await.unwrap(), 2);
    }
}
