use std::sync::Arc;

use crate::{
    application::ports::identity_provider::IdentityProviderPort,
    application::use_cases::{
        analysis::AnalysisUseCases, billing::BillingUseCases, entitlement::EntitlementUseCases,
        feedback::FeedbackUseCases,
    },
    infra::{config::AppConfig, rate_limit::RateLimiterTrait},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub entitlement_use_cases: Arc<EntitlementUseCases>,
    pub billing_use_cases: Arc<BillingUseCases>,
    pub feedback_use_cases: Arc<FeedbackUseCases>,
    pub analysis_use_cases: Arc<AnalysisUseCases>,
    pub identity: Arc<dyn IdentityProviderPort>,
    pub rate_limiter: Arc<dyn RateLimiterTrait>,
}
