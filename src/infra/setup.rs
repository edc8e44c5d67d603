use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        analysis::AnalysisUseCases, billing::BillingUseCases, credits::CreditStoreRepoTrait,
        entitlement::EntitlementUseCases, feedback::FeedbackUseCases,
    },
    application::{
        ports::{
            analysis_provider::PromptAnalysisPort, identity_provider::IdentityProviderPort,
            payment_provider::PaymentProviderPort,
        },
        use_cases::{billing::PurchaseLedgerRepoTrait, feedback::FeedbackRepoTrait},
    },
    infra::{
        analysis_client::HttpAnalysisClient,
        config::AppConfig,
        identity_client::HttpIdentityProvider,
        postgres_persistence,
        rate_limit::{RateLimiterTrait, RedisRateLimiter},
        stripe_client::StripeClient,
    },
};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);

    let rate_limiter: Arc<dyn RateLimiterTrait> = Arc::new(
        RedisRateLimiter::new(
            &config.redis_url,
            config.rate_limit_window_secs,
            config.rate_limit_per_ip,
        )
        .await?,
    );

    let credit_store = postgres_arc.clone() as Arc<dyn CreditStoreRepoTrait>;
    let purchase_ledger = postgres_arc.clone() as Arc<dyn PurchaseLedgerRepoTrait>;
    let feedback_repo = postgres_arc.clone() as Arc<dyn FeedbackRepoTrait>;

    let payments: Arc<dyn PaymentProviderPort> = Arc::new(StripeClient::new(
        config.payment_secret_key.clone(),
        config.provider_timeout_secs,
    ));
    let identity: Arc<dyn IdentityProviderPort> = Arc::new(HttpIdentityProvider::new(
        config.identity_api_url.clone(),
        config.identity_api_key.clone(),
        config.provider_timeout_secs,
    ));
    let analyzer: Arc<dyn PromptAnalysisPort> = Arc::new(HttpAnalysisClient::new(
        config.analysis_api_url.clone(),
        config.analysis_api_key.clone(),
        config.provider_timeout_secs,
    ));

    let entitlement_use_cases = Arc::new(EntitlementUseCases::new(
        credit_store.clone(),
        config.plan_allowances.clone(),
    ));

    let billing_use_cases = Arc::new(BillingUseCases::new(
        purchase_ledger,
        credit_store,
        payments,
        config.credit_packs.clone(),
        config.app_origin.to_string().trim_end_matches('/').to_string(),
    ));

    let feedback_use_cases = Arc::new(FeedbackUseCases::new(feedback_repo));

    let analysis_use_cases = Arc::new(AnalysisUseCases::new(
        entitlement_use_cases.clone(),
        analyzer,
        config.analysis_credit_cost,
    ));

    Ok(AppState {
        config: Arc::new(config),
        entitlement_use_cases,
        billing_use_cases,
        feedback_use_cases,
        analysis_use_cases,
        identity,
        rate_limiter,
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vibebetter_api=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false) // don't show target (module path)
        .with_level(true) // show log level
        .pretty(); // human-friendly, with colors

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
