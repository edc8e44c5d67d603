use std::net::SocketAddr;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::application::use_cases::{billing::CreditPackCatalog, entitlement::PlanTable};

pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
    pub app_origin: Url,
    pub cors_origin: HeaderValue,
    /// Whether to trust X-Forwarded-For headers. Set to true when behind a reverse proxy (Caddy, nginx).
    /// SECURITY: Only enable this when the API is not directly exposed to the internet.
    pub trust_proxy: bool,
    pub rate_limit_window_secs: u64,
    pub rate_limit_per_ip: u64,
    /// Payment provider API key.
    pub payment_secret_key: SecretString,
    /// Shared secret for verifying payment webhook signatures.
    pub payment_webhook_secret: SecretString,
    /// Identity provider session-verification endpoint base URL.
    pub identity_api_url: Url,
    pub identity_api_key: SecretString,
    /// Hosted prompt-analysis API base URL.
    pub analysis_api_url: Url,
    pub analysis_api_key: SecretString,
    /// Timeout applied to all external-provider calls.
    pub provider_timeout_secs: u64,
    /// Credits spent per prompt analysis.
    pub analysis_credit_cost: i64,
    /// Plan-name to credit-allowance table, overridable without a redeploy.
    pub plan_allowances: PlanTable,
    /// Product-id to credit-pack catalog, overridable without a redeploy.
    pub credit_packs: CreditPackCatalog,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3001".parse().unwrap());
        let database_url: String = get_env("DATABASE_URL");
        let redis_url: String = get_env_default("REDIS_URL", "redis://127.0.0.1:6379".to_string());
        let app_origin: Url = get_env("APP_ORIGIN");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");
        // Default to false for security - must explicitly enable when behind a trusted proxy
        let trust_proxy: bool = get_env_default("TRUST_PROXY", false);
        let rate_limit_window_secs: u64 = get_env_default("RATE_LIMIT_WINDOW_SECS", 60);
        let rate_limit_per_ip: u64 = get_env_default("RATE_LIMIT_PER_IP", 60);

        let payment_secret_key: SecretString =
            SecretString::new(get_env::<String>("PAYMENT_SECRET_KEY").into());
        let payment_webhook_secret: SecretString =
            SecretString::new(get_env::<String>("PAYMENT_WEBHOOK_SECRET").into());

        let identity_api_url: Url = get_env("IDENTITY_API_URL");
        let identity_api_key: SecretString =
            SecretString::new(get_env::<String>("IDENTITY_API_KEY").into());

        let analysis_api_url: Url = get_env("ANALYSIS_API_URL");
        let analysis_api_key: SecretString =
            SecretString::new(get_env::<String>("ANALYSIS_API_KEY").into());

        let provider_timeout_secs: u64 = get_env_default("PROVIDER_TIMEOUT_SECS", 10);
        let analysis_credit_cost: i64 = get_env_default("ANALYSIS_CREDIT_COST", 1);

        let plan_allowances = match std::env::var("PLAN_ALLOWANCES") {
            Ok(raw) => PlanTable::from_json(&raw)
                .unwrap_or_else(|e| panic!("PLAN_ALLOWANCES is invalid: {e}")),
            Err(_) => PlanTable::default(),
        };
        let credit_packs = match std::env::var("CREDIT_PACKS") {
            Ok(raw) => CreditPackCatalog::from_json(&raw)
                .unwrap_or_else(|e| panic!("CREDIT_PACKS is invalid: {e}")),
            Err(_) => CreditPackCatalog::default(),
        };

        Self {
            bind_addr,
            database_url,
            redis_url,
            app_origin,
            cors_origin,
            trust_proxy,
            rate_limit_window_secs,
            rate_limit_per_ip,
            payment_secret_key,
            payment_webhook_secret,
            identity_api_url,
            identity_api_key,
            analysis_api_url,
            analysis_api_key,
            provider_timeout_secs,
            analysis_credit_cost,
            plan_allowances,
            credit_packs,
        }
    }
}
