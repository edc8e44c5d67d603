use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::instrument;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::credits::CreditStoreRepoTrait,
    domain::entities::credit::{CreditAllowance, EffectiveBalance},
};

/// Default plan allowances. Business configuration, not an algorithmic
/// concern - deployments override the table via `PLAN_ALLOWANCES`.
static DEFAULT_ALLOWANCES: Lazy<HashMap<String, CreditAllowance>> = Lazy::new(|| {
    HashMap::from([
        ("Plan User Basic".to_string(), CreditAllowance::Limited(1000)),
        ("Plan User Full".to_string(), CreditAllowance::Limited(3000)),
        (
            "Plan User Premium".to_string(),
            CreditAllowance::Limited(8000),
        ),
        ("Plan User Unlimited".to_string(), CreditAllowance::Unlimited),
    ])
});

/// Static plan-name to credit-allowance table.
///
/// Pure lookup; recomputed per entitlement check from the caller's identity
/// context, never cached beyond the request. The source of truth for which
/// plan an organization is on lives in the identity provider.
#[derive(Debug, Clone)]
pub struct PlanTable {
    allowances: HashMap<String, CreditAllowance>,
}

impl PlanTable {
    pub fn new(allowances: HashMap<String, CreditAllowance>) -> Self {
        Self { allowances }
    }

    /// Parse a table from a JSON object mapping plan names to either a
    /// number or the string `"unlimited"`:
    /// `{"Plan User Basic": 1000, "Plan User Unlimited": "unlimited"}`.
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
        let object = value
            .as_object()
            .ok_or_else(|| "expected a JSON object".to_string())?;

        let mut allowances = HashMap::new();
        for (plan, entry) in object {
            let allowance = match entry {
                serde_json::Value::Number(n) => {
                    let amount = n
                        .as_i64()
                        .filter(|a| *a >= 0)
                        .ok_or_else(|| format!("plan {plan}: allowance must be a non-negative integer"))?;
                    CreditAllowance::Limited(amount)
                }
                serde_json::Value::String(s) if s.eq_ignore_ascii_case("unlimited") => {
                    CreditAllowance::Unlimited
                }
                other => {
                    return Err(format!(
                        "plan {plan}: expected a number or \"unlimited\", got {other}"
                    ));
                }
            };
            allowances.insert(plan.clone(), allowance);
        }

        Ok(Self { allowances })
    }

    /// Resolve a plan name to its credit allowance.
    /// Unknown or missing plan names yield a zero allowance.
    pub fn resolve(&self, plan_name: Option<&str>) -> CreditAllowance {
        plan_name
            .and_then(|name| self.allowances.get(name))
            .copied()
            .unwrap_or(CreditAllowance::Limited(0))
    }
}

impl Default for PlanTable {
    fn default() -> Self {
        Self {
            allowances: DEFAULT_ALLOWANCES.clone(),
        }
    }
}

/// Combines the credit store balance with the subscription allowance into a
/// single spend decision.
///
/// Subscription allowance is display-only except for the unlimited sentinel:
/// actual spend always draws from the credit store, which is topped up by
/// purchase grants.
#[derive(Clone)]
pub struct EntitlementUseCases {
    credits: Arc<dyn CreditStoreRepoTrait>,
    plans: PlanTable,
}

impl EntitlementUseCases {
    pub fn new(credits: Arc<dyn CreditStoreRepoTrait>, plans: PlanTable) -> Self {
        Self { credits, plans }
    }

    #[instrument(skip(self))]
    pub async fn effective_balance(
        &self,
        user_id: &str,
        plan_name: Option<&str>,
    ) -> AppResult<EffectiveBalance> {
        let unlimited = self.plans.resolve(plan_name).is_unlimited();
        let credits = self.credits.get_balance(user_id).await?;
        Ok(EffectiveBalance { credits, unlimited })
    }

    pub async fn can_consume(
        &self,
        user_id: &str,
        plan_name: Option<&str>,
        amount: i64,
    ) -> AppResult<bool> {
        let balance = self.effective_balance(user_id, plan_name).await?;
        Ok(balance.covers(amount))
    }

    /// Spend `amount` credits. A no-op under the unlimited sentinel;
    /// otherwise a single atomic conditional decrement.
    #[instrument(skip(self))]
    pub async fn consume(
        &self,
        user_id: &str,
        plan_name: Option<&str>,
        amount: i64,
    ) -> AppResult<EffectiveBalance> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "consume amount must be positive".into(),
            ));
        }

        if self.plans.resolve(plan_name).is_unlimited() {
            let credits = self.credits.get_balance(user_id).await?;
            return Ok(EffectiveBalance {
                credits,
                unlimited: true,
            });
        }

        let credits = self.credits.consume(user_id, amount).await?;
        Ok(EffectiveBalance {
            credits,
            unlimited: false,
        })
    }

    /// Return previously consumed credits. A no-op under the unlimited
    /// sentinel (nothing was decremented).
    pub async fn refund(
        &self,
        user_id: &str,
        plan_name: Option<&str>,
        amount: i64,
    ) -> AppResult<()> {
        if self.plans.resolve(plan_name).is_unlimited() {
            return Ok(());
        }
        self.credits.grant(user_id, amount).await?;
        Ok(())
    }
}
