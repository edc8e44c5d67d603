use serde::{Deserialize, Serialize};

/// Credit allowance derived from a subscription plan.
///
/// `Unlimited` is a sentinel: spend checks always pass and consumption is a
/// no-op. Everything else is a finite display allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditAllowance {
    Limited(i64),
    Unlimited,
}

impl CreditAllowance {
    pub fn is_unlimited(&self) -> bool {
        matches!(self, CreditAllowance::Unlimited)
    }

    /// Finite allowance amount, if any.
    pub fn amount(&self) -> Option<i64> {
        match self {
            CreditAllowance::Limited(n) => Some(*n),
            CreditAllowance::Unlimited => None,
        }
    }
}

impl Default for CreditAllowance {
    fn default() -> Self {
        CreditAllowance::Limited(0)
    }
}

/// Spendable balance as seen by a caller: the stored credit count plus
/// whether the unlimited sentinel applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveBalance {
    pub credits: i64,
    pub unlimited: bool,
}

impl EffectiveBalance {
    pub fn covers(&self, amount: i64) -> bool {
        self.unlimited || self.credits >= amount
    }
}
