use serde::{Deserialize, Serialize};

/// Status of a recorded one-time purchase.
///
/// A row is created as `pending` by webhook reconciliation, moves to
/// `complete` once the credit grant succeeds, or to `failed` when grant
/// retries are exhausted. `complete` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "purchase_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Complete,
    Failed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Complete => "complete",
            PurchaseStatus::Failed => "failed",
        }
    }

    /// Terminal statuses are never overwritten by later webhook deliveries.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PurchaseStatus::Complete)
    }
}

impl Default for PurchaseStatus {
    fn default() -> Self {
        PurchaseStatus::Pending
    }
}

impl std::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PurchaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PurchaseStatus::Pending),
            "complete" => Ok(PurchaseStatus::Complete),
            "failed" => Ok(PurchaseStatus::Failed),
            _ => Err(format!("Invalid purchase status: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round_trip() {
        for status in [
            PurchaseStatus::Pending,
            PurchaseStatus::Complete,
            PurchaseStatus::Failed,
        ] {
            assert_eq!(PurchaseStatus::from_str(status.as_str()), Ok(status));
        }
        assert!(PurchaseStatus::from_str("refunded").is_err());
    }

    #[test]
    fn test_is_terminal() {
        assert!(PurchaseStatus::Complete.is_terminal());
        assert!(!PurchaseStatus::Pending.is_terminal());
        assert!(!PurchaseStatus::Failed.is_terminal());
    }
}
