use async_trait::async_trait;

use crate::app_error::AppResult;

/// Credit store - the single mutable shared resource of the ledger.
///
/// All mutation goes through `grant`/`consume`, each a single atomic
/// statement at the storage layer. No caller may read-then-write the
/// balance across two operations.
#[async_trait]
pub trait CreditStoreRepoTrait: Send + Sync {
    /// Current balance. Returns 0 when the user has no record yet;
    /// never fails with not-found.
    async fn get_balance(&self, user_id: &str) -> AppResult<i64>;

    /// Atomically add `amount` (must be > 0) to the balance, creating the
    /// record lazily, and return the new balance. Safe under concurrent
    /// grants for the same user.
    async fn grant(&self, user_id: &str, amount: i64) -> AppResult<i64>;

    /// Atomically subtract `amount` (must be > 0) if and only if the balance
    /// covers it, returning the new balance. Fails with
    /// `AppError::InsufficientCredits` otherwise, leaving the balance
    /// unchanged. Two concurrent consumers can never over-spend.
    async fn consume(&self, user_id: &str, amount: i64) -> AppResult<i64>;
}
