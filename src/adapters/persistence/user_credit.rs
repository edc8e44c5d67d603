use async_trait::async_trait;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::credits::CreditStoreRepoTrait,
};

#[async_trait]
impl CreditStoreRepoTrait for PostgresPersistence {
    async fn get_balance(&self, user_id: &str) -> AppResult<i64> {
        let credits: Option<i64> =
            sqlx::query_scalar("SELECT credits FROM user_credits WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await
                .map_err(AppError::from)?;

        Ok(credits.unwrap_or(0))
    }

    async fn grant(&self, user_id: &str, amount: i64) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "grant amount must be positive".into(),
            ));
        }

        // Single-statement upsert increment; safe under concurrent grants.
        let credits: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO user_credits (user_id, credits)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET
                credits = user_credits.credits + EXCLUDED.credits,
                updated_at = CURRENT_TIMESTAMP
            RETURNING credits
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(credits)
    }

    async fn consume(&self, user_id: &str, amount: i64) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::ValidationError(
                "consume amount must be positive".into(),
            ));
        }

        // Atomic conditional decrement; the guard clause makes concurrent
        // over-spend impossible. Zero rows means the balance didn't cover
        // the amount (including the no-row-yet case).
        let credits: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE user_credits SET
                credits = credits - $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1 AND credits >= $2
            RETURNING credits
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        credits.ok_or(AppError::InsufficientCredits)
    }
}
