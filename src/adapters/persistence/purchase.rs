use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::billing::{
        PurchaseLedgerRepoTrait, PurchaseProfile, RecordPurchaseInput, RecordedPurchase,
    },
    domain::entities::purchase::PurchaseStatus,
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> PurchaseProfile {
    PurchaseProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        product_id: row.get("product_id"),
        price_id: row.get("price_id"),
        payment_intent_id: row.get("payment_intent_id"),
        session_id: row.get("session_id"),
        customer_id: row.get("customer_id"),
        credits: row.get("credits"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, user_id, product_id, price_id, payment_intent_id, session_id,
    customer_id, credits, status, created_at, updated_at
"#;

#[async_trait]
impl PurchaseLedgerRepoTrait for PostgresPersistence {
    async fn record_if_new(&self, input: &RecordPurchaseInput) -> AppResult<RecordedPurchase> {
        let id = Uuid::new_v4();

        // ON CONFLICT DO NOTHING across both unique keys: the insert either
        // claims the event or returns no row, atomically.
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO purchases (
                id, user_id, product_id, price_id, payment_intent_id,
                session_id, customer_id, credits, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending')
            ON CONFLICT DO NOTHING
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(id)
        .bind(&input.user_id)
        .bind(&input.product_id)
        .bind(&input.price_id)
        .bind(&input.payment_intent_id)
        .bind(&input.session_id)
        .bind(&input.customer_id)
        .bind(input.credits)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        if let Some(row) = inserted {
            return Ok(RecordedPurchase {
                created: true,
                purchase: row_to_profile(row),
            });
        }

        // Conflict on either idempotency key - return the existing record.
        let existing = sqlx::query(&format!(
            "SELECT {} FROM purchases WHERE payment_intent_id = $1 OR session_id = $2",
            SELECT_COLS
        ))
        .bind(&input.payment_intent_id)
        .bind(&input.session_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| AppError::Internal("purchase insert conflicted but no row found".into()))?;

        Ok(RecordedPurchase {
            created: false,
            purchase: row_to_profile(existing),
        })
    }

    async fn claim_for_grant(
        &self,
        payment_intent_id: &str,
        stale_after_secs: i64,
    ) -> AppResult<bool> {
        // CAS on the status row: only one concurrent caller sees the guard
        // condition hold. Refreshing updated_at makes the losing caller's
        // staleness check fail.
        let result = sqlx::query(
            r#"
            UPDATE purchases SET
                status = 'pending',
                updated_at = CURRENT_TIMESTAMP
            WHERE payment_intent_id = $1
              AND (
                status = 'failed'
                OR (status = 'pending'
                    AND updated_at < CURRENT_TIMESTAMP - make_interval(secs => $2))
              )
            "#,
        )
        .bind(payment_intent_id)
        .bind(stale_after_secs as f64)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(result.rows_affected() == 1)
    }

    async fn finalize(&self, payment_intent_id: &str, status: PurchaseStatus) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE purchases SET
                status = $2,
                updated_at = CURRENT_TIMESTAMP
            WHERE payment_intent_id = $1 AND status <> 'complete'
            "#,
        )
        .bind(payment_intent_id)
        .bind(status)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM purchases WHERE payment_intent_id = $1")
                    .bind(payment_intent_id)
                    .fetch_optional(self.pool())
                    .await
                    .map_err(AppError::from)?;

            if exists.is_some() {
                tracing::debug!(
                    payment_intent_id,
                    "Purchase finalize skipped - already complete"
                );
            } else {
                tracing::warn!(payment_intent_id, "Purchase finalize failed - not found");
            }
        }

        Ok(())
    }

    async fn get_by_payment_intent(
        &self,
        payment_intent_id: &str,
    ) -> AppResult<Option<PurchaseProfile>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM purchases WHERE payment_intent_id = $1",
            SELECT_COLS
        ))
        .bind(payment_intent_id)
        .fetch_optional(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row.map(row_to_profile))
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<PurchaseProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM purchases
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
            SELECT_COLS
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_profile).collect())
    }
}
