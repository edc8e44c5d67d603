use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::feedback::{FeedbackProfile, FeedbackRepoTrait},
    domain::entities::feedback::FeedbackCategory,
};

fn row_to_profile(row: sqlx::postgres::PgRow) -> FeedbackProfile {
    FeedbackProfile {
        id: row.get("id"),
        user_id: row.get("user_id"),
        rating: row.get("rating"),
        category: row.get("category"),
        message: row.get("message"),
        name: row.get("name"),
        email: row.get("email"),
        allow_public: row.get("allow_public"),
        created_at: row.get("created_at"),
    }
}

const SELECT_COLS: &str =
    "id, user_id, rating, category, message, name, email, allow_public, created_at";

#[async_trait]
impl FeedbackRepoTrait for PostgresPersistence {
    async fn create(
        &self,
        user_id: &str,
        rating: i32,
        category: FeedbackCategory,
        message: &str,
        name: Option<&str>,
        email: Option<&str>,
        allow_public: bool,
    ) -> AppResult<FeedbackProfile> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO feedback (id, user_id, rating, category, message, name, email, allow_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(rating)
        .bind(category)
        .bind(message)
        .bind(name)
        .bind(email)
        .bind(allow_public)
        .fetch_one(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(row_to_profile(row))
    }

    async fn list_public(&self, limit: i64) -> AppResult<Vec<FeedbackProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM feedback
            WHERE allow_public = TRUE
            ORDER BY created_at DESC
            LIMIT $1
            "#,
            SELECT_COLS
        ))
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(AppError::from)?;

        Ok(rows.into_iter().map(row_to_profile).collect())
    }

    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<FeedbackProfile>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM feedback
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
