use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::identity_provider::AuthContext,
    application::validators::{is_valid_email, is_valid_feedback_message, is_valid_rating},
    domain::entities::feedback::FeedbackCategory,
};

/// Public listing is unauthenticated; a hard cap keeps it cheap.
pub const PUBLIC_FEEDBACK_LIMIT: i64 = 100;

#[derive(Debug, Clone)]
pub struct FeedbackProfile {
    pub id: Uuid,
    pub user_id: String,
    pub rating: i32,
    pub category: FeedbackCategory,
    pub message: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub allow_public: bool,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone)]
pub struct CreateFeedbackInput {
    pub rating: i32,
    /// Raw category string; validated against the declared enum values.
    pub category: String,
    pub message: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub allow_public: bool,
}

#[async_trait]
pub trait FeedbackRepoTrait: Send + Sync {
    async fn create(
        &self,
        user_id: &str,
        rating: i32,
        category: FeedbackCategory,
        message: &str,
        name: Option<&str>,
        email: Option<&str>,
        allow_public: bool,
    ) -> AppResult<FeedbackProfile>;

    /// Feedback marked public, newest first.
    async fn list_public(&self, limit: i64) -> AppResult<Vec<FeedbackProfile>>;

    /// One user's own submissions, newest first.
    async fn list_by_user(&self, user_id: &str) -> AppResult<Vec<FeedbackProfile>>;
}

#[derive(Clone)]
pub struct FeedbackUseCases {
    repo: Arc<dyn FeedbackRepoTrait>,
}

impl FeedbackUseCases {
    pub fn new(repo: Arc<dyn FeedbackRepoTrait>) -> Self {
        Self { repo }
    }

    /// Persist a feedback submission. Anonymous callers get a generated
    /// surrogate user id.
    #[instrument(skip(self, identity, input))]
    pub async fn submit(
        &self,
        identity: Option<&AuthContext>,
        input: &CreateFeedbackInput,
    ) -> AppResult<FeedbackProfile> {
        if !is_valid_rating(input.rating) {
            return Err(AppError::ValidationError(
                "rating must be between 1 and 5".into(),
            ));
        }
        let category = FeedbackCategory::from_str(&input.category).map_err(|_| {
            AppError::ValidationError(format!("unknown feedback category: {}", input.category))
        })?;
        if !is_valid_feedback_message(&input.message) {
            return Err(AppError::ValidationError(
                "message must be non-empty and at most 5000 characters".into(),
            ));
        }
        if let Some(email) = input.email.as_deref()
            && !is_valid_email(email)
        {
            return Err(AppError::ValidationError("invalid email address".into()));
        }

        let user_id = match identity {
            Some(ctx) => ctx.user_id.clone(),
            None => format!("anon_{}", Uuid::new_v4().simple()),
        };

        self.repo
            .create(
                &user_id,
                input.rating,
                category,
                input.message.trim(),
                input.name.as_deref(),
                input.email.as_deref(),
                input.allow_public,
            )
            .await
    }

    pub async fn list_public(&self) -> AppResult<Vec<FeedbackProfile>> {
        self.repo.list_public(PUBLIC_FEEDBACK_LIMIT).await
    }

    pub async fn list_own(&self, ctx: &AuthContext) -> AppResult<Vec<FeedbackProfile>> {
        self.repo.list_by_user(&ctx.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::InMemoryFeedbackRepo;

    fn input(overrides: impl FnOnce(&mut CreateFeedbackInput)) -> CreateFeedbackInput {
        let mut input = CreateFeedbackInput {
            rating: 5,
            category: "general".to_string(),
            message: "Love it".to_string(),
            name: None,
            email: None,
            allow_public: false,
        };
        overrides(&mut input);
        input
    }

    fn ctx(user_id: &str) -> AuthContext {
        AuthContext {
            user_id: user_id.to_string(),
            org_id: None,
            plan_name: None,
        }
    }

    #[tokio::test]
    async fn rejects_out_of_range_rating() {
        let repo = Arc::new(InMemoryFeedbackRepo::new());
        let feedback = FeedbackUseCases::new(repo.clone());

        let result = feedback
            .submit(Some(&ctx("user_1")), &input(|i| i.rating = 6))
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
        // Nothing persisted.
        assert!(repo.list_by_user("user_1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_category() {
        let repo = Arc::new(InMemoryFeedbackRepo::new());
        let feedback = FeedbackUseCases::new(repo);

        let result = feedback
            .submit(Some(&ctx("user_1")), &input(|i| i.category = "rant".into()))
            .await;
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn rejects_empty_message_and_bad_email() {
        let repo = Arc::new(InMemoryFeedbackRepo::new());
        let feedback = FeedbackUseCases::new(repo);

        assert!(matches!(
            feedback
                .submit(Some(&ctx("user_1")), &input(|i| i.message = "  ".into()))
                .await,
            Err(AppError::ValidationError(_))
        ));
        assert!(matches!(
            feedback
                .submit(
                    Some(&ctx("user_1")),
                    &input(|i| i.email = Some("not-an-email".into()))
                )
                .await,
            Err(AppError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn anonymous_submission_gets_surrogate_user_id() {
        let repo = Arc::new(InMemoryFeedbackRepo::new());
        let feedback = FeedbackUseCases::new(repo);

        let created = feedback
            .submit(None, &input(|i| i.allow_public = true))
            .await
            .unwrap();
        assert!(created.user_id.starts_with("anon_"));

        // Honored by the public listing.
        let public = feedback.list_public().await.unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, created.id);
    }

    #[tokio::test]
    async fn private_feedback_is_not_listed_publicly() {
        let repo = Arc::new(InMemoryFeedbackRepo::new());
        let feedback = FeedbackUseCases::new(repo);

        feedback
            .submit(Some(&ctx("user_1")), &input(|i| i.allow_public = false))
            .await
            .unwrap();

        assert!(feedback.list_public().await.unwrap().is_empty());
        assert_eq!(feedback.list_own(&ctx("user_1")).await.unwrap().len(), 1);
    }
}
