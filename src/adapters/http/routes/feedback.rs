use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::{
        app_state::AppState,
        auth::{authenticate, maybe_authenticate},
    },
    app_error::AppResult,
    application::use_cases::feedback::{CreateFeedbackInput, FeedbackProfile},
    domain::entities::feedback::FeedbackCategory,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_feedback).post(submit_feedback))
}

#[derive(Deserialize)]
struct SubmitPayload {
    rating: i32,
    category: String,
    message: String,
    name: Option<String>,
    email: Option<String>,
    #[serde(default)]
    allow_public: bool,
}

#[derive(Serialize)]
struct FeedbackResponse {
    id: Uuid,
    rating: i32,
    category: FeedbackCategory,
    message: String,
    name: Option<String>,
    allow_public: bool,
}

impl From<FeedbackProfile> for FeedbackResponse {
    fn from(profile: FeedbackProfile) -> Self {
        FeedbackResponse {
            id: profile.id,
            rating: profile.rating,
            category: profile.category,
            message: profile.message,
            name: profile.name,
            allow_public: profile.allow_public,
        }
    }
}

#[derive(Serialize)]
struct FeedbackListResponse {
    items: Vec<FeedbackResponse>,
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    public: bool,
}

/// Feedback may be submitted anonymously; a presented token still has to be
/// valid.
async fn submit_feedback(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitPayload>,
) -> AppResult<impl IntoResponse> {
    let identity = maybe_authenticate(&headers, &app_state).await?;

    let input = CreateFeedbackInput {
        rating: payload.rating,
        category: payload.category,
        message: payload.message,
        name: payload.name,
        email: payload.email,
        allow_public: payload.allow_public,
    };

    let created = app_state
        .feedback_use_cases
        .submit(identity.as_ref(), &input)
        .await?;

    Ok((StatusCode::CREATED, Json(FeedbackResponse::from(created))))
}

/// `?public=true` lists publicly shareable feedback without authentication;
/// otherwise the caller's own submissions are returned.
async fn list_feedback(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> AppResult<impl IntoResponse> {
    let items = if params.public {
        app_state.feedback_use_cases.list_public().await?
    } else {
        let ctx = authenticate(&headers, &app_state).await?;
        app_state.feedback_use_cases.list_own(&ctx).await?
    };

    Ok(Json(FeedbackListResponse {
        items: items.into_iter().map(FeedbackResponse::from).collect(),
    }))
}
