use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::post,
};
use serde::Deserialize;

use crate::{
    adapters::http::{app_state::AppState, auth::authenticate},
    app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(create_analysis))
}

#[derive(Deserialize)]
struct AnalyzePayload {
    prompt: String,
}

async fn create_analysis(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AnalyzePayload>,
) -> AppResult<impl IntoResponse> {
    let ctx = authenticate(&headers, &app_state).await?;

    let analysis = app_state
        .analysis_use_cases
        .analyze(&ctx, &payload.prompt)
        .await?;

    Ok(Json(analysis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;

    use crate::test_utils::{TestAppStateBuilder, create_test_auth_context};

    fn test_server(app_state: AppState) -> TestServer {
        TestServer::new(router().with_state(app_state)).unwrap()
    }

    #[tokio::test]
    async fn analysis_requires_authentication() {
        let app_state = TestAppStateBuilder::new().build();
        let server = test_server(app_state);

        let response = server
            .post("/")
            .json(&serde_json::json!({"prompt": "improve this"}))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn analysis_spends_a_credit() {
        let ctx = create_test_auth_context("user_1", |_| {});
        let (app_state, mocks) = TestAppStateBuilder::new()
            .with_token("tok_1", ctx)
            .with_balance("user_1", 2)
            .build_with_mocks();
        let server = test_server(app_state);

        let response = server
            .post("/")
            .authorization_bearer("tok_1")
            .json(&serde_json::json!({"prompt": "improve this"}))
            .await;
        response.assert_status(StatusCode::OK);

        let body: serde_json::Value = response.json();
        assert!(body["improved_prompt"].is_string());
        assert_eq!(mocks.credits.get_balance("user_1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn analysis_with_empty_balance_returns_402() {
        let ctx = create_test_auth_context("user_broke", |_| {});
        let app_state = TestAppStateBuilder::new().with_token("tok_1", ctx).build();
        let server = test_server(app_state);

        let response = server
            .post("/")
            .authorization_bearer("tok_1")
            .json(&serde_json::json!({"prompt": "improve this"}))
            .await;
        response.assert_status(StatusCode::PAYMENT_REQUIRED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "INSUFFICIENT_CREDITS");
    }

    #[tokio::test]
    async fn analysis_under_unlimited_plan_ignores_balance() {
        let ctx = create_test_auth_context("user_vip", |c| {
            c.plan_name = Some("Plan User Unlimited".to_string());
        });
        let app_state = TestAppStateBuilder::new().with_token("tok_1", ctx).build();
        let server = test_server(app_state);

        let response = server
            .post("/")
            .authorization_bearer("tok_1")
            .json(&serde_json::json!({"prompt": "improve this"}))
            .await;
        response.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn analysis_rejects_empty_prompt() {
        let ctx = create_test_auth_context("user_1", |_| {});
        let app_state = TestAppStateBuilder::new()
            .with_token("tok_1", ctx)
            .with_balance("user_1", 2)
            .build();
        let server = test_server(app_state);

        let response = server
            .post("/")
            .authorization_bearer("tok_1")
            .json(&serde_json::json!({"prompt": "  "}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}
