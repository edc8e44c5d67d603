use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;

use crate::{
    adapters::http::{app_state::AppState, auth::authenticate},
    app_error::AppResult,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_credits))
}

#[derive(Serialize)]
struct CreditsResponse {
    credits: i64,
    unlimited: bool,
}

async fn get_credits(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let ctx = authenticate(&headers, &app_state).await?;

    let balance = app_state
        .entitlement_use_cases
        .effective_balance(&ctx.user_id, ctx.plan_name.as_deref())
        .await?;

    Ok(Json(CreditsResponse {
        credits: balance.credits,
        unlimited: balance.unlimited,
    }))
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
    async fn credits_without_token_returns_401() {
        let app_state = TestAppStateBuilder::new().build();
        let server = test_server(app_state);

        let response = server.get("/").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn credits_with_unknown_token_returns_401() {
        let app_state = TestAppStateBuilder::new().build();
        let server = test_server(app_state);

        let response = server.get("/").authorization_bearer("tok_unknown").await;
        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn credits_returns_stored_balance() {
        let ctx = create_test_auth_context("user_1", |_| {});
        let app_state = TestAppStateBuilder::new()
            .with_token("tok_1", ctx)
            .with_balance("user_1", 42)
            .build();
        let server = test_server(app_state);

        let response = server.get("/").authorization_bearer("tok_1").await;
        response.assert_status(StatusCode::OK);
        response.assert_json(&serde_json::json!({"credits": 42, "unlimited": false}));
    }

    #[tokio::test]
    async fn credits_defaults_to_zero_for_new_user() {
        let ctx = create_test_auth_context("user_new", |_| {});
        let app_state = TestAppStateBuilder::new().with_token("tok_1", ctx).build();
        let server = test_server(app_state);

        let response = server.get("/").authorization_bearer("tok_1").await;
        response.assert_status(StatusCode::OK);
        response.assert_json(&serde_json::json!({"credits": 0, "unlimited": false}));
    }

    #[tokio::test]
    async fn credits_reports_unlimited_plan() {
        let ctx = create_test_auth_context("user_1", |c| {
            c.plan_name = Some("Plan User Unlimited".to_string());
        });
        let app_state = TestAppStateBuilder::new()
            .with_token("tok_1", ctx)
            .with_balance("user_1", 7)
            .build();
        let server = test_server(app_state);

        let response = server.get("/").authorization_bearer("tok_1").await;
        response.assert_status(StatusCode::OK);
        response.assert_json(&serde_json::json!({"credits": 7, "unlimited": true}));
    }
}
