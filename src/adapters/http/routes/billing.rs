use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::{app_state::AppState, auth::authenticate},
    app_error::AppResult,
    application::use_cases::billing::PurchaseProfile,
    domain::entities::purchase::PurchaseStatus,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(create_checkout))
        .route("/portal", post(create_portal))
        .route("/purchases", get(list_purchases))
}

#[derive(Deserialize)]
struct CheckoutPayload {
    product_id: String,
}

async fn create_checkout(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CheckoutPayload>,
) -> AppResult<impl IntoResponse> {
    let ctx = authenticate(&headers, &app_state).await?;

    let checkout = app_state
        .billing_use_cases
        .create_checkout(&ctx, &payload.product_id)
        .await?;

    Ok(Json(checkout))
}

#[derive(Serialize)]
struct PortalResponse {
    portal_url: String,
}

async fn create_portal(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let ctx = authenticate(&headers, &app_state).await?;

    let portal_url = app_state.billing_use_cases.create_portal_session(&ctx).await?;

    Ok(Json(PortalResponse { portal_url }))
}

#[derive(Serialize)]
struct PurchaseResponse {
    id: Uuid,
    product_id: String,
    credits: i64,
    status: PurchaseStatus,
    created_at: Option<NaiveDateTime>,
}

impl From<PurchaseProfile> for PurchaseResponse {
    fn from(purchase: PurchaseProfile) -> Self {
        PurchaseResponse {
            id: purchase.id,
            product_id: purchase.product_id,
            credits: purchase.credits,
            status: purchase.status,
            created_at: purchase.created_at,
        }
    }
}

#[derive(Serialize)]
struct PurchaseListResponse {
    items: Vec<PurchaseResponse>,
}

async fn list_purchases(
    State(app_state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<impl IntoResponse> {
    let ctx = authenticate(&headers, &app_state).await?;

    let purchases = app_state
        .billing_use_cases
        .list_purchases(&ctx.user_id)
        .await?;

    Ok(Json(PurchaseListResponse {
        items: purchases.into_iter().map(PurchaseResponse::from).collect(),
    }))
}
