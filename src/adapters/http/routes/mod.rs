pub mod analyses;
pub mod billing;
pub mod credits;
pub mod feedback;
pub mod webhooks;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/credits", credits::router())
        .nest("/webhooks", webhooks::router())
        .nest("/feedback", feedback::router())
        .nest("/billing", billing::router())
        .nest("/analyses", analyses::router())
}
