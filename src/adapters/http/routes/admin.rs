use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};

use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    use_cases::subscription::SubscriptionUseCases,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/sweep", post(run_expiry_sweep))
}

/// Runs one expiry sweep on demand. Returns 409 while another sweep holds the lock.
async fn run_expiry_sweep(
    State(subscriptions): State<Arc<SubscriptionUseCases>>,
) -> AppResult<impl IntoResponse> {
    let report = subscriptions.process_expired().await?;
    Ok(Json(report))
}
