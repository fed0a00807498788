use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::{
        helpers::pagination::PageRequest,
        use_cases::subscription::CreateSubscriptionInput,
        validators::parse_id,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route("/{subscription_id}", get(get_subscription))
        .route("/{subscription_id}/cancel", post(cancel_subscription))
        .route("/{subscription_id}/renew", post(renew_subscription))
        .route("/{subscription_id}/activate-trial", post(activate_trial))
        .route(
            "/organization/{organization_id}",
            get(list_organization_subscriptions),
        )
        .route(
            "/organization/{organization_id}/active",
            get(get_current_subscription),
        )
}

#[derive(Deserialize)]
struct CreateSubscriptionRequest {
    organization_id: String,
    plan_id: String,
    auto_renew: Option<bool>,
}

#[derive(Deserialize, Default)]
struct CancelSubscriptionRequest {
    #[serde(default)]
    immediate: bool,
}

async fn create_subscription(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateSubscriptionRequest>,
) -> AppResult<impl IntoResponse> {
    let input = CreateSubscriptionInput {
        organization_id: parse_id(&payload.organization_id, "organization")?,
        plan_id: parse_id(&payload.plan_id, "plan")?,
        auto_renew: payload.auto_renew.unwrap_or(true),
    };

    let created = app_state
        .subscription_use_cases
        .create_subscription(input)
        .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_subscriptions(
    State(app_state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> AppResult<impl IntoResponse> {
    let subscriptions = app_state
        .subscription_use_cases
        .list_subscriptions(page)
        .await?;
    Ok(Json(subscriptions))
}

async fn get_subscription(
    State(app_state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let subscription_id = parse_id(&subscription_id, "subscription")?;
    let details = app_state
        .subscription_use_cases
        .get_subscription(subscription_id)
        .await?;
    Ok(Json(details))
}

async fn cancel_subscription(
    State(app_state): State<AppState>,
    Path(subscription_id): Path<String>,
    payload: Option<Json<CancelSubscriptionRequest>>,
) -> AppResult<impl IntoResponse> {
    let subscription_id = parse_id(&subscription_id, "subscription")?;
    let Json(request) = payload.unwrap_or_default();

    let subscription = app_state
        .subscription_use_cases
        .cancel_subscription(subscription_id, request.immediate)
        .await?;
    Ok(Json(subscription))
}

async fn renew_subscription(
    State(app_state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let subscription_id = parse_id(&subscription_id, "subscription")?;
    let outcome = app_state
        .subscription_use_cases
        .renew_subscription(subscription_id)
        .await?;
    Ok(Json(outcome))
}

async fn activate_trial(
    State(app_state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let subscription_id = parse_id(&subscription_id, "subscription")?;
    let outcome = app_state
        .subscription_use_cases
        .activate_trial(subscription_id)
        .await?;
    Ok(Json(outcome))
}

async fn list_organization_subscriptions(
    State(app_state): State<AppState>,
    Path(organization_id): Path<String>,
    Query(page): Query<PageRequest>,
) -> AppResult<impl IntoResponse> {
    let organization_id = parse_id(&organization_id, "organization")?;
    let subscriptions = app_state
        .subscription_use_cases
        .list_organization_subscriptions(organization_id, page)
        .await?;
    Ok(Json(subscriptions))
}

async fn get_current_subscription(
    State(app_state): State<AppState>,
    Path(organization_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let organization_id = parse_id(&organization_id, "organization")?;
    let details = app_state
        .subscription_use_cases
        .get_current_subscription(organization_id)
        .await?;
    Ok(Json(details))
}
