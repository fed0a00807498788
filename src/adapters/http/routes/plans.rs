use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::{
        helpers::pagination::PageRequest,
        use_cases::plan_catalog::{CreatePlanInput, UpdatePlanInput},
        validators::parse_id,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/active", get(list_active_plans))
        .route("/popular", get(list_popular_plans))
        .route("/slug/{slug}", get(get_plan_by_slug))
        .route(
            "/{plan_id}",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
        .route("/{plan_id}/activate", post(activate_plan))
        .route("/{plan_id}/deactivate", post(deactivate_plan))
        .route("/{plan_id}/set-popular", post(set_popular_plan))
}

async fn list_plans(
    State(app_state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> AppResult<impl IntoResponse> {
    let plans = app_state.plan_use_cases.list_plans(page).await?;
    Ok(Json(plans))
}

async fn list_active_plans(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let plans = app_state.plan_use_cases.list_active_plans().await?;
    Ok(Json(plans))
}

async fn list_popular_plans(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let plans = app_state.plan_use_cases.list_popular_plans().await?;
    Ok(Json(plans))
}

async fn get_plan(
    State(app_state): State<AppState>,
    Path(plan_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let plan_id = parse_id(&plan_id, "plan")?;
    let plan = app_state.plan_use_cases.get_plan(plan_id).await?;
    Ok(Json(plan))
}

async fn get_plan_by_slug(
    State(app_state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<impl IntoResponse> {
    let plan = app_state.plan_use_cases.get_plan_by_slug(&slug).await?;
    Ok(Json(plan))
}

async fn create_plan(
    State(app_state): State<AppState>,
    Json(input): Json<CreatePlanInput>,
) -> AppResult<impl IntoResponse> {
    let plan = app_state.plan_use_cases.create_plan(input).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

async fn update_plan(
    State(app_state): State<AppState>,
    Path(plan_id): Path<String>,
    Json(input): Json<UpdatePlanInput>,
) -> AppResult<impl IntoResponse> {
    let plan_id = parse_id(&plan_id, "plan")?;
    let plan = app_state.plan_use_cases.update_plan(plan_id, input).await?;
    Ok(Json(plan))
}

async fn delete_plan(
    State(app_state): State<AppState>,
    Path(plan_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let plan_id = parse_id(&plan_id, "plan")?;
    app_state.plan_use_cases.delete_plan(plan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn activate_plan(
    State(app_state): State<AppState>,
    Path(plan_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let plan_id = parse_id(&plan_id, "plan")?;
    let plan = app_state.plan_use_cases.activate_plan(plan_id).await?;
    Ok(Json(plan))
}

async fn deactivate_plan(
    State(app_state): State<AppState>,
    Path(plan_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let plan_id = parse_id(&plan_id, "plan")?;
    let plan = app_state.plan_use_cases.deactivate_plan(plan_id).await?;
    Ok(Json(plan))
}

async fn set_popular_plan(
    State(app_state): State<AppState>,
    Path(plan_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let plan_id = parse_id(&plan_id, "plan")?;
    let plan = app_state.plan_use_cases.set_popular_plan(plan_id).await?;
    Ok(Json(plan))
}
