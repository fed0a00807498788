use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::{
        helpers::pagination::PageRequest,
        use_cases::organization::{CreateOrganizationInput, UpdateOrganizationInput},
        validators::parse_id,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_organizations).post(create_organization))
        .route("/slug/{slug}", get(get_organization_by_slug))
        .route(
            "/{organization_id}",
            get(get_organization)
                .put(update_organization)
                .delete(delete_organization),
        )
}

async fn create_organization(
    State(app_state): State<AppState>,
    Json(input): Json<CreateOrganizationInput>,
) -> AppResult<impl IntoResponse> {
    let organization = app_state
        .organization_use_cases
        .create_organization(input)
        .await?;
    Ok((StatusCode::CREATED, Json(organization)))
}

async fn list_organizations(
    State(app_state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> AppResult<impl IntoResponse> {
    let organizations = app_state
        .organization_use_cases
        .list_organizations(page)
        .await?;
    Ok(Json(organizations))
}

async fn get_organization(
    State(app_state): State<AppState>,
    Path(organization_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let organization_id = parse_id(&organization_id, "organization")?;
    let organization = app_state
        .organization_use_cases
        .get_organization(organization_id)
        .await?;
    Ok(Json(organization))
}

async fn get_organization_by_slug(
    State(app_state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<impl IntoResponse> {
    let organization = app_state
        .organization_use_cases
        .get_organization_by_slug(&slug)
        .await?;
    Ok(Json(organization))
}

async fn update_organization(
    State(app_state): State<AppState>,
    Path(organization_id): Path<String>,
    Json(input): Json<UpdateOrganizationInput>,
) -> AppResult<impl IntoResponse> {
    let organization_id = parse_id(&organization_id, "organization")?;
    let organization = app_state
        .organization_use_cases
        .update_organization(organization_id, input)
        .await?;
    Ok(Json(organization))
}

async fn delete_organization(
    State(app_state): State<AppState>,
    Path(organization_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let organization_id = parse_id(&organization_id, "organization")?;
    app_state
        .organization_use_cases
        .delete_organization(organization_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
