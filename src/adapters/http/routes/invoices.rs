use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::{
        helpers::pagination::PageRequest, use_cases::invoice::DateRangeQuery,
        validators::parse_id,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_invoices))
        .route("/overdue", get(list_overdue_invoices))
        .route("/date-range", get(list_invoices_by_date_range))
        .route("/number/{invoice_number}", get(get_invoice_by_number))
        .route("/organization/{organization_id}", get(list_organization_invoices))
        .route("/subscription/{subscription_id}", get(list_subscription_invoices))
        .route("/{invoice_id}", get(get_invoice))
}

#[derive(Deserialize)]
struct DateRangeParams {
    start_date: Option<String>,
    end_date: Option<String>,
    page: Option<u32>,
    #[serde(alias = "limit")]
    per_page: Option<u32>,
}

fn parse_date(value: &str, field: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AppError::InvalidInput(format!("Invalid {} format. Use YYYY-MM-DD", field))
    })
}

async fn list_invoices(
    State(app_state): State<AppState>,
    Query(page): Query<PageRequest>,
) -> AppResult<impl IntoResponse> {
    let invoices = app_state.invoice_use_cases.list_invoices(page).await?;
    Ok(Json(invoices))
}

async fn get_invoice(
    State(app_state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let invoice_id = parse_id(&invoice_id, "invoice")?;
    let invoice = app_state.invoice_use_cases.get_invoice(invoice_id).await?;
    Ok(Json(invoice))
}

async fn get_invoice_by_number(
    State(app_state): State<AppState>,
    Path(invoice_number): Path<String>,
) -> AppResult<impl IntoResponse> {
    let invoice = app_state
        .invoice_use_cases
        .get_invoice_by_number(&invoice_number)
        .await?;
    Ok(Json(invoice))
}

async fn list_organization_invoices(
    State(app_state): State<AppState>,
    Path(organization_id): Path<String>,
    Query(page): Query<PageRequest>,
) -> AppResult<impl IntoResponse> {
    let organization_id = parse_id(&organization_id, "organization")?;
    let invoices = app_state
        .invoice_use_cases
        .list_organization_invoices(organization_id, page)
        .await?;
    Ok(Json(invoices))
}

async fn list_subscription_invoices(
    State(app_state): State<AppState>,
    Path(subscription_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let subscription_id = parse_id(&subscription_id, "subscription")?;
    let invoices = app_state
        .invoice_use_cases
        .list_subscription_invoices(subscription_id)
        .await?;
    Ok(Json(invoices))
}

async fn list_overdue_invoices(State(app_state): State<AppState>) -> AppResult<impl IntoResponse> {
    let invoices = app_state.invoice_use_cases.list_overdue_invoices().await?;
    Ok(Json(invoices))
}

async fn list_invoices_by_date_range(
    State(app_state): State<AppState>,
    Query(params): Query<DateRangeParams>,
) -> AppResult<impl IntoResponse> {
    let (Some(start), Some(end)) = (params.start_date.as_deref(), params.end_date.as_deref())
    else {
        return Err(AppError::InvalidInput(
            "start_date and end_date are required".into(),
        ));
    };

    let range = DateRangeQuery::whole_days(
        parse_date(start, "start_date")?,
        parse_date(end, "end_date")?,
    )?;
    let defaults = PageRequest::default();
    let page = PageRequest::new(
        params.page.unwrap_or(defaults.page),
        params.per_page.unwrap_or(defaults.per_page),
    );

    let invoices = app_state
        .invoice_use_cases
        .list_invoices_by_date_range(range, page)
        .await?;
    Ok(Json(invoices))
}
