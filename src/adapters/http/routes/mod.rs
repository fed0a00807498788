pub mod admin;
pub mod invoices;
pub mod organizations;
pub mod plans;
pub mod subscriptions;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/plans", plans::router())
        .nest("/organizations", organizations::router())
        .nest("/subscriptions", subscriptions::router())
        .nest("/invoices", invoices::router())
        .nest("/admin", admin::router())
}
