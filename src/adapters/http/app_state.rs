use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    infra::config::AppConfig,
    use_cases::{
        invoice::InvoiceUseCases, organization::OrganizationUseCases,
        plan_catalog::PlanCatalogUseCases, subscription::SubscriptionUseCases,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub plan_use_cases: Arc<PlanCatalogUseCases>,
    pub organization_use_cases: Arc<OrganizationUseCases>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub invoice_use_cases: Arc<InvoiceUseCases>,
}

impl FromRef<AppState> for Arc<PlanCatalogUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.plan_use_cases.clone()
    }
}

impl FromRef<AppState> for Arc<OrganizationUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.organization_use_cases.clone()
    }
}

impl FromRef<AppState> for Arc<SubscriptionUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.subscription_use_cases.clone()
    }
}

impl FromRef<AppState> for Arc<InvoiceUseCases> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.invoice_use_cases.clone()
    }
}
