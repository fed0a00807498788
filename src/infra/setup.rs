use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    adapters::http::app_state::AppState,
    application::{
        ports::{clock::SystemClock, ids::UuidV4Generator},
        use_cases::{
            invoice::{InvoiceGenerator, InvoiceUseCases},
            organization::OrganizationUseCases,
            plan_catalog::PlanCatalogUseCases,
            subscription::SubscriptionUseCases,
        },
    },
    infra::{
        config::{AppConfig, LogFormat},
        postgres_persistence,
    },
};

pub async fn init_app_state(config: AppConfig) -> anyhow::Result<AppState> {
    let postgres_arc = Arc::new(
        postgres_persistence(&config.database_url, config.database_max_connections).await?,
    );
    let clock = Arc::new(SystemClock);
    let ids = Arc::new(UuidV4Generator);

    let invoice_generator = Arc::new(InvoiceGenerator::new(
        postgres_arc.clone(),
        clock.clone(),
        ids.clone(),
    ));

    let plan_use_cases = PlanCatalogUseCases::new(postgres_arc.clone(), clock.clone(), ids.clone());

    let organization_use_cases = OrganizationUseCases::new(
        postgres_arc.clone(),
        clock.clone(),
        ids.clone(),
    );

    let subscription_use_cases = SubscriptionUseCases::new(
        postgres_arc.clone(),
        postgres_arc.clone(),
        postgres_arc.clone(),
        invoice_generator,
        clock.clone(),
        ids,
    );

    let invoice_use_cases = InvoiceUseCases::new(postgres_arc.clone(), postgres_arc, clock);

    Ok(AppState {
        config: Arc::new(config),
        plan_use_cases: Arc::new(plan_use_cases),
        organization_use_cases: Arc::new(organization_use_cases),
        subscription_use_cases: Arc::new(subscription_use_cases),
        invoice_use_cases: Arc::new(invoice_use_cases),
    })
}

pub fn init_tracing(log_format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tenant_billing=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = (log_format == LogFormat::Pretty).then(|| {
        fmt::layer()
            .with_target(false)
            .with_level(true)
            .pretty()
    });

    // Structured JSON logs for log shippers
    let json_layer = (log_format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
