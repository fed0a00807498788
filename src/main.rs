use dotenvy::dotenv;
use tracing::info;

use std::net::SocketAddr;
use std::time::Duration;
use tenant_billing::infra::{
    app::create_app,
    config::AppConfig,
    expiry_sweeper::run_expiry_sweep_loop,
    setup::{init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let sweep_enabled = config.expiry_sweep_enabled;
    let sweep_every = Duration::from_secs(config.expiry_sweep_interval_secs);

    let app_state = init_app_state(config).await?;

    let bind_addr = app_state.config.bind_addr;

    if sweep_enabled {
        let subscriptions = app_state.subscription_use_cases.clone();
        tokio::spawn(async move {
            run_expiry_sweep_loop(subscriptions, sweep_every).await;
        });
    } else {
        info!("Expiry sweeper disabled (EXPIRY_SWEEP_ENABLED=false)");
    }

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
