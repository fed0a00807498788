//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` wires an `AppState` to a [`BillingHarness`] so a route
//! test can seed the in-memory store and move the clock while the server runs.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use chrono::{DateTime, Utc};
use secrecy::SecretString;

use crate::{
    adapters::http::app_state::AppState,
    infra::config::{AppConfig, LogFormat},
    test_utils::{BillingHarness, test_datetime},
};

pub struct TestAppStateBuilder {
    now: DateTime<Utc>,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            now: test_datetime(),
        }
    }

    /// Start the fixed clock at `now` instead of [`test_datetime`].
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Build the state. The returned harness shares its store, clock and use
    /// cases with the state.
    pub fn build(self) -> (AppState, BillingHarness) {
        let harness = BillingHarness::at(self.now);

        let config = Arc::new(AppConfig {
            database_url: SecretString::new("postgres://unused".into()),
            bind_addr: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            database_max_connections: 1,
            expiry_sweep_enabled: false,
            expiry_sweep_interval_secs: 3600,
            log_format: LogFormat::Pretty,
        });

        let app_state = AppState {
            config,
            plan_use_cases: harness.plans.clone(),
            organization_use_cases: harness.organizations.clone(),
            subscription_use_cases: harness.subscriptions.clone(),
            invoice_use_cases: harness.invoices.clone(),
        };

        (app_state, harness)
    }
}
