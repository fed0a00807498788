//! Test utilities.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - An in-memory store implementing every repository trait
//! - A fixed clock and a harness wiring the use cases to both
//! - An `AppState` builder for route tests

mod app_state_builder;
mod billing_mocks;
mod clock;
mod factories;
mod harness;

pub use app_state_builder::*;
pub use billing_mocks::*;
pub use clock::*;
pub use factories::*;
pub use harness::*;
