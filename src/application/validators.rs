use std::collections::HashSet;

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::plan::BillingInterval,
};

pub const PLAN_NAME_MIN_LEN: usize = 2;
pub const PLAN_NAME_MAX_LEN: usize = 100;
pub const PLAN_DESCRIPTION_MIN_LEN: usize = 10;
pub const PLAN_DESCRIPTION_MAX_LEN: usize = 500;
pub const MAX_TRIAL_DAYS: i32 = 365;
pub const ORGANIZATION_NAME_MIN_LEN: usize = 2;
pub const ORGANIZATION_NAME_MAX_LEN: usize = 100;
pub const ORGANIZATION_DESCRIPTION_MAX_LEN: usize = 500;

static SUPPORTED_CURRENCIES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "USD", "EUR", "GBP", "CAD", "AUD", "JPY", "CHF", "CNY", "INR", "BRL", "MXN", "SGD", "HKD",
        "NOK", "SEK", "DKK", "PLN", "CZK", "HUF", "RUB", "ZAR", "KRW", "THB", "MYR", "PHP", "IDR",
        "VND",
    ]
    .into_iter()
    .collect()
});

/// Three uppercase letters from the supported set. Case-sensitive.
pub fn is_valid_currency(code: &str) -> bool {
    SUPPORTED_CURRENCIES.contains(code)
}

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

pub fn parse_interval(value: &str) -> AppResult<BillingInterval> {
    value.parse().map_err(|_| {
        AppError::InvalidInput(format!(
            "Invalid billing interval '{}': expected weekly, monthly or yearly",
            value
        ))
    })
}

pub fn parse_id(value: &str, what: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value.trim()).map_err(|_| AppError::InvalidInput(format!("Invalid {} ID", what)))
}

pub fn validate_currency(code: &str) -> AppResult<()> {
    if is_valid_currency(code) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Unsupported currency '{}'",
            code
        )))
    }
}

pub fn validate_price(price: Decimal) -> AppResult<()> {
    if price < Decimal::ZERO {
        return Err(AppError::InvalidInput("Price cannot be negative".into()));
    }
    // Stored as NUMERIC(12, 2).
    if price.normalize().scale() > 2 {
        return Err(AppError::InvalidInput(
            "Price cannot have more than 2 decimal places".into(),
        ));
    }
    Ok(())
}

pub fn validate_length(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(AppError::InvalidInput(format!(
            "{} must be between {} and {} characters",
            field, min, max
        )));
    }
    Ok(())
}

pub fn validate_features(features: &[String]) -> AppResult<()> {
    if features.is_empty() {
        return Err(AppError::InvalidInput(
            "At least one feature is required".into(),
        ));
    }
    if features.iter().any(|f| f.trim().is_empty()) {
        return Err(AppError::InvalidInput("Features cannot be blank".into()));
    }
    Ok(())
}

pub fn validate_trial_days(days: i32) -> AppResult<()> {
    if !(0..=MAX_TRIAL_DAYS).contains(&days) {
        return Err(AppError::InvalidInput(format!(
            "Trial days must be between 0 and {}",
            MAX_TRIAL_DAYS
        )));
    }
    Ok(())
}
