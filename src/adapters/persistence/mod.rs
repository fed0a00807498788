use sqlx::{PgPool, error::ErrorKind};

use crate::app_error::AppError;

const MAX_JSON_LOG_LEN: usize = 200;

/// Unique index that backs the one-open-subscription-per-organization rule.
const ONE_OPEN_SUBSCRIPTION_INDEX: &str = "subscriptions_one_open_per_org";

/// Parse JSON value to target type, logging warning on failure.
///
/// SQL NULL maps to the default without a warning. Only real parse failures
/// (type mismatches, corruption) are logged.
pub fn parse_json_with_fallback<T: serde::de::DeserializeOwned + Default>(
    json: &serde_json::Value,
    field_name: &str,
    entity_type: &str,
    entity_id: &str,
) -> T {
    if json.is_null() {
        return T::default();
    }

    serde_json::from_value(json.clone()).unwrap_or_else(|err| {
        let raw_str = json.to_string();
        let truncated = if raw_str.len() > MAX_JSON_LOG_LEN {
            let cut = raw_str
                .char_indices()
                .map(|(i, _)| i)
                .take_while(|i| *i <= MAX_JSON_LOG_LEN)
                .last()
                .unwrap_or(0);
            format!("{}...", &raw_str[..cut])
        } else {
            raw_str
        };

        tracing::warn!(
            field = field_name,
            entity_type = entity_type,
            entity_id = entity_id,
            raw_json = %truncated,
            error = %err,
            "Failed to parse JSON field, using default value"
        );
        T::default()
    })
}

pub mod invoice;
pub mod organization;
pub mod plan;
pub mod subscription;

#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    pub fn new(pool: PgPool) -> Self {
        PostgresPersistence { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                    if db_err.constraint() == Some(ONE_OPEN_SUBSCRIPTION_INDEX) =>
                {
                    AppError::Conflict("Organization already has an active subscription".into())
                }
                ErrorKind::UniqueViolation => {
                    AppError::Conflict("A record with this value already exists".into())
                }
                ErrorKind::ForeignKeyViolation => {
                    AppError::InvalidInput("Referenced record not found".into())
                }
                ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                    AppError::InvalidInput("Required field is missing or out of range".into())
                }
                _ => {
                    // Log the actual error, but don't expose details
                    tracing::error!(error = ?err, "Database error");
                    AppError::Storage("Database operation failed".into())
                }
            },
            _ => {
                tracing::error!(error = ?err, "Database error");
                AppError::Storage("Database operation failed".into())
            }
        }
    }
}
