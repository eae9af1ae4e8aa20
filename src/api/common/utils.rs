use std::future::Future;
use std::time::Duration;

use crate::errors::{AppError, StoreError};

/// Upper bound for a single store call made on behalf of a request.
pub const STORE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn timeout_store<T, F>(fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(STORE_TIMEOUT, fut).await {
        Ok(Ok(res)) => Ok(res),
        Ok(Err(e)) => Err(AppError::from(e)),
        Err(elapsed) => {
            tracing::error!("Store call exceeded {:?}", STORE_TIMEOUT);
            Err(AppError::Timeout(elapsed))
        }
    }
}

/// Applies a default when `requested` is missing and keeps it within `1..=max`.
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max)
}

/// Trimmed, non-empty query value or a validation error naming `field`.
pub fn required_param(value: Option<&str>, field: &str) -> Result<String, AppError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::Validation(format!("{} is required", field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_default_and_clamp() {
        assert_eq!(clamp_limit(None, 20, 100), 20);
        assert_eq!(clamp_limit(Some(500), 20, 100), 100);
        assert_eq!(clamp_limit(Some(0), 20, 100), 1);
        assert_eq!(clamp_limit(Some(7), 10, 50), 7);
    }

    #[test]
    fn blank_parameters_are_rejected() {
        assert_eq!(required_param(Some("  海绵 "), "keyword").unwrap(), "海绵");
        assert!(matches!(required_param(Some("   "), "keyword"), Err(AppError::Validation(_))));
        assert!(required_param(None, "keyword").is_err());
    }

    #[tokio::test]
    async fn store_errors_pass_through_as_database_errors() {
        let result: Result<(), AppError> =
            timeout_store(async { Err(StoreError::Database(sqlx::Error::PoolClosed)) }).await;

        assert!(matches!(result, Err(AppError::Database(_))));
    }
}
