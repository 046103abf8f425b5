// src/utils/deadline.rs

use std::time::Duration;

use crate::error::AppError;

/// Runs a store, cache or gateway call under a time limit.
///
/// A call that does not finish within `limit` is abandoned and reported as
/// `AppError::Unavailable`, the same as an I/O failure.
pub async fn bounded<T, E, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, E>>,
    AppError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(AppError::from),
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", operation, limit);
            Err(AppError::Unavailable(format!("{} timed out", operation)))
        }
    }
}
