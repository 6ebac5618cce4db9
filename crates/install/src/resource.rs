//! Concurrency helpers for blob fetching

use pkgup_errors::Error;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Acquire a semaphore permit with consistent error reporting
///
/// # Errors
///
/// Returns an error if the semaphore is closed
pub async fn acquire_semaphore_permit(
    semaphore: Arc<Semaphore>,
    operation: &str,
) -> Result<OwnedSemaphorePermit, Error> {
    semaphore
        .acquire_owned()
        .await
        .map_err(|_| Error::internal(format!("failed to acquire semaphore for {operation}")))
}

/// Create a semaphore with at least one permit
#[must_use]
pub fn create_semaphore(permits: usize) -> Arc<Semaphore> {
    Arc::new(Semaphore::new(permits.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_permits_clamped() {
        let sem = create_semaphore(0);
        assert_eq!(sem.available_permits(), 1);
        let _permit = acquire_semaphore_permit(sem.clone(), "test").await.unwrap();
        assert_eq!(sem.available_permits(), 0);
    }

    #[tokio::test]
    async fn test_closed_semaphore_errors() {
        let sem = create_semaphore(1);
        sem.close();
        assert!(acquire_semaphore_permit(sem, "test").await.is_err());
    }
}
