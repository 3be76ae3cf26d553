//! Delivery backend trait

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

use crate::job::Job;

/// Why a single delivery attempt did not go through
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// Worth retrying (connection reset, 4xx greylisting, 5xx)
    #[error("Transient delivery failure: {0}")]
    Transient(String),
    /// Retrying cannot help (malformed payload, unknown recipient)
    #[error("Permanent delivery failure: {0}")]
    Permanent(String),
    #[error("Delivery attempt timed out after {0:?}")]
    Timeout(Duration),
    /// The adapter itself misbehaved, e.g. panicked mid-attempt
    #[error("Delivery adapter error: {0}")]
    Adapter(String),
}

impl DeliveryError {
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn permanent(msg: impl Into<String>) -> Self {
        Self::Permanent(msg.into())
    }

    /// Permanent errors skip the remaining attempt budget.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Dispatch queue is full ({capacity} jobs)")]
    Full { capacity: usize },
}

/// Performs one delivery attempt for a job.
///
/// The queue calls this at most once at a time per controller. Retries hand
/// the same job back, so side effects must tolerate repeats.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    async fn deliver(&self, job: &Job) -> Result<(), DeliveryError>;
}

/// Adapter built from an async closure
pub struct FnAdapter<F> {
    f: F,
}

impl<F> FnAdapter<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> DeliveryAdapter for FnAdapter<F>
where
    F: Fn(Job) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DeliveryError>> + Send + 'static,
{
    async fn deliver(&self, job: &Job) -> Result<(), DeliveryError> {
        (self.f)(job.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permanent_is_not_retryable() {
        assert!(!DeliveryError::permanent("bad address").is_retryable());
        assert!(DeliveryError::transient("421").is_retryable());
        assert!(DeliveryError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(DeliveryError::Adapter("panicked".into()).is_retryable());
    }

    #[tokio::test]
    async fn test_fn_adapter_passes_job() {
        let adapter = FnAdapter::new(|job: Job| async move {
            if job.payload()["ok"] == true {
                Ok(())
            } else {
                Err(DeliveryError::transient("not ok"))
            }
        });

        assert!(adapter.deliver(&Job::new(json!({ "ok": true }), 1)).await.is_ok());
        assert_eq!(
            adapter.deliver(&Job::new(json!({ "ok": false }), 1)).await,
            Err(DeliveryError::transient("not ok"))
        );
    }
}
