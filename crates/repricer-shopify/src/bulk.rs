//! Bulk-operation submission and polling.
//!
//! The Admin API answers large reads with an asynchronous bulk operation
//! that must be polled to completion before its result can be fetched.
//! [`submit_collection_query`] starts the job and [`await_completion`]
//! drives it under a bounded wait budget so callers stay declarative.

use std::time::Duration;

use thiserror::Error;

use crate::client::{ShopifyClient, StoreAuth};
use crate::error::ShopifyError;
use crate::types::{BulkStatus, CollectionId};

/// How often and how many times to poll one bulk job.
///
/// The defaults (5 s interval, 60 attempts) give a five-minute ceiling.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
        }
    }
}

impl PollPolicy {
    #[must_use]
    pub fn from_app_config(config: &repricer_core::AppConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.bulk_poll_interval_secs),
            max_attempts: config.bulk_poll_max_attempts,
        }
    }
}

/// Handle to a submitted bulk job.
#[derive(Debug, Clone)]
pub struct BulkJobHandle {
    pub id: String,
}

/// A completed bulk job. `result_url` is `None` when the query matched no
/// objects; callers treat that as an empty record stream.
#[derive(Debug, Clone)]
pub struct BulkJobOutcome {
    pub id: String,
    pub result_url: Option<String>,
}

/// Failures while submitting or waiting on a bulk job.
#[derive(Debug, Error)]
pub enum BulkError {
    /// The gateway rejected the submission or returned no job id.
    #[error("bulk job submission failed: {0}")]
    Submission(String),

    /// The remote job finished in `FAILED` state; the code is Shopify's
    /// `errorCode`, surfaced unchanged.
    #[error("bulk job failed remotely: {code}")]
    JobFailed { code: String },

    /// The job did not complete within the polling budget.
    #[error("bulk job did not complete within {attempts} polls")]
    Timeout { attempts: u32 },

    #[error(transparent)]
    Gateway(#[from] ShopifyError),
}

/// Submits the bulk read of every variant in `collection`.
///
/// # Errors
///
/// Returns [`BulkError::Submission`] if the mutation reports `userErrors` or
/// comes back without an operation id, or [`BulkError::Gateway`] on
/// transport/API failures.
pub async fn submit_collection_query(
    client: &ShopifyClient,
    auth: &StoreAuth,
    collection: CollectionId,
) -> Result<BulkJobHandle, BulkError> {
    let payload = client.run_collection_bulk_query(auth, collection).await?;

    if !payload.user_errors.is_empty() {
        let messages: Vec<&str> = payload
            .user_errors
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        return Err(BulkError::Submission(messages.join("; ")));
    }

    let Some(operation) = payload.bulk_operation else {
        return Err(BulkError::Submission(
            "no bulk operation id in response".to_owned(),
        ));
    };

    tracing::info!(job = %operation.id, collection = %collection, "bulk query submitted");
    Ok(BulkJobHandle { id: operation.id })
}

/// Polls the job to a terminal state: sleep, poll, repeat.
///
/// Polling is strictly sequential; each attempt is one sleep of
/// `policy.interval` followed by one status query. Statuses other than
/// `COMPLETED` and `FAILED` keep polling until the attempt budget runs out.
///
/// # Errors
///
/// - [`BulkError::JobFailed`] when the remote reports `FAILED`, carrying its
///   `errorCode` unchanged.
/// - [`BulkError::Timeout`] after `policy.max_attempts` polls without a
///   terminal status.
/// - [`BulkError::Gateway`] if a poll itself fails.
pub async fn await_completion(
    client: &ShopifyClient,
    auth: &StoreAuth,
    handle: &BulkJobHandle,
    policy: PollPolicy,
) -> Result<BulkJobOutcome, BulkError> {
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        let Some(current) = client.current_bulk_operation(auth).await? else {
            tracing::debug!(job = %handle.id, attempt, "no current bulk operation yet");
            continue;
        };

        match current.status {
            BulkStatus::Completed => {
                tracing::info!(job = %current.id, attempt, "bulk query completed");
                return Ok(BulkJobOutcome {
                    id: current.id,
                    result_url: current.url,
                });
            }
            BulkStatus::Failed => {
                let code = current
                    .error_code
                    .unwrap_or_else(|| "UNKNOWN".to_owned());
                tracing::error!(job = %current.id, attempt, code = %code, "bulk query failed");
                return Err(BulkError::JobFailed { code });
            }
            status => {
                tracing::debug!(job = %current.id, attempt, ?status, "bulk query still in flight");
            }
        }
    }

    Err(BulkError::Timeout {
        attempts: policy.max_attempts,
    })
}
