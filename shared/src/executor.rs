//! Query execution with a deadline and rate-limit inspection.
//!
//! The [`Executor`] is the only component that talks to a [`Transport`]. It is
//! shared by every beat behind an `Arc` and never retries: the next scheduled
//! tick is the retry.

use crate::github::{Query, RateLimitRemaining, Transport, TransportError};
use prometheus::IntGauge;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default deadline for a single query.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while executing a query.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The query did not complete before the deadline.
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// The query succeeded but the rate-limit budget is exhausted.
    #[error("Rate limited: {remaining} calls remaining")]
    RateLimited {
        /// Remaining calls reported by the API.
        remaining: i64,
    },

    /// The transport failed.
    #[error("Failed to execute query: {0}")]
    Transport(#[from] TransportError),

    /// The query variables could not be serialized.
    #[error("Failed to encode query variables: {0}")]
    Encode(#[source] serde_json::Error),

    /// The response did not match the query's response shape.
    #[error("Failed to decode query response: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Runs queries against a transport.
pub struct Executor {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    rate_limit_remaining: IntGauge,
}

impl Executor {
    /// Creates an executor with the given per-query deadline.
    ///
    /// # Errors
    ///
    /// Returns an error if the rate-limit gauge cannot be created.
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Result<Self, prometheus::Error> {
        let rate_limit_remaining = IntGauge::new(
            "rate_limit_remaining",
            "Remaining GitHub API calls reported by the most recent query",
        )?;

        Ok(Self {
            transport,
            timeout,
            rate_limit_remaining,
        })
    }

    /// Returns the per-query deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Gauge holding the last observed rate-limit budget, for registration.
    #[must_use]
    pub fn rate_limit_gauge(&self) -> IntGauge {
        self.rate_limit_remaining.clone()
    }

    /// Executes one query.
    ///
    /// # Errors
    ///
    /// - [`ExecuteError::Timeout`] if the deadline passes
    /// - [`ExecuteError::Transport`] if the transport fails
    /// - [`ExecuteError::Decode`] if the response has the wrong shape
    /// - [`ExecuteError::RateLimited`] if the API reports no remaining calls
    pub async fn execute<Q: Query>(&self, query: &Q) -> Result<Q::Response, ExecuteError> {
        let variables = serde_json::to_value(query).map_err(ExecuteError::Encode)?;

        let data = tokio::time::timeout(
            self.timeout,
            self.transport.query(query.document(), variables),
        )
        .await
        .map_err(|_| ExecuteError::Timeout(self.timeout))??;

        let response: Q::Response = serde_json::from_value(data).map_err(ExecuteError::Decode)?;

        let remaining = response.rate_limit_remaining();
        self.rate_limit_remaining.set(remaining);
        tracing::debug!(rate_limit_remaining = remaining, "Query succeeded");

        if remaining < 1 {
            return Err(ExecuteError::RateLimited { remaining });
        }

        Ok(response)
    }
}
