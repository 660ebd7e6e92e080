//! Beats: independently scheduled units that refresh one metric family.
//!
//! Every beat owns its metric objects and exposes them through the
//! [`Collector`] contract, so the exposition layer reads whatever snapshot is
//! installed while the scheduler keeps ticking.
//!
//! The set of beats is closed ([`BeatKind`]). Two implementations share the
//! work:
//!
//! - [`CountBeat`] - one count query per state, one gauge per state
//! - [`DistributionBeat`] - paginated fetch, then a [`Distribution`] snapshot
//!
//! [`Distribution`]: crate::metrics::Distribution

pub mod age;
pub mod count;

pub use age::{DistributionBeat, Measure};
pub use count::CountBeat;

use crate::config::Target;
use crate::executor::{ExecuteError, Executor};
use crate::metrics::DistributionError;
use crate::pagination::{PaginationError, DEFAULT_MAX_PAGES};
use async_trait::async_trait;
use prometheus::core::Collector;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default interval for count beats.
pub const DEFAULT_COUNT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default interval for age and lifecycle beats.
pub const DEFAULT_DISTRIBUTION_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Errors that can occur while setting up or ticking a beat.
#[derive(Debug, Error)]
pub enum BeatError {
    /// A query failed.
    #[error(transparent)]
    Execute(#[from] ExecuteError),

    /// A paginated fetch failed.
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    /// A metric could not be created.
    #[error("Metric error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// A distribution could not be created.
    #[error(transparent)]
    Distribution(#[from] DistributionError),
}

impl BeatError {
    /// Whether the error means the beat's assumptions no longer hold.
    ///
    /// Only a pagination overrun is fatal; everything else is retried on the
    /// next tick.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Pagination(PaginationError::Overrun { .. }))
    }
}

/// A periodically refreshed metric family.
#[async_trait]
pub trait Beat: Collector {
    /// Stable, human-readable name.
    fn name(&self) -> &str;

    /// How often [`tick`](Beat::tick) should run.
    fn tick_interval(&self) -> Duration;

    /// Runs one fetch-and-recompute cycle.
    ///
    /// On failure the previously exposed values stay in place.
    ///
    /// # Errors
    ///
    /// Returns the first failure encountered during the cycle.
    async fn tick(&self) -> Result<(), BeatError>;
}

/// Tuning shared by all beats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatOptions {
    /// Interval for count beats.
    pub count_interval: Duration,
    /// Interval for age and lifecycle beats.
    pub distribution_interval: Duration,
    /// Pagination safety valve.
    pub max_pages: usize,
}

impl Default for BeatOptions {
    fn default() -> Self {
        Self {
            count_interval: DEFAULT_COUNT_INTERVAL,
            distribution_interval: DEFAULT_DISTRIBUTION_INTERVAL,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Error returned when parsing an unknown beat identifier.
#[derive(Debug, Error)]
#[error("Unknown beat: '{0}'")]
pub struct UnknownBeat(pub String);

/// The closed set of beats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeatKind {
    /// Issues by state.
    IssueCount,
    /// Pull requests by state.
    PullRequestCount,
    /// Age distribution of open issues.
    OpenIssueAge,
    /// Age distribution of open pull requests.
    OpenPullRequestAge,
    /// Creation-to-close distribution of closed issues.
    ClosedIssueLifecycle,
}

impl BeatKind {
    /// Every beat, in registration order.
    pub const ALL: [Self; 5] = [
        Self::IssueCount,
        Self::PullRequestCount,
        Self::OpenIssueAge,
        Self::OpenPullRequestAge,
        Self::ClosedIssueLifecycle,
    ];

    /// Identifier used in configuration.
    #[must_use]
    pub fn id(&self) -> &'static str {
        match self {
            Self::IssueCount => "issue_count",
            Self::PullRequestCount => "pull_request_count",
            Self::OpenIssueAge => "open_issue_age",
            Self::OpenPullRequestAge => "open_pull_request_age",
            Self::ClosedIssueLifecycle => "closed_issue_lifecycle",
        }
    }

    /// Binds the beat to its target and executor and allocates its metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if the beat's metric objects cannot be created.
    pub fn setup(
        self,
        target: &Target,
        executor: Arc<Executor>,
        options: &BeatOptions,
    ) -> Result<Arc<dyn Beat>, BeatError> {
        let beat: Arc<dyn Beat> = match self {
            Self::IssueCount => Arc::new(CountBeat::issues(target, executor, options)?),
            Self::PullRequestCount => Arc::new(CountBeat::pull_requests(target, executor, options)?),
            Self::OpenIssueAge => {
                Arc::new(DistributionBeat::open_issue_age(target, executor, options)?)
            }
            Self::OpenPullRequestAge => {
                Arc::new(DistributionBeat::open_pull_request_age(target, executor, options)?)
            }
            Self::ClosedIssueLifecycle => {
                Arc::new(DistributionBeat::closed_issue_lifecycle(target, executor, options)?)
            }
        };
        Ok(beat)
    }
}

impl fmt::Display for BeatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for BeatKind {
    type Err = UnknownBeat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == wanted)
            .ok_or_else(|| UnknownBeat(wanted.to_string()))
    }
}
