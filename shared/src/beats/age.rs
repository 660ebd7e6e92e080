//! Distribution beats: ages of open items and lifecycles of closed items.
//!
//! Each tick fetches the full set of matching items, turns every item into a
//! duration in hours and installs the result as a new [`Distribution`]
//! snapshot. The snapshot is only replaced once the whole fetch succeeded.

use super::{Beat, BeatError, BeatOptions};
use crate::config::Target;
use crate::executor::Executor;
use crate::github::{Collection, Item, ItemState, PageQuery};
use crate::metrics::{day_buckets, Distribution, DistributionOpts};
use crate::pagination::fetch_all;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use std::sync::Arc;
use std::time::Duration;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// What duration an item contributes to a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// Time from creation until now.
    Age,
    /// Time from creation until close.
    Lifecycle,
}

impl Measure {
    /// Duration of `item` in fractional hours.
    ///
    /// Returns `None` for a lifecycle without a close time.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hours(self, item: &Item, now: DateTime<Utc>) -> Option<f64> {
        let end = match self {
            Self::Age => now,
            Self::Lifecycle => item.closed_at?,
        };
        let millis = (end - item.created_at).num_milliseconds();
        Some(millis as f64 / MILLIS_PER_HOUR)
    }
}

/// Periodically rebuilds a day-bucketed distribution from a paginated fetch.
pub struct DistributionBeat {
    name: &'static str,
    collection: Collection,
    state: ItemState,
    measure: Measure,
    interval: Duration,
    max_pages: usize,
    target: Target,
    executor: Arc<Executor>,
    distribution: Distribution,
}

impl DistributionBeat {
    /// Age of open issues.
    ///
    /// # Errors
    ///
    /// Returns an error if the distribution cannot be created.
    pub fn open_issue_age(
        target: &Target,
        executor: Arc<Executor>,
        options: &BeatOptions,
    ) -> Result<Self, BeatError> {
        Self::new(
            "open issue age",
            DistributionOpts::new("open_issue_age", "Distribution of open issue ages in hours"),
            Collection::Issues,
            ItemState::Open,
            Measure::Age,
            target,
            executor,
            options,
        )
    }

    /// Age of open pull requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the distribution cannot be created.
    pub fn open_pull_request_age(
        target: &Target,
        executor: Arc<Executor>,
        options: &BeatOptions,
    ) -> Result<Self, BeatError> {
        Self::new(
            "open pull request age",
            DistributionOpts::new(
                "open_pull_request_age",
                "Distribution of open pull request ages in hours",
            ),
            Collection::PullRequests,
            ItemState::Open,
            Measure::Age,
            target,
            executor,
            options,
        )
    }

    /// Time from creation to close of closed issues.
    ///
    /// # Errors
    ///
    /// Returns an error if the distribution cannot be created.
    pub fn closed_issue_lifecycle(
        target: &Target,
        executor: Arc<Executor>,
        options: &BeatOptions,
    ) -> Result<Self, BeatError> {
        Self::new(
            "closed issue lifecycle",
            DistributionOpts::new(
                "closed_issue_lifecycle",
                "Distribution of closed issue lifecycles in hours",
            ),
            Collection::Issues,
            ItemState::Closed,
            Measure::Lifecycle,
            target,
            executor,
            options,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        name: &'static str,
        opts: DistributionOpts,
        collection: Collection,
        state: ItemState,
        measure: Measure,
        target: &Target,
        executor: Arc<Executor>,
        options: &BeatOptions,
    ) -> Result<Self, BeatError> {
        let opts = target
            .const_labels()
            .into_iter()
            .fold(opts, |opts, (key, value)| opts.with_const_label(key, value));
        let distribution = Distribution::new(opts, day_buckets())?;

        Ok(Self {
            name,
            collection,
            state,
            measure,
            interval: options.distribution_interval,
            max_pages: options.max_pages,
            target: target.clone(),
            executor,
            distribution,
        })
    }

    /// The currently installed snapshot.
    #[must_use]
    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    /// What this beat measures.
    #[must_use]
    pub fn measure(&self) -> Measure {
        self.measure
    }
}

#[async_trait]
impl Beat for DistributionBeat {
    fn name(&self) -> &str {
        self.name
    }

    fn tick_interval(&self) -> Duration {
        self.interval
    }

    async fn tick(&self) -> Result<(), BeatError> {
        let now = Utc::now();
        let query = PageQuery::new(self.collection, &self.target, &[self.state]);
        let items = fetch_all(&self.executor, &query, self.max_pages).await?;

        let mut skipped = 0_usize;
        let hours: Vec<f64> = items
            .iter()
            .filter_map(|item| {
                let hours = self.measure.hours(item, now);
                if hours.is_none() {
                    skipped += 1;
                }
                hours
            })
            .collect();

        if skipped > 0 {
            tracing::warn!(beat = self.name, skipped, "Skipped items without a close time");
        }

        let observed = hours.len();
        self.distribution.replace(hours);
        tracing::debug!(beat = self.name, observed, "Distribution replaced");

        Ok(())
    }
}

impl Collector for DistributionBeat {
    fn desc(&self) -> Vec<&Desc> {
        self.distribution.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.distribution.collect()
    }
}
