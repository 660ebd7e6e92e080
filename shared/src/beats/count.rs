//! Count beats: current number of issues or pull requests per state.

use super::{Beat, BeatError, BeatOptions};
use crate::config::Target;
use crate::executor::Executor;
use crate::github::{Collection, CountQuery, ItemState};
use async_trait::async_trait;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use std::sync::Arc;
use std::time::Duration;

/// Exposes one gauge per state, each refreshed by its own count query.
///
/// States are independent: a failed query leaves only that state's gauge at
/// its previous value.
pub struct CountBeat {
    name: &'static str,
    collection: Collection,
    states: Vec<ItemState>,
    interval: Duration,
    target: Target,
    executor: Arc<Executor>,
    totals: GaugeVec,
}

impl CountBeat {
    /// Issues by state (open, closed).
    ///
    /// # Errors
    ///
    /// Returns an error if the gauge vector cannot be created.
    pub fn issues(
        target: &Target,
        executor: Arc<Executor>,
        options: &BeatOptions,
    ) -> Result<Self, BeatError> {
        Self::new(
            "issue count",
            Opts::new("issues", "Current number of issues by state"),
            Collection::Issues,
            vec![ItemState::Open, ItemState::Closed],
            target,
            executor,
            options.count_interval,
        )
    }

    /// Pull requests by state (open, closed, merged).
    ///
    /// # Errors
    ///
    /// Returns an error if the gauge vector cannot be created.
    pub fn pull_requests(
        target: &Target,
        executor: Arc<Executor>,
        options: &BeatOptions,
    ) -> Result<Self, BeatError> {
        Self::new(
            "pull request count",
            Opts::new("pull_requests", "Current number of pull requests by state"),
            Collection::PullRequests,
            vec![ItemState::Open, ItemState::Closed, ItemState::Merged],
            target,
            executor,
            options.count_interval,
        )
    }

    fn new(
        name: &'static str,
        opts: Opts,
        collection: Collection,
        states: Vec<ItemState>,
        target: &Target,
        executor: Arc<Executor>,
        interval: Duration,
    ) -> Result<Self, BeatError> {
        let totals = GaugeVec::new(opts.const_labels(target.const_labels()), &["state"])?;

        Ok(Self {
            name,
            collection,
            states,
            interval,
            target: target.clone(),
            executor,
            totals,
        })
    }

    /// States this beat counts.
    #[must_use]
    pub fn states(&self) -> &[ItemState] {
        &self.states
    }

    /// Currently exposed value for a state, if it has ever been set.
    #[must_use]
    pub fn total(&self, state: ItemState) -> Option<f64> {
        self.totals
            .collect()
            .iter()
            .flat_map(|family| family.get_metric().iter())
            .find(|metric| {
                metric
                    .get_label()
                    .iter()
                    .any(|pair| pair.get_name() == "state" && pair.get_value() == state.as_label())
            })
            .map(|metric| metric.get_gauge().get_value())
    }
}

#[async_trait]
impl Beat for CountBeat {
    fn name(&self) -> &str {
        self.name
    }

    fn tick_interval(&self) -> Duration {
        self.interval
    }

    #[allow(clippy::cast_precision_loss)]
    async fn tick(&self) -> Result<(), BeatError> {
        let mut first_error = None;

        for &state in &self.states {
            let query = CountQuery::new(self.collection, &self.target, state);
            match self.executor.execute(&query).await {
                Ok(response) => {
                    let total = response.total_count();
                    self.totals
                        .with_label_values(&[state.as_label()])
                        .set(total as f64);
                    tracing::debug!(beat = self.name, %state, total, "Count updated");
                }
                Err(e) => {
                    tracing::warn!(
                        beat = self.name,
                        %state,
                        error = %e,
                        "Count query failed, keeping previous value"
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

impl Collector for CountBeat {
    fn desc(&self) -> Vec<&Desc> {
        self.totals.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.totals.collect()
    }
}
