//! Wiring of target, executor, beats and registry.

use crate::config::Config;
use crate::scheduler::{Scheduler, SchedulerMetrics};
use crate::state::AppState;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::Registry;
use shared::beats::{Beat, BeatError, BeatKind};
use shared::executor::Executor;
use shared::github::Transport;
use std::sync::Arc;
use thiserror::Error;

/// Prefix of every exported metric name.
pub const METRIC_PREFIX: &str = "repo_rhythm";

/// Errors raised while assembling the exporter.
#[derive(Debug, Error)]
pub enum ExporterError {
    /// A beat could not be set up.
    #[error("Failed to set up beat '{beat}': {source}")]
    Beat {
        /// Identifier of the beat.
        beat: BeatKind,
        /// Underlying error.
        #[source]
        source: BeatError,
    },

    /// A collector could not be registered.
    #[error("Failed to register metrics: {0}")]
    Registry(#[from] prometheus::Error),
}

/// Registers a beat's metric objects without giving up the shared handle.
struct BeatCollector(Arc<dyn Beat>);

impl Collector for BeatCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.0.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.0.collect()
    }
}

/// A fully wired exporter, ready to serve and to start its beats.
pub struct Exporter {
    state: AppState,
    beats: Vec<Arc<dyn Beat>>,
    metrics: SchedulerMetrics,
}

impl Exporter {
    /// Sets up every beat against `transport` and registers all metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if a beat or metric cannot be created or registered.
    pub fn build(config: &Config, transport: Arc<dyn Transport>) -> Result<Self, ExporterError> {
        let registry = Registry::new_custom(Some(METRIC_PREFIX.to_string()), None)?;

        let executor = Arc::new(Executor::new(transport, config.query_timeout)?);
        registry.register(Box::new(executor.rate_limit_gauge()))?;

        let options = config.beat_options();
        let mut beats = Vec::with_capacity(BeatKind::ALL.len());
        for kind in BeatKind::ALL {
            let beat = kind
                .setup(&config.target, Arc::clone(&executor), &options)
                .map_err(|source| ExporterError::Beat { beat: kind, source })?;
            registry.register(Box::new(BeatCollector(Arc::clone(&beat))))?;
            tracing::debug!(beat = beat.name(), "Beat registered");
            beats.push(beat);
        }

        let metrics = SchedulerMetrics::new()?;
        metrics.register(&registry)?;

        Ok(Self {
            state: AppState::new(registry, config.target.clone()),
            beats,
            metrics,
        })
    }

    /// State for the HTTP routes.
    #[must_use]
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// The configured beats, in registration order.
    #[must_use]
    pub fn beats(&self) -> &[Arc<dyn Beat>] {
        &self.beats
    }

    /// Scheduler self-metrics.
    #[must_use]
    pub fn scheduler_metrics(&self) -> &SchedulerMetrics {
        &self.metrics
    }

    /// Spawns one task per beat.
    #[must_use]
    pub fn start(&self) -> Scheduler {
        Scheduler::start(&self.beats, &self.metrics)
    }
}
