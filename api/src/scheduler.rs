//! Beat scheduling.
//!
//! Every beat runs in its own task on its own interval. The first tick fires
//! immediately; a tick that overruns its interval delays the next one rather
//! than triggering a burst. Failures are logged and retried on the next tick,
//! except for fatal errors, which end the task and surface through
//! [`Scheduler::failed`].

use prometheus::{GaugeVec, IntCounterVec, Opts, Registry};
use shared::beats::{Beat, BeatError};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

/// Errors that end a beat's task.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A beat reported an unrecoverable error.
    #[error("Beat '{beat}' failed fatally: {source}")]
    Fatal {
        /// Name of the failed beat.
        beat: String,
        /// The error it reported.
        #[source]
        source: BeatError,
    },

    /// A beat task panicked.
    #[error("Beat task panicked: {0}")]
    Panicked(String),
}

/// Self-metrics describing how the beats are doing.
#[derive(Clone)]
pub struct SchedulerMetrics {
    tick_duration: GaugeVec,
    last_success: GaugeVec,
    failures: IntCounterVec,
}

impl SchedulerMetrics {
    /// Creates the metric vectors, labelled by beat name.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric cannot be created.
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            tick_duration: GaugeVec::new(
                Opts::new(
                    "beat_tick_duration_seconds",
                    "Duration of the most recent tick of each beat",
                ),
                &["beat"],
            )?,
            last_success: GaugeVec::new(
                Opts::new(
                    "beat_last_success_timestamp_seconds",
                    "Unix time of the most recent successful tick of each beat",
                ),
                &["beat"],
            )?,
            failures: IntCounterVec::new(
                Opts::new("beat_tick_failures_total", "Failed ticks of each beat"),
                &["beat"],
            )?,
        })
    }

    /// Registers all vectors with `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric with the same name is already registered.
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.tick_duration.clone()))?;
        registry.register(Box::new(self.last_success.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        Ok(())
    }

    /// Number of failed ticks recorded for `beat`.
    #[must_use]
    pub fn failures(&self, beat: &str) -> u64 {
        self.failures.with_label_values(&[beat]).get()
    }

    /// Unix time of the last successful tick of `beat`, zero if none.
    #[must_use]
    pub fn last_success(&self, beat: &str) -> f64 {
        self.last_success.with_label_values(&[beat]).get()
    }

    fn record(&self, beat: &str, elapsed: Duration, succeeded: bool) {
        self.tick_duration
            .with_label_values(&[beat])
            .set(elapsed.as_secs_f64());

        if succeeded {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default();
            self.last_success
                .with_label_values(&[beat])
                .set(now.as_secs_f64());
        } else {
            self.failures.with_label_values(&[beat]).inc();
        }
    }
}

/// Drives one beat forever.
pub struct BeatRunner {
    beat: Arc<dyn Beat>,
    metrics: SchedulerMetrics,
}

impl BeatRunner {
    /// Creates a runner for `beat`.
    #[must_use]
    pub fn new(beat: Arc<dyn Beat>, metrics: SchedulerMetrics) -> Self {
        Self { beat, metrics }
    }

    /// Ticks the beat at its interval until it fails fatally.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Fatal`] when a tick reports a fatal error.
    pub async fn run(self) -> Result<(), SchedulerError> {
        let name = self.beat.name().to_string();
        let period = self.beat.tick_interval();

        // Expose a zero failure count before the first failure.
        self.metrics
            .failures
            .with_label_values(&[name.as_str()])
            .inc_by(0);

        tracing::info!(beat = %name, interval_secs = period.as_secs_f64(), "Beat scheduled");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick_once(&name).await?;
        }
    }

    async fn tick_once(&self, name: &str) -> Result<(), SchedulerError> {
        let started = Instant::now();
        let result = self.beat.tick().await;
        let elapsed = started.elapsed();

        self.metrics.record(name, elapsed, result.is_ok());
        let duration_ms = elapsed.as_secs_f64() * 1000.0;

        match result {
            Ok(()) => {
                tracing::info!(beat = name, duration_ms, "Beat succeeded");
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(beat = name, duration_ms, error = %e, "Beat failed fatally");
                Err(SchedulerError::Fatal {
                    beat: name.to_string(),
                    source: e,
                })
            }
            Err(e) => {
                tracing::warn!(beat = name, duration_ms, error = %e, "Beat failed");
                Ok(())
            }
        }
    }
}

/// The set of running beat tasks.
pub struct Scheduler {
    tasks: JoinSet<Result<(), SchedulerError>>,
}

impl Scheduler {
    /// Spawns one task per beat. Must be called within a Tokio runtime.
    #[must_use]
    pub fn start(beats: &[Arc<dyn Beat>], metrics: &SchedulerMetrics) -> Self {
        let mut tasks = JoinSet::new();
        for beat in beats {
            let runner = BeatRunner::new(Arc::clone(beat), metrics.clone());
            tasks.spawn(runner.run());
        }
        Self { tasks }
    }

    /// Number of beat tasks still running.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no beat task is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits until a beat task ends abnormally.
    ///
    /// Stays pending for as long as the beats keep running.
    pub async fn failed(&mut self) -> SchedulerError {
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(Err(e)) => return e,
                Ok(Ok(())) => {}
                Err(e) if e.is_panic() => return SchedulerError::Panicked(e.to_string()),
                Err(_) => {}
            }
        }
        std::future::pending().await
    }

    /// Stops every beat task.
    pub async fn shutdown(mut self) {
        self.tasks.shutdown().await;
    }
}
