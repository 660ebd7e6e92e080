//! Snapshot-style bucketed distribution.
//!
//! A [`Distribution`] counts observations into named buckets, like a histogram,
//! with two differences:
//!
//! 1. It holds a snapshot of the current state only. Every refresh replaces
//!    the previous counts; nothing accumulates over time.
//! 2. Buckets are addressed by string labels (`"7d"`, `"14d"`) so they are easy
//!    to diagram, while assignment uses the numeric upper bound of each bucket.
//!
//! Each bucket is exported as an independent gauge sample labelled
//! `bucket="<label>"`.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Label of the overflow bucket.
pub const OVERFLOW_BUCKET: &str = "+Inf";

/// Name of the variable label carrying the bucket label.
pub const BUCKET_LABEL: &str = "bucket";

const HOURS_PER_DAY: f64 = 24.0;

/// Errors raised while building a distribution.
#[derive(Debug, Error)]
pub enum DistributionError {
    /// A bucket label was empty.
    #[error("Bucket label cannot be empty")]
    EmptyLabel,

    /// A bucket used the label reserved for the overflow bucket.
    #[error("Bucket label '{OVERFLOW_BUCKET}' is reserved for the overflow bucket")]
    ReservedLabel,

    /// Two buckets share a label.
    #[error("Duplicate bucket label: '{0}'")]
    DuplicateLabel(String),

    /// Two buckets share an upper bound.
    #[error("Duplicate bucket bound {bound} for label '{label}'")]
    DuplicateBound {
        /// Label of the second bucket with this bound.
        label: String,
        /// The repeated bound.
        bound: f64,
    },

    /// A bucket bound was NaN or infinite.
    #[error("Bucket '{label}' has a non-finite bound: {bound}")]
    NonFiniteBound {
        /// Offending bucket label.
        label: String,
        /// Offending bound.
        bound: f64,
    },

    /// The underlying gauge vector could not be created.
    #[error("Metric error: {0}")]
    Metric(#[from] prometheus::Error),
}

/// A named bucket with an inclusive upper bound.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Display label, e.g. `"7d"`.
    pub label: String,
    /// Inclusive upper bound.
    pub upper_bound: f64,
}

impl Bucket {
    /// Creates a new bucket.
    #[must_use]
    pub fn new(label: impl Into<String>, upper_bound: f64) -> Self {
        Self {
            label: label.into(),
            upper_bound,
        }
    }
}

/// Naming and constant labels for a distribution.
#[derive(Debug, Clone, Default)]
pub struct DistributionOpts {
    /// Metric name.
    pub name: String,
    /// Help text.
    pub help: String,
    /// Labels attached to every sample.
    pub const_labels: HashMap<String, String>,
}

impl DistributionOpts {
    /// Creates options with a name and help text.
    #[must_use]
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            const_labels: HashMap::new(),
        }
    }

    /// Adds a constant label.
    #[must_use]
    pub fn with_const_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.insert(key.into(), value.into());
        self
    }
}

/// Day buckets shared by all age and lifecycle distributions, in hours.
#[must_use]
pub fn day_buckets() -> Vec<Bucket> {
    [1_u32, 3, 7, 14, 30, 90, 180, 365]
        .into_iter()
        .map(|days| Bucket::new(format!("{days}d"), f64::from(days) * HOURS_PER_DAY))
        .collect()
}

/// A snapshot of bucketed observations.
///
/// Counts live behind an `RwLock` that is only held while a snapshot is
/// written or read, never across a fetch. Scrapes therefore always see a
/// complete snapshot.
pub struct Distribution {
    buckets: Vec<Bucket>,
    gauges: GaugeVec,
    counts: RwLock<Vec<u64>>,
}

impl Distribution {
    /// Creates a distribution from caller-supplied buckets.
    ///
    /// Buckets may be given in any order; they are sorted by upper bound. The
    /// overflow bucket is appended automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if a label is empty, reserved or repeated, if a bound is
    /// not finite or repeated, or if the metric options are invalid.
    pub fn new(opts: DistributionOpts, buckets: Vec<Bucket>) -> Result<Self, DistributionError> {
        let mut labels = HashSet::new();
        for bucket in &buckets {
            if bucket.label.is_empty() {
                return Err(DistributionError::EmptyLabel);
            }
            if bucket.label == OVERFLOW_BUCKET {
                return Err(DistributionError::ReservedLabel);
            }
            if !bucket.upper_bound.is_finite() {
                return Err(DistributionError::NonFiniteBound {
                    label: bucket.label.clone(),
                    bound: bucket.upper_bound,
                });
            }
            if !labels.insert(bucket.label.as_str()) {
                return Err(DistributionError::DuplicateLabel(bucket.label.clone()));
            }
        }

        let mut buckets = buckets;
        buckets.sort_by(|left, right| left.upper_bound.total_cmp(&right.upper_bound));
        if let Some(pair) = buckets
            .windows(2)
            .find(|pair| pair[0].upper_bound == pair[1].upper_bound)
        {
            return Err(DistributionError::DuplicateBound {
                label: pair[1].label.clone(),
                bound: pair[1].upper_bound,
            });
        }
        buckets.push(Bucket::new(OVERFLOW_BUCKET, f64::INFINITY));

        let gauges = GaugeVec::new(
            Opts::new(opts.name, opts.help).const_labels(opts.const_labels),
            &[BUCKET_LABEL],
        )?;

        Ok(Self {
            counts: RwLock::new(vec![0; buckets.len()]),
            buckets,
            gauges,
        })
    }

    /// Returns the buckets in assignment order, overflow last.
    #[must_use]
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Adds one observation to the bucket it belongs to.
    ///
    /// A value equal to a bound belongs to that bucket. The first bucket also
    /// takes every value below its bound.
    pub fn observe(&self, value: f64) {
        let index = self.bucket_index(value);
        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        counts[index] += 1;
        self.publish(&counts);
    }

    /// Zeroes every bucket, including the overflow bucket.
    pub fn reset(&self) {
        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        counts.iter_mut().for_each(|count| *count = 0);
        self.publish(&counts);
    }

    /// Replaces the snapshot with the given observations in one step.
    ///
    /// Equivalent to [`reset`](Self::reset) followed by one
    /// [`observe`](Self::observe) per value, except that no reader can see the
    /// intermediate states.
    pub fn replace<I>(&self, values: I)
    where
        I: IntoIterator<Item = f64>,
    {
        let mut fresh = vec![0_u64; self.buckets.len()];
        for value in values {
            fresh[self.bucket_index(value)] += 1;
        }

        let mut counts = self.counts.write().unwrap_or_else(PoisonError::into_inner);
        *counts = fresh;
        self.publish(&counts);
    }

    /// Returns the current count of a bucket, if the label exists.
    #[must_use]
    pub fn count(&self, label: &str) -> Option<u64> {
        let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
        self.buckets
            .iter()
            .position(|bucket| bucket.label == label)
            .map(|index| counts[index])
    }

    /// Returns `(label, count)` pairs in bucket order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
        self.buckets
            .iter()
            .zip(counts.iter())
            .map(|(bucket, count)| (bucket.label.clone(), *count))
            .collect()
    }

    /// Returns the sum of all bucket counts.
    #[must_use]
    pub fn total(&self) -> u64 {
        let counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
        counts.iter().sum()
    }

    fn bucket_index(&self, value: f64) -> usize {
        // NaN compares false against every bound and falls through to overflow.
        self.buckets
            .iter()
            .position(|bucket| value <= bucket.upper_bound)
            .unwrap_or(self.buckets.len() - 1)
    }

    // Callers hold the counts write lock.
    #[allow(clippy::cast_precision_loss)]
    fn publish(&self, counts: &[u64]) {
        for (bucket, count) in self.buckets.iter().zip(counts) {
            self.gauges
                .with_label_values(&[bucket.label.as_str()])
                .set(*count as f64);
        }
    }
}

impl fmt::Debug for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Distribution")
            .field("buckets", &self.buckets)
            .field("counts", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl Collector for Distribution {
    fn desc(&self) -> Vec<&Desc> {
        self.gauges.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _counts = self.counts.read().unwrap_or_else(PoisonError::into_inner);
        self.gauges.collect()
    }
}
