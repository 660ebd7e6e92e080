//! Metric types exported by beats.
//!
//! The standard Prometheus histogram accumulates observations forever. Beats
//! instead publish a fresh snapshot on every refresh, which is what
//! [`Distribution`] models.

pub mod distribution;

pub use distribution::{
    day_buckets, Bucket, Distribution, DistributionError, DistributionOpts, BUCKET_LABEL,
    OVERFLOW_BUCKET,
};
