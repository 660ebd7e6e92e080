//! Repo Rhythm Shared Library
//!
//! This crate contains everything needed to turn a GitHub repository's
//! issues and pull requests into Prometheus metrics: the GraphQL transport,
//! query execution, pagination and the beats that refresh each metric family.
//!
//! # Modules
//!
//! - [`config`] - The observed repository
//! - [`github`] - GraphQL transport, documents and response shapes
//! - [`executor`] - Query execution with deadline and rate-limit checks
//! - [`pagination`] - Bounded cursor pagination
//! - [`metrics`] - Snapshot-style bucketed distributions
//! - [`beats`] - Periodically refreshed metric families
//!
//! # Example
//!
//! ```
//! use shared::metrics::{day_buckets, Distribution, DistributionOpts};
//!
//! let ages = Distribution::new(
//!     DistributionOpts::new("open_issue_age", "Open issue age in hours"),
//!     day_buckets(),
//! )
//! .unwrap();
//!
//! ages.replace([2.0, 30.0, 10_000.0]);
//! assert_eq!(ages.count("1d"), Some(1));
//! assert_eq!(ages.count("+Inf"), Some(1));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod beats;
pub mod config;
pub mod executor;
pub mod github;
pub mod metrics;
pub mod pagination;

#[cfg(test)]
mod testing;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use prometheus;
pub use serde;
pub use serde_json;
pub use validator;
