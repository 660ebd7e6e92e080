//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use prometheus::{Encoder, Registry, TextEncoder};
use shared::config::Target;
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Holds the registry every beat and self-metric is registered with. Scrapes
/// read whatever each collector has installed; they never wait for a tick.
#[derive(Clone)]
pub struct AppState {
    registry: Registry,
    target: Arc<Target>,
}

impl AppState {
    /// Creates a new application state.
    #[must_use]
    pub fn new(registry: Registry, target: Target) -> Self {
        Self {
            registry,
            target: Arc::new(target),
        }
    }

    /// Returns a reference to the metric registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns the observed repository.
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Renders every registered metric in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if the gathered families cannot be encoded.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
