//! The repository a Repo Rhythm process observes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use validator::Validate;

/// Errors raised when a target is invalid.
#[derive(Debug, Error)]
pub enum TargetError {
    /// Validation failed with details.
    #[error("Invalid target: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Owner and name of the observed repository.
///
/// Set once at process start and shared read-only by every beat.
///
/// # Examples
///
/// ```
/// use shared::config::Target;
///
/// let target = Target::new("grafana", "loki");
/// assert!(target.validate_target().is_ok());
/// assert_eq!(target.to_string(), "grafana/loki");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Target {
    /// Repository owner (user or organization).
    #[validate(length(min = 1, message = "Repository owner cannot be empty"))]
    pub owner: String,

    /// Repository name.
    #[validate(length(min = 1, message = "Repository name cannot be empty"))]
    pub repo: String,
}

impl Target {
    /// Creates a new target.
    #[must_use]
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// Validates the target.
    ///
    /// # Errors
    ///
    /// Returns an error if the owner or repository name is empty.
    pub fn validate_target(&self) -> Result<(), TargetError> {
        self.validate()?;
        Ok(())
    }

    /// Constant labels attached to every metric about this target.
    #[must_use]
    pub fn const_labels(&self) -> HashMap<String, String> {
        HashMap::from([
            ("owner".to_string(), self.owner.clone()),
            ("repo".to_string(), self.repo.clone()),
        ])
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_validates() {
        assert!(Target::new("grafana", "loki").validate_target().is_ok());
    }

    #[test]
    fn test_target_rejects_empty_owner() {
        let result = Target::new("", "loki").validate_target();
        assert!(matches!(result, Err(TargetError::ValidationError(_))));
    }

    #[test]
    fn test_target_rejects_empty_repo() {
        assert!(Target::new("grafana", "").validate_target().is_err());
    }

    #[test]
    fn test_const_labels() {
        let labels = Target::new("grafana", "loki").const_labels();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["owner"], "grafana");
        assert_eq!(labels["repo"], "loki");
    }
}
