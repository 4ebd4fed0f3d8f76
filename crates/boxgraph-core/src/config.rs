//! Configuration for graphs and editing sessions

use serde::{Deserialize, Serialize};

/// Graph behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Run [`crate::BoxGraph::verify_pointers`] after every transaction and
    /// log violations
    pub verify_on_end_transaction: bool,
}

impl GraphConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With pointer verification after every transaction
    #[inline]
    #[must_use]
    pub fn with_verify_on_end_transaction(mut self, verify: bool) -> Self {
        self.verify_on_end_transaction = verify;
        self
    }
}

/// Undo/redo session settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingConfig {
    /// Run the requirement sweep after every modify, undo and redo
    pub validate_after_replay: bool,
    /// Maximum number of marked history entries kept
    pub history_limit: Option<usize>,
}

impl EditingConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With requirement sweep after each cycle
    #[inline]
    #[must_use]
    pub fn with_validate_after_replay(mut self, validate: bool) -> Self {
        self.validate_after_replay = validate;
        self
    }

    /// With a bounded history
    #[inline]
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            validate_after_replay: true,
            history_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editing_defaults_validate_without_limit() {
        let config = EditingConfig::new();
        assert!(config.validate_after_replay);
        assert_eq!(config.history_limit, None);
    }

    #[test]
    fn builders_override_defaults() {
        let config = EditingConfig::new()
            .with_validate_after_replay(false)
            .with_history_limit(8);
        assert!(!config.validate_after_replay);
        assert_eq!(config.history_limit, Some(8));
        assert!(GraphConfig::new().with_verify_on_end_transaction(true).verify_on_end_transaction);
    }
}
