//! Timeline configuration.
//!
//! Loaded from RON; every field is optional and falls back to the value in
//! [`constants`](crate::constants).
//!
//! ```ron
//! TimelineConfig(
//!     page_size: 50,
//!     reorder_live_events: true,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_PAGE_SIZE, DEFAULT_SUPPORTED_EVENT_TYPES, NOTIFICATION_CHANNEL_CAPACITY,
};
use crate::error::ConfigError;

/// Per-timeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Events requested per pagination call when the caller passes no limit.
    pub page_size: usize,
    /// Event types allowed into the main sequence.
    pub supported_event_types: Vec<String>,
    /// Hold plaintext live events behind earlier events that are still
    /// decrypting, releasing them in arrival order. Off by default, which
    /// merges plaintext events as soon as they arrive.
    pub reorder_live_events: bool,
    /// Capacity of the notification broadcast channel.
    pub notification_capacity: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            supported_event_types: DEFAULT_SUPPORTED_EVENT_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
            reorder_live_events: false,
            notification_capacity: NOTIFICATION_CHANNEL_CAPACITY,
        }
    }
}

impl TimelineConfig {
    /// Parse and validate a RON document.
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.notification_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notification_capacity must be at least 1".into(),
            ));
        }
        if self.supported_event_types.is_empty() {
            return Err(ConfigError::Invalid(
                "supported_event_types must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn with_reorder_live_events(mut self, enabled: bool) -> Self {
        self.reorder_live_events = enabled;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}
