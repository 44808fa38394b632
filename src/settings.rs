use crate::error::DocumentError;
use crate::resolver::RelayClassifier;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Timing and classification knobs shared by every controller of a session.
///
/// Every field has a default, so a settings file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Debounce window of connection-change notifications.
    pub stabilize_delay_ms: u64,
    /// Idle period after which a held width is released.
    pub width_decay_ms: u64,
    /// Interval of the group-list poll.
    pub group_poll_interval_ms: u64,
    /// Delay of the first pass after creation or configure.
    pub deferred_restore_ms: u64,
    /// Type tag substrings of transparent relay nodes.
    pub relay_type_patterns: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stabilize_delay_ms: 100,
            width_decay_ms: 32,
            group_poll_interval_ms: 1000,
            deferred_restore_ms: 100,
            relay_type_patterns: vec!["Reroute".to_string(), "PrimitiveNode".to_string()],
        }
    }
}

impl Settings {
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::JsonParseError(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DocumentError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn relay_classifier(&self) -> RelayClassifier {
        RelayClassifier::new(self.relay_type_patterns.iter().cloned())
    }
}
