//! Change log configuration.

use serde::{Deserialize, Serialize};

use crate::JournalError;

/// Configuration for the [`ChangeLog`](crate::consumer::ChangeLog) worker.
///
/// Every field has a default, so a JSON document only needs the keys it
/// overrides:
///
/// ```
/// use vellum_journal::config::ChangeLogConfig;
///
/// let config = ChangeLogConfig::from_json(r#"{ "ignore": ["clock", "velocity"] }"#).unwrap();
/// assert_eq!(config.ignore, vec!["clock", "velocity"]);
/// assert_eq!(config.thread_name, "vellum-change-log");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeLogConfig {
    /// Component names whose changes are never rendered. Meant for
    /// high-frequency, low-information types such as the tick clock.
    pub ignore: Vec<String>,
    /// Name given to the worker thread.
    pub thread_name: String,
}

impl Default for ChangeLogConfig {
    /// Ignores the `"clock"` component; names the worker `vellum-change-log`.
    fn default() -> Self {
        Self {
            ignore: vec!["clock".to_owned()],
            thread_name: "vellum-change-log".to_owned(),
        }
    }
}

impl ChangeLogConfig {
    /// Parse a configuration from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, JournalError> {
        serde_json::from_str(json).map_err(|e| JournalError::InvalidConfig {
            details: e.to_string(),
        })
    }

    /// Builder-style helper adding one ignored component name.
    pub fn ignoring(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.ignore.contains(&name) {
            self.ignore.push(name);
        }
        self
    }
}
