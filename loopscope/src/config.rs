//! Hook options
//!
//! Loaded from JSON (camelCase keys, every field optional) and then
//! overridden by CLI flags in the binary.
//!
//! ```json
//! { "verboseLogging": false, "longOperationThresholdMs": 100 }
//! ```

use crate::domain::{ConfigError, Duration, TaskKind};
use loopscope_common::DEFAULT_LONG_OPERATION_THRESHOLD_MS;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default number of destroyed task ids remembered for ordering checks
pub const DEFAULT_TOMBSTONE_CAPACITY: usize = 4096;

/// What to do with assertion-class lifecycle violations (a second
/// about-to-run while a run is pending, a finished-running with no start).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationPolicy {
    /// Panic with the violation. Default in debug builds.
    Panic,
    /// Log a warning and ignore the event. Default in release builds.
    Warn,
}

impl Default for ViolationPolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            ViolationPolicy::Panic
        } else {
            ViolationPolicy::Warn
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HookOptions {
    /// Log every lifecycle event at debug level
    pub verbose_logging: bool,
    /// Runs strictly longer than this are reported as long operations
    pub long_operation_threshold_ms: u64,
    /// Task kind that marks the start of a logical request
    pub request_root_kind: TaskKind,
    pub violation_policy: ViolationPolicy,
    /// How many destroyed task ids to remember for after-destroy detection
    pub tombstone_capacity: usize,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            verbose_logging: false,
            long_operation_threshold_ms: DEFAULT_LONG_OPERATION_THRESHOLD_MS,
            request_root_kind: TaskKind::RequestRoot,
            violation_policy: ViolationPolicy::default(),
            tombstone_capacity: DEFAULT_TOMBSTONE_CAPACITY,
        }
    }
}

impl HookOptions {
    /// Load options from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    #[must_use]
    pub fn long_operation_threshold(&self) -> Duration {
        Duration::from_millis(self.long_operation_threshold_ms)
    }
}
