//! Configuration for traversal limits

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the kinship engine
///
/// Bounds the work a single traversal may do.
///
/// # Examples
///
/// ```
/// use kinship_engine::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.max_connection_depth, 20);
/// assert_eq!(config.max_paths, 3);
///
/// let config = EngineConfig::from_toml("max_paths = 5").unwrap();
/// assert_eq!(config.max_paths, 5);
/// assert_eq!(config.default_circle_depth, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum path length searched by the connection finder
    /// Default: 20 hops
    pub max_connection_depth: usize,

    /// Maximum number of alternative paths returned
    /// Default: 3
    pub max_paths: usize,

    /// Maximum number of common ancestors reported
    /// Default: 5
    pub max_common_ancestors: usize,

    /// Circle search depth when the caller gives none
    /// Default: 3 hops
    pub default_circle_depth: usize,

    /// Largest circle search depth a caller may request
    /// Default: 10 hops
    pub max_circle_depth: usize,

    /// Abort a traversal between rounds once it has run this long
    /// Default: no deadline
    pub traversal_timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_connection_depth: 20,
            max_paths: 3,
            max_common_ancestors: 5,
            default_circle_depth: 3,
            max_circle_depth: 10,
            traversal_timeout_ms: None,
        }
    }
}

impl EngineConfig {
    /// Interactive preset: shallower searches under a two second deadline
    pub fn interactive() -> Self {
        Self {
            max_connection_depth: 12,
            max_paths: 3,
            max_common_ancestors: 5,
            default_circle_depth: 2,
            max_circle_depth: 6,
            traversal_timeout_ms: Some(2_000),
        }
    }

    /// Get the traversal deadline as a Duration
    pub fn traversal_timeout(&self) -> Option<Duration> {
        self.traversal_timeout_ms.map(Duration::from_millis)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connection_depth == 0 {
            return Err("max_connection_depth must be greater than 0".to_string());
        }
        if self.max_paths == 0 {
            return Err("max_paths must be greater than 0".to_string());
        }
        if self.max_circle_depth == 0 {
            return Err("max_circle_depth must be greater than 0".to_string());
        }
        if self.default_circle_depth == 0 || self.default_circle_depth > self.max_circle_depth {
            return Err("default_circle_depth must be between 1 and max_circle_depth".to_string());
        }
        if self.traversal_timeout_ms == Some(0) {
            return Err("traversal_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
