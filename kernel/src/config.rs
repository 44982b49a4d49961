// Repository Configuration
//
// Startup settings for a table registry, loaded from JSON.

use serde::{Deserialize, Serialize};

/// Registry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Tables created when the registry starts.
    pub tables: Vec<String>,

    pub inbox: InboxConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxConfig {
    /// Attempts an inbox makes before giving up on a contended table.
    pub max_send_attempts: u32,
}

impl RepositoryConfig {
    /// Built-in configuration (used if no config is provided).
    pub fn default_config() -> Self {
        Self {
            tables: Vec::new(),
            inbox: InboxConfig::default(),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            max_send_attempts: 3,
        }
    }
}
