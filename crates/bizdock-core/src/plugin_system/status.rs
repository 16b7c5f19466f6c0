use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a registered plugin configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginStatus {
    #[default]
    Stopped,
    Starting,
    Started,
    Stopping,
    StartFailed,
}

impl PluginStatus {
    pub const ALL: [PluginStatus; 5] = [
        PluginStatus::Stopped,
        PluginStatus::Starting,
        PluginStatus::Started,
        PluginStatus::Stopping,
        PluginStatus::StartFailed,
    ];

    /// A stop is accepted from these states
    pub fn is_stoppable(&self) -> bool {
        matches!(self, PluginStatus::Started | PluginStatus::StartFailed)
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginStatus::Stopped => "STOPPED",
            PluginStatus::Starting => "STARTING",
            PluginStatus::Started => "STARTED",
            PluginStatus::Stopping => "STOPPING",
            PluginStatus::StartFailed => "START_FAILED",
        };
        f.write_str(name)
    }
}

/// Mailbox of a lifecycle worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleMessage {
    Start,
    Stop,
}

/// Outcome reported by a lifecycle worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCallback {
    pub plugin_configuration_id: i64,
    pub status: PluginStatus,
}
