/// Application name
pub const APP_NAME: &str = "BizDock";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Settings file looked up when none is given
pub const DEFAULT_SETTINGS_FILE: &str = "bizdock.toml";

/// Permission required by the plugin configurator controllers
pub const ADMIN_PLUGIN_MANAGER_PERMISSION: &str = "ADMIN_PLUGIN_MANAGER_PERMISSION";

/// Prefix of the tool menu items of started plugins
pub const PLUGIN_TOOL_ITEM_PREFIX: &str = "_PLUGIN_";

/// Bound on the wait for stopping plugins at shutdown, in seconds
pub const SHUTDOWN_GRACE_SECS: u64 = 10;
