//! Application-wide constants for scriptcast.
//!
//! Defaults for [`crate::config::Config`], the environment variables that
//! override them, and the fixed names the binary uses on disk.
//!
//! # Categories
//!
//! - **Names**: application and file names
//! - **Defaults**: configuration defaults
//! - **Environment**: override variables

// ============================================================================
// Names
// ============================================================================

/// Application name, used for the config directory.
pub const APP_NAME: &str = "scriptcast";

/// Config file name inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Log file name inside the config directory.
pub const LOG_FILE_NAME: &str = "scriptcast.log";

/// Log target for messages emitted by Lua scripts.
pub const LUA_LOG_TARGET: &str = "lua";

// ============================================================================
// Defaults
// ============================================================================

/// Largest serialized message delivered to the client, in megabytes.
///
/// Matches the limit browsers and websocket servers commonly accept for a
/// single frame.
pub const DEFAULT_MAX_MESSAGE_SIZE_MB: u64 = 200;

/// Delivery loop flush period, in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 10;

/// Script runner shutdown deadline, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Message shown in place of exception details when they are hidden.
pub const HIDDEN_ERROR_MESSAGE: &str =
    "This app has encountered an error. The original error message is in the server log.";

// ============================================================================
// Environment
// ============================================================================

/// Overrides the config directory.
pub const ENV_CONFIG_DIR: &str = "SCRIPTCAST_CONFIG_DIR";

/// Overrides the log file path.
pub const ENV_LOG_FILE: &str = "SCRIPTCAST_LOG_FILE";

/// Overrides [`DEFAULT_MAX_MESSAGE_SIZE_MB`].
pub const ENV_MAX_MESSAGE_SIZE_MB: &str = "SCRIPTCAST_MAX_MESSAGE_SIZE_MB";

/// Overrides run-on-save (`true` / `false`).
pub const ENV_RUN_ON_SAVE: &str = "SCRIPTCAST_RUN_ON_SAVE";

/// Overrides [`DEFAULT_FLUSH_INTERVAL_MS`].
pub const ENV_FLUSH_INTERVAL_MS: &str = "SCRIPTCAST_FLUSH_INTERVAL_MS";

/// Overrides [`DEFAULT_SHUTDOWN_TIMEOUT_SECS`].
pub const ENV_SHUTDOWN_TIMEOUT_SECS: &str = "SCRIPTCAST_SHUTDOWN_TIMEOUT_SECS";

/// Overrides whether exception details reach the client.
pub const ENV_SHOW_ERROR_DETAILS: &str = "SCRIPTCAST_SHOW_ERROR_DETAILS";
