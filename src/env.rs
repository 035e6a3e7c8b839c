//! Environment variable names used for convenient configuration of the
//! logging pipeline from services and the diagnostic CLIs.
//!
//! These are purely helpers; the core types remain decoupled from
//! environment access.

/// Log directory, e.g. `logs` or `/var/log/myapp`.
pub const SPANLOG_DIR_ENV: &str = "SPANLOG_DIR";

/// Least severe level emitted, e.g. `DEBUG` or `WARNING`.
pub const SPANLOG_LEVEL_ENV: &str = "SPANLOG_LEVEL";

/// Console sink toggle; `0`, `false` or `no` disables it.
pub const SPANLOG_CONSOLE_ENV: &str = "SPANLOG_CONSOLE";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
