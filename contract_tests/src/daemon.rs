//! Daemon interface contract tests
//!
//! These tests define the stable contract for `org.freedesktop.DBus`.

// ===== Addressing =====
pub const DAEMON_SERVICE: &str = "org.freedesktop.DBus";
pub const DAEMON_PATH: &str = "/org/freedesktop/DBus";
pub const DAEMON_INTERFACE: &str = "org.freedesktop.DBus";
