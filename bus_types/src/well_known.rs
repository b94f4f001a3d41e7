//! Well-known buses and the daemon's own coordinates

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bus name owned by the bus daemon itself
pub const DBUS_SERVICE: &str = "org.freedesktop.DBus";

/// Object path of the bus daemon
pub const DBUS_PATH: &str = "/org/freedesktop/DBus";

/// Interface implemented by the bus daemon
pub const DBUS_INTERFACE: &str = "org.freedesktop.DBus";

/// Which of the standard buses a connection targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellKnownBus {
    /// Per-login-session bus
    #[default]
    Session,
    /// System-wide bus
    System,
    /// Bus that activated the current process
    Starter,
}

impl WellKnownBus {
    /// Environment variable carrying this bus's address
    pub fn address_env_var(&self) -> &'static str {
        match self {
            Self::Session => "DBUS_SESSION_BUS_ADDRESS",
            Self::System => "DBUS_SYSTEM_BUS_ADDRESS",
            Self::Starter => "DBUS_STARTER_ADDRESS",
        }
    }
}

impl fmt::Display for WellKnownBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Session => write!(f, "session"),
            Self::System => write!(f, "system"),
            Self::Starter => write!(f, "starter"),
        }
    }
}
