//! Contract tests for the interfaces every exported object serves

// ===== Interface Names =====
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";
pub const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";
pub const PEER_INTERFACE: &str = "org.freedesktop.DBus.Peer";
