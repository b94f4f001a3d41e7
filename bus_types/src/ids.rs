//! Identifiers for bus instances

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one bus instance
///
/// Reported by the daemon's `GetId` method as 32 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BusId(Uuid);

impl BusId {
    /// Creates a new random bus ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a bus ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Hex form used on the wire
    pub fn to_hex(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for BusId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bus({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_id_creation() {
        let id1 = BusId::new();
        let id2 = BusId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_bus_id_hex_form() {
        let id = BusId::new();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_bus_id_from_uuid() {
        let uuid = Uuid::new_v4();
        assert_eq!(BusId::from_uuid(uuid).as_uuid(), uuid);
    }
}
