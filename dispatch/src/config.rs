//! Connection configuration

use bus_api::BusError;
use bus_types::WellKnownBus;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one bus connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Timeout for raw calls that carry no descriptor
    pub default_call_timeout_ms: u64,
    /// Longest a blocked caller or executor waits before re-checking state
    pub poll_interval_ms: u64,
    /// Which standard bus the connection targets
    pub bus: WellKnownBus,
}

impl ConnectionConfig {
    pub fn new(bus: WellKnownBus) -> Self {
        Self {
            bus,
            ..Self::default()
        }
    }

    pub fn with_default_call_timeout(mut self, timeout: Duration) -> Self {
        self.default_call_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn default_call_timeout(&self) -> Duration {
        Duration::from_millis(self.default_call_timeout_ms)
    }

    /// Poll interval, never zero
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Serializes to JSON string
    pub fn to_json(&self) -> Result<String, BusError> {
        serde_json::to_string_pretty(self).map_err(|e| BusError::Config(e.to_string()))
    }

    /// Deserializes from JSON string; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, BusError> {
        serde_json::from_str(json).map_err(|e| BusError::Config(e.to_string()))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            default_call_timeout_ms: 25_000,
            poll_interval_ms: 20,
            bus: WellKnownBus::Session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConnectionConfig::default();
        assert_eq!(config.default_call_timeout(), Duration::from_secs(25));
        assert_eq!(config.poll_interval(), Duration::from_millis(20));
        assert_eq!(config.bus, WellKnownBus::Session);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ConnectionConfig::from_json(r#"{ "bus": "system" }"#).unwrap();
        assert_eq!(config.bus, WellKnownBus::System);
        assert_eq!(config.default_call_timeout_ms, 25_000);
    }

    #[test]
    fn test_json_round_trip_and_errors() {
        let config = ConnectionConfig::new(WellKnownBus::Starter)
            .with_poll_interval(Duration::from_millis(5));
        let json = config.to_json().unwrap();
        assert_eq!(ConnectionConfig::from_json(&json).unwrap(), config);
        assert!(matches!(
            ConnectionConfig::from_json("{ not json"),
            Err(BusError::Config(_))
        ));
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = ConnectionConfig::default().with_poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval(), Duration::from_millis(1));
    }
}
