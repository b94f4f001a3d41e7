//! Simulated bus configuration

use serde::{Deserialize, Serialize};

/// Tunables for a [`crate::SimulatedBus`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimBusConfig {
    /// Frames a connection may have waiting before sends to it fail
    pub queue_capacity: usize,
}

impl SimBusConfig {
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

impl Default for SimBusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capacity() {
        assert_eq!(SimBusConfig::default().queue_capacity, 1024);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: SimBusConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SimBusConfig::default());
        let config: SimBusConfig = serde_json::from_str(r#"{"queue_capacity": 8}"#).unwrap();
        assert_eq!(config.queue_capacity, 8);
    }
}
