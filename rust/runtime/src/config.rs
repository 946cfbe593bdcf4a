//! Per-machine configuration.

use serde::{Deserialize, Serialize};

/// Machine configuration.
///
/// All fields are preallocation hints; they never bound behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Initial mailbox capacity.
    pub mailbox_capacity: usize,
    /// Expected nesting depth of the state stack.
    pub state_depth_hint: usize,
    /// Expected depth of the handler call stack.
    pub call_depth_hint: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 16,
            state_depth_hint: 4,
            call_depth_hint: 8,
        }
    }
}

impl MachineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the underlying decode error for malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config = MachineConfig::from_json(r#"{ "mailbox_capacity": 64 }"#).unwrap();
        assert_eq!(config.mailbox_capacity, 64);
        assert_eq!(config.state_depth_hint, MachineConfig::default().state_depth_hint);
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(MachineConfig::from_json(r#"{ "mailbox_capacity": "lots" }"#).is_err());
    }
}
