//! Machine (sensor node) data model

use serde::{Deserialize, Serialize};

/// An industrial sensor node registered with the backend
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Machine {
    /// Machine identifier
    pub id: i64,

    /// Display name
    pub name: Option<String>,
}

/// Generic label for a machine whose name is unknown
pub fn fallback_machine_name(machine_id: i64) -> String {
    format!("Node {machine_id}")
}
