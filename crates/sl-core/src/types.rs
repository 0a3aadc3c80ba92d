//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::NodeConnectionConfig;

/// Unique identifier for a node
///
/// Derived from the host and control-API port so it stays stable across
/// reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new node ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a node ID from a host and control-API port
    pub fn from_endpoint(host: &str, api_port: u16) -> Self {
        Self(format!("{}:{}", host, api_port))
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Role a node holds within the round pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Opens each round and seeds the dialogue
    Coordinator,
    /// Continues the dialogue from the coordinator's output
    Executor,
    /// Synthesizes the coordinator and executor outputs
    Referee,
    /// Spare node, not part of the pipeline
    Development,
}

impl Role {
    /// Roles in round-robin assignment order
    pub const ALL: [Role; 4] = [
        Role::Coordinator,
        Role::Executor,
        Role::Referee,
        Role::Development,
    ];

    /// Phase label used in round results
    pub fn phase_label(&self) -> &'static str {
        match self {
            Role::Coordinator => "coordinator_initiation",
            Role::Executor => "executor_continuation",
            Role::Referee => "referee_synthesis",
            Role::Development => "development",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Coordinator => write!(f, "coordinator"),
            Role::Executor => write!(f, "executor"),
            Role::Referee => write!(f, "referee"),
            Role::Development => write!(f, "development"),
        }
    }
}

/// Runtime status of a configured node
///
/// One record exists per configured node for the lifetime of a run. A node
/// that fails keeps its record, with the failure captured in
/// `error_message`, so later phases can retry or skip it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Connection configuration, immutable once registered
    pub config: NodeConnectionConfig,
    /// Whether the remote channel answered the canary probe
    pub connected: bool,
    /// Whether the service process was confirmed running
    pub service_running: bool,
    /// Unix millis of the last successful health check
    pub last_health_check: Option<u64>,
    /// Role currently assigned to this node
    pub role: Role,
    /// Last error observed on this node
    pub error_message: Option<String>,
}

impl NodeStatus {
    /// Create a fresh status record for a configured node
    pub fn new(config: NodeConnectionConfig) -> Self {
        Self {
            config,
            connected: false,
            service_running: false,
            last_health_check: None,
            role: Role::Development,
            error_message: None,
        }
    }

    /// Node ID for this record
    pub fn node_id(&self) -> NodeId {
        self.config.node_id()
    }

    /// Record a failure without discarding the node
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error_message = Some(message.into());
    }
}

/// Shared handle to a node's status record
///
/// Mutation is serialized per node; the sequential control flow means no
/// two components write the same record at the same time.
pub type NodeHandle = Arc<RwLock<NodeStatus>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_from_endpoint() {
        let id = NodeId::from_endpoint("10.0.0.5", 8080);
        assert_eq!(id.as_str(), "10.0.0.5:8080");
        assert_eq!(format!("{}", id), "10.0.0.5:8080");
    }

    #[test]
    fn test_role_display() {
        assert_eq!(format!("{}", Role::Coordinator), "coordinator");
        assert_eq!(format!("{}", Role::Referee), "referee");
    }

    #[test]
    fn test_role_phase_labels_are_distinct() {
        let labels: Vec<_> = Role::ALL.iter().map(|r| r.phase_label()).collect();
        for (i, a) in labels.iter().enumerate() {
            for b in labels.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
