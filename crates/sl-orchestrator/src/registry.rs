//! Node registry and role-selection policy

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use sl_core::config::NodeConnectionConfig;
use sl_core::types::{NodeHandle, NodeId, NodeStatus, Role};

/// A node chosen for a phase
#[derive(Debug, Clone)]
pub struct RoleSelection {
    /// The chosen node
    pub node_id: NodeId,
    /// Handle to its status record
    pub handle: NodeHandle,
    /// Whether the node actually holds the requested role, as opposed to
    /// being a fallback
    pub exact: bool,
}

/// Registry of configured nodes and their runtime status
///
/// Every configured node is registered once at construction time and
/// never removed; failed nodes keep their record so later phases can
/// retry or skip them. Registration order drives deterministic selection.
pub struct NodeRegistry {
    nodes: DashMap<NodeId, NodeHandle>,
    order: Vec<NodeId>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a node, returning its stable ID
    pub fn register(&mut self, config: NodeConnectionConfig) -> NodeId {
        let node_id = config.node_id();
        self.nodes.insert(
            node_id.clone(),
            Arc::new(RwLock::new(NodeStatus::new(config))),
        );
        self.order.push(node_id.clone());
        node_id
    }

    /// Get a node's status handle
    pub fn get(&self, node_id: &NodeId) -> Option<NodeHandle> {
        self.nodes.get(node_id).map(|r| Arc::clone(&r))
    }

    /// All nodes in registration order
    pub fn handles(&self) -> Vec<(NodeId, NodeHandle)> {
        self.order
            .iter()
            .filter_map(|id| self.get(id).map(|h| (id.clone(), h)))
            .collect()
    }

    /// IDs of nodes with a confirmed running service
    pub async fn list_running(&self) -> Vec<NodeId> {
        let mut running = Vec::new();
        for (id, handle) in self.handles() {
            if handle.read().await.service_running {
                running.push(id);
            }
        }
        running
    }

    /// IDs of nodes currently holding a role
    pub async fn list_by_role(&self, role: Role) -> Vec<NodeId> {
        let mut matching = Vec::new();
        for (id, handle) in self.handles() {
            if handle.read().await.role == role {
                matching.push(id);
            }
        }
        matching
    }

    /// Select a node for a role.
    ///
    /// Prefers a running node already holding the role; with none
    /// available, degrades to the first running node, which lets a
    /// depleted fleet reuse one node for every phase. Returns `None` only
    /// when nothing is running.
    pub async fn select_for_role(&self, role: Role) -> Option<RoleSelection> {
        let mut fallback = None;
        for (id, handle) in self.handles() {
            let status = handle.read().await;
            if !status.service_running {
                continue;
            }
            if status.role == role {
                drop(status);
                return Some(RoleSelection {
                    node_id: id,
                    handle,
                    exact: true,
                });
            }
            if fallback.is_none() {
                fallback = Some((id.clone(), Arc::clone(&handle)));
            }
        }
        fallback.map(|(node_id, handle)| RoleSelection {
            node_id,
            handle,
            exact: false,
        })
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(host: &str, api_port: u16) -> NodeConnectionConfig {
        let mut config = NodeConnectionConfig::new(host);
        config.api_port = api_port;
        config
    }

    async fn mark_running(registry: &NodeRegistry, id: &NodeId, role: Role) {
        let handle = registry.get(id).unwrap();
        let mut status = handle.write().await;
        status.service_running = true;
        status.role = role;
    }

    #[tokio::test]
    async fn test_register_and_get() {
        let mut registry = NodeRegistry::new();
        let id = registry.register(test_config("a", 8080));
        assert_eq!(id.as_str(), "a:8080");
        assert!(registry.get(&id).is_some());
        assert!(registry.get(&NodeId::from("b:8080")).is_none());
    }

    #[tokio::test]
    async fn test_select_prefers_exact_role_match() {
        let mut registry = NodeRegistry::new();
        let a = registry.register(test_config("a", 8080));
        let b = registry.register(test_config("b", 8080));
        mark_running(&registry, &a, Role::Coordinator).await;
        mark_running(&registry, &b, Role::Referee).await;

        let selection = registry.select_for_role(Role::Referee).await.unwrap();
        assert_eq!(selection.node_id, b);
        assert!(selection.exact);
    }

    #[tokio::test]
    async fn test_select_falls_back_to_first_running() {
        let mut registry = NodeRegistry::new();
        let a = registry.register(test_config("a", 8080));
        registry.register(test_config("b", 8080));
        mark_running(&registry, &a, Role::Coordinator).await;

        let selection = registry.select_for_role(Role::Referee).await.unwrap();
        assert_eq!(selection.node_id, a);
        assert!(!selection.exact);
    }

    #[tokio::test]
    async fn test_select_single_node_serves_every_role() {
        let mut registry = NodeRegistry::new();
        let a = registry.register(test_config("solo", 8080));
        mark_running(&registry, &a, Role::Coordinator).await;

        for role in [Role::Coordinator, Role::Executor, Role::Referee] {
            let selection = registry.select_for_role(role).await.unwrap();
            assert_eq!(selection.node_id, a);
        }
    }

    #[tokio::test]
    async fn test_select_none_when_nothing_running() {
        let mut registry = NodeRegistry::new();
        registry.register(test_config("a", 8080));
        assert!(registry.select_for_role(Role::Coordinator).await.is_none());
    }

    #[tokio::test]
    async fn test_list_running_preserves_registration_order() {
        let mut registry = NodeRegistry::new();
        let a = registry.register(test_config("a", 8080));
        let b = registry.register(test_config("b", 8081));
        let c = registry.register(test_config("c", 8082));
        mark_running(&registry, &c, Role::Referee).await;
        mark_running(&registry, &a, Role::Coordinator).await;

        assert_eq!(registry.list_running().await, vec![a, c]);
        let _ = b;
    }
}
