//! Node health probing over the control API
//!
//! Runs between rounds. A transient health-check failure is logged and
//! leaves `service_running` untouched; only explicit phase or connection
//! failures take a node out of rotation.

use std::time::Duration;

use sl_core::time::now_millis;

use crate::registry::NodeRegistry;

/// Probes running nodes' control APIs
pub struct HealthMonitor {
    http: reqwest::Client,
    timeout: Duration,
}

impl HealthMonitor {
    /// Create a monitor with the given per-request budget
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Check every node with a running service
    pub async fn check_all(&self, registry: &NodeRegistry) {
        for (node_id, handle) in registry.handles() {
            let (running, api_url) = {
                let status = handle.read().await;
                (status.service_running, status.config.api_url())
            };
            if !running {
                continue;
            }

            let response = self
                .http
                .get(format!("{}/health", api_url))
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    handle.write().await.last_health_check = Some(now_millis());
                    tracing::debug!("health check passed: {}", node_id);
                }
                Ok(resp) => {
                    tracing::warn!("health check failed: {} (HTTP {})", node_id, resp.status());
                }
                Err(e) => {
                    tracing::warn!("health check error: {}: {}", node_id, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_core::config::NodeConnectionConfig;

    #[tokio::test]
    async fn test_check_all_skips_nodes_without_running_service() {
        let mut registry = NodeRegistry::new();
        // reserved address; would time out if it were actually probed
        let id = registry.register(NodeConnectionConfig::new("192.0.2.1"));

        let monitor = HealthMonitor::new(Duration::from_millis(50));
        monitor.check_all(&registry).await;

        let handle = registry.get(&id).unwrap();
        assert!(handle.read().await.last_health_check.is_none());
    }
}
