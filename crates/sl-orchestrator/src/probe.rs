//! Connectivity probing over the remote channel
//!
//! A node's channel is usable only if a session opens, authenticates, and
//! a canary command echoes the expected literal back. Anything less marks
//! the node disconnected with the failure recorded.

use std::time::Duration;

use sl_core::config::NodeConnectionConfig;
use sl_core::error::RemoteError;
use sl_core::types::NodeHandle;

use crate::remote::SshSession;

const CANARY_COMMAND: &str = "echo 'channel probe'";
const CANARY_OUTPUT: &str = "channel probe";

/// Probes nodes for channel usability
pub struct ConnectivityProber {
    timeout: Duration,
}

impl ConnectivityProber {
    /// Create a prober with the given connect timeout
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Probe one node, updating its status record.
    ///
    /// Safe to call repeatedly; a node that stays unreachable stays
    /// disconnected with the latest error recorded.
    pub async fn probe(&self, node: &NodeHandle) -> bool {
        let config = node.read().await.config.clone();

        match self.try_probe(&config).await {
            Ok(()) => {
                let mut status = node.write().await;
                status.connected = true;
                status.error_message = None;
                true
            }
            Err(e) => {
                let mut status = node.write().await;
                status.connected = false;
                status.record_error(e.to_string());
                false
            }
        }
    }

    async fn try_probe(&self, config: &NodeConnectionConfig) -> Result<(), RemoteError> {
        let session = SshSession::connect(config, self.timeout).await?;
        let result = session.exec(CANARY_COMMAND).await;
        // the session is released before the output is inspected, on both paths
        if let Err(e) = session.close().await {
            tracing::debug!("probe session close: {}", e);
        }

        let output = result?;
        let actual = output.stdout.trim();
        if output.success() && actual == CANARY_OUTPUT {
            Ok(())
        } else {
            Err(RemoteError::CanaryMismatch {
                expected: CANARY_OUTPUT.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sl_core::types::NodeStatus;
    use std::sync::Arc;
    use tokio::sync::RwLock;

    fn unreachable_node() -> NodeHandle {
        // reserved address, nothing listens there
        let mut config = NodeConnectionConfig::new("192.0.2.1");
        config.password = Some("unused".to_string());
        Arc::new(RwLock::new(NodeStatus::new(config)))
    }

    #[tokio::test]
    async fn test_probe_unreachable_node_is_idempotent() {
        let prober = ConnectivityProber::new(Duration::from_millis(200));
        let node = unreachable_node();

        for _ in 0..2 {
            assert!(!prober.probe(&node).await);
            let status = node.read().await;
            assert!(!status.connected);
            assert!(status.error_message.is_some());
        }
    }
}
