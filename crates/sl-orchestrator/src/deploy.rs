//! Remote service presence checks and startup
//!
//! Copying binaries to nodes is out of scope; the manager verifies what
//! is already installed and launches it in the background with the ports
//! derived from the node's configuration.

use std::time::Duration;

use sl_core::config::NodeConnectionConfig;
use sl_core::error::RemoteError;
use sl_core::types::{NodeHandle, Role};

use crate::remote::SshSession;

/// Verifies service binaries and starts them with a role
pub struct DeployManager {
    connect_timeout: Duration,
    settle_delay: Duration,
}

impl DeployManager {
    /// Create a manager with the given connect timeout and post-launch
    /// settle delay
    pub fn new(connect_timeout: Duration, settle_delay: Duration) -> Self {
        Self {
            connect_timeout,
            settle_delay,
        }
    }

    /// Check that the service binary is present on the node.
    ///
    /// A missing binary is logged and still succeeds; only a connectivity
    /// failure during the check returns false.
    pub async fn ensure_deployed(&self, node: &NodeHandle) -> bool {
        let config = node.read().await.config.clone();
        let node_id = config.node_id();

        match self.check_binary(&config).await {
            Ok(true) => {
                tracing::debug!("service binary present on {}", node_id);
                true
            }
            Ok(false) => {
                tracing::info!(
                    "service binary missing on {}; install is handled out of band",
                    node_id
                );
                true
            }
            Err(e) => {
                tracing::warn!("deployment check failed on {}: {}", node_id, e);
                node.write().await.record_error(e.to_string());
                false
            }
        }
    }

    async fn check_binary(&self, config: &NodeConnectionConfig) -> Result<bool, RemoteError> {
        let session = SshSession::connect(config, self.connect_timeout).await?;
        let result = session
            .exec(&format!("test -f {} && echo present", config.install_path))
            .await;
        if let Err(e) = session.close().await {
            tracing::debug!("deploy session close: {}", e);
        }
        Ok(result?.stdout.contains("present"))
    }

    /// Launch the service on the node and assign it a role.
    ///
    /// Not double-start safe: callers must check `service_running` first.
    pub async fn start_service(&self, node: &NodeHandle, role: Role) -> bool {
        let config = node.read().await.config.clone();
        let node_id = config.node_id();

        match self.launch(&config).await {
            Ok(pid) => {
                let mut status = node.write().await;
                status.service_running = true;
                status.role = role;
                tracing::info!("service started on {} as {} (pid {})", node_id, role, pid);
                true
            }
            Err(e) => {
                tracing::warn!("service start failed on {}: {}", node_id, e);
                node.write().await.record_error(e.to_string());
                false
            }
        }
    }

    async fn launch(&self, config: &NodeConnectionConfig) -> Result<String, RemoteError> {
        let session = SshSession::connect(config, self.connect_timeout).await?;
        let result = self.launch_and_poll(&session, config).await;
        if let Err(e) = session.close().await {
            tracing::debug!("launch session close: {}", e);
        }
        result
    }

    async fn launch_and_poll(
        &self,
        session: &SshSession,
        config: &NodeConnectionConfig,
    ) -> Result<String, RemoteError> {
        let start_command = format!(
            "cd {} && nohup {} start --port {} --p2p-port {} --log-level info > service.log 2>&1 &",
            config.workdir,
            config.install_path,
            config.api_port,
            config.p2p_port(),
        );
        session.exec(&start_command).await?;

        // give the process a moment before consulting the process table
        tokio::time::sleep(self.settle_delay).await;

        let pgrep = session
            .exec(&format!("pgrep -f {}", config.binary_name()))
            .await?;
        let pid = pgrep.stdout.trim().to_string();
        if pid.is_empty() {
            Err(RemoteError::ProcessStart)
        } else {
            Ok(pid)
        }
    }
}
