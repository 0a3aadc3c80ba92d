//! SSH command channel to a remote node
//!
//! Wraps a russh client session behind the small surface the rest of the
//! engine needs: run a command and collect its output, write a file
//! through the shell, read one back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key::PublicKey;

use sl_core::config::NodeConnectionConfig;
use sl_core::error::RemoteError;

/// Output of a remote command execution
#[derive(Debug, Default)]
pub struct ExecOutput {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Exit status reported by the remote shell
    pub exit_status: u32,
}

impl ExecOutput {
    /// Whether the command exited zero
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Escape content for interpolation inside single quotes.
///
/// Embedded single quotes become `'"'"'` so dialogue content cannot break
/// out of the quoting and inject shell commands.
pub fn escape_single_quotes(content: &str) -> String {
    content.replace('\'', "'\"'\"'")
}

/// An authenticated SSH session to a single node
pub struct SshSession {
    handle: Handle<ClientHandler>,
}

impl SshSession {
    /// Connect and authenticate against a node.
    ///
    /// Uses the configured private key when present, otherwise password
    /// authentication; a node with neither fails authentication outright.
    pub async fn connect(
        config: &NodeConnectionConfig,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let ssh_config = Arc::new(Config::default());
        let address = (config.host.as_str(), config.port);

        let mut handle = tokio::time::timeout(
            timeout,
            client::connect(ssh_config, address, ClientHandler),
        )
        .await
        .map_err(|_| RemoteError::Timeout(timeout))?
        .map_err(|e| RemoteError::Connectivity(format!("{}:{}: {}", config.host, config.port, e)))?;

        let authenticated = if let Some(key_path) = &config.key_file {
            let key = russh_keys::load_secret_key(key_path, None).map_err(|e| {
                RemoteError::Connectivity(format!(
                    "failed to load key {}: {}",
                    key_path.display(),
                    e
                ))
            })?;
            handle
                .authenticate_publickey(&config.username, Arc::new(key))
                .await
                .map_err(|e| RemoteError::Connectivity(format!("publickey auth: {}", e)))?
        } else if let Some(password) = &config.password {
            handle
                .authenticate_password(&config.username, password)
                .await
                .map_err(|e| RemoteError::Connectivity(format!("password auth: {}", e)))?
        } else {
            return Err(RemoteError::AuthenticationFailed);
        };

        if !authenticated {
            return Err(RemoteError::AuthenticationFailed);
        }

        Ok(Self { handle })
    }

    /// Execute a command, blocking until its exit status is available
    pub async fn exec(&self, command: &str) -> Result<ExecOutput, RemoteError> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| RemoteError::Connectivity(format!("channel open: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| RemoteError::Connectivity(format!("exec: {}", e)))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status: status } => exit_status = Some(status),
                _ => {}
            }
        }

        let exit_status = exit_status.ok_or(RemoteError::ChannelClosed)?;

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }

    /// Write content to a remote path through the shell.
    ///
    /// Short content only; result artifacts come back over `read_file`.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), RemoteError> {
        let command = format!("echo '{}' > {}", escape_single_quotes(content), path);
        let output = self.exec(&command).await?;
        if output.success() {
            Ok(())
        } else {
            Err(RemoteError::Execution {
                exit_code: output.exit_status,
                stderr: output.stderr,
            })
        }
    }

    /// Read a remote file's content
    pub async fn read_file(&self, path: &str) -> Result<String, RemoteError> {
        let output = self.exec(&format!("cat {}", path)).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(RemoteError::Execution {
                exit_code: output.exit_status,
                stderr: output.stderr,
            })
        }
    }

    /// Close the session gracefully
    pub async fn close(self) -> Result<(), RemoteError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "closing", "en")
            .await
            .map_err(|e| RemoteError::Connectivity(format!("disconnect: {}", e)))?;
        Ok(())
    }
}

/// SSH client handler for outbound sessions.
///
/// Host keys are not pinned; transport trust comes from the deployment
/// network the fleet lives on.
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = anyhow::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!("server host key: {}", server_public_key.fingerprint());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_single_quotes() {
        assert_eq!(escape_single_quotes("no quotes"), "no quotes");
        assert_eq!(escape_single_quotes("it's"), "it'\"'\"'s");
    }

    #[test]
    fn test_escape_neutralizes_injection_payload() {
        let payload = "'; rm -rf / #";
        let escaped = escape_single_quotes(payload);
        // the leading quote can no longer terminate the enclosing string
        assert!(escaped.starts_with("'\"'\"'"));
        assert!(!escaped.contains("''"));
    }

    #[test]
    fn test_exec_output_success() {
        let ok = ExecOutput {
            exit_status: 0,
            ..Default::default()
        };
        let bad = ExecOutput {
            exit_status: 127,
            ..Default::default()
        };
        assert!(ok.success());
        assert!(!bad.success());
    }
}
