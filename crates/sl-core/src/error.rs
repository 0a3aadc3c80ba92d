//! Core error types for Sandloop

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the sandloop ecosystem
#[derive(Error, Debug)]
pub enum SandloopError {
    /// Remote channel error
    #[error("Remote channel error: {0}")]
    Remote(#[from] RemoteError),

    /// Control API error
    #[error("Control API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Setup could not reach enough nodes to proceed
    #[error("Setup failed: {0}")]
    Setup(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced by the remote command channel
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Authentication was rejected or no credentials were configured
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Transport-level connection failure
    #[error("Connection failed: {0}")]
    Connectivity(String),

    /// The canary command returned unexpected output
    #[error("Canary output mismatch: expected {expected:?}, got {actual:?}")]
    CanaryMismatch {
        /// Expected canary output
        expected: String,
        /// Output actually received
        actual: String,
    },

    /// An operation exceeded its time budget
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// A remote command exited nonzero
    #[error("Remote command exited with status {exit_code}: {stderr}")]
    Execution {
        /// Exit status reported by the remote shell
        exit_code: u32,
        /// Captured standard error
        stderr: String,
    },

    /// The service did not appear in the remote process table after launch
    #[error("Service did not appear in the remote process table")]
    ProcessStart,

    /// The channel closed before an exit status was reported
    #[error("Channel closed before exit status was reported")]
    ChannelClosed,
}

/// Errors produced by the node control API
#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response status
    #[error("HTTP {0}")]
    Status(u16),

    /// The response envelope reported failure
    #[error("API reported failure: {0}")]
    Unsuccessful(String),

    /// Transport-level failure (DNS, connect, timeout)
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// No nodes configured
    #[error("No nodes configured")]
    NoNodes,
}
