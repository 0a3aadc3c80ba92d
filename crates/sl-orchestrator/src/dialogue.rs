//! Remote dialogue execution and artifact retrieval
//!
//! Dialogue runs are opaque remote programs; the engine's contract with
//! them is a command line, an exit status, and a JSON result artifact
//! dropped in the node's working directory.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use sl_core::config::NodeConnectionConfig;
use sl_core::error::{RemoteError, SandloopError};
use sl_core::report::{PhaseResult, PhaseStatus};
use sl_core::traits::DialogueRunner;
use sl_core::types::{NodeHandle, NodeId, Role};

use crate::remote::SshSession;

const DIALOGUE_SCRIPT: &str = "examples/socratic_dialogue.py";
const SEED_MESSAGE: &str = "examples/first_message.md";
const RESULT_GLOB: &str = "cosmic_dialogue_result_*.json";

/// Runs dialogue phases over the SSH channel
pub struct SshDialogueRunner {
    connect_timeout: Duration,
}

impl SshDialogueRunner {
    /// Create a runner with the given session connect timeout
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn execute(
        &self,
        config: &NodeConnectionConfig,
        node_id: &NodeId,
        phase: &str,
        round: u32,
        previous_context: Option<&str>,
    ) -> Result<PhaseResult, RemoteError> {
        let session = SshSession::connect(config, self.connect_timeout).await?;
        let result = self
            .run_phase(&session, config, node_id, phase, round, previous_context)
            .await;
        if let Err(e) = session.close().await {
            tracing::debug!("dialogue session close: {}", e);
        }
        result
    }

    async fn run_phase(
        &self,
        session: &SshSession,
        config: &NodeConnectionConfig,
        node_id: &NodeId,
        phase: &str,
        round: u32,
        previous_context: Option<&str>,
    ) -> Result<PhaseResult, RemoteError> {
        let script = format!("{}/{}", config.workdir, DIALOGUE_SCRIPT);
        let mut input = format!("{}/{}", config.workdir, SEED_MESSAGE);

        if let Some(context) = previous_context {
            let context_file = format!("/tmp/context_round_{}.md", round);
            session.write_file(&context_file, context).await?;
            input = context_file;
        }

        let command = format!("python3 {} {}", script, input);
        tracing::debug!("running dialogue on {}: {}", node_id, command);
        let output = session.exec(&command).await?;

        if !output.success() {
            tracing::warn!(
                "dialogue exited {} on {}: {}",
                output.exit_status,
                node_id,
                output.stderr.trim()
            );
            return Ok(PhaseResult::new(
                phase,
                node_id.clone(),
                PhaseStatus::Failed,
                json!({
                    "exit_code": output.exit_status,
                    "error": output.stderr,
                }),
            ));
        }

        // newest artifact wins; the embedded timestamp makes lexicographic
        // order chronological
        let listing = session
            .exec(&format!(
                "ls {}/{} | tail -1",
                config.workdir, RESULT_GLOB
            ))
            .await?;
        let result_file = listing.stdout.trim().to_string();

        if result_file.is_empty() {
            tracing::warn!("no result artifact on {}", node_id);
            return Ok(PhaseResult::new(
                phase,
                node_id.clone(),
                PhaseStatus::NoResult,
                json!({
                    "output": output.stdout,
                    "error": output.stderr,
                }),
            ));
        }

        let content = session.read_file(&result_file).await?;
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(payload) => {
                tracing::info!("dialogue completed on {}", node_id);
                Ok(PhaseResult::new(
                    phase,
                    node_id.clone(),
                    PhaseStatus::Completed,
                    payload,
                ))
            }
            Err(e) => Ok(PhaseResult::new(
                phase,
                node_id.clone(),
                PhaseStatus::Failed,
                json!({
                    "error": format!("result artifact is not valid JSON: {}", e),
                    "raw": content,
                }),
            )),
        }
    }
}

#[async_trait]
impl DialogueRunner for SshDialogueRunner {
    async fn run(
        &self,
        node: &NodeHandle,
        role: Role,
        round: u32,
        previous_context: Option<&str>,
    ) -> Result<PhaseResult, SandloopError> {
        let config = node.read().await.config.clone();
        let node_id = config.node_id();
        let phase = role.phase_label();

        match self
            .execute(&config, &node_id, phase, round, previous_context)
            .await
        {
            Ok(result) => Ok(result),
            Err(e) => {
                // an unreachable node degrades the phase, not the round
                tracing::warn!("dialogue session failed on {}: {}", node_id, e);
                Ok(PhaseResult::new(
                    phase,
                    node_id,
                    PhaseStatus::Error,
                    json!({ "error": e.to_string() }),
                ))
            }
        }
    }
}
