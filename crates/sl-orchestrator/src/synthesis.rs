//! Referee synthesis over the control API
//!
//! The synthesis prompt is staged on the node best-effort for operator
//! inspection; the actual work happens through a single timed POST to the
//! node's control API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use sl_core::config::{NodeConnectionConfig, GOLDEN_RATIO};
use sl_core::error::SandloopError;
use sl_core::report::{PhaseResult, PhaseStatus};
use sl_core::traits::SynthesisClient;
use sl_core::types::{NodeHandle, NodeId, Role};

use crate::remote::SshSession;

const SYNTHESIS_ROUTE: &str = "/python/recursive-orchestration";

/// Response envelope of the synthesis route
#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    success: bool,
    #[serde(default)]
    data: serde_json::Value,
}

/// Build the synthesis prompt from two evolved theses
pub fn synthesis_prompt(thesis_a: &str, thesis_b: &str) -> String {
    format!(
        "Synthesize these two evolved theses into a stronger, more comprehensive version:\n\n\
         Thesis A: {}\n\n\
         Thesis B: {}\n\n\
         Apply geometric principles (golden ratio, tetrahedral balance, fractal depth) to create\n\
         a synthesis that maintains the best elements of both while resolving any contradictions.",
        thesis_a, thesis_b
    )
}

/// Requests thesis synthesis from a node's control API
pub struct HttpSynthesisClient {
    http: reqwest::Client,
    connect_timeout: Duration,
    request_timeout: Duration,
    recursion_depth: u32,
}

impl HttpSynthesisClient {
    /// Create a client with the given SSH connect timeout (prompt
    /// staging), API request budget, and recursion depth
    pub fn new(connect_timeout: Duration, request_timeout: Duration, recursion_depth: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            connect_timeout,
            request_timeout,
            recursion_depth,
        }
    }

    /// Stage the prompt on the node; failure is logged, never fatal
    async fn stage_prompt(&self, config: &NodeConnectionConfig, round: u32, prompt: &str) {
        let path = format!("/tmp/synthesis_round_{}.md", round);
        match SshSession::connect(config, self.connect_timeout).await {
            Ok(session) => {
                if let Err(e) = session.write_file(&path, prompt).await {
                    tracing::warn!("failed to stage synthesis prompt on {}: {}", config.host, e);
                }
                if let Err(e) = session.close().await {
                    tracing::debug!("synthesis session close: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("failed to stage synthesis prompt on {}: {}", config.host, e);
            }
        }
    }

    async fn request(
        &self,
        config: &NodeConnectionConfig,
        node_id: &NodeId,
        thesis_a: &str,
        thesis_b: &str,
        prompt: &str,
    ) -> PhaseResult {
        let phase = Role::Referee.phase_label();
        let summary: String = prompt.chars().take(500).collect();
        let body = json!({
            "task_description": format!("Synthesize theses with geometric principles: {}...", summary),
            "recursion_depth": self.recursion_depth,
            "cosmic_parameters": {
                "thesis_a": thesis_a,
                "thesis_b": thesis_b,
                "geometric_constraints": { "golden_ratio": GOLDEN_RATIO },
            },
        });

        let url = format!("{}{}", config.api_url(), SYNTHESIS_ROUTE);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.json::<ApiEnvelope>().await {
                Ok(envelope) if envelope.success => {
                    tracing::info!("synthesis completed on {}", node_id);
                    let thesis = envelope
                        .data
                        .get("result")
                        .and_then(serde_json::Value::as_str)
                        .unwrap_or("Synthesis completed");
                    let metrics = envelope
                        .data
                        .get("geometric_metadata")
                        .cloned()
                        .unwrap_or_else(|| json!({}));
                    PhaseResult::new(
                        phase,
                        node_id.clone(),
                        PhaseStatus::Completed,
                        json!({
                            "synthesized_thesis": thesis,
                            "geometric_metrics": metrics,
                        }),
                    )
                }
                Ok(_) => {
                    tracing::warn!("synthesis rejected by {}", node_id);
                    PhaseResult::new(
                        phase,
                        node_id.clone(),
                        PhaseStatus::ApiFailed,
                        json!({ "error": "API envelope reported failure" }),
                    )
                }
                Err(e) => PhaseResult::new(
                    phase,
                    node_id.clone(),
                    PhaseStatus::ApiFailed,
                    json!({ "error": format!("malformed API response: {}", e) }),
                ),
            },
            Ok(resp) => {
                tracing::warn!("synthesis API call failed: HTTP {}", resp.status());
                PhaseResult::new(
                    phase,
                    node_id.clone(),
                    PhaseStatus::ApiFailed,
                    json!({ "error": format!("HTTP {}", resp.status().as_u16()) }),
                )
            }
            Err(e) => {
                tracing::warn!("synthesis transport error on {}: {}", node_id, e);
                PhaseResult::new(
                    phase,
                    node_id.clone(),
                    PhaseStatus::Error,
                    json!({ "error": e.to_string() }),
                )
            }
        }
    }
}

#[async_trait]
impl SynthesisClient for HttpSynthesisClient {
    async fn synthesize(
        &self,
        node: &NodeHandle,
        thesis_a: &str,
        thesis_b: &str,
        round: u32,
    ) -> Result<PhaseResult, SandloopError> {
        let config = node.read().await.config.clone();
        let node_id = config.node_id();

        let prompt = synthesis_prompt(thesis_a, thesis_b);
        self.stage_prompt(&config, round, &prompt).await;

        Ok(self
            .request(&config, &node_id, thesis_a, thesis_b, &prompt)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_both_theses() {
        let prompt = synthesis_prompt("all is flux", "nothing changes");
        assert!(prompt.contains("Thesis A: all is flux"));
        assert!(prompt.contains("Thesis B: nothing changes"));
    }

    #[test]
    fn test_envelope_parses_with_missing_data() {
        let envelope: ApiEnvelope = serde_json::from_str("{\"success\": true}").unwrap();
        assert!(envelope.success);
        assert!(envelope.data.is_null());
    }
}
