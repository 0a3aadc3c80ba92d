//! Round and loop result types
//!
//! Every remote phase produces a [`PhaseResult`] regardless of outcome;
//! failures are statuses, not errors, so one unreachable node never aborts
//! a round. Rounds accumulate into the [`LoopReport`] persisted at the end
//! of a run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::NodeId;

/// Outcome of a single phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// Phase produced a parsed result artifact
    Completed,
    /// Remote command exited nonzero or the artifact was unparseable
    Failed,
    /// Session establishment or transport fault
    Error,
    /// Command succeeded but produced no result artifact
    NoResult,
    /// Control API returned non-2xx or an unsuccessful envelope
    ApiFailed,
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseStatus::Completed => write!(f, "completed"),
            PhaseStatus::Failed => write!(f, "failed"),
            PhaseStatus::Error => write!(f, "error"),
            PhaseStatus::NoResult => write!(f, "no_result"),
            PhaseStatus::ApiFailed => write!(f, "api_failed"),
        }
    }
}

/// Result of one phase within a round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Phase label, e.g. `coordinator_initiation`
    pub phase: String,
    /// Node the phase ran on
    pub node: NodeId,
    /// Outcome status
    pub status: PhaseStatus,
    /// Result artifact content, or an error envelope
    pub payload: Value,
}

impl PhaseResult {
    /// Create a new phase result
    pub fn new(
        phase: impl Into<String>,
        node: NodeId,
        status: PhaseStatus,
        payload: Value,
    ) -> Self {
        Self {
            phase: phase.into(),
            node,
            status,
            payload,
        }
    }

    /// Extract the final-output field consumed by the next phase.
    ///
    /// Dialogue phases carry `final_thesis`, synthesis carries
    /// `synthesized_thesis`. A missing or empty field is a soft failure:
    /// the caller reuses its previous input instead.
    pub fn final_output(&self) -> Option<&str> {
        self.payload
            .get("final_thesis")
            .or_else(|| self.payload.get("synthesized_thesis"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

/// Outcome of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// All three phases returned a result
    Completed,
    /// A phase fault or missing role assignment ended the round early
    Failed,
}

/// Result of one coordinator → executor → referee round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundResult {
    /// 1-based round number
    pub round: u32,
    /// Unix millis when the round started
    pub started_at: u64,
    /// Unix millis when the round ended
    pub ended_at: u64,
    /// Phase results in execution order
    pub phases: Vec<PhaseResult>,
    /// Round outcome
    pub status: RoundStatus,
    /// Error recorded for a failed round
    pub error: Option<String>,
}

/// Live state of a running loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopState {
    /// Execution identity for this run
    pub loop_id: String,
    /// Unix millis when the loop started
    pub started_at: u64,
    /// 1-based number of the round in flight (0 before the first round)
    pub current_round: u32,
    /// Total rounds requested
    pub total_rounds: u32,
    /// Nodes with a running service at loop start
    pub active_nodes: Vec<NodeId>,
    /// Dialogue carried forward between rounds
    pub current_dialogue: Option<String>,
    /// Compliance metric in [0, 1] over round completion and exact role
    /// assignment
    pub geometric_health: f64,
}

/// Overall loop outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopStatus {
    /// All requested rounds ran, regardless of individual round outcomes
    Completed,
    /// The loop could not run at all
    Failed,
}

impl fmt::Display for LoopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopStatus::Completed => write!(f, "completed"),
            LoopStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Configuration echo embedded in the persisted report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfiguration {
    /// Total rounds requested
    pub total_rounds: u32,
    /// Nodes active at loop start
    pub active_nodes: Vec<NodeId>,
    /// Golden ratio constant used for timing
    pub golden_ratio: f64,
    /// Base inter-round interval in seconds
    pub round_interval_secs: u64,
    /// Recursion depth passed to synthesis calls
    pub recursion_depth: u32,
}

/// Persisted result document for a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopReport {
    /// Execution identity
    pub loop_id: String,
    /// Unix millis when the loop started
    pub started_at: u64,
    /// Unix millis when the loop ended
    pub ended_at: u64,
    /// Wall-clock duration in seconds
    pub total_duration_secs: f64,
    /// Configuration echo
    pub configuration: ReportConfiguration,
    /// Per-round results
    pub rounds: Vec<RoundResult>,
    /// Overall outcome
    pub status: LoopStatus,
    /// Error for a failed loop
    pub error: Option<String>,
    /// Best-effort final dialogue
    pub final_dialogue: Option<String>,
    /// Final compliance metric
    pub geometric_health: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_final_output_from_dialogue_payload() {
        let result = PhaseResult::new(
            "coordinator_initiation",
            NodeId::from("a:8080"),
            PhaseStatus::Completed,
            json!({"final_thesis": "being precedes essence"}),
        );
        assert_eq!(result.final_output(), Some("being precedes essence"));
    }

    #[test]
    fn test_final_output_from_synthesis_payload() {
        let result = PhaseResult::new(
            "referee_synthesis",
            NodeId::from("a:8080"),
            PhaseStatus::Completed,
            json!({"synthesized_thesis": "a synthesis"}),
        );
        assert_eq!(result.final_output(), Some("a synthesis"));
    }

    #[test]
    fn test_final_output_absent_is_soft_failure() {
        let result = PhaseResult::new(
            "executor_continuation",
            NodeId::from("a:8080"),
            PhaseStatus::Completed,
            json!({"status": "ok"}),
        );
        assert_eq!(result.final_output(), None);
    }

    #[test]
    fn test_final_output_empty_string_is_soft_failure() {
        let result = PhaseResult::new(
            "executor_continuation",
            NodeId::from("a:8080"),
            PhaseStatus::Completed,
            json!({"final_thesis": "   "}),
        );
        assert_eq!(result.final_output(), None);
    }

    #[test]
    fn test_phase_status_serializes_snake_case() {
        let s = serde_json::to_string(&PhaseStatus::NoResult).unwrap();
        assert_eq!(s, "\"no_result\"");
        let s = serde_json::to_string(&PhaseStatus::ApiFailed).unwrap();
        assert_eq!(s, "\"api_failed\"");
    }
}
