//! Phase execution traits
//!
//! The round state machine drives phases through these traits so the
//! sequencing, failure isolation, and carry-forward rules can be exercised
//! without a live fleet.

use async_trait::async_trait;

use crate::error::SandloopError;
use crate::report::PhaseResult;
use crate::types::{NodeHandle, Role};

/// Runs one dialogue phase on a node and retrieves its result artifact
#[async_trait]
pub trait DialogueRunner: Send + Sync {
    /// Execute the dialogue task for `role` in round `round`.
    ///
    /// Known failure modes (nonzero exit, missing artifact, unreachable
    /// node) are reported through the result's status. `Err` is reserved
    /// for faults outside the channel contract; the round catches it and
    /// continues the loop.
    async fn run(
        &self,
        node: &NodeHandle,
        role: Role,
        round: u32,
        previous_context: Option<&str>,
    ) -> Result<PhaseResult, SandloopError>;
}

/// Requests a synthesis of two theses from a node's control API
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    /// Combine `thesis_a` and `thesis_b` on the given node.
    ///
    /// API and transport failures are reported through the result's
    /// status; `Err` is reserved for faults outside the API contract.
    async fn synthesize(
        &self,
        node: &NodeHandle,
        thesis_a: &str,
        thesis_b: &str,
        round: u32,
    ) -> Result<PhaseResult, SandloopError>;
}
