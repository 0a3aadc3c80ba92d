//! sl-orchestrator: round orchestration across SSH-reachable nodes
//!
//! Coordinates a multi-round dialogue across a small fleet of remote
//! nodes. Each round runs a strict coordinator → executor → referee
//! pipeline: dialogue phases execute over SSH and retrieve a JSON result
//! artifact, the referee phase synthesizes over the node's control API,
//! and the synthesized output seeds the next round. Failed phases degrade
//! the round, never the loop.

pub mod deploy;
pub mod dialogue;
pub mod engine;
pub mod health;
pub mod probe;
pub mod registry;
pub mod remote;
pub mod synthesis;

pub use engine::RoundOrchestrator;
pub use registry::NodeRegistry;
