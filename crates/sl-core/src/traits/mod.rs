//! Trait seams for the round pipeline

mod phase;

pub use phase::{DialogueRunner, SynthesisClient};
