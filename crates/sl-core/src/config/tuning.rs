//! Loop timing and weighting configuration
//!
//! All timing knobs live in one immutable struct handed to the
//! orchestrator, so test suites can substitute deterministic values.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Golden ratio, the timing constant the loop intervals derive from
pub const GOLDEN_RATIO: f64 = 1.618033988749894;

/// Nodes in a full tetrahedral fleet
pub const TETRAHEDRAL_NODES: usize = 4;

fn default_round_interval() -> Duration {
    // 60s scaled by the golden ratio
    Duration::from_secs((60.0 * GOLDEN_RATIO) as u64)
}

fn default_settle_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_exec_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_synthesis_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_recursion_depth() -> u32 {
    3
}

/// Timing and weighting knobs for a loop run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopTuning {
    /// Base inter-round interval; the pause after round `i` is this value
    /// divided by `i + 1`
    #[serde(with = "duration_secs")]
    pub round_interval: Duration,

    /// Wait after launching a service before polling the process table
    #[serde(with = "duration_secs")]
    pub settle_delay: Duration,

    /// Connect timeout for connectivity probes
    #[serde(with = "duration_secs")]
    pub probe_timeout: Duration,

    /// Connect timeout for command execution sessions
    #[serde(with = "duration_secs")]
    pub exec_connect_timeout: Duration,

    /// End-to-end budget for a synthesis API call
    #[serde(with = "duration_secs")]
    pub synthesis_timeout: Duration,

    /// End-to-end budget for a health check
    #[serde(with = "duration_secs")]
    pub health_timeout: Duration,

    /// Recursion depth passed to synthesis calls
    pub recursion_depth: u32,
}

impl Default for LoopTuning {
    fn default() -> Self {
        Self {
            round_interval: default_round_interval(),
            settle_delay: default_settle_delay(),
            probe_timeout: default_probe_timeout(),
            exec_connect_timeout: default_exec_connect_timeout(),
            synthesis_timeout: default_synthesis_timeout(),
            health_timeout: default_health_timeout(),
            recursion_depth: default_recursion_depth(),
        }
    }
}

// Helper module for Duration serialization as whole seconds
mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_interval_follows_golden_ratio() {
        let tuning = LoopTuning::default();
        assert_eq!(tuning.round_interval, Duration::from_secs(97));
    }

    #[test]
    fn test_tuning_roundtrips_through_toml() {
        let tuning = LoopTuning::default();
        let text = toml::to_string(&tuning).unwrap();
        let parsed: LoopTuning = toml::from_str(&text).unwrap();
        assert_eq!(parsed.round_interval, tuning.round_interval);
        assert_eq!(parsed.recursion_depth, tuning.recursion_depth);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: LoopTuning = toml::from_str("round_interval = 5").unwrap();
        assert_eq!(parsed.round_interval, Duration::from_secs(5));
        assert_eq!(parsed.settle_delay, Duration::from_secs(3));
        assert_eq!(parsed.recursion_depth, 3);
    }
}
