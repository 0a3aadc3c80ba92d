//! Round orchestration state machine
//!
//! A round is a strict pipeline: the coordinator's output feeds the
//! executor, whose output joins the coordinator's in the referee's
//! synthesis, which becomes the dialogue carried into the next round.
//! Rounds fail in isolation; the loop runs to its configured length
//! regardless and reports what each round produced.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use sl_core::config::{LoopTuning, SandloopConfig, GOLDEN_RATIO};
use sl_core::report::{
    LoopReport, LoopState, LoopStatus, PhaseResult, ReportConfiguration, RoundResult, RoundStatus,
};
use sl_core::time::{elapsed_secs, now_millis};
use sl_core::traits::{DialogueRunner, SynthesisClient};
use sl_core::types::Role;
use sl_core::SandloopError;

use crate::deploy::DeployManager;
use crate::dialogue::SshDialogueRunner;
use crate::health::HealthMonitor;
use crate::probe::ConnectivityProber;
use crate::registry::{NodeRegistry, RoleSelection};
use crate::synthesis::HttpSynthesisClient;

/// Pause after round `round_index`: the base interval divided by the
/// number of rounds already run, so pauses shrink monotonically.
pub fn round_pause(base: Duration, round_index: u32) -> Duration {
    base.div_f64((round_index + 1) as f64)
}

/// Running tally of role assignments and how many were exact matches
#[derive(Debug, Default, Clone, Copy)]
struct AssignmentStats {
    total: u32,
    exact: u32,
}

impl AssignmentStats {
    fn record(&mut self, selection: &RoleSelection) {
        self.total += 1;
        if selection.exact {
            self.exact += 1;
        }
    }

    fn exact_fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            f64::from(self.exact) / f64::from(self.total)
        }
    }
}

/// Compliance metric over round completion and exact role assignment.
/// Always within [0, 1].
fn geometric_health(rounds: &[RoundResult], assignments: &AssignmentStats) -> f64 {
    if rounds.is_empty() {
        return 1.0;
    }
    let completed = rounds
        .iter()
        .filter(|r| r.status == RoundStatus::Completed)
        .count();
    let completed_fraction = completed as f64 / rounds.len() as f64;
    0.5 * completed_fraction + 0.5 * assignments.exact_fraction()
}

/// Drives setup and the round loop across the configured fleet
pub struct RoundOrchestrator {
    registry: NodeRegistry,
    tuning: LoopTuning,
    prober: ConnectivityProber,
    deploy: DeployManager,
    health: HealthMonitor,
    dialogue: Box<dyn DialogueRunner>,
    synthesis: Box<dyn SynthesisClient>,
    cancel: CancellationToken,
}

impl RoundOrchestrator {
    /// Create an orchestrator wired to the SSH and control-API backends
    pub fn new(config: SandloopConfig, cancel: CancellationToken) -> Self {
        let dialogue = Box::new(SshDialogueRunner::new(config.tuning.exec_connect_timeout));
        let synthesis = Box::new(HttpSynthesisClient::new(
            config.tuning.exec_connect_timeout,
            config.tuning.synthesis_timeout,
            config.tuning.recursion_depth,
        ));
        Self::with_runners(config, dialogue, synthesis, cancel)
    }

    /// Create an orchestrator with explicit phase runners.
    ///
    /// The sequencing and carry-forward rules are exercised through this
    /// seam with in-memory runners.
    pub fn with_runners(
        config: SandloopConfig,
        dialogue: Box<dyn DialogueRunner>,
        synthesis: Box<dyn SynthesisClient>,
        cancel: CancellationToken,
    ) -> Self {
        let mut registry = NodeRegistry::new();
        for node in &config.nodes {
            registry.register(node.clone());
        }
        let tuning = config.tuning;
        Self {
            prober: ConnectivityProber::new(tuning.probe_timeout),
            deploy: DeployManager::new(tuning.exec_connect_timeout, tuning.settle_delay),
            health: HealthMonitor::new(tuning.health_timeout),
            registry,
            tuning,
            dialogue,
            synthesis,
            cancel,
        }
    }

    /// The node registry backing this orchestrator
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Probe the fleet, verify deployments, and start services.
    ///
    /// Fails when fewer than two nodes answer the probe or fewer than two
    /// services come up; the loop needs a minimal fleet to be worth
    /// running.
    pub async fn setup(&self) -> Result<(), SandloopError> {
        let handles = self.registry.handles();

        tracing::info!("probing connectivity for {} nodes", handles.len());
        let mut connected = 0usize;
        for (node_id, handle) in &handles {
            if self.prober.probe(handle).await {
                connected += 1;
                tracing::info!("channel usable: {}", node_id);
            } else {
                let error = handle.read().await.error_message.clone().unwrap_or_default();
                tracing::warn!("channel unusable: {} ({})", node_id, error);
            }
        }
        if connected < 2 {
            return Err(SandloopError::Setup(format!(
                "need at least 2 reachable nodes, got {}",
                connected
            )));
        }

        tracing::info!("verifying service deployment on connected nodes");
        for (node_id, handle) in &handles {
            if !handle.read().await.connected {
                continue;
            }
            if !self.deploy.ensure_deployed(handle).await {
                tracing::warn!("deployment check failed: {}", node_id);
            }
        }

        tracing::info!("starting services with round-robin role assignment");
        let mut running = 0usize;
        for (index, (node_id, handle)) in handles.iter().enumerate() {
            {
                let status = handle.read().await;
                if !status.connected {
                    continue;
                }
                // launch is not double-start safe
                if status.service_running {
                    running += 1;
                    continue;
                }
            }
            let role = Role::ALL[index % Role::ALL.len()];
            if self.deploy.start_service(handle, role).await {
                running += 1;
            } else {
                tracing::warn!("service start failed: {}", node_id);
            }
        }
        if running < 2 {
            return Err(SandloopError::Setup(format!(
                "need at least 2 running services, got {}",
                running
            )));
        }

        // dialogue scripts and peer coordination ship with the service
        // install; nothing further to verify here
        tracing::info!("setup complete ({} nodes running)", running);
        Ok(())
    }

    /// Run the loop for `total_rounds` rounds and report the outcome.
    ///
    /// The loop completes after its configured length regardless of
    /// individual round failures; only an empty fleet at start reports a
    /// failed loop.
    pub async fn run(&self, total_rounds: u32) -> LoopReport {
        let loop_id = format!("sandloop-{}", Uuid::new_v4().simple());
        let started_at = now_millis();
        let active_nodes = self.registry.list_running().await;

        let configuration = ReportConfiguration {
            total_rounds,
            active_nodes: active_nodes.clone(),
            golden_ratio: GOLDEN_RATIO,
            round_interval_secs: self.tuning.round_interval.as_secs(),
            recursion_depth: self.tuning.recursion_depth,
        };

        if active_nodes.is_empty() {
            tracing::error!("no nodes with a running service; loop cannot start");
            return LoopReport {
                loop_id,
                started_at,
                ended_at: now_millis(),
                total_duration_secs: elapsed_secs(started_at),
                configuration,
                rounds: Vec::new(),
                status: LoopStatus::Failed,
                error: Some("no nodes with a running service".to_string()),
                final_dialogue: None,
                geometric_health: 0.0,
            };
        }

        let mut state = LoopState {
            loop_id: loop_id.clone(),
            started_at,
            current_round: 0,
            total_rounds,
            active_nodes,
            current_dialogue: None,
            geometric_health: 1.0,
        };

        tracing::info!(
            "starting sandloop {} ({} rounds, {} active nodes)",
            state.loop_id,
            total_rounds,
            state.active_nodes.len()
        );

        let mut rounds = Vec::new();
        let mut assignments = AssignmentStats::default();

        for round_index in 0..total_rounds {
            if self.cancel.is_cancelled() {
                tracing::info!("interrupt received; stopping before round {}", round_index + 1);
                break;
            }

            state.current_round = round_index + 1;
            tracing::info!("=== round {}/{} ===", state.current_round, total_rounds);

            let Some(result) = self
                .execute_round(&mut state, round_index, &mut assignments)
                .await
            else {
                tracing::info!("interrupt received mid-round; discarding partial round");
                break;
            };

            rounds.push(result);
            state.geometric_health = geometric_health(&rounds, &assignments);

            self.health.check_all(&self.registry).await;

            if round_index + 1 < total_rounds {
                let pause = round_pause(self.tuning.round_interval, round_index);
                tracing::info!("pausing {:.1}s before next round", pause.as_secs_f64());
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = self.cancel.cancelled() => {}
                }
            }
        }

        let ended_at = now_millis();
        tracing::info!(
            "sandloop {} finished ({} rounds recorded)",
            state.loop_id,
            rounds.len()
        );

        LoopReport {
            loop_id,
            started_at,
            ended_at,
            total_duration_secs: elapsed_secs(started_at),
            configuration,
            rounds,
            status: LoopStatus::Completed,
            error: None,
            final_dialogue: state.current_dialogue,
            geometric_health: state.geometric_health.clamp(0.0, 1.0),
        }
    }

    /// Execute one round. Returns `None` when an interrupt landed
    /// mid-round; the partial round is discarded.
    async fn execute_round(
        &self,
        state: &mut LoopState,
        round_index: u32,
        assignments: &mut AssignmentStats,
    ) -> Option<RoundResult> {
        let round_num = round_index + 1;
        let started_at = now_millis();
        let mut phases: Vec<PhaseResult> = Vec::new();

        // all three roles must resolve before any phase runs
        let coordinator = self.registry.select_for_role(Role::Coordinator).await;
        let executor = self.registry.select_for_role(Role::Executor).await;
        let referee = self.registry.select_for_role(Role::Referee).await;

        let (coordinator, executor, referee) = match (coordinator, executor, referee) {
            (Some(c), Some(e), Some(r)) => (c, e, r),
            _ => {
                tracing::error!("round {}: no running node available for role assignment", round_num);
                return Some(RoundResult {
                    round: round_num,
                    started_at,
                    ended_at: now_millis(),
                    phases,
                    status: RoundStatus::Failed,
                    error: Some("no running node available for role assignment".to_string()),
                });
            }
        };

        assignments.record(&coordinator);
        assignments.record(&executor);
        assignments.record(&referee);

        tracing::info!(
            "role assignment - coordinator: {}, executor: {}, referee: {}",
            coordinator.node_id,
            executor.node_id,
            referee.node_id
        );

        // coordinator opens the round from the seed message
        let coordinator_result = match self
            .dialogue
            .run(&coordinator.handle, Role::Coordinator, round_num, None)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("round {} failed in coordinator phase: {}", round_num, e);
                return Some(RoundResult {
                    round: round_num,
                    started_at,
                    ended_at: now_millis(),
                    phases,
                    status: RoundStatus::Failed,
                    error: Some(e.to_string()),
                });
            }
        };
        let coordinator_thesis = coordinator_result.final_output().map(str::to_owned);
        phases.push(coordinator_result);
        if self.cancel.is_cancelled() {
            return None;
        }

        // executor continues from the coordinator's output; with none, it
        // reruns from the seed
        let executor_result = match self
            .dialogue
            .run(
                &executor.handle,
                Role::Executor,
                round_num,
                coordinator_thesis.as_deref(),
            )
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("round {} failed in executor phase: {}", round_num, e);
                return Some(RoundResult {
                    round: round_num,
                    started_at,
                    ended_at: now_millis(),
                    phases,
                    status: RoundStatus::Failed,
                    error: Some(e.to_string()),
                });
            }
        };
        let executor_thesis = executor_result.final_output().map(str::to_owned);
        phases.push(executor_result);
        if self.cancel.is_cancelled() {
            return None;
        }

        // referee synthesizes both outputs
        let referee_result = match self
            .synthesis
            .synthesize(
                &referee.handle,
                coordinator_thesis.as_deref().unwrap_or(""),
                executor_thesis.as_deref().unwrap_or(""),
                round_num,
            )
            .await
        {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("round {} failed in referee phase: {}", round_num, e);
                return Some(RoundResult {
                    round: round_num,
                    started_at,
                    ended_at: now_millis(),
                    phases,
                    status: RoundStatus::Failed,
                    error: Some(e.to_string()),
                });
            }
        };
        let synthesized = referee_result.final_output().map(str::to_owned);
        phases.push(referee_result);

        // carry-forward: the synthesis when it produced one, otherwise the
        // most evolved non-empty thesis, otherwise the previous dialogue
        if let Some(thesis) = synthesized.or(executor_thesis).or(coordinator_thesis) {
            state.current_dialogue = Some(thesis);
        }

        let ended_at = now_millis();
        tracing::info!(
            "round {} completed in {:.1}s",
            round_num,
            (ended_at.saturating_sub(started_at)) as f64 / 1000.0
        );

        Some(RoundResult {
            round: round_num,
            started_at,
            ended_at,
            phases,
            status: RoundStatus::Completed,
            error: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_pause_shrinks_monotonically() {
        let base = Duration::from_secs(97);
        let pauses: Vec<Duration> = (0..4).map(|i| round_pause(base, i)).collect();
        for pair in pauses.windows(2) {
            assert!(pair[0] > pair[1]);
        }
        assert_eq!(pauses[0], base);
        assert_eq!(pauses[1], base / 2);
        assert_eq!(pauses[3], base / 4);
    }

    #[test]
    fn test_geometric_health_perfect_run() {
        let rounds = vec![completed_round(1), completed_round(2)];
        let assignments = AssignmentStats { total: 6, exact: 6 };
        assert_eq!(geometric_health(&rounds, &assignments), 1.0);
    }

    #[test]
    fn test_geometric_health_degrades_with_failures() {
        let rounds = vec![completed_round(1), failed_round(2)];
        let assignments = AssignmentStats { total: 6, exact: 3 };
        let health = geometric_health(&rounds, &assignments);
        assert!(health > 0.0 && health < 1.0);
        assert!((health - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_geometric_health_stays_in_unit_interval() {
        let rounds = vec![failed_round(1)];
        let assignments = AssignmentStats { total: 0, exact: 0 };
        let health = geometric_health(&rounds, &assignments);
        assert!((0.0..=1.0).contains(&health));
    }

    fn completed_round(round: u32) -> RoundResult {
        RoundResult {
            round,
            started_at: 0,
            ended_at: 0,
            phases: Vec::new(),
            status: RoundStatus::Completed,
            error: None,
        }
    }

    fn failed_round(round: u32) -> RoundResult {
        RoundResult {
            round,
            started_at: 0,
            ended_at: 0,
            phases: Vec::new(),
            status: RoundStatus::Failed,
            error: Some("simulated".to_string()),
        }
    }
}
