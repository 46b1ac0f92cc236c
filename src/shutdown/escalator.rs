//! # VM Shutdown Escalator
//!
//! Drives a scope of running workloads to the stopped state through three
//! increasingly forceful phases: graceful stop, forced stop, power reset. Each
//! phase re-enumerates the scope, fires its action at every workload still
//! running, and waits on the [`ConvergencePoller`] with its own timeout. The
//! first phase that converges ends the escalation.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::poller::{ConvergencePoller, PollOutcome};
use crate::config::EscalationConfig;
use crate::error::Result;
use crate::logging::{log_dispatch_operation, log_phase_transition};
use crate::management::{DispatchCommand, DispatchPool, ResourceEnumerator, WorkloadAction};
use crate::models::{ResourceId, WorkloadScope};
use crate::timing::{Clock, Deadline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationPhase {
    GracefulStop,
    ForceStop,
    PowerReset,
}

impl EscalationPhase {
    pub const ALL: [EscalationPhase; 3] =
        [Self::GracefulStop, Self::ForceStop, Self::PowerReset];

    pub fn action(&self) -> WorkloadAction {
        match self {
            Self::GracefulStop => WorkloadAction::GracefulStop,
            Self::ForceStop => WorkloadAction::ForceStop,
            Self::PowerReset => WorkloadAction::PowerReset,
        }
    }

    pub fn timeout(&self, config: &EscalationConfig) -> Duration {
        match self {
            Self::GracefulStop => config.graceful_timeout(),
            Self::ForceStop => config.force_timeout(),
            Self::PowerReset => config.reset_timeout(),
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Self::GracefulStop => 1,
            Self::ForceStop => 2,
            Self::PowerReset => 3,
        }
    }
}

impl fmt::Display for EscalationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase {} ({})", self.number(), self.action())
    }
}

/// What happened during one phase
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseRecord {
    pub phase: EscalationPhase,
    /// Workloads in scope when the phase started, in enumeration order
    pub targets: Vec<ResourceId>,
    /// `None` when the scope was already empty and no poll was needed
    pub poll: Option<PollOutcome>,
}

impl PhaseRecord {
    pub fn dispatched(&self) -> usize {
        self.targets.len()
    }

    pub fn converged(&self) -> bool {
        self.poll.as_ref().map_or(true, PollOutcome::converged)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationReport {
    pub scope: WorkloadScope,
    pub phases: Vec<PhaseRecord>,
    pub converged: bool,
}

impl EscalationReport {
    pub fn total_dispatches(&self) -> usize {
        self.phases.iter().map(PhaseRecord::dispatched).sum()
    }
}

pub struct VmShutdownEscalator {
    enumerator: Arc<dyn ResourceEnumerator>,
    pool: Arc<DispatchPool>,
    poller: ConvergencePoller,
    clock: Arc<dyn Clock>,
    config: EscalationConfig,
}

impl fmt::Debug for VmShutdownEscalator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VmShutdownEscalator")
            .field("enumerator", &"Arc<dyn ResourceEnumerator>")
            .field("pool", &self.pool)
            .field("poller", &self.poller)
            .field("config", &self.config)
            .finish()
    }
}

impl VmShutdownEscalator {
    pub fn new(
        enumerator: Arc<dyn ResourceEnumerator>,
        pool: Arc<DispatchPool>,
        poller: ConvergencePoller,
        clock: Arc<dyn Clock>,
        config: EscalationConfig,
    ) -> Self {
        Self {
            enumerator,
            pool,
            poller,
            clock,
            config,
        }
    }

    /// Escalate until every workload in `scope` has stopped or all phases are spent.
    ///
    /// `Ok` with `converged == false` means workloads are still running after the
    /// power reset phase; the caller must not continue to host shutdown.
    #[instrument(skip_all, fields(scope = %scope))]
    pub async fn escalate(&self, scope: &WorkloadScope) -> Result<EscalationReport> {
        let mut phases = Vec::with_capacity(EscalationPhase::ALL.len());

        for phase in EscalationPhase::ALL {
            let record = self.run_phase(phase, scope).await?;
            let converged = record.converged();
            phases.push(record);

            if converged {
                info!(phase = %phase, "🎉 ESCALATOR: workloads stopped");
                return Ok(EscalationReport {
                    scope: scope.clone(),
                    phases,
                    converged: true,
                });
            }

            warn!(phase = %phase, "ESCALATOR: phase did not converge, escalating");
        }

        error!(
            scope = %scope,
            "❌ ESCALATOR: workloads still running after every escalation phase"
        );
        Ok(EscalationReport {
            scope: scope.clone(),
            phases,
            converged: false,
        })
    }

    async fn run_phase(
        &self,
        phase: EscalationPhase,
        scope: &WorkloadScope,
    ) -> Result<PhaseRecord> {
        // Fresh enumeration: workloads stopped by an earlier phase are not re-targeted.
        let targets = self.enumerator.list_workloads(scope).await?;

        if targets.is_empty() {
            log_phase_transition("escalator", &phase.to_string(), "nothing_to_stop", Some(0), None);
            return Ok(PhaseRecord {
                phase,
                targets: Vec::new(),
                poll: None,
            });
        }

        log_phase_transition(
            "escalator",
            &phase.to_string(),
            "dispatching",
            Some(targets.len()),
            None,
        );

        let action = phase.action();
        for id in &targets {
            let name = self.display_name(id).await;
            log_dispatch_operation(
                "escalator",
                &action.to_string(),
                id.as_str(),
                Some(&name),
                "issued",
                None,
            );
            self.pool.spawn(DispatchCommand::Workload {
                id: id.clone(),
                action,
            });
            self.clock.sleep(self.config.dispatch_stagger()).await;
        }

        let deadline = Deadline::after(self.clock.as_ref(), phase.timeout(&self.config));
        let label = format!("{scope} {phase}");
        let poll = self
            .poller
            .poll_until_empty(&label, deadline, || self.enumerator.list_workloads(scope))
            .await?;

        log_phase_transition(
            "escalator",
            &phase.to_string(),
            if poll.converged() { "converged" } else { "timed_out" },
            Some(poll.remaining),
            Some(poll.elapsed.as_secs()),
        );

        Ok(PhaseRecord {
            phase,
            targets: targets.into_iter().collect(),
            poll: Some(poll),
        })
    }

    async fn display_name(&self, id: &ResourceId) -> String {
        self.enumerator
            .display_name(id)
            .await
            .unwrap_or_else(|_| id.to_string())
    }
}
