//! # Cluster Shutdown Orchestrator
//!
//! Runs the whole procedure in order:
//!
//! 1. Role gate (no-op unless this node is the coordinator)
//! 2. Storage detach
//! 3. Workload escalation over the restricted scope (deferral-tagged workloads held back)
//! 4. Workload escalation over every running workload
//! 5. Host shutdown sequence, coordinator last
//!
//! Either escalation pass failing to converge stops the run before any host is
//! touched.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use super::escalator::{EscalationReport, VmShutdownEscalator};
use super::hosts::{HostShutdownReport, HostShutdownSequencer};
use super::poller::ConvergencePoller;
use super::role::{RoleGate, RoleSource};
use super::storage::{DetachReport, StorageDetacher};
use crate::config::ShutdownConfig;
use crate::constants::exit_codes;
use crate::error::Result;
use crate::management::{DispatchPool, ManagementContext};
use crate::models::WorkloadScope;
use crate::timing::Clock;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShutdownReport {
    pub started_at: DateTime<Utc>,
    pub storage: Option<DetachReport>,
    pub restricted_pass: Option<EscalationReport>,
    pub full_pass: Option<EscalationReport>,
    pub hosts: Option<HostShutdownReport>,
    pub elapsed: Duration,
}

impl ShutdownReport {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            storage: None,
            restricted_pass: None,
            full_pass: None,
            hosts: None,
            elapsed: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "report", rename_all = "snake_case")]
pub enum ShutdownOutcome {
    /// This node is a member; nothing was done
    NotCoordinator,
    /// Every workload stopped and the host sequence ran
    Completed(ShutdownReport),
    /// An escalation pass left workloads running; hosts were not touched
    WorkloadsRemaining(ShutdownReport),
}

impl ShutdownOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotCoordinator | Self::Completed(_) => exit_codes::SUCCESS,
            Self::WorkloadsRemaining(_) => exit_codes::FAILURE,
        }
    }

    pub fn report(&self) -> Option<&ShutdownReport> {
        match self {
            Self::NotCoordinator => None,
            Self::Completed(report) | Self::WorkloadsRemaining(report) => Some(report),
        }
    }
}

#[derive(Debug)]
pub struct ClusterShutdown {
    role_gate: RoleGate,
    detacher: StorageDetacher,
    escalator: VmShutdownEscalator,
    sequencer: HostShutdownSequencer,
    clock: Arc<dyn Clock>,
    deferral_tag: String,
}

impl ClusterShutdown {
    pub fn new(
        config: &ShutdownConfig,
        context: ManagementContext,
        role_source: Arc<dyn RoleSource>,
    ) -> Self {
        let pool = Arc::new(DispatchPool::new(
            context.dispatcher.clone(),
            config.dispatch.max_in_flight,
        ));
        let poller = ConvergencePoller::new(
            context.clock.clone(),
            config.poller.settle_delay(),
            config.poller.retry_interval(),
        );

        Self {
            role_gate: RoleGate::new(role_source),
            detacher: StorageDetacher::new(
                context.enumerator.clone(),
                context.dispatcher.clone(),
                context.clock.clone(),
                config.storage.transports(),
                config.storage.detach_stagger(),
            ),
            escalator: VmShutdownEscalator::new(
                context.enumerator.clone(),
                pool.clone(),
                poller,
                context.clock.clone(),
                config.escalation.clone(),
            ),
            sequencer: HostShutdownSequencer::new(
                context.enumerator.clone(),
                pool,
                context.probe.clone(),
                context.clock.clone(),
                config.hosts.clone(),
            ),
            clock: context.clock,
            deferral_tag: config.escalation.deferral_tag.clone(),
        }
    }

    /// Run the procedure to completion.
    ///
    /// `Err` is reserved for fatal faults: the local role or the management plane
    /// could not be read.
    #[instrument(skip_all)]
    pub async fn run(&self) -> Result<ShutdownOutcome> {
        if !self.role_gate.resolve().await?.is_coordinator() {
            info!("ROLE: not the coordinator, nothing to do");
            return Ok(ShutdownOutcome::NotCoordinator);
        }

        let started = self.clock.now();
        let mut report = ShutdownReport::new();
        info!("🚀 SHUTDOWN: starting cluster shutdown");

        report.storage = Some(self.detacher.detach_all().await?);

        let passes = [
            WorkloadScope::restricted(self.deferral_tag.clone()),
            WorkloadScope::All,
        ];
        for scope in passes {
            let escalation = self.escalator.escalate(&scope).await?;
            let converged = escalation.converged;
            match scope {
                WorkloadScope::Restricted { .. } => report.restricted_pass = Some(escalation),
                WorkloadScope::All => report.full_pass = Some(escalation),
            }

            if !converged {
                report.elapsed = self.clock.now() - started;
                error!(
                    scope = %scope,
                    "❌ SHUTDOWN: workloads still running, hosts will not be shut down"
                );
                return Ok(ShutdownOutcome::WorkloadsRemaining(report));
            }
        }

        let hosts = self.sequencer.shutdown_all().await?;
        if hosts.budget_exhausted {
            info!(
                unconfirmed = hosts.unconfirmed_members().count(),
                "SHUTDOWN: some member hosts were not confirmed down"
            );
        }
        report.hosts = Some(hosts);
        report.elapsed = self.clock.now() - started;

        info!(
            elapsed_secs = report.elapsed.as_secs(),
            "✅ SHUTDOWN: cluster shutdown issued"
        );
        Ok(ShutdownOutcome::Completed(report))
    }
}
