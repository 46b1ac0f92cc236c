//! Integration tests for the three-phase workload escalator
//!
//! Runs on a paused tokio clock with the default timings: graceful 180s, force
//! 80s, reset 60s, 1s dispatch stagger, 10s settle and retry.

mod common;

use std::sync::Arc;
use tokio::time::Instant;

use cluster_shutdown::config::ShutdownConfig;
use cluster_shutdown::management::{DispatchPool, WorkloadAction};
use cluster_shutdown::models::{ResourceId, WorkloadScope};
use cluster_shutdown::shutdown::{
    ConvergencePoller, EscalationPhase, PollState, VmShutdownEscalator,
};
use common::{context, secs, SimWorkload, SimulatedCluster};

fn stops_on(id: &str, action: WorkloadAction, after: u64) -> SimWorkload {
    SimWorkload::running(id).stops_on(action, secs(after))
}

fn escalator(cluster: &Arc<SimulatedCluster>) -> VmShutdownEscalator {
    let ctx = context(cluster);
    let config = ShutdownConfig::default();
    let pool = Arc::new(DispatchPool::new(
        ctx.dispatcher.clone(),
        config.dispatch.max_in_flight,
    ));
    let poller = ConvergencePoller::new(
        ctx.clock.clone(),
        config.poller.settle_delay(),
        config.poller.retry_interval(),
    );
    VmShutdownEscalator::new(ctx.enumerator, pool, poller, ctx.clock, config.escalation)
}

#[tokio::test(start_paused = true)]
async fn test_empty_scope_dispatches_nothing() {
    let cluster = Arc::new(
        SimulatedCluster::new()
            .with_workload(SimWorkload::running("dom0").control_domain()),
    );
    let start = Instant::now();

    let report = escalator(&cluster).escalate(&WorkloadScope::All).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.phases.len(), 1);
    assert_eq!(report.total_dispatches(), 0);
    assert!(report.phases[0].poll.is_none());
    assert!(cluster.events().is_empty());
    assert_eq!(start.elapsed(), secs(0));
}

#[tokio::test(start_paused = true)]
async fn test_graceful_stop_converges_in_first_phase() {
    let cluster = Arc::new(
        SimulatedCluster::new()
            .with_workload(stops_on("vm-1", WorkloadAction::GracefulStop, 5))
            .with_workload(stops_on("vm-2", WorkloadAction::GracefulStop, 8)),
    );
    let start = Instant::now();

    let report = escalator(&cluster).escalate(&WorkloadScope::All).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.phases.len(), 1);
    let poll = report.phases[0].poll.as_ref().unwrap();
    assert_eq!(poll.attempts, 1);
    assert_eq!(poll.elapsed, secs(10));
    // Two dispatches staggered by a second, then the settle delay.
    assert_eq!(start.elapsed(), secs(12));
    assert_eq!(cluster.actions_for(WorkloadAction::GracefulStop), vec!["vm-1", "vm-2"]);
    assert!(cluster.actions_for(WorkloadAction::ForceStop).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_force_stop_after_graceful_timeout() {
    let cluster = Arc::new(
        SimulatedCluster::new()
            .with_workload(stops_on("vm-1", WorkloadAction::ForceStop, 5)),
    );
    let start = Instant::now();

    let report = escalator(&cluster).escalate(&WorkloadScope::All).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.phases.len(), 2);
    assert_eq!(report.phases[0].poll.as_ref().unwrap().state, PollState::TimedOut);
    assert_eq!(report.phases[1].phase, EscalationPhase::ForceStop);
    assert!(report.phases[1].converged());
    // Phase one times out 180s after its dispatch finished at t=1.
    assert_eq!(start.elapsed(), secs(192));
    assert!(cluster.actions_for(WorkloadAction::PowerReset).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_power_reset_after_force_timeout() {
    let cluster = Arc::new(
        SimulatedCluster::new()
            .with_workload(stops_on("vm-1", WorkloadAction::PowerReset, 5)),
    );
    let start = Instant::now();

    let report = escalator(&cluster).escalate(&WorkloadScope::All).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.phases.len(), 3);
    assert_eq!(report.total_dispatches(), 3);
    assert_eq!(start.elapsed(), secs(273));
}

#[tokio::test(start_paused = true)]
async fn test_all_phases_exhausted_reports_not_converged() {
    let cluster = Arc::new(SimulatedCluster::new().with_workload(SimWorkload::running("stuck")));
    let start = Instant::now();

    let report = escalator(&cluster).escalate(&WorkloadScope::All).await.unwrap();

    assert!(!report.converged);
    assert_eq!(report.phases.len(), 3);
    for record in &report.phases {
        assert_eq!(record.targets, vec![ResourceId::from("stuck")]);
        let poll = record.poll.as_ref().unwrap();
        assert_eq!(poll.state, PollState::TimedOut);
        assert_eq!(poll.remaining, 1);
    }
    assert_eq!(cluster.events().len(), 3);
    assert_eq!(cluster.running_workloads(), 1);
    assert_eq!(start.elapsed(), secs(323));
}

#[tokio::test(start_paused = true)]
async fn test_each_phase_targets_only_workloads_still_running() {
    let cluster = Arc::new(
        SimulatedCluster::new()
            .with_workload(stops_on("vm-1", WorkloadAction::GracefulStop, 5))
            .with_workload(stops_on("vm-2", WorkloadAction::ForceStop, 5)),
    );

    let report = escalator(&cluster).escalate(&WorkloadScope::All).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.phases[0].dispatched(), 2);
    assert_eq!(report.phases[1].targets, vec![ResourceId::from("vm-2")]);
    assert_eq!(cluster.actions_for(WorkloadAction::ForceStop), vec!["vm-2"]);
}

#[tokio::test(start_paused = true)]
async fn test_restricted_scope_leaves_deferred_workloads_alone() {
    let cluster = Arc::new(
        SimulatedCluster::new()
            .with_workload(stops_on("app", WorkloadAction::GracefulStop, 5))
            .with_workload(
                SimWorkload::running("storage-appliance")
                    .tagged("shutdown_last")
                    .stops_on(WorkloadAction::GracefulStop, secs(5)),
            ),
    );

    let report = escalator(&cluster)
        .escalate(&WorkloadScope::restricted("shutdown_last"))
        .await
        .unwrap();

    assert!(report.converged);
    assert_eq!(cluster.actions_for(WorkloadAction::GracefulStop), vec!["app"]);
    assert_eq!(cluster.running_workloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_just_inside_graceful_budget_converges() {
    // Final check lands exactly on the deadline; an empty set still wins.
    let cluster = Arc::new(
        SimulatedCluster::new()
            .with_workload(stops_on("slow", WorkloadAction::GracefulStop, 175)),
    );

    let report = escalator(&cluster).escalate(&WorkloadScope::All).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.phases.len(), 1);
    let poll = report.phases[0].poll.as_ref().unwrap();
    assert_eq!(poll.attempts, 18);
    assert_eq!(poll.retries, 17);
    assert!(cluster.actions_for(WorkloadAction::ForceStop).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_just_past_graceful_budget_escalates() {
    let cluster = Arc::new(
        SimulatedCluster::new()
            .with_workload(stops_on("slow", WorkloadAction::GracefulStop, 185)),
    );

    let report = escalator(&cluster).escalate(&WorkloadScope::All).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.phases.len(), 2);
    assert_eq!(cluster.actions_for(WorkloadAction::ForceStop), vec!["slow"]);
}

#[tokio::test(start_paused = true)]
async fn test_enumeration_failure_is_returned() {
    let cluster = Arc::new(SimulatedCluster::new().with_workload(SimWorkload::running("vm-1")));
    cluster.take_management_plane_down();

    let result = escalator(&cluster).escalate(&WorkloadScope::All).await;

    assert!(result.is_err());
    assert!(cluster.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_hung_graceful_stops_do_not_starve_force_stop() {
    let max_in_flight = ShutdownConfig::default().dispatch.max_in_flight;
    let guests = max_in_flight + 4;
    let cluster = Arc::new((0..guests).fold(SimulatedCluster::new(), |cluster, n| {
        cluster.with_workload(
            stops_on(&format!("vm-{n}"), WorkloadAction::ForceStop, 5)
                .hangs_on(WorkloadAction::GracefulStop),
        )
    }));

    let report = escalator(&cluster).escalate(&WorkloadScope::All).await.unwrap();

    assert!(report.converged);
    assert_eq!(report.phases.len(), 2);
    assert_eq!(cluster.actions_for(WorkloadAction::ForceStop).len(), guests);
    assert_eq!(cluster.running_workloads(), 0);
}
