//! # Cluster Shutdown
//!
//! Command-line entry point. Installed on every pool host; only the coordinator
//! acts, members exit 0 without doing anything.
//!
//! Exit codes: 0 on success or on a member, 1 when workloads could not be
//! stopped or the procedure hit a fatal fault.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_appender::non_blocking::WorkerGuard;

use cluster_shutdown::config::ConfigManager;
use cluster_shutdown::constants::exit_codes;
use cluster_shutdown::logging::init_structured_logging;
use cluster_shutdown::management::ManagementContext;
use cluster_shutdown::shutdown::{ClusterShutdown, PoolConfRoleSource, RoleGate};

#[derive(Parser)]
#[command(name = "cluster-shutdown")]
#[command(about = "Shut down every workload and host of a virtualization pool, coordinator last")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration directory (default: /etc/cluster-shutdown)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Environment overlay to apply (default: detected from CLUSTER_SHUTDOWN_ENV)
    #[arg(short, long)]
    environment: Option<String>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
pub enum Commands {
    /// Run the full shutdown procedure (default)
    Run,

    /// Print the local node's role and exit
    Role,

    /// Load and validate configuration, then print it as JSON
    ValidateConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut log_guard = None;

    let code = match execute(cli, &mut log_guard).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            error!(error = %format!("{e:#}"), "❌ SHUTDOWN: fatal error");
            eprintln!("cluster-shutdown: {e:#}");
            ExitCode::from(exit_codes::FAILURE as u8)
        }
    };

    // Flushes the log file.
    drop(log_guard);
    code
}

async fn execute(cli: Cli, log_guard: &mut Option<WorkerGuard>) -> anyhow::Result<i32> {
    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);
    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir.clone(), &environment)
        .context("loading configuration")?;
    let config = manager.config();

    let level = match cli.verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    *log_guard = init_structured_logging(&environment, config.logging.log_file.as_deref(), level);

    let role_source = Arc::new(PoolConfRoleSource::new(config.management.role_file.clone()));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::ValidateConfig => {
            println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
            Ok(exit_codes::SUCCESS)
        }
        Commands::Role => {
            let role = RoleGate::new(role_source)
                .resolve()
                .await
                .context("resolving local role")?;
            println!("{role}");
            Ok(exit_codes::SUCCESS)
        }
        Commands::Run => {
            let procedure =
                ClusterShutdown::new(config, ManagementContext::from_config(config), role_source);
            let outcome = procedure.run().await.context("running cluster shutdown")?;
            if let Some(report) = outcome.report() {
                tracing::info!(
                    report = %serde_json::to_string(report)?,
                    "📋 SHUTDOWN: final report"
                );
            }
            Ok(outcome.exit_code())
        }
    }
}
