//! Gestor safe launcher
//!
//! Supervises the Gestor desktop application: pre-flight resource checks,
//! port reclamation, supervised launch with readiness polling, background
//! health monitoring, and ordered shutdown on signals or child death.

use anyhow::Result;
use clap::{Parser, Subcommand};
use launcher_lib::{
    evaluate, resources::write_report, CheckReport, HostProbe, LaunchSpec, ProcessSupervisor,
    SupervisorConfig, SystemProbe, Thresholds,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

/// Safe launcher for the Gestor application
#[derive(Parser)]
#[command(name = "gestor-launcher")]
#[command(author, version, about = "Safe launcher for the Gestor application", long_about = None)]
struct Cli {
    /// Raise log verbosity and pass a debug environment to the application
    #[arg(long)]
    debug: bool,

    /// TCP port the application serves on
    #[arg(long)]
    port: Option<u16>,

    /// Startup wait bound in seconds
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch and supervise the application (default)
    Run,
    /// Run the resource check standalone and write a JSON report
    Check {
        /// Report output path
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut cfg = config::LauncherConfig::load()?;
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if let Some(timeout) = cli.timeout {
        cfg.startup_timeout_secs = timeout;
    }

    let _log_guard = init_tracing(&cfg.log_dir, cli.debug)?;
    info!("gestor-launcher starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_supervised(&cfg, cli.debug).await,
        Commands::Check { output } => run_check(&cfg, output).await,
    }
}

/// Initialize tracing with a console layer and an append-mode log file
fn init_tracing(
    log_dir: &str,
    debug: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "launcher.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_filter = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(guard)
}

/// Launch and supervise the application until it stops
async fn run_supervised(cfg: &config::LauncherConfig, debug: bool) -> Result<ExitCode> {
    let mut args = vec![cfg.app_entry.clone()];
    if debug {
        args.push("--debug".to_string());
    }

    let launch = LaunchSpec {
        program: cfg.runtime.clone(),
        args,
        env: vec![
            (
                "GESTOR_LOG_LEVEL".to_string(),
                if debug { "debug" } else { "info" }.to_string(),
            ),
            ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
        ],
        working_dir: cfg.app_dir.clone().map(PathBuf::from),
        log_path: Some(Path::new(&cfg.log_dir).join("app.log")),
    };

    let mut supervisor_config = SupervisorConfig::new(launch);
    supervisor_config.host = cfg.host.clone();
    supervisor_config.port = cfg.port;
    supervisor_config.startup_timeout = Duration::from_secs(cfg.startup_timeout_secs);

    let probe = Arc::new(HostProbe::new(&cfg.runtime).with_advisory_ports(vec![cfg.port]));
    let mut supervisor = ProcessSupervisor::new(supervisor_config, probe);

    // The handler only requests shutdown; all state mutation and resource
    // release stays on the supervisor control path.
    let shutdown = supervisor.shutdown_handle();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.request();
    });

    match supervisor.run().await {
        Ok(()) => {
            info!("launcher stopped cleanly");
            Ok(ExitCode::SUCCESS)
        }
        Err(reason) => {
            error!(reason = %reason, "launch failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Standalone resource check: snapshot, evaluate, persist, report
async fn run_check(cfg: &config::LauncherConfig, output: Option<PathBuf>) -> Result<ExitCode> {
    let probe = HostProbe::new(&cfg.runtime).with_advisory_ports(vec![cfg.port, 5000, 3000]);
    let snapshot = probe.snapshot().await?;
    let verdict = evaluate(&snapshot, &Thresholds::default());
    let report = CheckReport::new(snapshot, verdict);

    let path = output.unwrap_or_else(|| PathBuf::from(&cfg.check_output));
    write_report(&path, &report)?;
    info!(path = %path.display(), "check report written");

    if report.verdict.overall_pass {
        info!("system meets the minimum requirements");
        Ok(ExitCode::SUCCESS)
    } else {
        for rec in &report.verdict.recommendations {
            warn!("{rec}");
        }
        error!("system does not meet the minimum requirements");
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut terminate = signal(SignalKind::terminate()).expect("install SIGTERM handler");

    tokio::select! {
        _ = interrupt.recv() => info!("received SIGINT"),
        _ = terminate.recv() => info!("received SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("received interrupt");
}
