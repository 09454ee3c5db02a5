//! rtr-jobs - recurring remote-execution jobs
//!
//! Main entry point for the rtr-jobs CLI and API server.

mod backends;
mod cli;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use rtr_jobs_api::{ApiConfig, ApiServer, AppState, ServiceSettings};
use rtr_jobs_config::{Config, ConfigLoader, ConfigValidator, LoggingConfig, ValidationResult};
use rtr_jobs_core::schedule::CronSchedule;
use rtr_jobs_core::timefmt;

use crate::cli::{Cli, Commands};

/// Initialize tracing: console output plus an optional daily rolling file.
fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let console = if logging.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let file = match &logging.dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("rtr-jobs")
                .filename_suffix("log")
                .max_log_files(30)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Flushes buffered lines on exit.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist.
fn load_config(path: &Path) -> Result<(Config, bool), Box<dyn std::error::Error>> {
    if path.exists() {
        Ok((ConfigLoader::load(path)?, true))
    } else {
        Ok((Config::default(), false))
    }
}

fn report_validation(result: &ValidationResult) {
    for warning in &result.warnings {
        warn!("config {}: {}", warning.path, warning.message);
    }
    for err in &result.errors {
        error!("config {}: {}", err.path, err.message);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::CheckConfig) => check_config(&cli.config),
        Some(Commands::NextRuns {
            cycle,
            timezone,
            count,
        }) => next_runs(&cycle, &timezone, count),
        Some(Commands::Serve { host, port }) => serve(&cli.config, host, port).await,
        None => serve(&cli.config, None, None).await,
    }
}

/// Run the API server in foreground.
async fn serve(
    config_path: &Path,
    host: Option<String>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mut config, found) = load_config(config_path)?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    init_tracing(&config.logging)?;

    if found {
        info!("Loaded configuration from {}", config_path.display());
    } else {
        warn!(
            "Config file {} not found, using defaults",
            config_path.display()
        );
    }

    let validation = ConfigValidator::validate(&config)?;
    report_validation(&validation);
    if !validation.is_valid() {
        return Err(format!(
            "configuration is invalid ({} errors)",
            validation.errors.len()
        )
        .into());
    }

    let collab = backends::build_collaborators(&config).await?;
    let settings = Arc::new(ServiceSettings::from_config(&config));
    let state = Arc::new(AppState::new(collab, settings));

    let server = ApiServer::new(ApiConfig::from(&config.server), state);
    info!("Starting rtr-jobs {} on {}", env!("CARGO_PKG_VERSION"), server.addr());
    server.run().await?;

    info!("Server stopped");
    Ok(())
}

/// Validate the configuration file and print the findings.
fn check_config(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::load(config_path)?;
    let result = ConfigValidator::validate(&config)?;

    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for err in &result.errors {
        println!("error: {}: {}", err.path, err.message);
    }

    if result.is_valid() {
        println!("{}: ok", config_path.display());
        Ok(())
    } else {
        Err(format!("{}: {} errors", config_path.display(), result.errors.len()).into())
    }
}

/// Print upcoming occurrences of a cron cycle in UTC and in its timezone.
fn next_runs(cycle: &str, timezone: &str, count: usize) -> Result<(), Box<dyn std::error::Error>> {
    let schedule = CronSchedule::parse(cycle, timezone)?;
    let tz = schedule.timezone();

    let mut from = chrono::Utc::now();
    for _ in 0..count {
        let Some(next) = schedule.next_after(from) else {
            break;
        };
        println!(
            "{}  ({} {})",
            timefmt::format_iso(next),
            next.with_timezone(&tz).format("%Y-%m-%d %H:%M"),
            tz
        );
        from = next;
    }
    Ok(())
}
