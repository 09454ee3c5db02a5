//! CLI definitions for rtr-jobs.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// rtr-jobs CLI.
#[derive(Parser)]
#[command(name = "rtr-jobs")]
#[command(about = "Recurring remote-execution jobs: scheduling, reconciliation and history")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        env = "RTR_JOBS_CONFIG",
        default_value = "config/rtr-jobs.toml",
        global = true
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the API server in foreground (default)
    Serve {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,

        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration file and exit
    CheckConfig,

    /// Print upcoming occurrences of a cron cycle
    NextRuns {
        /// Five-field cron expression, e.g. "0 3 * * 1"
        #[arg(long)]
        cycle: String,

        /// IANA timezone the cycle is evaluated in
        #[arg(long, default_value = "UTC")]
        timezone: String,

        /// Number of occurrences to print
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::try_parse_from(["rtr-jobs"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("config/rtr-jobs.toml"));
    }

    #[test]
    fn test_serve_overrides() {
        let cli = Cli::try_parse_from(["rtr-jobs", "serve", "--port", "9000"]).unwrap();
        match cli.command {
            Some(Commands::Serve { host, port }) => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_next_runs_defaults() {
        let cli = Cli::try_parse_from([
            "rtr-jobs",
            "--config",
            "other.toml",
            "next-runs",
            "--cycle",
            "0 3 * * 1",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("other.toml"));
        match cli.command {
            Some(Commands::NextRuns {
                cycle,
                timezone,
                count,
            }) => {
                assert_eq!(cycle, "0 3 * * 1");
                assert_eq!(timezone, "UTC");
                assert_eq!(count, 5);
            }
            _ => panic!("expected next-runs"),
        }
    }

    #[test]
    fn test_next_runs_requires_cycle() {
        assert!(Cli::try_parse_from(["rtr-jobs", "next-runs"]).is_err());
    }
}
