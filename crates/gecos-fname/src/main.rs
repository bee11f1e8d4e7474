//! gecos-fname - display-name builder and overflow harness.
//!
//! Formats a GECOS full-name field the way a mail delivery agent builds the
//! "Full Name" part of an address, either trusting the buffer size (the
//! historical behaviour) or enforcing it.
//!
//! ## Usage
//!
//! ```bash
//! # Format into a 5 byte buffer, trusting it to be big enough
//! gecos-fname format --gecos "John Doe" --login jdoe --capacity 5
//!
//! # Same, with the capacity enforced
//! gecos-fname format --gecos "John Doe" --login jdoe --capacity 5 --mode checked
//!
//! # Estimated length of the display name
//! gecos-fname estimate --gecos "&, Manager" --login al
//!
//! # Run configured scenarios
//! gecos-fname run --config scenarios.toml
//!
//! # Print an example configuration
//! gecos-fname config --example
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use gecos_fname::alloc::SystemAllocator;
use gecos_fname::config::{HarnessConfig, MAX_CAPACITY};
use gecos_fname::format::{Mode, OverflowPolicy};
use gecos_fname::gecos::estimate_len;
use gecos_fname::harness::{self, Run};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let builder = tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, rust_log.as_deref()))
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// `--verbose` forces debug; otherwise RUST_LOG decides, defaulting to info.
fn log_filter(verbose: bool, rust_log: Option<&str>) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Returns false when a scenario expectation failed.
fn run(cli: Cli) -> Result<bool> {
    let config = HarnessConfig::load(cli.config.as_deref()).context("loading harness config")?;
    debug!(
        mode = %config.mode,
        policy = %config.policy,
        capacity = config.capacity,
        "config loaded"
    );

    match cli.command {
        Command::Format {
            gecos,
            login,
            capacity,
            mode,
            policy,
        } => {
            let report = harness::execute(
                &SystemAllocator,
                Run {
                    name: "cli",
                    gecos: gecos.as_bytes(),
                    login: login.as_bytes(),
                    size_request: capacity.unwrap_or(config.capacity),
                    mode: mode.unwrap_or(config.mode),
                    policy: policy.unwrap_or(config.policy),
                },
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(true)
        }
        Command::Estimate { gecos, login } => {
            println!("{}", estimate_len(gecos.as_bytes(), login.as_bytes()));
            Ok(true)
        }
        Command::Run => {
            let reports = harness::run_all(&config);
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(reports.iter().all(|r| r.passed()))
        }
        Command::Config { example } => {
            if example {
                println!("{}", HarnessConfig::example_config());
            } else {
                println!(
                    "{}",
                    toml::to_string_pretty(&config).context("serializing config")?
                );
            }
            Ok(true)
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "gecos-fname",
    author,
    version,
    about = "Build mail display names from GECOS fields and detect buffer overruns",
    after_help = "Examples:\n  \
        gecos-fname format --gecos 'John Doe' --login jdoe --capacity 5\n  \
        gecos-fname format --gecos '&, Manager' --login al --mode checked\n  \
        gecos-fname run --config scenarios.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (overrides GECOS_FNAME_CONFIG and the user config)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging, including per-byte formatter trace
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long = "json-logs", global = true)]
    json_logs: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Allocate a buffer and format one display name into it
    Format {
        /// GECOS full-name field
        #[arg(short, long)]
        gecos: String,

        /// Login name substituted for '&'
        #[arg(short, long)]
        login: String,

        /// Bytes to request from the allocator (non-positive means 1)
        #[arg(
            short = 'n',
            long,
            allow_negative_numbers = true,
            value_parser = clap::value_parser!(i64).range(..=MAX_CAPACITY)
        )]
        capacity: Option<i64>,

        /// Formatter to run
        #[arg(short, long)]
        mode: Option<Mode>,

        /// What the checked formatter does on overflow
        #[arg(short, long)]
        policy: Option<OverflowPolicy>,
    },

    /// Print the estimated display-name length
    Estimate {
        #[arg(short, long)]
        gecos: String,

        #[arg(short, long)]
        login: String,
    },

    /// Run every configured scenario
    Run,

    /// Show or generate configuration
    Config {
        /// Print example configuration file
        #[arg(long)]
        example: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn rust_log_sets_the_level() {
        let filter = log_filter(false, Some("debug"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));

        let filter = log_filter(false, Some("warn"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn log_level_defaults_to_info() {
        assert_eq!(log_filter(false, None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn verbose_forces_debug() {
        let filter = log_filter(true, Some("error"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn capacity_flag_is_bounded() {
        let parsed = Cli::try_parse_from([
            "gecos-fname", "format", "-g", "x", "-l", "y", "-n", "8000000000",
        ]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from(["gecos-fname", "format", "-g", "x", "-l", "y", "-n", "-3"])
            .unwrap();
        match cli.command {
            Command::Format { capacity, .. } => assert_eq!(capacity, Some(-3)),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
