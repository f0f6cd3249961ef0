//! CLI Commands
//!
//! Argument definitions for the signal-brain binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::application::PipelineMode;

/// signal-brain - Signal ingestion and windowed decision pipeline
#[derive(Parser, Debug)]
#[command(
    name = "signal-brain",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Signal ingestion and windowed decision pipeline for a Solana trading agent",
    long_about = "Collects pump.fun launches, Raydium pools and social sentiment into a \
                  durable queue, batches them into time windows and asks a decision \
                  oracle for one trade action per window."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file (defaults to ./config.toml when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the source adapters and the window aggregator
    Run(RunCmd),

    /// Run the source adapters only
    Collect(CollectCmd),

    /// Run the window aggregator only
    Consume(ConsumeCmd),

    /// Validate the configuration and print the effective values
    CheckConfig,
}

impl Command {
    pub fn mode(&self) -> Option<PipelineMode> {
        match self {
            Command::Run(_) => Some(PipelineMode::Full),
            Command::Collect(_) => Some(PipelineMode::Collect),
            Command::Consume(_) => Some(PipelineMode::Consume),
            Command::CheckConfig => None,
        }
    }
}

/// Window overrides shared by commands that run the aggregator
#[derive(Parser, Debug, Default, Clone)]
pub struct WindowArgs {
    /// Override the window duration in seconds
    #[arg(long, value_name = "SECS")]
    pub window_secs: Option<u64>,

    /// Close expired windows even when no new signal arrives
    #[arg(long)]
    pub idle_flush: bool,
}

#[derive(Parser, Debug)]
pub struct RunCmd {
    #[command(flatten)]
    pub window: WindowArgs,

    /// Use the in-process channel and store instead of RabbitMQ and Postgres
    #[arg(long)]
    pub in_memory: bool,
}

#[derive(Parser, Debug)]
pub struct CollectCmd {
    /// Skip the pump.fun stream
    #[arg(long)]
    pub no_pump_fun: bool,

    /// Skip the Raydium poller
    #[arg(long)]
    pub no_raydium: bool,

    /// Enable the social metrics poller
    #[arg(long)]
    pub social: bool,
}

#[derive(Parser, Debug)]
pub struct ConsumeCmd {
    #[command(flatten)]
    pub window: WindowArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliApp {
        CliApp::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_run_with_overrides() {
        let app = parse(&[
            "signal-brain",
            "run",
            "--window-secs",
            "10",
            "--idle-flush",
            "--in-memory",
        ]);
        let Command::Run(cmd) = &app.command else {
            panic!("expected run");
        };
        assert_eq!(cmd.window.window_secs, Some(10));
        assert!(cmd.window.idle_flush);
        assert!(cmd.in_memory);
        assert_eq!(app.command.mode(), Some(PipelineMode::Full));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let app = parse(&["signal-brain", "consume", "--config", "alt.toml", "--debug"]);
        assert_eq!(app.config, Some(PathBuf::from("alt.toml")));
        assert!(app.debug);
        assert_eq!(app.command.mode(), Some(PipelineMode::Consume));
    }

    #[test]
    fn test_collect_flags() {
        let app = parse(&["signal-brain", "collect", "--no-raydium", "--social"]);
        let Command::Collect(cmd) = &app.command else {
            panic!("expected collect");
        };
        assert!(cmd.no_raydium);
        assert!(!cmd.no_pump_fun);
        assert!(cmd.social);
    }

    #[test]
    fn test_check_config_has_no_mode() {
        let app = parse(&["signal-brain", "check-config"]);
        assert!(app.command.mode().is_none());
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(CliApp::try_parse_from(["signal-brain", "trade"]).is_err());
    }
}
