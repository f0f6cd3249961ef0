//! CLI Adapter
//!
//! Command-line interface for the signal-brain binary.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, CollectCmd, Command, ConsumeCmd, RunCmd, WindowArgs};

/// Parse the process arguments
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}
