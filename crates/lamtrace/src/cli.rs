//! CLI definitions and argument types.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Exit code for success.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code for failure.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Parser)]
#[command(name = "lamtrace")]
#[command(about = "Execution tracer - logs calls, returns and steps of a script")]
#[command(version)]
pub struct Cli {
    /// Show metrics summary after execution
    #[arg(long, global = true)]
    pub metrics: bool,

    /// Enable verbose output (sets RUST_LOG=debug)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output (only show errors)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a script with tracing enabled
    Run {
        /// Script file
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Run the script untraced, then trace only this code
        #[arg(long, value_name = "CODE")]
        eval: Option<String>,

        /// Label prepended to every trace line
        #[arg(long, default_value = "")]
        prefix: String,

        /// Log call arguments
        #[arg(long)]
        values: bool,

        /// Log function returns with their value
        #[arg(long)]
        returns: bool,

        /// Log statement steps
        #[arg(long)]
        steps: bool,

        /// Pause execution after each traced event (milliseconds)
        #[arg(long, value_name = "MS")]
        pause_on_step: Option<u64>,

        /// Only trace frames whose source URL contains this substring
        #[arg(long, value_name = "S")]
        filter_url: Option<String>,

        /// Do not write trace lines; only report the event count
        #[arg(short, long)]
        quiet: bool,
    },

    /// Parse a script and list its functions
    Check {
        /// Script file
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
    },
}
