//! Command implementations.

mod check;
mod run;

use crate::cli::{Cli, Commands};

/// Dispatch CLI command to the appropriate handler.
pub fn run_command(cli: &Cli) -> i32 {
    match &cli.command {
        Commands::Run { .. } => handle_run(cli),
        Commands::Check { script } => check::cmd_check(script),
    }
}

fn handle_run(cli: &Cli) -> i32 {
    let Commands::Run {
        script,
        eval,
        prefix,
        values,
        returns,
        steps,
        pause_on_step,
        filter_url,
        quiet,
    } = &cli.command
    else {
        unreachable!("run command variant mismatch");
    };

    run::cmd_run(&run::RunArgs {
        script,
        eval: eval.as_deref(),
        prefix,
        values: *values,
        returns: *returns,
        steps: *steps,
        pause_on_step: *pause_on_step,
        filter_url: filter_url.as_deref(),
        quiet: *quiet,
    })
}
