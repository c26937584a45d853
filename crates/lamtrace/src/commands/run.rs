//! Run command.

use std::path::Path;

use lamtrace::{RunOptions, StdoutSink, TraceConfig, run_script};
use tracing::{error, info};

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

pub struct RunArgs<'a> {
    pub script: &'a Path,
    pub eval: Option<&'a str>,
    pub prefix: &'a str,
    pub values: bool,
    pub returns: bool,
    pub steps: bool,
    pub pause_on_step: Option<u64>,
    pub filter_url: Option<&'a str>,
    pub quiet: bool,
}

fn build_config(args: &RunArgs<'_>) -> Result<TraceConfig, String> {
    let mut config = TraceConfig::new()
        .with_prefix(args.prefix)
        .with_trace_values(args.values)
        .with_trace_function_return(args.returns)
        .with_trace_steps(args.steps);
    if let Some(ms) = args.pause_on_step {
        let ms = i64::try_from(ms).map_err(|_| format!("pause of {ms} ms is too large"))?;
        config = config.with_pause_on_step_ms(ms);
    }
    if let Some(filter) = args.filter_url {
        config = config.with_filter_frame_source_url(filter);
    }
    if !args.quiet {
        config = config.with_logging_method(StdoutSink);
    }
    Ok(config)
}

/// Handle the `run` command.
pub fn cmd_run(args: &RunArgs<'_>) -> i32 {
    info!(script = %args.script.display(), "running");

    let config = match build_config(args) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid trace configuration");
            return EXIT_FAILURE;
        }
    };
    let mut options = RunOptions::new(args.script, config);
    if let Some(code) = args.eval {
        options = options.with_eval(code);
    }

    match run_script(&options) {
        Ok(summary) => {
            terminal::success(&format!(
                "{} events ({} calls, {} steps, {} returns) in {:.2?}",
                summary.events(),
                summary.calls,
                summary.steps,
                summary.returns,
                summary.elapsed
            ));
            terminal::dim(&format!("result: {}", summary.result));
            EXIT_SUCCESS
        }
        Err(err) => {
            terminal::error(&format!("{}: {err}", args.script.display()));
            EXIT_FAILURE
        }
    }
}
