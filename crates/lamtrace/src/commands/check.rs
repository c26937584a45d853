//! Check command: parse a script and list its functions.

use std::fs;
use std::path::Path;

use lamtrace::script_url;
use lamtrace_script::{SourceLocation, parse};
use tracing::debug;

use crate::cli::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::terminal;

/// Handle the `check` command.
pub fn cmd_check(script: &Path) -> i32 {
    terminal::info(&format!("checking {}", script.display()));
    let source = match fs::read_to_string(script) {
        Ok(source) => source,
        Err(err) => {
            terminal::error(&format!("failed to read {}: {err}", script.display()));
            return EXIT_FAILURE;
        }
    };
    let url = script_url(script);
    let program = match parse(&url, &source) {
        Ok(program) => program,
        Err(err) => {
            terminal::error(&err.to_string());
            return EXIT_FAILURE;
        }
    };

    let mut count = 0usize;
    for function in program.functions() {
        let entry = SourceLocation::new(url.as_str(), function.entry_pos());
        let name = function.name.as_deref().unwrap_or("anonymous");
        println!("λ {name} {entry}");
        count += 1;
    }
    debug!(functions = count, "parsed");

    if count == 0 {
        terminal::warning(&format!("{url}: no top-level functions"));
    } else {
        terminal::success(&format!("{url}: {count} functions"));
    }
    EXIT_SUCCESS
}
