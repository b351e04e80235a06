//! Entry point: parses the CLI, installs tracing, and dispatches to the
//! comparison window or the `still` exporter.

mod cli;
mod paths;
mod run;
mod still;

use anyhow::Result;
use cli::Command;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing(cli.log_level.as_deref());

    match cli.command {
        Some(Command::Still(args)) => still::run_still(args),
        None => run::run(cli.run),
    }
}
