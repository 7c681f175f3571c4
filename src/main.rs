//! Binary entry point: parse the command line and hand off to either the
//! terminal UI or a one-shot store command.
use clap::Parser;
use student_records::cli::{self, Cli};

/// Errors bubble up here so startup failures (an unwritable data directory, a
/// malformed config file) are printed instead of crashing silently.
fn main() -> anyhow::Result<()> {
    cli::run(Cli::parse())
}
