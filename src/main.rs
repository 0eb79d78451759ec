//! Command-line entry point for dotlink.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use dotlink::cli::{Cli, Command};
use dotlink::{commands, logging};

fn main() -> Result<()> {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();

    if matches!(args.command, Command::Version) {
        commands::version::run();
        return Ok(());
    }

    logging::init_subscriber(args.verbose, args.log_name());
    let log = Arc::new(logging::Logger::new(args.log_name()));

    match args.command {
        Command::Config(action) => commands::config::run(&args.global, action, &log),
        Command::Mac(_) => commands::mac::run(&args.global, &log),
        Command::Version => Ok(()),
    }
}
