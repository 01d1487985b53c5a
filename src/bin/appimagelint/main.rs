//! appimagelint CLI - checks AppImages for compatibility with Linux distributions

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use appimagelint::util::signal::{install_interrupt_handler, interrupted, INTERRUPTED_EXIT_CODE};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let result = run();

    if interrupted() {
        eprintln!("error: interrupted by user");
        std::process::exit(INTERRUPTED_EXIT_CODE);
    }

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    init_logging(&cli);
    install_interrupt_handler();

    // Execute command
    match cli.command {
        Some(Commands::Cache(args)) => commands::cache::execute(args, cli.offline, cli.force_colors),
        Some(Commands::Completions(args)) => commands::completions::execute(args),
        None => commands::check::execute(cli.check, cli.offline, cli.force_colors),
    }
}

/// Log to stderr; `RUST_LOG` replaces the default filter.
fn init_logging(cli: &Cli) {
    let default = if cli.debug {
        "appimagelint=debug"
    } else {
        "appimagelint=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .with_ansi(cli.force_colors || io::stderr().is_terminal())
        .with_file(cli.log_source_location)
        .with_line_number(cli.log_source_location);

    if cli.log_timestamps {
        builder.init();
    } else {
        builder.without_time().init();
    }
}
