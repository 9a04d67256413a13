mod cli;
mod commands;
mod components;
mod config;
mod engine;
mod kinds;
mod kube;
mod paths;
mod progress;
mod scenario;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    /// Explicit stack file from `--config` / `NIMBUS_CONFIG`
    pub config: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        config: cli.config,
    };

    match cli.command {
        Command::Preview(args) => commands::stack::preview(&ctx, args),
        Command::Up(args) => commands::stack::up(&ctx, args),
        Command::Graph(args) => commands::stack::graph(&ctx, args),
        Command::Scenarios => commands::stack::scenarios(),
        Command::Config(cmd) => commands::config::run(&ctx, cmd),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "nimbus", &mut io::stdout());
            Ok(())
        }
    }
}
