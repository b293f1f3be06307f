mod cli;
mod codebook;
mod commands;
mod dataset;
mod error;
mod metrics;
mod model;
mod sampling;
mod session;
mod similarity;
mod util;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Profile(args) => commands::profile::run(args),
        Commands::Sample(args) => commands::sample::run(args),
        Commands::Review(args) => commands::review::run(args),
        Commands::Report(args) => commands::report::run(args),
        Commands::Export(args) => commands::export::run(args),
        Commands::Codebook(args) => commands::codebook::run(args),
        Commands::Status(args) => commands::status::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
