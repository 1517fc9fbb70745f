// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Resolve {
            config,
            seed,
            project,
            strategy,
        } => commands::cmd_resolve(&config, &seed, &project, strategy),
        Commands::Mirror {
            config,
            destination,
            seed,
            name,
        } => commands::cmd_mirror(&config, &destination, &seed, &name),
        Commands::Gav {
            coordinates,
            classifier,
            extension,
        } => commands::cmd_gav(&coordinates, classifier.as_deref(), extension.as_deref()),
        Commands::Classpath { project } => commands::cmd_classpath(&project),
        Commands::BuildProperties { project } => commands::cmd_build_properties(&project),
    }
}
