// src/cli.rs
//! CLI definitions for tpforge
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tpforge::config::DEFAULT_CONFIG_FILE;
use tpforge::resolver::StrategyKind;

#[derive(Parser)]
#[command(name = "tpforge")]
#[command(author = "tpforge Contributors")]
#[command(version)]
#[command(about = "Target-platform resolution and p2 repository mirroring for OSGi builds", long_about = None)]
pub struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a target platform and print it per environment
    Resolve {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Root unit as id[/version]; a version ending in .qualifier matches any qualifier
        #[arg(short, long)]
        seed: Vec<String>,

        /// Plug-in project whose META-INF/MANIFEST.MF is part of the reactor
        #[arg(short, long)]
        project: Vec<PathBuf>,

        /// Override the configured resolution strategy
        #[arg(long)]
        strategy: Option<StrategyKind>,
    },

    /// Mirror units and artifacts into a local repository
    Mirror {
        /// Path to the configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Destination repository directory
        #[arg(short, long)]
        destination: PathBuf,

        /// Root unit as [feature:|plugin:]id[/version]; none mirrors everything
        #[arg(short, long)]
        seed: Vec<String>,

        /// Name of the destination repository
        #[arg(long, default_value = "tpforge mirror")]
        name: String,
    },

    /// Print the Maven repository path of groupId:artifactId:version
    Gav {
        coordinates: String,

        #[arg(long)]
        classifier: Option<String>,

        /// Packaging type or file extension
        #[arg(long)]
        extension: Option<String>,
    },

    /// Print the entries of a project's .classpath
    Classpath {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },

    /// Print the parsed build.properties of a project
    BuildProperties {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
    },
}
