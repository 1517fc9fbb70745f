// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: configuration file
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .default_value("tpforge.toml")
        .help("Path to the configuration file")
}

/// Common argument: root units
fn seed_arg() -> Arg {
    Arg::new("seed")
        .short('s')
        .long("seed")
        .action(ArgAction::Append)
        .help("Root unit as id[/version]")
}

fn build_cli() -> Command {
    Command::new("tpforge")
        .version(env!("CARGO_PKG_VERSION"))
        .author("tpforge Contributors")
        .about("Target-platform resolution and p2 repository mirroring for OSGi builds")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log at debug level (overridden by RUST_LOG)"),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve a target platform and print it per environment")
                .arg(config_arg())
                .arg(seed_arg())
                .arg(
                    Arg::new("project")
                        .short('p')
                        .long("project")
                        .action(ArgAction::Append)
                        .help("Plug-in project whose manifest is part of the reactor"),
                )
                .arg(
                    Arg::new("strategy")
                        .long("strategy")
                        .value_parser(["slicer", "projector"])
                        .help("Override the configured resolution strategy"),
                ),
        )
        .subcommand(
            Command::new("mirror")
                .about("Mirror units and artifacts into a local repository")
                .arg(config_arg())
                .arg(seed_arg())
                .arg(
                    Arg::new("destination")
                        .short('d')
                        .long("destination")
                        .required(true)
                        .help("Destination repository directory"),
                )
                .arg(
                    Arg::new("name")
                        .long("name")
                        .default_value("tpforge mirror")
                        .help("Name of the destination repository"),
                ),
        )
        .subcommand(
            Command::new("gav")
                .about("Print the Maven repository path of groupId:artifactId:version")
                .arg(Arg::new("coordinates").required(true))
                .arg(Arg::new("classifier").long("classifier"))
                .arg(Arg::new("extension").long("extension").help("Packaging type or file extension")),
        )
        .subcommand(
            Command::new("classpath")
                .about("Print the entries of a project's .classpath")
                .arg(Arg::new("project").default_value(".").help("Project directory")),
        )
        .subcommand(
            Command::new("build-properties")
                .about("Print the parsed build.properties of a project")
                .arg(Arg::new("project").default_value(".").help("Project directory")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("tpforge.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
