// src/commands/mod.rs
//! Command handlers for the tpforge CLI

mod mirror;
mod project;
mod resolve;

pub use mirror::cmd_mirror;
pub use project::{cmd_build_properties, cmd_classpath, cmd_gav};
pub use resolve::cmd_resolve;
