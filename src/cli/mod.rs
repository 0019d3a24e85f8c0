//! CLI layer: argument parsing and the interactive designer session

pub mod args;
pub mod commands;

pub use args::Cli;
