//! CLI argument definitions using clap

use clap::{ArgAction, Parser};
use clap_complete::Shell;

/// Interactive editor and player for branching-narrative scene trees
#[derive(Parser, Debug)]
#[command(name = "storytree")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity (can be repeated: -d -d -d)
    #[arg(short, long, action = ArgAction::Count)]
    pub debug: u8,

    /// Print author and version information
    #[arg(long)]
    pub info: bool,

    /// Generate shell completions
    #[arg(long = "generate", value_enum)]
    pub generator: Option<Shell>,
}
