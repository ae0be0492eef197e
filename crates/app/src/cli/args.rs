pub use clap::Parser;

use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(about = "Path-addressed file storage with access rights, over HTTP")]
pub struct Args {
    /// Path to the TOML config file (defaults are used when not set)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: crate::Command,
}
