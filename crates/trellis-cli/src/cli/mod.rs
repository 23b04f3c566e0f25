use clap::Parser;

pub mod global;
pub mod root_commands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::{Commands, WatchArgs};

/// Top-level CLI parser for the `trl` binary.
#[derive(Debug, Parser)]
#[command(name = "trl", version, about = "Trellis - live session and task logs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: text, json
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    /// Extract ergonomic global flags struct for command handlers.
    #[must_use]
    pub const fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            quiet: self.quiet,
        }
    }
}
