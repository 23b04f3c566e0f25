use clap::{Args, Subcommand};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Stream logs live: catch up, then print every new record.
    Watch(WatchArgs),
    /// Print the resolved configuration.
    Config,
}

#[derive(Clone, Debug, Args)]
pub struct WatchArgs {
    /// Follow one session instead of all sessions.
    #[arg(long)]
    pub session: Option<String>,

    /// Only fetch records at this level (debug, info, warn, error).
    #[arg(long)]
    pub level: Option<String>,

    /// Only fetch records from this source.
    #[arg(long)]
    pub source: Option<String>,

    /// Cached records to print after the first catch-up.
    #[arg(long, default_value_t = 20)]
    pub tail: usize,
}
