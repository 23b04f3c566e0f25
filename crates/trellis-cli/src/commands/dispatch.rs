use trellis_config::TrellisConfig;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;

/// Dispatch a parsed command to the corresponding handler module.
pub async fn dispatch(
    command: Commands,
    config: &TrellisConfig,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Watch(args) => commands::watch::handle(&args, config, flags).await,
        Commands::Config => commands::config::handle(config, flags),
    }
}
