use anyhow::Context;
use trellis_config::TrellisConfig;

/// Load `.env` and the layered configuration.
pub fn load_config() -> anyhow::Result<TrellisConfig> {
    TrellisConfig::load_with_dotenv().context("failed to load trellis configuration")
}

/// Warn once about missing server settings instead of failing deep inside a
/// command.
pub fn warn_unconfigured(config: &TrellisConfig) {
    if !config.server.is_configured() {
        tracing::warn!(
            "server.base_url is not set; set TRELLIS_SERVER__BASE_URL or add it to .trellis/config.toml"
        );
    } else if config.server.require_auth && config.server.token().is_none() {
        tracing::warn!("server.require_auth is set but no api_token is configured; live updates are disabled");
    }
}
