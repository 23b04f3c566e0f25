use trellis_config::TrellisConfig;

use crate::cli::{GlobalFlags, OutputFormat};

const REDACTED: &str = "********";

/// Handle `trl config`.
pub fn handle(config: &TrellisConfig, flags: &GlobalFlags) -> anyhow::Result<()> {
    let redacted = redact(config);
    let rendered = match flags.format {
        OutputFormat::Text => toml::to_string_pretty(&redacted)?,
        OutputFormat::Json => serde_json::to_string_pretty(&redacted)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}

fn redact(config: &TrellisConfig) -> TrellisConfig {
    let mut redacted = config.clone();
    if redacted.server.api_token.is_some() {
        redacted.server.api_token = Some(REDACTED.to_string());
    }
    redacted
}
