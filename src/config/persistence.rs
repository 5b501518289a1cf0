use std::path::Path;

use config::{Config, Environment, File};
use tracing::info;

use super::settings::SessionConfig;
use crate::error::Result;

pub const ENV_PREFIX: &str = "SYNCSTREAM";

/// Load configuration.
///
/// Priority: environment (`SYNCSTREAM_SYNC__DRIFT_THRESHOLD_SECONDS`, ...),
/// then the optional file, then defaults. A missing file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        info!("Loading config from {:?}", path);
        builder = builder.add_source(File::from(path).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?.try_deserialize::<SessionConfig>()?;
    Ok(config)
}

pub fn save_config(path: &Path, config: &SessionConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)?;
    info!("Config saved to {:?}", path);
    Ok(())
}
