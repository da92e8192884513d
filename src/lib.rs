pub mod config;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod store;

use std::path::PathBuf;

use config::{Config, CONFIG_PATH_ENV};
use store::{SessionStore, StoreConfig};

/// Restore what can be restored, back up what is live, print the report.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    let _logger = logging::init(&config.log_dir(), config.debug_logging)?;
    log::info!("Sessions root: {}", config.sessions_path.display());

    let store = SessionStore::new(StoreConfig::from(&config));
    let report = lifecycle::startup(&store, &config);

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
