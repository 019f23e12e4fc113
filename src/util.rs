use std::path::PathBuf;

use tracing::Level;

use crate::config::{ApiConfig, Config};

const MONITOR_DATA_DIR: &str = "MONITOR_DATA_DIR";

pub fn get_data_dir() -> Option<PathBuf> {
    std::env::var(MONITOR_DATA_DIR).ok().map(PathBuf::from)
}

const MONITOR_LOG_LEVEL: &str = "MONITOR_LOG_LEVEL";

const DEFAULT_LOG_LEVEL: Level = Level::INFO;

pub fn get_log_level() -> Level {
    let level_from_env = std::env::var(MONITOR_LOG_LEVEL);
    level_from_env.map_or(DEFAULT_LOG_LEVEL, |res| {
        res.parse().unwrap_or(DEFAULT_LOG_LEVEL)
    })
}

const MONITOR_API_TOKEN: &str = "MONITOR_API_TOKEN";

pub fn get_api_token() -> Option<String> {
    let token_from_env = std::env::var(MONITOR_API_TOKEN);
    token_from_env.ok().filter(|token| !token.is_empty())
}

/// Apply environment overrides on top of a loaded configuration
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(dir) = get_data_dir() {
        config.storage.directory = dir;
    }

    if let Some(token) = get_api_token() {
        config
            .api
            .get_or_insert_with(ApiConfig::default)
            .auth_token = Some(token);
    }
}
