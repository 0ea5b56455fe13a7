//! Dashboard configuration: `shopwatch.toml` under the platform config dir.
//!
//! Loaded once at startup and threaded through the app as an explicit
//! value. There is no ambient singleton; updating settings produces a new
//! value that is saved and re-threaded.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use shopwatch_api_types::AgentSettings;

pub const MODEL_OPTIONS: &[&str] = &["gpt-4o-mini", "gpt-4", "o3-mini"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3030".to_string(),
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Identity-provider user id sent with start-run requests.
    pub user_id: String,
}

pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io", "shopwatch", "shopwatch")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Load `shopwatch.toml`, falling back to defaults on a missing or
/// unparseable file.
pub fn load_config() -> AppConfig {
    let Some(path) = config_dir().map(|d| d.join("shopwatch.toml")) else {
        return AppConfig::default();
    };
    match std::fs::read_to_string(&path) {
        Ok(raw) => match toml::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("invalid config at {}: {e}", path.display());
                AppConfig::default()
            }
        },
        Err(_) => AppConfig::default(),
    }
}

/// Persist the config under `dir`, creating the directory if needed.
pub fn save_config(dir: &Path, config: &AppConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let raw = toml::to_string_pretty(config)?;
    std::fs::write(dir.join("shopwatch.toml"), raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.server.url, "http://127.0.0.1:3030");
        assert_eq!(parsed.agent.llm_model_name, "gpt-4o-mini");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let parsed: AppConfig = toml::from_str("[identity]\nuser_id = \"user_1\"\n").unwrap();
        assert_eq!(parsed.identity.user_id, "user_1");
        assert_eq!(parsed.server.request_timeout_secs, 15);
    }

    #[test]
    fn save_writes_a_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.agent.llm_model_name = "gpt-4".to_string();

        save_config(dir.path(), &config).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("shopwatch.toml")).unwrap();
        let parsed: AppConfig = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.agent.llm_model_name, "gpt-4");
    }
}
