use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

pub const DEFAULT_API_URL: &str = "https://api.backend.stream";
pub const DEFAULT_LOCAL_CHAT_URL: &str = "http://127.0.0.1:5000";

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub local_chat_url: Option<String>,
    pub download_dir: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            api_base_url: None,
            local_chat_url: None,
            download_dir: None,
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        Ok(())
    }

    /// Backend base URL: env var first, then config file, then the default.
    pub fn resolve_api_url(&self) -> String {
        std::env::var("WATCHPOST_API_URL")
            .ok()
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Local-edge chat URL: env var first, then config file, then the default.
    pub fn resolve_local_chat_url(&self) -> String {
        std::env::var("WATCHPOST_LOCAL_CHAT_URL")
            .ok()
            .or_else(|| self.local_chat_url.clone())
            .unwrap_or_else(|| DEFAULT_LOCAL_CHAT_URL.to_string())
    }

    /// Directory frame images get written to. Falls back to the user's
    /// download directory, then the working directory.
    pub fn resolve_download_dir(&self) -> PathBuf {
        self.download_dir
            .clone()
            .map(PathBuf::from)
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Where the runtime log goes. The TUI owns the terminal, so diagnostics
    /// cannot be printed there.
    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("watchpost.log"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("config.json"))
    }

    fn app_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("watchpost"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_resolution_order() {
        let mut config = Config::new();
        assert_eq!(config.resolve_api_url(), DEFAULT_API_URL);

        config.api_base_url = Some("https://staging.example.com".to_string());
        assert_eq!(config.resolve_api_url(), "https://staging.example.com");

        std::env::set_var("WATCHPOST_API_URL", "https://override.example.com");
        assert_eq!(config.resolve_api_url(), "https://override.example.com");
        std::env::remove_var("WATCHPOST_API_URL");
    }

    #[test]
    fn test_local_chat_url_resolution_order() {
        let mut config = Config::new();
        assert_eq!(config.resolve_local_chat_url(), DEFAULT_LOCAL_CHAT_URL);

        config.local_chat_url = Some("http://192.168.1.20:5000".to_string());
        assert_eq!(config.resolve_local_chat_url(), "http://192.168.1.20:5000");

        std::env::set_var("WATCHPOST_LOCAL_CHAT_URL", "http://10.0.0.2:5000");
        assert_eq!(config.resolve_local_chat_url(), "http://10.0.0.2:5000");
        std::env::remove_var("WATCHPOST_LOCAL_CHAT_URL");
    }

    #[test]
    fn test_configured_download_dir_wins() {
        let mut config = Config::new();
        config.download_dir = Some("/tmp/watchpost-frames".to_string());
        assert_eq!(
            config.resolve_download_dir(),
            PathBuf::from("/tmp/watchpost-frames")
        );
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let mut config = Config::new();
        config.api_base_url = Some("https://api.example.com".to_string());
        config.download_dir = Some("/data/frames".to_string());

        let json = serde_json::to_string_pretty(&config).unwrap();
        let loaded: Config = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.api_base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(loaded.local_chat_url, None);
        assert_eq!(loaded.download_dir.as_deref(), Some("/data/frames"));
    }
}
