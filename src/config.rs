use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{
    Result,
    eyre::{Context, OptionExt},
};
use serde::{Deserialize, Serialize};

use crate::services::listen_time::DEFAULT_ALBUM_CONCURRENCY;
use crate::spotify_rs::auth::SPOTIFY_ACCOUNTS_URL;
use crate::spotify_rs::client::SPOTIFY_API_URL;

const APP_DIR: &str = "listen-time";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite file, `~` is expanded
    #[serde(skip_serializing_if = "Option::is_none")]
    database: Option<String>,
    /// How long a cached artist is trusted, e.g. `30days`
    cache_retention: String,
    spotify: SpotifyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub api_base_url: String,
    pub accounts_base_url: String,
    pub request_timeout: String,
    pub album_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            cache_retention: "30days".to_string(),
            spotify: SpotifyConfig::default(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base_url: SPOTIFY_API_URL.to_string(),
            accounts_base_url: SPOTIFY_ACCOUNTS_URL.to_string(),
            request_timeout: "10s".to_string(),
            album_concurrency: DEFAULT_ALBUM_CONCURRENCY,
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context(format!("Failed to parse config file: {}", path.display()))?;

        // Surface bad durations at startup rather than on first use
        config.cache_retention()?;
        config.request_timeout()?;

        Ok(config)
    }

    /// Get the default config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|path| path.join(APP_DIR).join("config.toml"))
    }

    /// Load the default config file, or built-in defaults if there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Write the default config to the default path, if it doesn't exist
    pub fn create_default() -> Result<PathBuf> {
        let path = Self::config_path().ok_or_eyre("No config directory on this platform")?;
        Self::write_default(&path)?;
        Ok(path)
    }

    fn write_default(path: &Path) -> Result<()> {
        if path.exists() {
            tracing::info!("Config already exists at {}", path.display());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(format!(
                "Failed to create config directory: {}",
                parent.display()
            ))?;
        }

        let contents =
            toml::to_string_pretty(&Self::default()).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .context(format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Wrote default config to {}", path.display());
        Ok(())
    }

    /// Expand ~ to home directory
    fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.database {
            Some(path) => Self::expand_path(path),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .unwrap_or_default()
                .join("cache.sqlite"),
        }
    }

    pub fn cache_retention(&self) -> Result<Duration> {
        humantime::parse_duration(&self.cache_retention).context(format!(
            "Invalid cache_retention: {}",
            self.cache_retention
        ))
    }

    pub fn request_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.spotify.request_timeout).context(format!(
            "Invalid spotify.request_timeout: {}",
            self.spotify.request_timeout
        ))
    }

    pub fn spotify(&self) -> &SpotifyConfig {
        &self.spotify
    }

    /// Client credentials, preferring the given overrides to the file
    pub fn spotify_credentials(
        &self,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Result<SpotifyCredentials> {
        let client_id = client_id
            .or_else(|| self.spotify.client_id.clone())
            .ok_or_eyre("Missing Spotify client id, set SPOTIFY_ID or spotify.client_id")?;
        let client_secret = client_secret
            .or_else(|| self.spotify.client_secret.clone())
            .ok_or_eyre(
                "Missing Spotify client secret, set SPOTIFY_SECRET or spotify.client_secret",
            )?;

        Ok(SpotifyCredentials {
            client_id,
            client_secret,
        })
    }
}
