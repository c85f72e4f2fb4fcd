use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::error::{AppError, AppResult};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Catalog API client id (required by the crawl stage only)
    #[serde(default)]
    pub spotify_client_id: Option<String>,

    /// Catalog API client secret (required by the crawl stage only)
    #[serde(default)]
    pub spotify_client_secret: Option<String>,

    /// Catalog API base URL
    #[serde(default = "default_spotify_api_url")]
    pub spotify_api_url: String,

    /// Client-credentials token endpoint
    #[serde(default = "default_spotify_token_url")]
    pub spotify_token_url: String,

    /// Directory holding every pipeline artifact
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Recommendations materialized per track
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Items requested per playlist page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Attempts allowed for transient upstream failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff delay, also the fallback retry-after hint
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Lookup service host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Lookup service port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_spotify_api_url() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_spotify_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_top_k() -> usize {
    10
}

fn default_page_size() -> u32 {
    100
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// Returns the client credentials, or a configuration error if either is missing
    pub fn credentials(&self) -> AppResult<(String, String)> {
        match (&self.spotify_client_id, &self.spotify_client_secret) {
            (Some(id), Some(secret)) if !id.trim().is_empty() && !secret.trim().is_empty() => {
                Ok((id.clone(), secret.clone()))
            }
            _ => Err(AppError::Configuration(
                "SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must both be set".to_string(),
            )),
        }
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::new(&self.data_dir)
    }
}

/// Locations of every artifact the pipeline reads or writes
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    data_dir: PathBuf,
}

impl ArtifactPaths {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn checkpoint(&self) -> PathBuf {
        self.data_dir.join("playlist_ids_checkpoint.csv")
    }

    pub fn tracks(&self) -> PathBuf {
        self.data_dir.join("crawled_tracks.csv")
    }

    pub fn clean_tracks(&self) -> PathBuf {
        self.data_dir.join("clean_data.csv")
    }

    pub fn features(&self) -> PathBuf {
        self.data_dir.join("features.json")
    }

    pub fn recommendations(&self) -> PathBuf {
        self.data_dir.join("recommend.csv")
    }
}
