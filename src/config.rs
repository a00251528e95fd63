//! Configuration for the acquisition cycle and the HTTP endpoint
//!
//! Defaults carry the fixed deployment (Wiesbaden, DWD open data and Bright
//! Sky). A TOML file can override any section.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// DWD open data base URL
const DWD_BASE_URL: &str = "https://opendata.dwd.de/climate_environment/health/alerts";

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub region: RegionConfig,
    pub endpoints: EndpointConfig,
    pub http: HttpConfig,
    pub server: ServerConfig,
}

/// The single target region and the names it appears under upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Display name, also the primary match key
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Alternative names matched by substring (state, nearby city)
    pub aliases: Vec<String>,
    /// Region codes matched exactly
    pub codes: Vec<String>,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            name: "Wiesbaden".to_string(),
            latitude: 50.0826,
            longitude: 8.2400,
            aliases: vec!["Hessen".to_string(), "Frankfurt".to_string()],
            codes: vec!["11".to_string()],
        }
    }
}

impl RegionConfig {
    /// Expands `{lat}`, `{lon}` and `{date}` placeholders in an endpoint URL
    pub fn expand(&self, template: &str, date: NaiveDate) -> String {
        template
            .replace("{lat}", &self.latitude.to_string())
            .replace("{lon}", &self.longitude.to_string())
            .replace("{date}", &date.format("%Y-%m-%d").to_string())
    }

    /// Expands every template in a candidate list
    pub fn expand_all(&self, templates: &[String], date: NaiveDate) -> Vec<String> {
        templates.iter().map(|t| self.expand(t, date)).collect()
    }
}

/// Ordered candidate endpoints per pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub weather: Vec<String>,
    pub pollen: Vec<String>,
    pub uv: Vec<String>,
    pub ozone: Vec<String>,
    /// Combined UV/ozone feeds, tried for whichever value is still missing
    pub hazard_indices: Vec<String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        let dwd = |path: &str| format!("{}/{}", DWD_BASE_URL, path);

        Self {
            weather: vec![
                "https://api.brightsky.dev/current_weather?lat={lat}&lon={lon}&date={date}"
                    .to_string(),
                dwd("warnings/bgww.json"),
                dwd("warnings/BGWW.json"),
                dwd("biometeorology/biometeorology.json"),
                dwd("warnings/hessen.json"),
                dwd("warnings/biometeorology.csv"),
            ],
            pollen: vec![
                dwd("s31fg.json"),
                dwd("pollenflug/pollenflug.json"),
                dwd("pollenflug/Pollenflug.json"),
                dwd("pollenflug/pollen.json"),
                dwd("pollenflug/hessen.json"),
                dwd("pollenflug/pollenflug.xml"),
                dwd("pollenflug/pollenflug.csv"),
            ],
            uv: vec![
                dwd("uv/uv.json"),
                dwd("uv/UV.json"),
                dwd("uv_index/uv_index.json"),
                dwd("uv_index.json"),
            ],
            ozone: vec![
                dwd("ozon/ozon.json"),
                dwd("ozon/Ozon.json"),
                dwd("ozonvorhersage/ozonvorhersage.json"),
                dwd("ozonvorhersage.json"),
            ],
            hazard_indices: vec![
                dwd("gefahrenindizes/gefahrenindizes.json"),
                dwd("gefahrenindizes.json"),
            ],
        }
    }
}

/// Per-request HTTP settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub accept: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            user_agent: "Biowetter-Wiesbaden/1.0".to_string(),
            accept: "application/json, application/xml, text/csv, */*".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// HTTP endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the platform config file
    ///
    /// A missing file yields the defaults; an unreadable or invalid file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let config = toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.clone(), source })?;

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Path to the platform config file (`~/.config/biowetter/config.toml` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("", "", "biowetter")?;
        Some(dirs.config_dir().join("config.toml"))
    }
}
