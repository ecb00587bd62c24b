use crate::artifacts::ArtifactPaths;
use crate::series::DEFAULT_CADENCE_MINUTES;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_TREND_POINTS: usize = 126;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub artifacts: Option<ArtifactsSection>,
    #[serde(default)]
    pub forecast: Option<ForecastSection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactsSection {
    pub series_path: Option<PathBuf>,
    pub scalers_path: Option<PathBuf>,
    pub models_path: Option<PathBuf>,
    /// Lot coordinates and capacities (optional)
    pub lots_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastSection {
    /// Spacing of the forecast index in minutes (default: 30)
    pub cadence_minutes: Option<i64>,
    /// Threads used to forecast locations in parallel (default: 1)
    pub workers: Option<usize>,
    /// Historical points returned with a lot trend (default: 126)
    pub trend_points: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

fn non_empty(path: Option<&PathBuf>) -> Option<&Path> {
    let path = path?.as_path();
    if path.as_os_str().is_empty() {
        None
    } else {
        Some(path)
    }
}

impl Config {
    /// Returns the artifact file locations, or None unless the series,
    /// scalers and models paths are all set.
    pub fn artifact_paths(&self) -> Option<ArtifactPaths> {
        let section = self.artifacts.as_ref()?;
        Some(ArtifactPaths {
            series: non_empty(section.series_path.as_ref())?.to_path_buf(),
            scalers: non_empty(section.scalers_path.as_ref())?.to_path_buf(),
            models: non_empty(section.models_path.as_ref())?.to_path_buf(),
            lots: non_empty(section.lots_path.as_ref()).map(Path::to_path_buf),
        })
    }

    /// Returns the forecast cadence (default: 30 minutes).
    /// A value too large to represent comes back as zero and fails series validation.
    pub fn cadence(&self) -> time::Duration {
        let minutes = self
            .forecast
            .as_ref()
            .and_then(|f| f.cadence_minutes)
            .unwrap_or(DEFAULT_CADENCE_MINUTES);
        minutes
            .checked_mul(60)
            .map(time::Duration::seconds)
            .unwrap_or(time::Duration::ZERO)
    }

    /// Returns the number of forecast workers, at least 1
    pub fn workers(&self) -> usize {
        self.forecast
            .as_ref()
            .and_then(|f| f.workers)
            .unwrap_or(DEFAULT_WORKERS)
            .max(1)
    }

    pub fn trend_points(&self) -> usize {
        self.forecast
            .as_ref()
            .and_then(|f| f.trend_points)
            .unwrap_or(DEFAULT_TREND_POINTS)
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    pub fn log_level(&self) -> &str {
        let level = self.logging.level.trim();
        if level.is_empty() {
            DEFAULT_LOG_LEVEL
        } else {
            level
        }
    }
}
