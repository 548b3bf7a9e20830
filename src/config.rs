//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the
//! tide-config.toml file. It provides a centralized way to configure the tide
//! model, the forecast window and worker pool, and the coastal sites.

use crate::catalog::Interpolation;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "tide-config.toml";

/// Application configuration loaded from tide-config.toml
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// Tide model and prediction settings
    pub tides: TideConfig,
    /// Forecast window and parallelism
    pub forecast: ForecastConfig,
    /// Coastal points that get a forecast table
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

/// Tide model and prediction settings
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TideConfig {
    /// Harmonic tide model document (JSON)
    pub model_path: PathBuf,
    /// Number of leading constituents to use (1..=10)
    pub n_constituents: usize,
    /// Grid-to-site interpolation
    #[serde(default)]
    pub interpolation: Interpolation,
    /// Synthesis resolution in minutes
    pub step_minutes: i64,
    /// Minimum spacing between successive turning points, in minutes
    pub min_separation_minutes: i64,
    /// Hours subtracted from UTC to get local time (4 for UTC-4)
    pub utc_offset_hours: i64,
}

/// Forecast window and parallelism
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ForecastConfig {
    /// Length of the hourly site table in hours
    pub horizon_hours: i64,
    /// Site worker pool size
    pub n_jobs: usize,
    /// Directory the site tables are written to
    pub output_dir: PathBuf,
}

/// A coastal forecast point
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SiteConfig {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl SiteConfig {
    fn new(name: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tides: TideConfig {
                model_path: PathBuf::from("data/tide_model.json"),
                n_constituents: 10,
                interpolation: Interpolation::Nearest,
                step_minutes: 1,
                min_separation_minutes: 120,
                utc_offset_hours: 4, // Chile continental, UTC-4
            },
            forecast: ForecastConfig {
                horizon_hours: 24 * 9,
                n_jobs: 10,
                output_dir: PathBuf::from("tmp"),
            },
            sites: vec![
                SiteConfig::new("Valparaiso", -33.046, -71.613),
                SiteConfig::new("Los_Vilos", -31.904, -71.499),
                SiteConfig::new("Huentelauquen", -31.621, -71.568),
                SiteConfig::new("Talcaruca", -30.476, -71.697),
                SiteConfig::new("La_Serena", -29.878, -71.286),
                SiteConfig::new("Chanaral_de_Aceituno", -29.064, -71.514),
            ],
        }
    }
}

impl Config {
    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        sites = config.sites.len(),
                        "loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), "invalid config file format: {e}");
                    warn!("using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                info!(path = %path.display(), "no config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Save current configuration to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path.as_ref(), contents)?;
        info!(path = %path.as_ref().display(), "configuration saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tides.n_constituents, 10);
        assert_eq!(config.tides.step_minutes, 1);
        assert_eq!(config.tides.min_separation_minutes, 120);
        assert_eq!(config.tides.utc_offset_hours, 4);
        assert_eq!(config.forecast.horizon_hours, 216);
        assert_eq!(config.forecast.n_jobs, 10);
        assert_eq!(config.sites.len(), 6);
        assert_eq!(config.sites[0].name, "Valparaiso");
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.tides.model_path, parsed.tides.model_path);
        assert_eq!(config.tides.interpolation, parsed.tides.interpolation);
        assert_eq!(config.sites, parsed.sites);
    }

    #[test]
    fn test_partial_config_parses() {
        let toml_str = r#"
            [tides]
            model_path = "model.json"
            n_constituents = 4
            interpolation = "bilinear"
            step_minutes = 2
            min_separation_minutes = 90
            utc_offset_hours = 3

            [forecast]
            horizon_hours = 48
            n_jobs = 2
            output_dir = "out"

            [[sites]]
            name = "Coquimbo"
            lat = -29.95
            lon = -71.34
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.tides.interpolation, Interpolation::Bilinear);
        assert_eq!(config.sites, vec![SiteConfig::new("Coquimbo", -29.95, -71.34)]);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let config = Config::load_from_path("/nonexistent/path");
        // Should fallback to default
        assert_eq!(config.tides.n_constituents, 10);
    }

    #[test]
    fn test_save_and_reload() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.forecast.n_jobs = 3;
        config.save(file.path()).unwrap();
        let loaded = Config::load_from_path(file.path());
        assert_eq!(loaded.forecast.n_jobs, 3);
    }
}
