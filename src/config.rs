//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety

use crate::forecast::{ForecastAnchor, ScenarioKey, DEFAULT_HORIZON_DAYS};
use crate::timestamp_parser::DayBoundary;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Estimation and conversion settings
    pub engine: EngineConfig,

    /// Forecast defaults
    pub forecast: ForecastConfig,

    /// Output configuration
    pub output: OutputConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Explicit intensity in g/kWh; overrides the selected mix when set
    pub carbon_intensity: Option<f64>,
    /// Energy mix used when the store has no selection
    pub selected_mix: String,
    pub day_boundary: DayBoundary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    pub horizon_days: usize,
    pub scenario: String,
    pub anchor: ForecastAnchor,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub json_pretty: bool,
    pub daily_limit: usize,
    pub recent_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_directory: PathBuf,
    pub log_directory: PathBuf,
    /// JSON table of energy mixes replacing the built-in one
    pub intensity_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig {
                level: "ERROR".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
            },
            engine: EngineConfig {
                carbon_intensity: None,
                selected_mix: crate::carbon::GLOBAL_AVERAGE_MIX.to_string(),
                day_boundary: DayBoundary::Local,
            },
            forecast: ForecastConfig {
                horizon_days: DEFAULT_HORIZON_DAYS,
                scenario: ScenarioKey::Normal.to_string(),
                anchor: ForecastAnchor::Mean,
            },
            output: OutputConfig {
                json_pretty: true,
                daily_limit: 30,
                recent_limit: 4,
            },
            paths: PathsConfig {
                data_directory: dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("llm-footprint"),
                log_directory: PathBuf::from("logs"),
                intensity_file: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("llm-footprint.toml"),
            PathBuf::from(".llm-footprint.toml"),
            dirs::config_dir()
                .map(|d| d.join("llm-footprint").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        if let Ok(val) = env::var("LLM_FOOTPRINT_INTENSITY") {
            self.engine.carbon_intensity = Some(val.parse().context("Invalid LLM_FOOTPRINT_INTENSITY")?);
        }
        if let Ok(val) = env::var("LLM_FOOTPRINT_MIX") {
            self.engine.selected_mix = val;
        }
        if let Ok(val) = env::var("LLM_FOOTPRINT_DAY_BOUNDARY") {
            self.engine.day_boundary = val.parse().context("Invalid LLM_FOOTPRINT_DAY_BOUNDARY")?;
        }

        if let Ok(val) = env::var("LLM_FOOTPRINT_SCENARIO") {
            self.forecast.scenario = val;
        }
        if let Ok(val) = env::var("LLM_FOOTPRINT_HORIZON_DAYS") {
            self.forecast.horizon_days = val.parse().context("Invalid LLM_FOOTPRINT_HORIZON_DAYS")?;
        }

        if let Ok(val) = env::var("LLM_FOOTPRINT_DATA_DIR") {
            self.paths.data_directory = PathBuf::from(val);
        }
        if let Ok(val) = env::var("LLM_FOOTPRINT_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if let Some(intensity) = self.engine.carbon_intensity {
            if !intensity.is_finite() || intensity < 0.0 {
                return Err(anyhow::anyhow!(
                    "Carbon intensity must be a non-negative number, got {}",
                    intensity
                ));
            }
        }

        if self.forecast.horizon_days == 0 {
            return Err(anyhow::anyhow!("Forecast horizon must be greater than 0"));
        }

        if self.forecast.scenario.parse::<ScenarioKey>().is_err() {
            warn!(
                scenario = %self.forecast.scenario,
                "Unknown forecast scenario, normal will be used"
            );
        }

        if matches!(self.logging.output.as_str(), "file" | "both") && !self.paths.log_directory.exists() {
            fs::create_dir_all(&self.paths.log_directory).context("Failed to create log directory")?;
        }

        Ok(())
    }

    pub fn scenario(&self) -> ScenarioKey {
        ScenarioKey::from_key_or_default(&self.forecast.scenario)
    }

    /// Save current configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration instance
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: {:#}. Using default configuration.", e);
            Config::default()
        })
    })
}
