//! Configuration management
//!
//! This module handles loading, validation, and management of the Wayfarer configuration.
//! Configuration is stored in TOML format at ~/.wayfarer/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level, payload logging level, data directory
//! - **llm**: Structured-contract LLM settings and provider blocks
//! - **tools**: Upstream data-source endpoints and timeouts
//! - **planner**: Candidate bounds and relaxation strategy
//! - **session**: Conversation context and presentation settings
//!
//! # Examples
//!
//! ```no_run
//! use wayfarer_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_create()?;
//! println!("Default provider: {}", config.llm.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::TravelError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    pub core: CoreConfig,

    /// LLM provider configuration
    pub llm: LLMConfig,

    /// Data source configuration
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Planner configuration
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Verbosity that gates payload inclusion in emitted events (info, debug, trace)
    #[serde(default = "default_payload_level")]
    pub payload_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Use the LLM to refine intents and narrate results
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Default LLM provider (ollama, openai)
    pub default_provider: String,

    /// Timeout for a single structured exchange, in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Ask the LLM for a short summary of the ranked shortlist
    #[serde(default = "default_true")]
    pub narrate_results: bool,

    /// Ollama provider settings
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI-compatible provider settings (OpenAI, Groq, ...)
    #[serde(default)]
    pub openai: OpenAIConfig,
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Base URL for Ollama API
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the chat completions API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Additional models tried in order when the primary model is not found
    #[serde(default = "default_openai_fallback_models")]
    pub fallback_models: Vec<String>,
    // Note: API key read from the environment or OS keychain, not from config
}

/// Data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Nominatim search endpoint
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    /// Open-Meteo forecast endpoint
    #[serde(default = "default_weather_url")]
    pub weather_url: String,

    /// Overpass interpreter endpoint
    #[serde(default = "default_places_url")]
    pub places_url: String,

    /// User-Agent header sent to upstreams
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Timeout for a single upstream call, in seconds
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Search radius for points of interest, in metres
    #[serde(default = "default_poi_radius")]
    pub poi_radius_m: u32,

    /// Maximum points of interest kept per candidate
    #[serde(default = "default_poi_limit")]
    pub poi_limit: usize,

    /// Optional airport table (CSV: city,country,lat,lon); built-in table if unset
    #[serde(default)]
    pub airports_path: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            weather_url: default_weather_url(),
            places_url: default_places_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_tool_timeout(),
            poi_radius_m: default_poi_radius(),
            poi_limit: default_poi_limit(),
            airports_path: None,
        }
    }
}

/// How the planner widens the candidate set when every candidate is infeasible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxationStrategy {
    /// Add the secondary seed pool for the same activity
    WidenSeeds,
    /// Fall back to the general-purpose seed pool regardless of activity
    AnyActivity,
}

/// Planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Upper bound on candidates per planning pass
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,

    /// Minimum surviving candidates before reporting no feasible destinations
    #[serde(default = "default_min_viable")]
    pub min_viable: usize,

    /// Candidate widening strategy used by the single relaxation attempt
    #[serde(default = "default_relaxation")]
    pub relaxation: RelaxationStrategy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_candidates: default_max_candidates(),
            min_viable: default_min_viable(),
            relaxation: default_relaxation(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of prior turns kept in the conversation context
    #[serde(default = "default_context_turns")]
    pub context_turns: usize,

    /// Number of ranked options shown per turn
    #[serde(default = "default_results_shown")]
    pub results_shown: usize,

    /// Ask once per session for a weather preference before discovery queries
    #[serde(default = "default_true")]
    pub ask_weather_preference: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_turns: default_context_turns(),
            results_shown: default_results_shown(),
            ask_weather_preference: true,
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_payload_level() -> String {
    "debug".to_string()
}

fn default_true() -> bool {
    true
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.wayfarer")
}

fn default_llm_timeout() -> u64 {
    30
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_openai_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_openai_fallback_models() -> Vec<String> {
    vec!["llama-3.3-70b-versatile".to_string()]
}

fn default_geocoding_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_weather_url() -> String {
    "https://api.open-meteo.com/v1/forecast".to_string()
}

fn default_places_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

fn default_user_agent() -> String {
    format!("Wayfarer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_tool_timeout() -> u64 {
    20
}

fn default_poi_radius() -> u32 {
    25_000
}

fn default_poi_limit() -> usize {
    100
}

fn default_max_candidates() -> usize {
    8
}

fn default_min_viable() -> usize {
    1
}

fn default_relaxation() -> RelaxationStrategy {
    RelaxationStrategy::WidenSeeds
}

fn default_context_turns() -> usize {
    6
}

fn default_results_shown() -> usize {
    3
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
        }
    }
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            fallback_models: default_openai_fallback_models(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Config {
    /// Load configuration from the default location (~/.wayfarer/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or validation fails.
    pub fn load_or_create() -> Result<Self, TravelError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, TravelError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| TravelError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| TravelError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, TravelError> {
        let mut config = Self::default_config();
        config.validate_and_process()?;
        config.save_to_path(path)?;
        Ok(config)
    }

    /// Write this configuration as TOML, creating parent directories
    pub fn save_to_path(&self, path: &Path) -> Result<(), TravelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                TravelError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| TravelError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| TravelError::Config(format!("Failed to write config file: {}", e)))
    }

    /// Get the default configuration file path (~/.wayfarer/config.toml)
    pub fn default_config_path() -> Result<PathBuf, TravelError> {
        let home = dirs::home_dir()
            .ok_or_else(|| TravelError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".wayfarer").join("config.toml"))
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            core: CoreConfig {
                log_level: default_log_level(),
                payload_level: default_payload_level(),
                data_dir: default_data_dir(),
            },
            llm: LLMConfig {
                enabled: true,
                default_provider: "openai".to_string(),
                timeout_secs: default_llm_timeout(),
                narrate_results: true,
                ollama: OllamaConfig::default(),
                openai: OpenAIConfig::default(),
            },
            tools: ToolsConfig::default(),
            planner: PlannerConfig::default(),
            session: SessionConfig::default(),
        }
    }

    /// Validate and process configuration
    ///
    /// Validates enumerated values and bounds, expands `~` in paths.
    fn validate_and_process(&mut self) -> Result<(), TravelError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(TravelError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        let valid_payload_levels = ["info", "debug", "trace"];
        if !valid_payload_levels.contains(&self.core.payload_level.as_str()) {
            return Err(TravelError::Config(format!(
                "Invalid payload level '{}'. Must be one of: {}",
                self.core.payload_level,
                valid_payload_levels.join(", ")
            )));
        }

        let valid_providers = ["ollama", "openai"];
        if !valid_providers.contains(&self.llm.default_provider.as_str()) {
            return Err(TravelError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.llm.default_provider,
                valid_providers.join(", ")
            )));
        }

        if self.llm.timeout_secs == 0 || self.tools.timeout_secs == 0 {
            return Err(TravelError::Config(
                "timeouts must be at least 1 second".to_string(),
            ));
        }

        if self.planner.max_candidates == 0 {
            return Err(TravelError::Config(
                "max_candidates must be at least 1".to_string(),
            ));
        }

        if self.planner.min_viable == 0 || self.planner.min_viable > self.planner.max_candidates
        {
            return Err(TravelError::Config(
                "min_viable must be between 1 and max_candidates".to_string(),
            ));
        }

        if self.session.results_shown == 0 {
            return Err(TravelError::Config(
                "results_shown must be at least 1".to_string(),
            ));
        }

        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if let Some(path) = &self.tools.airports_path {
            self.tools.airports_path = Some(expand_path(path)?);
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, TravelError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| TravelError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| TravelError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| TravelError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_creation() {
        let config = Config::default_config();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.llm.default_provider, "openai");
        assert_eq!(config.planner.max_candidates, 8);
        assert_eq!(config.planner.min_viable, 1);
        assert_eq!(config.planner.relaxation, RelaxationStrategy::WidenSeeds);
        assert_eq!(config.session.results_shown, 3);
        assert!(config.session.ask_weather_preference);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_validation_rejects_bad_provider() {
        let mut config = Config::default_config();
        config.llm.default_provider = "gemini".to_string();
        let err = config.validate_and_process().unwrap_err();
        assert!(err.to_string().contains("Invalid default provider"));
    }

    #[test]
    fn test_validation_rejects_min_viable_above_max() {
        let mut config = Config::default_config();
        config.planner.max_candidates = 2;
        config.planner.min_viable = 3;
        assert!(config.validate_and_process().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default_config();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(
            config.llm.default_provider,
            deserialized.llm.default_provider
        );
        assert_eq!(config.planner.relaxation, deserialized.planner.relaxation);
    }
}
