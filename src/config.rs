//! Configuration management
//!
//! Manages tutor configuration: API endpoint, model candidates, speech
//! settings, the default scenario and reply-parser field aliases.

use anyhow::{Result, Context, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agent::reply::FieldAliases;
use crate::agent::scenario::Scenario;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Gemini API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// Ordered model candidates
    #[serde(default)]
    pub models: ModelsConfig,
    /// Speech synthesis settings
    #[serde(default)]
    pub speech: SpeechConfig,
    /// Session defaults
    #[serde(default)]
    pub session: SessionConfig,
    /// Alternate reply field names
    #[serde(default)]
    pub parser: FieldAliases,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the generative-language API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout enforced by the HTTP client
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Model candidates, tried top to bottom on every request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
}

fn default_candidates() -> Vec<String> {
    vec![
        "gemini-2.5-flash".to_string(),
        "gemini-2.0-flash".to_string(),
        "gemini-1.5-flash".to_string(),
    ]
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Speak assistant replies
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Native TTS model used by the primary path
    #[serde(default = "default_tts_model")]
    pub model: String,
    /// Prebuilt voice name for the primary path
    #[serde(default = "default_voice")]
    pub voice: String,
    /// Language code for the fallback engine
    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,
    /// Top-level domain selecting the fallback accent (com = US)
    #[serde(default = "default_fallback_tld")]
    pub fallback_tld: String,
}

fn default_true() -> bool {
    true
}

fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_voice() -> String {
    "Kore".to_string()
}

fn default_fallback_language() -> String {
    "en".to_string()
}

fn default_fallback_tld() -> String {
    "com".to_string()
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_tts_model(),
            voice: default_voice(),
            fallback_language: default_fallback_language(),
            fallback_tld: default_fallback_tld(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Scenario used when none is given on the command line
    #[serde(default)]
    pub scenario: Scenario,
}

impl Config {
    /// Load configuration from the default path, writing defaults on first run
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Reject configurations the exchange cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.models.candidates.iter().all(|m| m.trim().is_empty()) {
            bail!("models.candidates must list at least one model");
        }
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url must not be empty");
        }
        Ok(())
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

pub(crate) fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "beconfident", "beconfident")
        .context("Failed to get project directories")
}

/// Parse a comma separated model list, dropping blanks
pub fn parse_model_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Configuration ({})", config_path()?.display());
    println!();
    println!("API base URL:     {}", config.api.base_url);
    println!("Request timeout:  {}s", config.api.timeout_secs);
    println!("Scenario:         {}", config.session.scenario);
    println!();
    println!("Model candidates (tried in order):");
    for (i, model) in config.models.candidates.iter().enumerate() {
        println!("  {}. {}", i + 1, model);
    }
    println!();
    println!("Speech:           {}", if config.speech.enabled { "enabled" } else { "disabled" });
    println!("  primary:        {} (voice {})", config.speech.model, config.speech.voice);
    println!("  fallback:       translate ({}, .{})", config.speech.fallback_language, config.speech.fallback_tld);
    println!();
    println!("API key:          {}", if crate::security::KeyringStore::default().has_key() { "stored" } else { "not stored" });

    Ok(())
}

/// Replace the model candidate list
pub fn set_models(list: &str) -> Result<()> {
    let models = parse_model_list(list);
    if models.is_empty() {
        bail!("Provide at least one model, e.g. --set-models gemini-2.5-flash,gemini-2.0-flash");
    }
    let mut config = Config::load()?;
    config.models.candidates = models;
    config.save()?;
    println!("Model candidates set to: {}", config.models.candidates.join(" -> "));
    Ok(())
}

/// Set the primary voice
pub fn set_voice(voice: &str) -> Result<()> {
    let Some(voice) = crate::voice::gemini_tts::resolve_voice(voice) else {
        bail!(
            "Unknown voice '{}'. Available: {}",
            voice.trim(),
            crate::voice::gemini_tts::PREBUILT_VOICES.join(", ")
        );
    };
    let mut config = Config::load()?;
    config.speech.voice = voice.to_string();
    config.save()?;
    println!("Voice set to {}", config.speech.voice);
    Ok(())
}

/// Set the default scenario
pub fn set_scenario(scenario: Scenario) -> Result<()> {
    let mut config = Config::load()?;
    config.session.scenario = scenario;
    config.save()?;
    println!("Default scenario set to {}", scenario);
    Ok(())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults.");
    Ok(())
}
