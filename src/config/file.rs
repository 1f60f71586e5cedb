//! TOML configuration file loading
//!
//! Supports `~/.config/lingo-relay/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct RelayConfigFile {
    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Runtime configuration
    #[serde(default)]
    pub runtime: RuntimeFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "anthropic/claude-3-haiku")
    pub model: Option<String>,

    /// Completion endpoint base URL
    pub base_url: Option<String>,

    /// System persona
    pub system_prompt: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT provider ("google" or "whisper")
    pub stt_provider: Option<String>,

    /// Recognition language (BCP-47)
    pub stt_language: Option<String>,

    /// Whisper model (e.g. "whisper-1")
    pub whisper_model: Option<String>,

    /// Path to the ffmpeg binary
    pub ffmpeg_path: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub telegram: Option<String>,
    pub openrouter: Option<String>,
    pub openai: Option<String>,
    pub google_speech: Option<String>,
}

/// Runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct RuntimeFileConfig {
    /// Base directory for per-request scratch files
    pub scratch_dir: Option<String>,

    /// getUpdates long-poll window in seconds
    pub poll_timeout_secs: Option<u64>,

    /// HTTP connect/request timeout in seconds
    pub http_timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `RelayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> RelayConfigFile {
    config_file_path().map_or_else(RelayConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from `path`
///
/// Returns `RelayConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file_from(path: &Path) -> RelayConfigFile {
    if !path.exists() {
        return RelayConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                RelayConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            RelayConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/lingo-relay/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("lingo-relay").join("config.toml"))
}
