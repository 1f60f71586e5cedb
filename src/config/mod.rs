//! Configuration management for the relay bot
//!
//! Values resolve env > TOML file > default.

pub mod file;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::reply::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};
use crate::{Error, Result};

use file::RelayConfigFile;

/// Relay bot configuration
#[derive(Clone)]
pub struct Config {
    /// Telegram bot token (`TELEGRAM_TOKEN`)
    pub telegram_token: Option<String>,

    /// OpenRouter API key (`OPENROUTER_API_KEY`)
    pub openrouter_api_key: Option<String>,

    /// Completion endpoint configuration
    pub llm: LlmConfig,

    /// Speech recognition configuration
    pub stt: SttConfig,

    /// Path to the ffmpeg binary
    pub ffmpeg_path: PathBuf,

    /// Base directory for per-request scratch files
    pub scratch_dir: PathBuf,

    /// getUpdates long-poll window
    pub poll_timeout: Duration,

    /// HTTP connect and request timeout
    pub http_timeout: Duration,
}

/// Completion endpoint configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Endpoint base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// System persona
    pub system_prompt: String,
}

/// Speech recognition backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProvider {
    /// Google Web Speech v2
    #[default]
    Google,
    /// `OpenAI` Whisper
    Whisper,
}

impl FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "whisper" | "openai" => Ok(Self::Whisper),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Speech recognition configuration
#[derive(Clone)]
pub struct SttConfig {
    /// Which backend to use
    pub provider: SttProvider,

    /// Recognition language (BCP-47)
    pub language: String,

    /// Google speech key; the public Chromium key is used when absent
    pub google_api_key: Option<String>,

    /// `OpenAI` key for Whisper
    pub openai_api_key: Option<String>,

    /// Whisper model
    pub whisper_model: String,
}

impl fmt::Debug for SttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SttConfig")
            .field("provider", &self.provider)
            .field("language", &self.language)
            .field("google_api_key", &redact(self.google_api_key.as_ref()))
            .field("openai_api_key", &redact(self.openai_api_key.as_ref()))
            .field("whisper_model", &self.whisper_model)
            .finish()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_token", &redact(self.telegram_token.as_ref()))
            .field("openrouter_api_key", &redact(self.openrouter_api_key.as_ref()))
            .field("llm", &self.llm)
            .field("stt", &self.stt)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("scratch_dir", &self.scratch_dir)
            .field("poll_timeout", &self.poll_timeout)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

fn redact(secret: Option<&String>) -> &'static str {
    if secret.is_some() { "<set>" } else { "<unset>" }
}

/// Default base for scratch directories
fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("lingo-relay")
}

/// Non-empty value helper
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but malformed
    pub fn load() -> Result<Self> {
        Self::from_sources(file::load_config_file(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but malformed
    pub fn from_sources(fc: RelayConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_token = non_empty(env("TELEGRAM_TOKEN").or(fc.api_keys.telegram));
        let openrouter_api_key = non_empty(env("OPENROUTER_API_KEY").or(fc.api_keys.openrouter));

        let llm = LlmConfig {
            base_url: env("RELAY_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: env("RELAY_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: env("RELAY_SYSTEM_PROMPT")
                .or(fc.llm.system_prompt)
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        };

        let provider = env("RELAY_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .map(|p| p.parse::<SttProvider>())
            .transpose()?
            .unwrap_or_default();

        let stt = SttConfig {
            provider,
            language: env("RELAY_STT_LANGUAGE")
                .or(fc.voice.stt_language)
                .unwrap_or_else(|| "en-US".to_string()),
            google_api_key: non_empty(env("GOOGLE_SPEECH_API_KEY").or(fc.api_keys.google_speech)),
            openai_api_key: non_empty(env("OPENAI_API_KEY").or(fc.api_keys.openai)),
            whisper_model: fc
                .voice
                .whisper_model
                .unwrap_or_else(|| "whisper-1".to_string()),
        };

        let ffmpeg_path = env("RELAY_FFMPEG_PATH")
            .or(fc.voice.ffmpeg_path)
            .map_or_else(|| PathBuf::from("ffmpeg"), PathBuf::from);

        let scratch_dir = env("RELAY_SCRATCH_DIR")
            .or(fc.runtime.scratch_dir)
            .map_or_else(default_scratch_dir, PathBuf::from);

        let poll_timeout = Duration::from_secs(parse_secs(
            "RELAY_POLL_TIMEOUT_SECS",
            env("RELAY_POLL_TIMEOUT_SECS"),
            fc.runtime.poll_timeout_secs,
            10,
        )?);

        let http_timeout = Duration::from_secs(parse_secs(
            "RELAY_HTTP_TIMEOUT_SECS",
            env("RELAY_HTTP_TIMEOUT_SECS"),
            fc.runtime.http_timeout_secs,
            30,
        )?);

        Ok(Self {
            telegram_token,
            openrouter_api_key,
            llm,
            stt,
            ffmpeg_path,
            scratch_dir,
            poll_timeout,
            http_timeout,
        })
    }

    /// Both credentials needed to run the bot
    ///
    /// # Errors
    ///
    /// Returns error naming the first missing credential
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let token = self
            .telegram_token
            .as_deref()
            .ok_or_else(|| Error::Config("TELEGRAM_TOKEN is not set".to_string()))?;
        let key = self.require_openrouter_key()?;
        Ok((token, key))
    }

    /// The completion API key
    ///
    /// # Errors
    ///
    /// Returns error if `OPENROUTER_API_KEY` is missing
    pub fn require_openrouter_key(&self) -> Result<&str> {
        self.openrouter_api_key
            .as_deref()
            .ok_or_else(|| Error::Config("OPENROUTER_API_KEY is not set".to_string()))
    }
}

fn parse_secs(key: &str, env: Option<String>, file: Option<u64>, default: u64) -> Result<u64> {
    match env {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} must be a number of seconds, got {raw:?}"))),
        None => Ok(file.unwrap_or(default)),
    }
}
