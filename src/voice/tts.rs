//! Text-to-speech (TTS) processing

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;

use super::artifact::{AudioArtifact, Scratch};
use crate::language::Language;
use crate::{Error, Result};

/// Google Translate speech endpoint
const GOOGLE_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Longest text the Google endpoint accepts per request
pub const MAX_CHUNK_CHARS: usize = 100;

/// A speech synthesis backend producing MP3 audio
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Synthesize `text` with the voice for `lang`
    async fn synthesize(&self, text: &str, lang: Language) -> Result<Vec<u8>>;
}

/// Google Translate TTS
#[derive(Clone)]
pub struct GoogleTtsEngine {
    client: Client,
    url: String,
}

impl GoogleTtsEngine {
    /// Create an engine sharing an HTTP client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: GOOGLE_TTS_URL.to_string(),
        }
    }

    /// Override the endpoint URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn fetch_chunk(&self, chunk: &str, lang: Language, idx: usize, total: usize) -> Result<Vec<u8>> {
        let total = total.to_string();
        let idx = idx.to_string();
        let textlen = chunk.chars().count().to_string();

        let response = self
            .client
            .get(&self.url)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", lang.code()),
                ("q", chunk),
                ("ttsspeed", "1"),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("Google TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechEngine for GoogleTtsEngine {
    async fn synthesize(&self, text: &str, lang: Language) -> Result<Vec<u8>> {
        let chunks = split_for_speech(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(Error::Tts("no text to speak".to_string()));
        }

        // MP3 frames are self-delimiting so the responses can be concatenated
        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, lang, idx, chunks.len()).await?);
        }

        tracing::debug!(%lang, chunks = chunks.len(), bytes = audio.len(), "speech synthesized");
        Ok(audio)
    }
}

/// Split text into chunks of at most `max` characters on word boundaries
///
/// Words longer than `max` are cut mid-word.
#[must_use]
pub fn split_for_speech(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            chunks.extend(chars.chunks(max).map(|c| c.iter().collect::<String>()));
            continue;
        }

        let needed = if current.is_empty() { word_len } else { word_len + 1 };
        if current_len + needed > max {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Voice to use for a requested language code
///
/// Unsupported codes get the Hindi voice.
#[must_use]
pub fn voice_language(code: &str) -> Language {
    Language::from_code(code).unwrap_or(Language::REGIONAL_DEFAULT)
}

/// Writes synthesized replies to request-scoped audio files
#[derive(Clone)]
pub struct SpeechSynthesizer {
    engine: Arc<dyn SpeechEngine>,
}

impl SpeechSynthesizer {
    /// Create a synthesizer over an engine
    #[must_use]
    pub fn new(engine: Arc<dyn SpeechEngine>) -> Self {
        Self { engine }
    }

    /// Synthesize `text` in the language with code `lang`
    ///
    /// The caller owns the returned artifact and should dispose of it after
    /// sending.
    ///
    /// # Errors
    ///
    /// Returns error if the engine fails or the file cannot be written
    pub async fn synthesize(&self, text: &str, lang: &str, scratch: &Scratch) -> Result<AudioArtifact> {
        let voice = voice_language(lang);
        if voice.code() != lang {
            tracing::warn!(requested = lang, using = %voice, "unsupported voice language, falling back");
        }

        let audio = self.engine.synthesize(text, voice).await?;
        scratch.write("reply.mp3", "audio/mpeg", &audio).await
    }
}
