//! Translation between the user's language and the pivot language
//!
//! Both directions are best-effort: a failed translation passes the text
//! through unchanged and marks the result as degraded.

use async_trait::async_trait;
use reqwest::Client;

use crate::language::Language;
use crate::outcome::Degradable;
use crate::{Error, Result};

/// Public Google Translate endpoint used by the web widget
const GOOGLE_TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

/// A machine translation backend
#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Translate `text` from `source` to `target` (ISO 639-1 codes)
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Google Translate via the `translate_a/single` endpoint
#[derive(Clone)]
pub struct GoogleTranslateEngine {
    client: Client,
    url: String,
}

impl GoogleTranslateEngine {
    /// Create an engine with its own HTTP client
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create an engine sharing an existing HTTP client
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            url: GOOGLE_TRANSLATE_URL.to_string(),
        }
    }

    /// Override the endpoint URL
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl Default for GoogleTranslateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TranslationEngine for GoogleTranslateEngine {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        tracing::debug!(source, target, chars = text.chars().count(), "translating");

        let response = self
            .client
            .post(&self.url)
            .query(&[("client", "gtx"), ("sl", source), ("tl", target), ("dt", "t")])
            .form(&[("q", text)])
            .send()
            .await
            .map_err(|e| Error::Translate(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Translate(format!("Google Translate error {status}: {body}")));
        }

        let body: serde_json::Value = response.json().await?;
        parse_google_response(&body)
    }
}

/// Join the translated segments of a `translate_a/single` response
///
/// The payload is a nested array whose first element lists
/// `[translated, original, ...]` segments.
fn parse_google_response(body: &serde_json::Value) -> Result<String> {
    let segments = body
        .get(0)
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| Error::Translate("response has no segments".to_string()))?;

    let translated: String = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(serde_json::Value::as_str))
        .collect();

    if translated.trim().is_empty() {
        return Err(Error::Translate("empty translation".to_string()));
    }

    Ok(translated)
}

/// Translates to and from the pivot language
#[derive(Clone)]
pub struct Translator {
    engine: std::sync::Arc<dyn TranslationEngine>,
}

impl Translator {
    /// Create a translator over an engine
    #[must_use]
    pub fn new(engine: std::sync::Arc<dyn TranslationEngine>) -> Self {
        Self { engine }
    }

    /// Translate user text into the pivot language
    pub async fn translate_to_pivot(&self, text: &str, source: Language) -> Degradable<String> {
        self.translate_between(text, source, Language::PIVOT).await
    }

    /// Translate pivot-language text into the user's language
    pub async fn translate_from_pivot(&self, text: &str, target: Language) -> Degradable<String> {
        self.translate_between(text, Language::PIVOT, target).await
    }

    async fn translate_between(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Degradable<String> {
        if source == target || text.trim().is_empty() {
            return Degradable::succeeded(text.to_string());
        }

        match self
            .engine
            .translate(text, source.code(), target.code())
            .await
        {
            Ok(translated) => Degradable::succeeded(translated),
            Err(e) => {
                tracing::warn!(error = %e, %source, %target, "translation failed, passing text through");
                Degradable::degraded(text.to_string(), e)
            }
        }
    }
}
