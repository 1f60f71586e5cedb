//! Language detection and normalization
//!
//! Every detected language is folded into the closed [`Language`] set. Codes
//! that are regionally adjacent to Hindi, and anything else outside the set,
//! become Hindi. When identification fails outright the result is English.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::outcome::Degradable;
use crate::{Error, Result};

/// Detected codes that are treated as Hindi speakers
const HINDI_ADJACENT: &[&str] = &["ur", "so", "id", "fa", "ps", "sd", "ne"];

/// A language the bot can translate into and speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    English,
    Hindi,
    Marathi,
    Gujarati,
}

impl Language {
    /// All supported languages
    pub const ALL: [Self; 4] = [Self::English, Self::Hindi, Self::Marathi, Self::Gujarati];

    /// The language the reply generator is prompted in
    pub const PIVOT: Self = Self::English;

    /// Fallback when identification fails
    pub const DETECTION_DEFAULT: Self = Self::English;

    /// Fallback for unsupported codes and for speech synthesis
    pub const REGIONAL_DEFAULT: Self = Self::Hindi;

    /// ISO 639-1 code
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Hindi => "hi",
            Self::Marathi => "mr",
            Self::Gujarati => "gu",
        }
    }

    /// English display name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Hindi => "Hindi",
            Self::Marathi => "Marathi",
            Self::Gujarati => "Gujarati",
        }
    }

    /// Look up a supported language by its ISO 639-1 code
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|l| l.code() == code)
    }

    /// Whether this is the pivot language
    #[must_use]
    pub fn is_pivot(self) -> bool {
        self == Self::PIVOT
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_code(s)
            .or_else(|| {
                Self::ALL
                    .into_iter()
                    .find(|l| l.name().eq_ignore_ascii_case(s.trim()))
            })
            .ok_or_else(|| Error::Config(format!("unsupported language: {s}")))
    }
}

/// Fold an arbitrary detected code into the supported set
#[must_use]
pub fn normalize(code: &str) -> Language {
    let code = code.trim().to_ascii_lowercase();
    if HINDI_ADJACENT.contains(&code.as_str()) {
        return Language::REGIONAL_DEFAULT;
    }
    Language::from_code(&code).unwrap_or(Language::REGIONAL_DEFAULT)
}

/// Raw language identification
///
/// Returns an ISO 639-1 code when one can be guessed. Implementations do no
/// normalization of their own.
pub trait LanguageIdentifier: Send + Sync {
    /// Guess the language of `text`
    fn identify(&self, text: &str) -> Option<String>;
}

/// Trigram-based identification via `whatlang`
///
/// Guesses that `whatlang` does not consider reliable are only kept when the
/// script alone pins down a supported language: Gujarati script is Gujarati and
/// Devanagari is Hindi. Anything else unreliable, including short Latin text
/// such as "hello", is reported as unidentifiable.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhatlangIdentifier;

impl LanguageIdentifier for WhatlangIdentifier {
    fn identify(&self, text: &str) -> Option<String> {
        let info = whatlang::detect(text)?;
        tracing::trace!(
            lang = info.lang().code(),
            script = info.script().name(),
            confidence = info.confidence(),
            reliable = info.is_reliable(),
            "whatlang detection"
        );

        if info.is_reliable() {
            return Some(iso639_1(info.lang()).to_string());
        }

        match info.script() {
            whatlang::Script::Gujarati => Some(Language::Gujarati.code().to_string()),
            whatlang::Script::Devanagari => Some(Language::REGIONAL_DEFAULT.code().to_string()),
            _ => None,
        }
    }
}

/// Map a `whatlang` language to its two-letter code
///
/// Languages without a mapping keep their three-letter code, which
/// [`normalize`] treats as unsupported.
fn iso639_1(lang: whatlang::Lang) -> &'static str {
    use whatlang::Lang;

    match lang {
        Lang::Eng => "en",
        Lang::Hin => "hi",
        Lang::Mar => "mr",
        Lang::Guj => "gu",
        Lang::Urd => "ur",
        Lang::Ind => "id",
        Lang::Pes => "fa",
        Lang::Nep => "ne",
        Lang::Ben => "bn",
        Lang::Pan => "pa",
        Lang::Tam => "ta",
        Lang::Tel => "te",
        Lang::Kan => "kn",
        Lang::Mal => "ml",
        Lang::Ori => "or",
        Lang::Ara => "ar",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Rus => "ru",
        Lang::Jpn => "ja",
        Lang::Cmn => "zh",
        other => other.code(),
    }
}

/// Detects the language of incoming text
pub struct LanguageDetector {
    identifier: Box<dyn LanguageIdentifier>,
}

impl LanguageDetector {
    /// Create a detector over a specific identifier
    #[must_use]
    pub fn new(identifier: Box<dyn LanguageIdentifier>) -> Self {
        Self { identifier }
    }

    /// Detect and normalize the language of `text`
    ///
    /// Never fails: unidentifiable text yields English with a degraded outcome.
    #[must_use]
    pub fn detect(&self, text: &str) -> Degradable<Language> {
        if text.trim().is_empty() {
            return Degradable::degraded(Language::DETECTION_DEFAULT, "empty text");
        }

        match self.identifier.identify(text) {
            Some(code) => {
                let lang = normalize(&code);
                tracing::debug!(detected = %code, normalized = %lang, "language detected");
                Degradable::succeeded(lang)
            }
            None => Degradable::degraded(Language::DETECTION_DEFAULT, "language not identifiable"),
        }
    }
}

impl Default for LanguageDetector {
    fn default() -> Self {
        Self::new(Box::new(WhatlangIdentifier))
    }
}

/// Detect with the default identifier
#[must_use]
pub fn detect_language(text: &str) -> Degradable<Language> {
    LanguageDetector::default().detect(text)
}
