//! Lingo Relay - multilingual text and voice relay bot
//!
//! Receives Telegram text messages and voice notes, works out the sender's
//! language, asks a completion service for a reply in English, and answers
//! in the sender's language as both text and speech.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Telegram (polling)                   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ IncomingMessage
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Pipeline                          │
//! │  STT → Detect → Translate → Reply → Translate → TTS │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               External services                      │
//! │  Google Speech │ Google Translate │ OpenRouter │ TTS │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod config;
pub mod daemon;
pub mod error;
pub mod language;
pub mod outcome;
pub mod pipeline;
pub mod reply;
pub mod translate;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use language::{Language, LanguageDetector, detect_language, normalize};
pub use outcome::{Degradable, Outcome};
pub use pipeline::{Answer, EntryPoint, Pipeline, RunReport, Stage};
pub use reply::ReplyGenerator;
pub use translate::Translator;
