//! Messaging channel adapters
//!
//! A channel delivers inbound messages to the bot and carries its text and
//! voice replies back to the user.

pub mod telegram;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use telegram::TelegramChannel;

use crate::Result;
use crate::voice::AudioArtifact;

/// What an incoming message carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Plain text
    Text(String),

    /// A voice note stored on the platform
    Voice {
        /// Platform file identifier for download
        file_id: String,
        /// MIME type reported by the platform
        mime_type: String,
        /// Length in seconds, if known
        duration: Option<u32>,
    },

    /// A bot command such as `/start`
    Command {
        /// Command name without the slash or bot suffix
        name: String,
        /// Everything after the command
        args: String,
    },
}

/// A message from a channel
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Message identifier (platform-specific)
    pub id: String,

    /// Chat the reply goes to
    pub chat_id: String,

    /// Sender identifier
    pub sender_id: String,

    /// Sender display name
    pub sender_name: String,

    /// Message content
    pub payload: Payload,

    /// When the platform received the message
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    /// Build a text message, stamped now
    #[must_use]
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(chat_id, Payload::Text(text.into()))
    }

    /// Build a voice message, stamped now
    #[must_use]
    pub fn voice(chat_id: impl Into<String>, file_id: impl Into<String>) -> Self {
        Self::new(
            chat_id,
            Payload::Voice {
                file_id: file_id.into(),
                mime_type: "audio/ogg".to_string(),
                duration: None,
            },
        )
    }

    fn new(chat_id: impl Into<String>, payload: Payload) -> Self {
        let chat_id = chat_id.into();
        Self {
            id: String::new(),
            sender_id: chat_id.clone(),
            sender_name: "Unknown".to_string(),
            chat_id,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// A text message to send to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Chat identifier
    pub chat_id: String,

    /// Message content (plain text)
    pub content: String,
}

impl OutgoingMessage {
    /// Create a simple `text` message
    #[must_use]
    pub fn text(chat_id: String, content: String) -> Self {
        Self {
            chat_id,
            content,
        }
    }
}

/// Trait for messaging channel adapters
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name
    fn name(&self) -> &'static str;

    /// Connect to the channel
    async fn connect(&mut self) -> Result<()>;

    /// Send a text message
    async fn send(&self, message: OutgoingMessage) -> Result<()>;

    /// Upload and send a voice message
    async fn send_voice(&self, chat_id: &str, voice: &AudioArtifact) -> Result<()>;

    /// Download a file attached to an incoming message
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send typing indicator to show the bot is processing
    ///
    /// Default implementation is a no-op for channels that don't support typing
    async fn send_typing(&self, _chat_id: &str) -> Result<()> {
        Ok(())
    }
}
