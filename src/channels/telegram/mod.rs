//! Telegram channel adapter
//!
//! Uses long polling for receiving messages and the Bot API for sending

mod api;
pub mod polling;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::mpsc;

use super::{Channel, IncomingMessage, OutgoingMessage};
use crate::voice::AudioArtifact;
use crate::{Error, Result};

pub use polling::{parse_command, update_to_incoming};

/// Default long-poll window for getUpdates
const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Telegram channel adapter
#[derive(Clone)]
pub struct TelegramChannel {
    token: String,
    api_base: String,
    client: Client,
    message_tx: Option<mpsc::Sender<IncomingMessage>>,
    poll_timeout: Duration,
    connected: bool,
}

impl TelegramChannel {
    /// Create a new Telegram channel adapter
    #[must_use]
    pub fn new(token: String, client: Client) -> Self {
        Self {
            token,
            api_base: types::API_BASE.to_string(),
            client,
            message_tx: None,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            connected: false,
        }
    }

    /// Create with a message receiver for polling mode
    ///
    /// Returns the channel and a receiver for incoming messages
    #[must_use]
    pub fn with_receiver(token: String, client: Client) -> (Self, mpsc::Receiver<IncomingMessage>) {
        let (tx, rx) = mpsc::channel(100);
        let mut channel = Self::new(token, client);
        channel.message_tx = Some(tx);
        (channel, rx)
    }

    /// Point the adapter at a different Bot API server
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the getUpdates long-poll window
    #[must_use]
    pub const fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// URL for a Bot API method
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.token)
    }

    /// URL for downloading a file by its server path
    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base, self.token)
    }
}

/// Parse a chat identifier
fn parse_chat_id(chat_id: &str) -> Result<i64> {
    chat_id
        .parse()
        .map_err(|_| Error::Channel("Invalid chat ID".to_string()))
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn connect(&mut self) -> Result<()> {
        self.get_me().await?;
        self.connected = true;
        tracing::info!("Telegram channel connected");
        Ok(())
    }

    async fn send(&self, message: OutgoingMessage) -> Result<()> {
        let chat_id = parse_chat_id(&message.chat_id)?;
        self.send_message(chat_id, &message.content).await
    }

    async fn send_voice(&self, chat_id: &str, voice: &AudioArtifact) -> Result<()> {
        let chat_id = parse_chat_id(chat_id)?;
        self.upload_voice(chat_id, voice).await
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        self.fetch_file(file_id).await
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn send_typing(&self, chat_id: &str) -> Result<()> {
        let chat_id = parse_chat_id(chat_id)?;

        self.send_chat_action(chat_id, "typing").await?;
        tracing::debug!(chat_id, "Telegram typing indicator sent");
        Ok(())
    }
}
