//! Telegram polling mode: getUpdates loop and message conversion

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::TelegramChannel;
use super::types::Update;
use crate::channels::{IncomingMessage, Payload};
use crate::{Error, Result};

/// Pause after a failed getUpdates call
const ERROR_PAUSE: Duration = Duration::from_secs(3);

impl TelegramChannel {
    /// Spawn a background task that long-polls Telegram's getUpdates API
    ///
    /// Forwards received messages into the mpsc channel. Deletes any existing
    /// webhook before starting to avoid conflicts. The task ends when the
    /// receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the channel was built without a receiver
    pub fn start_polling(&self) -> Result<tokio::task::JoinHandle<()>> {
        let tx = self.message_tx.clone().ok_or_else(|| {
            Error::Channel("start_polling requires a receiver (use with_receiver)".to_string())
        })?;
        let channel = self.clone();

        Ok(tokio::spawn(async move {
            polling_loop(channel, tx).await;
        }))
    }
}

/// Run the polling loop (background task)
async fn polling_loop(channel: TelegramChannel, tx: mpsc::Sender<IncomingMessage>) {
    if let Err(e) = channel.delete_webhook().await {
        tracing::warn!(error = %e, "failed to delete Telegram webhook before polling");
    }

    let mut offset: Option<i64> = None;

    loop {
        let updates = match channel.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "Telegram getUpdates error");
                tokio::time::sleep(ERROR_PAUSE).await;
                continue;
            }
        };

        for update in &updates {
            // Advance offset past this update
            offset = Some(update.update_id + 1);

            let Some(msg) = update_to_incoming(update) else {
                continue;
            };

            if tx.send(msg).await.is_err() {
                tracing::info!("message receiver closed, stopping Telegram polling");
                return;
            }
        }
    }
}

/// Split `/name@bot args` into the bare command name and its arguments
#[must_use]
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.strip_prefix('/')?;
    let (head, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let name = head.split('@').next().unwrap_or_default();
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), args.trim().to_string()))
}

/// Convert a polling update into an `IncomingMessage`
///
/// Returns `None` for non-message updates, messages from bots, and messages
/// with neither text nor a voice note.
#[must_use]
pub fn update_to_incoming(update: &Update) -> Option<IncomingMessage> {
    let msg = update.message.as_ref()?;

    // Skip bot messages
    if msg.from.as_ref().is_some_and(|u| u.is_bot) {
        return None;
    }

    let payload = if let Some(voice) = &msg.voice {
        Payload::Voice {
            file_id: voice.file_id.clone(),
            mime_type: voice
                .mime_type
                .clone()
                .unwrap_or_else(|| "audio/ogg".to_string()),
            duration: voice.duration,
        }
    } else if let Some(text) = &msg.text {
        match parse_command(text) {
            Some((name, args)) => Payload::Command { name, args },
            None => Payload::Text(text.clone()),
        }
    } else {
        return None;
    };

    let sender_id = msg
        .from
        .as_ref()
        .map_or_else(|| msg.chat.id.to_string(), |u| u.id.to_string());

    let sender_name = msg
        .from
        .as_ref()
        .map_or_else(|| "Unknown".to_string(), |u| u.first_name.clone());

    tracing::trace!(chat_type = %msg.chat.chat_type, "update converted");

    Some(IncomingMessage {
        id: msg.message_id.to_string(),
        chat_id: msg.chat.id.to_string(),
        sender_id,
        sender_name,
        payload,
        received_at: DateTime::<Utc>::from_timestamp(msg.date, 0).unwrap_or_else(Utc::now),
    })
}
