//! Raw Telegram Bot API calls

use reqwest::multipart::{Form, Part};

use super::types::*;
use crate::voice::AudioArtifact;
use crate::{Error, Result};

impl super::TelegramChannel {
    /// Send a plain-text message to a chat
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let request = SendMessageRequest { chat_id, text };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram API error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_lower = body.to_lowercase();

            if body_lower.contains("chat not found")
                || body_lower.contains("bot was blocked by the user")
            {
                return Err(Error::Channel(format!(
                    "Telegram chat {chat_id} not reachable: {body}"
                )));
            }

            return Err(Error::Channel(format!(
                "Telegram sendMessage error: {status} - {body}"
            )));
        }

        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    /// Upload an audio file as a voice message
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the API request fails
    pub async fn upload_voice(&self, chat_id: i64, voice: &AudioArtifact) -> Result<()> {
        let bytes = voice.read().await?;
        let part = Part::bytes(bytes)
            .file_name(voice.file_name())
            .mime_str(voice.mime_type())
            .map_err(|e| Error::Channel(format!("Telegram sendVoice error: {e}")))?;

        let form = Form::new()
            .text("chat_id", chat_id.to_string())
            .part("voice", part);

        let response = self
            .client
            .post(self.method_url("sendVoice"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendVoice error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram sendVoice error: {status} - {body}"
            )));
        }

        tracing::debug!(chat_id, "Telegram voice message sent");
        Ok(())
    }

    /// Download a file from Telegram by `file_id`.
    ///
    /// Calls `getFile` to get the file path, then downloads it from the file
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the API request or download fails
    pub async fn fetch_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.method_url("getFile"))
            .json(&GetFileRequest { file_id })
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getFile error: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getFile response read error: {e}")))?;

        let parsed: TelegramResponse<TelegramFile> = serde_json::from_str(&body)
            .map_err(|e| Error::Channel(format!("Telegram getFile parse error: {e}")))?;

        let file = parsed.result.ok_or_else(|| {
            Error::Channel(format!(
                "Telegram getFile error: {}",
                parsed.description.unwrap_or_default()
            ))
        })?;

        let file_path = file.file_path.ok_or_else(|| {
            Error::Channel("Telegram getFile returned no file_path".to_string())
        })?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram file download error: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Channel(format!(
                "Telegram file download error: {}",
                response.status()
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| Error::Channel(format!("Telegram file download read error: {e}")))?;

        tracing::debug!(file_path = %file_path, bytes = data.len(), "Telegram file downloaded");
        Ok(data.to_vec())
    }

    /// Send a chat action (typing indicator, etc.)
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_chat_action(&self, chat_id: i64, action: &str) -> Result<()> {
        let response = self
            .client
            .post(self.method_url("sendChatAction"))
            .json(&SendChatActionRequest { chat_id, action })
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendChatAction error: {e}")))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram sendChatAction error: {body}"
            )));
        }

        Ok(())
    }

    /// Validate the bot token by calling `getMe`
    ///
    /// # Errors
    ///
    /// Returns error if the token is invalid
    pub async fn get_me(&self) -> Result<()> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getMe error: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Channel("Invalid Telegram bot token".to_string()));
        }

        Ok(())
    }

    /// Remove any webhook so that getUpdates is allowed
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn delete_webhook(&self) -> Result<()> {
        self.client
            .post(self.method_url("deleteWebhook"))
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram deleteWebhook error: {e}")))?;
        Ok(())
    }

    /// Fetch pending updates, waiting up to the poll timeout
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the response is not an update list
    pub async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>> {
        let request = GetUpdatesRequest {
            timeout: self.poll_timeout.as_secs(),
            allowed_updates: &["message"],
            offset,
        };

        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(self.poll_timeout + std::time::Duration::from_secs(10))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getUpdates error: {e}")))?;

        let body = response
            .text()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getUpdates read error: {e}")))?;

        let parsed: TelegramResponse<Vec<Update>> = serde_json::from_str(&body)?;
        if !parsed.ok {
            return Err(Error::Channel(format!(
                "Telegram getUpdates error: {}",
                parsed.description.unwrap_or_default()
            )));
        }

        Ok(parsed.result.unwrap_or_default())
    }
}
