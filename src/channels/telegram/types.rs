//! Telegram Bot API request/response types

use serde::{Deserialize, Serialize};

/// Telegram Bot API base URL
pub(crate) const API_BASE: &str = "https://api.telegram.org";

/// Telegram sendMessage request
#[derive(Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
}

/// Telegram sendChatAction request
#[derive(Serialize)]
pub(crate) struct SendChatActionRequest<'a> {
    pub chat_id: i64,
    pub action: &'a str,
}

/// Telegram getFile request
#[derive(Serialize)]
pub(crate) struct GetFileRequest<'a> {
    pub file_id: &'a str,
}

/// Telegram getUpdates request
#[derive(Serialize)]
pub(crate) struct GetUpdatesRequest {
    pub timeout: u64,
    pub allowed_updates: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

/// File metadata from Telegram getFile response
#[derive(Debug, Deserialize)]
pub(crate) struct TelegramFile {
    pub file_path: Option<String>,
}

/// Telegram API response wrapper
#[derive(Debug, Deserialize)]
pub struct TelegramResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

/// A single update from getUpdates
#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

/// An incoming message
#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub date: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub voice: Option<Voice>,
}

/// Voice note attached to a message
#[derive(Debug, Deserialize)]
pub struct Voice {
    pub file_id: String,
    pub mime_type: Option<String>,
    pub duration: Option<u32>,
}

/// Chat a message was sent in
#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
}

/// Message sender
#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
    pub is_bot: bool,
    pub first_name: String,
}
