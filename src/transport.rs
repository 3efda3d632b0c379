//! # Transport Boundary Module
//!
//! The narrow capability interface the core depends on: send a message,
//! delete a message, download a file, show a typing indicator. Handle
//! identity (chat id + message id) is stable and reusable for later deletion.
//! Telegram specifics stay behind the trait; tests substitute a recording
//! mock.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::io::Write;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, MessageId};
use tempfile::NamedTempFile;

use crate::errors::BotError;

/// Stable identity of a delivered message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// Chat-transport capabilities consumed by the core
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send text to a chat, returning the delivered message's identity
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef, BotError>;

    /// Send text with the command menu keyboard attached
    async fn send_menu(&self, chat_id: i64, text: &str) -> Result<MessageRef, BotError>;

    /// Delete a previously delivered message
    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), BotError>;

    /// Download a transport file to a local path owned by the caller
    async fn download(&self, file_id: &str) -> Result<String, BotError>;

    /// Best-effort typing indicator
    async fn typing(&self, chat_id: i64) -> Result<(), BotError>;
}

/// Telegram implementation over a teloxide `Bot`
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef, BotError> {
        let sent = self
            .bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?;
        Ok(MessageRef {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0 as i64,
        })
    }

    async fn send_menu(&self, chat_id: i64, text: &str) -> Result<MessageRef, BotError> {
        let sent = self
            .bot
            .send_message(ChatId(chat_id), text)
            .reply_markup(crate::bot::ui_builder::menu_keyboard())
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?;
        Ok(MessageRef {
            chat_id: sent.chat.id.0,
            message_id: sent.id.0 as i64,
        })
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), BotError> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id as i32))
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn download(&self, file_id: &str) -> Result<String, BotError> {
        let file = self
            .bot
            .get_file(FileId(file_id.to_string()))
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?;
        let url = format!(
            "https://api.telegram.org/file/bot{}/{}",
            self.bot.token(),
            file.path
        );

        let response = reqwest::get(&url)
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?;

        let mut temp_file =
            NamedTempFile::new().map_err(|e| BotError::Transport(e.to_string()))?;
        temp_file
            .as_file_mut()
            .write_all(&bytes)
            .map_err(|e| BotError::Transport(e.to_string()))?;
        let path = temp_file.path().to_string_lossy().to_string();
        debug!("Downloaded transport file to: {path}");

        // The caller owns cleanup of the downloaded file
        std::mem::forget(temp_file);

        Ok(path)
    }

    async fn typing(&self, chat_id: i64) -> Result<(), BotError> {
        self.bot
            .send_chat_action(ChatId(chat_id), ChatAction::Typing)
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?;
        Ok(())
    }
}
