//! # Bot Error Types Module
//!
//! This module defines the error taxonomy used throughout the bot. Validation
//! errors are recovered inline (re-prompt or usage message); the remaining
//! kinds are surfaced to the admin as text and never crash a handler.

/// Error kinds produced by offer handling and announcement delivery
#[derive(Debug, Clone)]
pub enum BotError {
    /// Bad user input (name, quantity, price, offer id)
    Validation(String),
    /// Offer id with no matching row
    NotFound(i64),
    /// Non-admin attempting a privileged action
    Unauthorized,
    /// Announcement send/delete or file download failure
    Transport(String),
    /// Both attempts against a single upload host failed
    UploadHost(String),
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotError::Validation(msg) => write!(f, "{msg}"),
            BotError::NotFound(id) => write!(f, "Offer #{id} not found"),
            BotError::Unauthorized => write!(f, "Not authorized"),
            BotError::Transport(msg) => write!(f, "Transport error: {msg}"),
            BotError::UploadHost(msg) => write!(f, "Upload host error: {msg}"),
        }
    }
}

impl std::error::Error for BotError {}
