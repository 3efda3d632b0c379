//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `message_handler`: Routes incoming messages to commands or pending flows
//! - `flow_manager`: Advances guided multi-step input and completes it
//! - `ui_builder`: Creates the menu keyboard and formats help text

pub mod flow_manager;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use message_handler::message_handler;

// Re-export routing types and helpers used elsewhere
pub use flow_manager::{handle_flow_input, resolve_announce_chat, ANNOUNCE_CHAT_SETTING};
pub use message_handler::{handle_inbound, Inbound, InboundContent};
pub use ui_builder::{build_help, command_for_label, menu_keyboard};
