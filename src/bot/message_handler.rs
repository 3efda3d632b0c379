//! Message Handler module for routing incoming Telegram messages
//!
//! An inbound message either advances the sender's pending flow or is
//! dispatched as a direct command. Commands and recognized menu labels are
//! rejected mid-flow (except cancel/help/menu) so flows cannot cross-talk.

use anyhow::Result;
use log::{debug, error};
use rusqlite::Connection;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::Mutex;

use crate::compose::format_stock_list;
use crate::config::BotConfig;
use crate::db;
use crate::flow::{FlowSessions, FlowState, OfferAction};
use crate::lifecycle::OfferLifecycle;
use crate::normalize::{parse_add_payload, parse_offer_id, parse_quantity, normalize_price};
use crate::transport::{TelegramTransport, Transport};

use super::flow_manager::{self, resolve_announce_chat, ANNOUNCE_CHAT_SETTING};
use super::ui_builder::{build_help, command_for_label};

pub const MSG_NOT_AUTHORIZED: &str = "Not authorized. Ask the owner to add you as an admin.";
pub const MSG_FINISH_OR_CANCEL: &str =
    "Finish or cancel the current step first (/cancel to abort).";
pub const MSG_GREETING: &str = "Hey! Use /stock to see what's available right now.";
pub const MSG_ALL_SOLD_OUT: &str = "All sold out right now.";
pub const MSG_MENU: &str = "Pick an action:";

/// What an inbound message carries, independent of the transport
#[derive(Debug, Clone)]
pub enum InboundContent {
    Text(String),
    Document { file_id: String },
    Other,
}

/// A transport-agnostic inbound message
#[derive(Debug, Clone)]
pub struct Inbound {
    pub chat_id: i64,
    pub user_id: Option<u64>,
    pub content: InboundContent,
}

/// Flatten a Telegram message into the routing shape
pub fn inbound_from_message(msg: &Message) -> Inbound {
    let user_id = msg.from.as_ref().map(|user| user.id.0);
    let content = if let Some(text) = msg.text() {
        InboundContent::Text(text.to_string())
    } else if let Some(doc) = msg.document() {
        InboundContent::Document {
            file_id: doc.file.id.0.clone(),
        }
    } else {
        InboundContent::Other
    };

    Inbound {
        chat_id: msg.chat.id.0,
        user_id,
        content,
    }
}

/// Dispatcher endpoint: wrap the bot in the transport and route
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    conn: Arc<Mutex<Connection>>,
    sessions: FlowSessions,
    config: Arc<BotConfig>,
) -> Result<()> {
    let transport = TelegramTransport::new(bot);
    let inbound = inbound_from_message(&msg);
    handle_inbound(&transport, &inbound, &conn, &sessions, &config).await
}

/// Route one inbound message
pub async fn handle_inbound<T: Transport>(
    transport: &T,
    inbound: &Inbound,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
) -> Result<()> {
    match &inbound.content {
        InboundContent::Text(text) => {
            handle_text(transport, inbound, text, conn, sessions, config).await
        }
        InboundContent::Document { file_id } => {
            handle_document(transport, inbound, file_id, conn, sessions, config).await
        }
        InboundContent::Other => {
            debug!("Ignoring unsupported message type in chat {}", inbound.chat_id);
            Ok(())
        }
    }
}

async fn handle_text<T: Transport>(
    transport: &T,
    inbound: &Inbound,
    text: &str,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
) -> Result<()> {
    let trimmed = text.trim();
    // Menu button presses arrive as their label text
    let canonical = command_for_label(trimmed).unwrap_or(trimmed);
    let chat_id = inbound.chat_id;

    if let Some(user_id) = inbound.user_id {
        let state = sessions.get(user_id).await;
        if state.is_pending() {
            // Authorization is re-checked at every step, not just at flow start
            if !config.is_admin(inbound.user_id) {
                sessions.clear(user_id).await;
                transport.send_text(chat_id, MSG_NOT_AUTHORIZED).await?;
                return Ok(());
            }
            let (command, _) = split_command(canonical);
            return match command.as_str() {
                "/cancel" => {
                    sessions.clear(user_id).await;
                    transport.send_text(chat_id, "Cancelled.").await?;
                    Ok(())
                }
                "/help" => {
                    transport.send_text(chat_id, &build_help(true)).await?;
                    Ok(())
                }
                "/menu" => {
                    transport.send_menu(chat_id, MSG_MENU).await?;
                    Ok(())
                }
                _ if canonical.starts_with('/') => {
                    transport.send_text(chat_id, MSG_FINISH_OR_CANCEL).await?;
                    Ok(())
                }
                _ => {
                    flow_manager::handle_flow_input(
                        transport, conn, sessions, config, chat_id, user_id, state, trimmed,
                    )
                    .await
                }
            };
        }
    }

    if canonical.starts_with('/') {
        return handle_command(transport, inbound, canonical, conn, sessions, config).await;
    }

    // Free-text stock triggers
    if matches!(trimmed.to_lowercase().as_str(), "stock" | "offers" | "list") {
        return send_stock(transport, conn, chat_id).await;
    }

    debug!("Ignoring free text in chat {chat_id}");
    Ok(())
}

async fn handle_document<T: Transport>(
    transport: &T,
    inbound: &Inbound,
    file_id: &str,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
) -> Result<()> {
    if let Some(user_id) = inbound.user_id {
        if let FlowState::AwaitUploadFile { display_count } = sessions.get(user_id).await {
            if !config.is_admin(inbound.user_id) {
                sessions.clear(user_id).await;
                transport
                    .send_text(inbound.chat_id, MSG_NOT_AUTHORIZED)
                    .await?;
                return Ok(());
            }
            return flow_manager::handle_upload_document(
                transport,
                conn,
                sessions,
                config,
                inbound.chat_id,
                user_id,
                display_count,
                file_id,
            )
            .await;
        }
    }

    debug!(
        "Ignoring document with no pending upload flow in chat {}",
        inbound.chat_id
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_command<T: Transport>(
    transport: &T,
    inbound: &Inbound,
    canonical: &str,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
) -> Result<()> {
    let (command, payload) = split_command(canonical);
    let chat_id = inbound.chat_id;
    let user_id = inbound.user_id;

    match command.as_str() {
        "/start" => {
            transport.send_text(chat_id, MSG_GREETING).await?;
        }
        "/help" => {
            transport
                .send_text(chat_id, &build_help(config.is_admin(user_id)))
                .await?;
        }
        "/stock" | "/list" => {
            send_stock(transport, conn, chat_id).await?;
        }
        "/cancel" => {
            transport.send_text(chat_id, "Nothing to cancel.").await?;
        }
        "/menu" => {
            if require_admin(transport, config, chat_id, user_id).await?.is_some() {
                transport.send_menu(chat_id, MSG_MENU).await?;
            }
        }
        "/add" => {
            if let Some(user_id) = require_admin(transport, config, chat_id, user_id).await? {
                if payload.is_empty() {
                    flow_manager::start_add_flow(transport, sessions, chat_id, user_id).await?;
                } else {
                    cmd_add_single(transport, conn, config, chat_id, &payload).await?;
                }
            }
        }
        "/setqty" => {
            if let Some(user_id) = require_admin(transport, config, chat_id, user_id).await? {
                cmd_set_quantity(
                    transport, conn, sessions, config, chat_id, user_id, &payload,
                )
                .await?;
            }
        }
        "/setprice" => {
            if let Some(user_id) = require_admin(transport, config, chat_id, user_id).await? {
                cmd_set_price(
                    transport, conn, sessions, config, chat_id, user_id, &payload,
                )
                .await?;
            }
        }
        "/soldout" | "/remove" => {
            if let Some(user_id) = require_admin(transport, config, chat_id, user_id).await? {
                cmd_sold_out(
                    transport, conn, sessions, config, chat_id, user_id, &payload,
                )
                .await?;
            }
        }
        "/announce" => {
            if let Some(user_id) = require_admin(transport, config, chat_id, user_id).await? {
                cmd_announce(
                    transport, conn, sessions, config, chat_id, user_id, &payload,
                )
                .await?;
            }
        }
        "/setannounce" => {
            if require_admin(transport, config, chat_id, user_id).await?.is_some() {
                cmd_set_announce(transport, conn, chat_id, &payload).await?;
            }
        }
        "/upload" => {
            if let Some(user_id) = require_admin(transport, config, chat_id, user_id).await? {
                let display_count = (!payload.is_empty()).then(|| payload.clone());
                flow_manager::start_upload_flow(
                    transport, sessions, chat_id, user_id, display_count,
                )
                .await?;
            }
        }
        _ => {
            transport
                .send_text(chat_id, "Unknown command. /help lists what I understand.")
                .await?;
        }
    }

    Ok(())
}

/// Gate an admin command; returns the verified user id or replies with the
/// denial
async fn require_admin<T: Transport>(
    transport: &T,
    config: &BotConfig,
    chat_id: i64,
    user_id: Option<u64>,
) -> Result<Option<u64>> {
    match user_id {
        Some(id) if config.is_admin(Some(id)) => Ok(Some(id)),
        _ => {
            transport.send_text(chat_id, MSG_NOT_AUTHORIZED).await?;
            Ok(None)
        }
    }
}

async fn send_stock<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    chat_id: i64,
) -> Result<()> {
    let offers = {
        let conn = conn.lock().await;
        db::list_offers(&conn, true)?
    };
    if offers.is_empty() {
        transport.send_text(chat_id, MSG_ALL_SOLD_OUT).await?;
    } else {
        transport
            .send_text(chat_id, &format_stock_list(&offers))
            .await?;
    }
    Ok(())
}

/// Single-shot `/add Name | qty | price`
async fn cmd_add_single<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    config: &BotConfig,
    chat_id: i64,
    payload: &str,
) -> Result<()> {
    let (name, quantity, price) = match parse_add_payload(payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            transport.send_text(chat_id, &e.to_string()).await?;
            return Ok(());
        }
    };

    let announce_chat = resolve_announce_chat(conn, config, chat_id).await;
    let lifecycle = OfferLifecycle::new(
        Arc::clone(conn),
        transport,
        announce_chat,
        config.contact_text.clone(),
    );
    let reply = match lifecycle.create(&name, quantity, &price).await {
        Ok(created) => flow_manager::describe_create(&created, chat_id),
        Err(e) => {
            error!("Offer creation failed: {e}");
            "Something went wrong saving the offer.".to_string()
        }
    };
    transport.send_text(chat_id, &reply).await?;
    Ok(())
}

/// `/setqty` in all its shapes: no args starts the flow, one arg pre-fills
/// the target id, two args run immediately
#[allow(clippy::too_many_arguments)]
async fn cmd_set_quantity<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
    chat_id: i64,
    user_id: u64,
    payload: &str,
) -> Result<()> {
    let parts: Vec<&str> = payload.split_whitespace().collect();
    match parts.as_slice() {
        [] => {
            flow_manager::start_id_flow(
                transport, sessions, chat_id, user_id, OfferAction::SetQuantity,
            )
            .await
        }
        [id] => {
            prefill_value_step(
                transport, conn, sessions, chat_id, user_id, OfferAction::SetQuantity, id,
            )
            .await
        }
        [id, value] => {
            let (offer_id, quantity) = match parse_offer_id(id).and_then(|offer_id| {
                parse_quantity(value).map(|quantity| (offer_id, quantity))
            }) {
                Ok(parsed) => parsed,
                Err(e) => {
                    transport.send_text(chat_id, &e.to_string()).await?;
                    return Ok(());
                }
            };
            let announce_chat = resolve_announce_chat(conn, config, chat_id).await;
            let lifecycle = OfferLifecycle::new(
                Arc::clone(conn),
                transport,
                announce_chat,
                config.contact_text.clone(),
            );
            let reply = match lifecycle.set_quantity(offer_id, quantity).await {
                Ok(outcome) => flow_manager::describe_quantity(&outcome),
                Err(e) => {
                    error!("Quantity update failed for offer {offer_id}: {e}");
                    "Something went wrong updating the offer.".to_string()
                }
            };
            transport.send_text(chat_id, &reply).await?;
            Ok(())
        }
        _ => {
            transport
                .send_text(chat_id, "Usage: /setqty <id> <qty>")
                .await?;
            Ok(())
        }
    }
}

/// `/setprice`, same shapes as `/setqty`
#[allow(clippy::too_many_arguments)]
async fn cmd_set_price<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
    chat_id: i64,
    user_id: u64,
    payload: &str,
) -> Result<()> {
    let parts: Vec<&str> = payload.split_whitespace().collect();
    match parts.as_slice() {
        [] => {
            flow_manager::start_id_flow(
                transport, sessions, chat_id, user_id, OfferAction::SetPrice,
            )
            .await
        }
        [id] => {
            prefill_value_step(
                transport, conn, sessions, chat_id, user_id, OfferAction::SetPrice, id,
            )
            .await
        }
        [id, value] => {
            let (offer_id, price) = match parse_offer_id(id)
                .and_then(|offer_id| normalize_price(value).map(|price| (offer_id, price)))
            {
                Ok(parsed) => parsed,
                Err(e) => {
                    transport.send_text(chat_id, &e.to_string()).await?;
                    return Ok(());
                }
            };
            let announce_chat = resolve_announce_chat(conn, config, chat_id).await;
            let lifecycle = OfferLifecycle::new(
                Arc::clone(conn),
                transport,
                announce_chat,
                config.contact_text.clone(),
            );
            let reply = match lifecycle.set_price(offer_id, &price).await {
                Ok(outcome) => flow_manager::describe_price(&outcome),
                Err(e) => {
                    error!("Price update failed for offer {offer_id}: {e}");
                    "Something went wrong updating the offer.".to_string()
                }
            };
            transport.send_text(chat_id, &reply).await?;
            Ok(())
        }
        _ => {
            transport
                .send_text(chat_id, "Usage: /setprice <id> <price>")
                .await?;
            Ok(())
        }
    }
}

/// Jump straight to the value step when the command already named the id
async fn prefill_value_step<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    chat_id: i64,
    user_id: u64,
    action: OfferAction,
    id_text: &str,
) -> Result<()> {
    let offer_id = match parse_offer_id(id_text) {
        Ok(offer_id) => offer_id,
        Err(e) => {
            transport.send_text(chat_id, &e.to_string()).await?;
            return Ok(());
        }
    };
    let exists = {
        let conn = conn.lock().await;
        db::get_offer(&conn, offer_id)?.is_some()
    };
    if !exists {
        transport.send_text(chat_id, "Offer not found.").await?;
        return Ok(());
    }
    sessions
        .set(user_id, FlowState::AwaitValue { action, offer_id })
        .await;
    transport.send_text(chat_id, action.value_prompt()).await?;
    Ok(())
}

/// `/soldout <id>` or the guided variant
#[allow(clippy::too_many_arguments)]
async fn cmd_sold_out<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
    chat_id: i64,
    user_id: u64,
    payload: &str,
) -> Result<()> {
    if payload.is_empty() {
        return flow_manager::start_id_flow(
            transport, sessions, chat_id, user_id, OfferAction::SoldOut,
        )
        .await;
    }

    let offer_id = match parse_offer_id(payload) {
        Ok(offer_id) => offer_id,
        Err(e) => {
            transport.send_text(chat_id, &e.to_string()).await?;
            return Ok(());
        }
    };
    let announce_chat = resolve_announce_chat(conn, config, chat_id).await;
    let lifecycle = OfferLifecycle::new(
        Arc::clone(conn),
        transport,
        announce_chat,
        config.contact_text.clone(),
    );
    let reply = match lifecycle.retire(offer_id).await {
        Ok(Some(outcome)) => flow_manager::describe_retire(&outcome),
        Ok(None) => "Offer not found.".to_string(),
        Err(e) => {
            error!("Sold-out failed for offer {offer_id}: {e}");
            "Something went wrong updating the offer.".to_string()
        }
    };
    transport.send_text(chat_id, &reply).await?;
    Ok(())
}

/// `/announce <id>` or the guided variant
#[allow(clippy::too_many_arguments)]
async fn cmd_announce<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
    chat_id: i64,
    user_id: u64,
    payload: &str,
) -> Result<()> {
    if payload.is_empty() {
        return flow_manager::start_id_flow(
            transport, sessions, chat_id, user_id, OfferAction::Reannounce,
        )
        .await;
    }

    let offer_id = match parse_offer_id(payload) {
        Ok(offer_id) => offer_id,
        Err(e) => {
            transport.send_text(chat_id, &e.to_string()).await?;
            return Ok(());
        }
    };
    let announce_chat = resolve_announce_chat(conn, config, chat_id).await;
    let lifecycle = OfferLifecycle::new(
        Arc::clone(conn),
        transport,
        announce_chat,
        config.contact_text.clone(),
    );
    let reply = match lifecycle.reannounce(offer_id).await {
        Ok(outcome) => flow_manager::describe_reannounce(&outcome),
        Err(e) => {
            error!("Re-announce failed for offer {offer_id}: {e}");
            "Something went wrong announcing the offer.".to_string()
        }
    };
    transport.send_text(chat_id, &reply).await?;
    Ok(())
}

/// `/setannounce [chat id]`: persist the announcement destination
async fn cmd_set_announce<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    chat_id: i64,
    payload: &str,
) -> Result<()> {
    let (target, reply) = if payload.is_empty() {
        (chat_id, "Announcements will go to this chat.".to_string())
    } else {
        match payload.trim().parse::<i64>() {
            Ok(target) => (target, format!("Announcements will go to chat {target}.")),
            Err(_) => {
                transport
                    .send_text(chat_id, "Chat id must be a number.")
                    .await?;
                return Ok(());
            }
        }
    };

    {
        let conn = conn.lock().await;
        db::set_setting(&conn, ANNOUNCE_CHAT_SETTING, &target.to_string())?;
    }
    transport.send_text(chat_id, &reply).await?;
    Ok(())
}

/// Split a command message into its command word (bot-mention stripped,
/// lowercased) and the remaining payload
fn split_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let raw = parts.next().unwrap_or("");
    let payload = parts.next().unwrap_or("").trim().to_string();
    let command = raw.split('@').next().unwrap_or("").to_lowercase();
    (command, payload)
}
