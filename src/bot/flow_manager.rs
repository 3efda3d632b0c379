//! Flow Manager module for advancing guided multi-step input
//!
//! Each handler validates the current step with the normalizers, re-prompts
//! on bad input without losing collected fields, and hands the completed flow
//! to the lifecycle controller. Sessions are cleared on completion regardless
//! of the controller outcome; controller failures are reported, not retried.

use anyhow::Result;
use chrono::Local;
use log::{error, warn};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::compose::{build_upload_report, resolve_header};
use crate::config::BotConfig;
use crate::db;
use crate::flow::{FlowSessions, FlowState, OfferAction};
use crate::lifecycle::{
    AnnounceStatus, CreatedOffer, OfferLifecycle, PriceOutcome, QuantityOutcome, ReannounceOutcome,
    RetireOutcome,
};
use crate::normalize::{normalize_price, parse_offer_id, parse_quantity, validate_offer_name};
use crate::transport::Transport;
use crate::upload::{scan_file, Uploader};

/// Settings key holding the announcement chat override
pub const ANNOUNCE_CHAT_SETTING: &str = "announce_chat_id";

pub const PROMPT_NAME: &str = "What's the item called?";
pub const PROMPT_QUANTITY: &str = "How many are available?";
pub const PROMPT_PRICE: &str = "What's the price?";
pub const PROMPT_OFFER_ID: &str = "Which offer id? Use /stock to look it up.";
pub const PROMPT_UPLOAD: &str = "Send the file as a document.";
pub const MSG_NOT_FOUND_RETRY: &str = "Offer not found. Try another id or /cancel.";

/// Where announcements go: settings override, then the configured default,
/// then the chat the admin is talking from
pub async fn resolve_announce_chat(
    conn: &Arc<Mutex<Connection>>,
    config: &BotConfig,
    current_chat: i64,
) -> i64 {
    let stored = {
        let conn = conn.lock().await;
        db::get_setting(&conn, ANNOUNCE_CHAT_SETTING).unwrap_or_else(|e| {
            error!("Failed to read announce chat setting: {e}");
            None
        })
    };
    if let Some(value) = stored {
        if let Ok(chat_id) = value.trim().parse() {
            return chat_id;
        }
        warn!("Ignoring malformed announce chat setting: {value}");
    }
    config.announce_chat_id.unwrap_or(current_chat)
}

/// Start the guided add-offer flow
pub async fn start_add_flow<T: Transport>(
    transport: &T,
    sessions: &FlowSessions,
    chat_id: i64,
    user_id: u64,
) -> Result<()> {
    sessions.set(user_id, FlowState::AwaitName).await;
    transport.send_text(chat_id, PROMPT_NAME).await?;
    Ok(())
}

/// Start a flow that first collects an offer id
pub async fn start_id_flow<T: Transport>(
    transport: &T,
    sessions: &FlowSessions,
    chat_id: i64,
    user_id: u64,
    action: OfferAction,
) -> Result<()> {
    sessions
        .set(user_id, FlowState::AwaitOfferId { action })
        .await;
    transport.send_text(chat_id, PROMPT_OFFER_ID).await?;
    Ok(())
}

/// Start the upload flow, carrying an optional display count for the header
pub async fn start_upload_flow<T: Transport>(
    transport: &T,
    sessions: &FlowSessions,
    chat_id: i64,
    user_id: u64,
    display_count: Option<String>,
) -> Result<()> {
    sessions
        .set(user_id, FlowState::AwaitUploadFile { display_count })
        .await;
    transport.send_text(chat_id, PROMPT_UPLOAD).await?;
    Ok(())
}

/// Advance a pending flow with one text input
#[allow(clippy::too_many_arguments)]
pub async fn handle_flow_input<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
    chat_id: i64,
    user_id: u64,
    state: FlowState,
    text: &str,
) -> Result<()> {
    match state {
        FlowState::AwaitName => match validate_offer_name(text) {
            Ok(name) => {
                sessions.set(user_id, FlowState::AwaitQuantity { name }).await;
                transport.send_text(chat_id, PROMPT_QUANTITY).await?;
            }
            Err(e) => {
                transport
                    .send_text(chat_id, &format!("{e} Try again or /cancel."))
                    .await?;
            }
        },
        FlowState::AwaitQuantity { name } => match parse_positive_quantity(text) {
            Ok(quantity) => {
                sessions
                    .set(user_id, FlowState::AwaitPrice { name, quantity })
                    .await;
                transport.send_text(chat_id, PROMPT_PRICE).await?;
            }
            Err(e) => {
                // Same step, name already collected stays put
                sessions.set(user_id, FlowState::AwaitQuantity { name }).await;
                transport
                    .send_text(chat_id, &format!("{e} Try again or /cancel."))
                    .await?;
            }
        },
        FlowState::AwaitPrice { name, quantity } => match normalize_price(text) {
            Ok(price) => {
                let announce_chat = resolve_announce_chat(conn, config, chat_id).await;
                let lifecycle = OfferLifecycle::new(
                    Arc::clone(conn),
                    transport,
                    announce_chat,
                    config.contact_text.clone(),
                );
                let reply = match lifecycle.create(&name, quantity, &price).await {
                    Ok(created) => describe_create(&created, chat_id),
                    Err(e) => {
                        error!("Offer creation failed: {e}");
                        "Something went wrong saving the offer.".to_string()
                    }
                };
                sessions.clear(user_id).await;
                transport.send_text(chat_id, &reply).await?;
            }
            Err(e) => {
                sessions
                    .set(user_id, FlowState::AwaitPrice { name, quantity })
                    .await;
                transport
                    .send_text(chat_id, &format!("{e} Try again or /cancel."))
                    .await?;
            }
        },
        FlowState::AwaitOfferId { action } => match parse_offer_id(text) {
            Ok(offer_id) => {
                let exists = {
                    let conn = conn.lock().await;
                    db::get_offer(&conn, offer_id)?.is_some()
                };
                if !exists {
                    transport.send_text(chat_id, MSG_NOT_FOUND_RETRY).await?;
                    return Ok(());
                }
                if action.needs_value() {
                    sessions
                        .set(user_id, FlowState::AwaitValue { action, offer_id })
                        .await;
                    transport.send_text(chat_id, action.value_prompt()).await?;
                } else {
                    complete_id_action(transport, conn, sessions, config, chat_id, user_id, action, offer_id)
                        .await?;
                }
            }
            Err(e) => {
                transport
                    .send_text(chat_id, &format!("{e} Try again or /cancel."))
                    .await?;
            }
        },
        FlowState::AwaitValue { action, offer_id } => {
            complete_value_action(
                transport, conn, sessions, config, chat_id, user_id, action, offer_id, text,
            )
            .await?;
        }
        FlowState::AwaitUploadFile { display_count } => {
            // Text while a file is expected: keep waiting
            sessions
                .set(user_id, FlowState::AwaitUploadFile { display_count })
                .await;
            transport
                .send_text(chat_id, "Send the file as a document, or /cancel.")
                .await?;
        }
        FlowState::Idle => {}
    }

    Ok(())
}

/// Finish a single-step id flow (sold-out, re-announce)
#[allow(clippy::too_many_arguments)]
async fn complete_id_action<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
    chat_id: i64,
    user_id: u64,
    action: OfferAction,
    offer_id: i64,
) -> Result<()> {
    let announce_chat = resolve_announce_chat(conn, config, chat_id).await;
    let lifecycle = OfferLifecycle::new(
        Arc::clone(conn),
        transport,
        announce_chat,
        config.contact_text.clone(),
    );

    let reply = match action {
        OfferAction::SoldOut => match lifecycle.retire(offer_id).await {
            Ok(Some(outcome)) => describe_retire(&outcome),
            Ok(None) => "Offer not found.".to_string(),
            Err(e) => {
                error!("Sold-out failed for offer {offer_id}: {e}");
                "Something went wrong updating the offer.".to_string()
            }
        },
        OfferAction::Reannounce => match lifecycle.reannounce(offer_id).await {
            Ok(outcome) => describe_reannounce(&outcome),
            Err(e) => {
                error!("Re-announce failed for offer {offer_id}: {e}");
                "Something went wrong announcing the offer.".to_string()
            }
        },
        OfferAction::SetQuantity | OfferAction::SetPrice => unreachable!("value actions"),
    };

    sessions.clear(user_id).await;
    transport.send_text(chat_id, &reply).await?;
    Ok(())
}

/// Finish a two-step value flow (set-quantity, set-price)
#[allow(clippy::too_many_arguments)]
async fn complete_value_action<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
    chat_id: i64,
    user_id: u64,
    action: OfferAction,
    offer_id: i64,
    text: &str,
) -> Result<()> {
    let announce_chat = resolve_announce_chat(conn, config, chat_id).await;
    let lifecycle = OfferLifecycle::new(
        Arc::clone(conn),
        transport,
        announce_chat,
        config.contact_text.clone(),
    );

    let reply = match action {
        OfferAction::SetQuantity => match parse_quantity(text) {
            Ok(quantity) => match lifecycle.set_quantity(offer_id, quantity).await {
                Ok(outcome) => describe_quantity(&outcome),
                Err(e) => {
                    error!("Quantity update failed for offer {offer_id}: {e}");
                    "Something went wrong updating the offer.".to_string()
                }
            },
            Err(e) => {
                // Re-prompt the same step; target id is kept
                sessions
                    .set(user_id, FlowState::AwaitValue { action, offer_id })
                    .await;
                transport
                    .send_text(chat_id, &format!("{e} Try again or /cancel."))
                    .await?;
                return Ok(());
            }
        },
        OfferAction::SetPrice => match normalize_price(text) {
            Ok(price) => match lifecycle.set_price(offer_id, &price).await {
                Ok(outcome) => describe_price(&outcome),
                Err(e) => {
                    error!("Price update failed for offer {offer_id}: {e}");
                    "Something went wrong updating the offer.".to_string()
                }
            },
            Err(e) => {
                sessions
                    .set(user_id, FlowState::AwaitValue { action, offer_id })
                    .await;
                transport
                    .send_text(chat_id, &format!("{e} Try again or /cancel."))
                    .await?;
                return Ok(());
            }
        },
        OfferAction::SoldOut | OfferAction::Reannounce => unreachable!("single-step actions"),
    };

    sessions.clear(user_id).await;
    transport.send_text(chat_id, &reply).await?;
    Ok(())
}

/// Handle the document completing an upload flow
#[allow(clippy::too_many_arguments)]
pub async fn handle_upload_document<T: Transport>(
    transport: &T,
    conn: &Arc<Mutex<Connection>>,
    sessions: &FlowSessions,
    config: &BotConfig,
    chat_id: i64,
    user_id: u64,
    display_count: Option<String>,
    file_id: &str,
) -> Result<()> {
    // The session ends with this document whatever happens below
    sessions.clear(user_id).await;

    let _ = transport.typing(chat_id).await;

    let local_path = match transport.download(file_id).await {
        Ok(path) => path,
        Err(e) => {
            warn!("Upload file download failed: {e}");
            transport
                .send_text(chat_id, &format!("File download failed: {e}"))
                .await?;
            return Ok(());
        }
    };

    let result = async {
        let metrics = match scan_file(std::path::Path::new(&local_path)) {
            Ok(metrics) => metrics,
            Err(e) => {
                transport
                    .send_text(chat_id, &format!("Could not read the file: {e}"))
                    .await?;
                return Ok(());
            }
        };

        let uploader = Uploader::new(config.upload_threshold_mb, config.catbox_userhash.clone());
        let upload = uploader
            .upload(std::path::Path::new(&local_path), metrics.size_bytes)
            .await;

        let header = resolve_header(None, display_count.as_deref(), &metrics);
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let report = build_upload_report(&header, &metrics, &upload, &timestamp);

        let target = resolve_announce_chat(conn, config, chat_id).await;
        match transport.send_text(target, &report).await {
            Ok(_) if target != chat_id => {
                transport
                    .send_text(chat_id, "Upload announcement posted.")
                    .await?;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Upload report send failed: {e}");
                transport
                    .send_text(
                        chat_id,
                        &format!("Posting the announcement failed: {e}\n\n{report}"),
                    )
                    .await?;
            }
        }
        Ok(())
    }
    .await;

    // Always clean up the downloaded file
    if let Err(cleanup_err) = std::fs::remove_file(&local_path) {
        error!("Failed to clean up downloaded file {local_path}: {cleanup_err:?}");
    }

    result
}

/// Quantity for a new offer must be strictly positive
fn parse_positive_quantity(text: &str) -> Result<i64, crate::errors::BotError> {
    let quantity = parse_quantity(text)?;
    if quantity == 0 {
        return Err(crate::errors::BotError::Validation(
            "Quantity must be greater than zero".to_string(),
        ));
    }
    Ok(quantity)
}

/// Phrase a create outcome for the admin
pub fn describe_create(created: &CreatedOffer, current_chat: i64) -> String {
    match &created.announcement {
        AnnounceStatus::Sent { chat_id } if *chat_id == current_chat => {
            format!("Added offer #{}.", created.offer.id)
        }
        AnnounceStatus::Sent { .. } => {
            format!("Added offer #{} and announced it.", created.offer.id)
        }
        AnnounceStatus::Failed(e) => {
            format!("Added offer #{}. Announcement failed: {e}", created.offer.id)
        }
    }
}

/// Phrase a quantity outcome for the admin
pub fn describe_quantity(outcome: &QuantityOutcome) -> String {
    match outcome {
        QuantityOutcome::NotFound => "Offer not found.".to_string(),
        QuantityOutcome::Restocked { offer_id, quantity } => {
            format!("Updated #{offer_id} quantity to {quantity}.")
        }
        QuantityOutcome::SoldOut(retired) => describe_retire(retired),
    }
}

/// Phrase a retire outcome, noting what happened to the announcement
pub fn describe_retire(outcome: &RetireOutcome) -> String {
    use crate::lifecycle::DeleteStatus;

    match &outcome.delete {
        DeleteStatus::Deleted => format!(
            "Marked #{} as sold out and removed the announcement.",
            outcome.offer_id
        ),
        DeleteStatus::Failed(e) => format!(
            "Marked #{} as sold out. Announcement delete failed: {e}",
            outcome.offer_id
        ),
        DeleteStatus::NoBinding => format!("Marked #{} as sold out.", outcome.offer_id),
    }
}

/// Phrase a re-announce outcome for the admin
pub fn describe_reannounce(outcome: &ReannounceOutcome) -> String {
    match outcome {
        ReannounceOutcome::NotFoundOrInactive => "Offer not found or inactive.".to_string(),
        ReannounceOutcome::Announced { offer_id, .. } => format!("Announced #{offer_id}."),
        ReannounceOutcome::SendFailed { offer_id, error } => {
            format!("Announcing #{offer_id} failed: {error}")
        }
    }
}

/// Phrase a price outcome for the admin
pub fn describe_price(outcome: &PriceOutcome) -> String {
    match outcome {
        PriceOutcome::NotFound => "Offer not found.".to_string(),
        PriceOutcome::Updated { offer_id, price } => {
            format!("Updated #{offer_id} price to ${price}.")
        }
    }
}
