//! # Offer Lifecycle Module
//!
//! Orchestrates create/update/retire operations against the repository and
//! the announcement channel. The repository is always mutated first and is
//! the source of truth; announcement sends and deletes are best-effort, so a
//! crash between the two effects leaves the repository correct and the
//! channel stale-or-missing, never the reverse.

use anyhow::Result;
use log::{info, warn};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::compose::build_announcement;
use crate::db::{self, Offer};
use crate::transport::Transport;

/// Result of attempting to publish an announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnounceStatus {
    Sent { chat_id: i64 },
    Failed(String),
}

/// Result of attempting to delete a bound announcement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteStatus {
    Deleted,
    Failed(String),
    NoBinding,
}

/// Outcome of a create operation
#[derive(Debug)]
pub struct CreatedOffer {
    pub offer: Offer,
    pub announcement: AnnounceStatus,
}

/// Outcome of retiring an offer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetireOutcome {
    pub offer_id: i64,
    pub delete: DeleteStatus,
}

/// Outcome of a quantity update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityOutcome {
    NotFound,
    Restocked { offer_id: i64, quantity: i64 },
    SoldOut(RetireOutcome),
}

/// Outcome of a re-announce request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReannounceOutcome {
    NotFoundOrInactive,
    Announced { offer_id: i64, chat_id: i64 },
    SendFailed { offer_id: i64, error: String },
}

/// Outcome of a price update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceOutcome {
    NotFound,
    Updated { offer_id: i64, price: String },
}

/// State machine over a single offer, driven by admin actions
pub struct OfferLifecycle<'a, T: Transport> {
    conn: Arc<Mutex<Connection>>,
    transport: &'a T,
    announce_chat_id: i64,
    contact_text: String,
}

impl<'a, T: Transport> OfferLifecycle<'a, T> {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        transport: &'a T,
        announce_chat_id: i64,
        contact_text: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            transport,
            announce_chat_id,
            contact_text: contact_text.into(),
        }
    }

    /// Create a new active offer, then attempt to publish its announcement.
    ///
    /// On publish failure the offer still exists, unannounced; the caller
    /// reports the partial failure instead of rolling back.
    pub async fn create(&self, name: &str, quantity: i64, price: &str) -> Result<CreatedOffer> {
        let offer = {
            let conn = self.conn.lock().await;
            db::add_offer(&conn, name, quantity, price)?
        };

        let text = build_announcement(&offer, &self.contact_text);
        let announcement = match self.transport.send_text(self.announce_chat_id, &text).await {
            Ok(sent) => {
                let conn = self.conn.lock().await;
                db::attach_announcement(&conn, offer.id, sent.chat_id, sent.message_id)?;
                AnnounceStatus::Sent {
                    chat_id: sent.chat_id,
                }
            }
            Err(e) => {
                warn!("Announcement send failed for offer {}: {e}", offer.id);
                AnnounceStatus::Failed(e.to_string())
            }
        };

        Ok(CreatedOffer {
            offer,
            announcement,
        })
    }

    /// Update quantity. Zero delegates to retire; any positive value
    /// re-activates the offer (restock), without a new announcement.
    pub async fn set_quantity(&self, offer_id: i64, quantity: i64) -> Result<QuantityOutcome> {
        let offer = {
            let conn = self.conn.lock().await;
            db::get_offer(&conn, offer_id)?
        };
        let Some(offer) = offer else {
            return Ok(QuantityOutcome::NotFound);
        };

        if quantity == 0 {
            return Ok(QuantityOutcome::SoldOut(self.retire_offer(&offer).await?));
        }

        {
            let conn = self.conn.lock().await;
            db::update_quantity(&conn, offer_id, quantity)?;
            db::set_active(&conn, offer_id, true)?;
        }
        info!("Offer {offer_id} quantity set to {quantity}");

        Ok(QuantityOutcome::Restocked { offer_id, quantity })
    }

    /// Retire an offer: quantity zero, inactive, one best-effort delete of
    /// the bound announcement.
    pub async fn retire(&self, offer_id: i64) -> Result<Option<RetireOutcome>> {
        let offer = {
            let conn = self.conn.lock().await;
            db::get_offer(&conn, offer_id)?
        };
        let Some(offer) = offer else {
            return Ok(None);
        };

        Ok(Some(self.retire_offer(&offer).await?))
    }

    async fn retire_offer(&self, offer: &Offer) -> Result<RetireOutcome> {
        {
            let conn = self.conn.lock().await;
            db::update_quantity(&conn, offer.id, 0)?;
            db::set_active(&conn, offer.id, false)?;
        }
        info!("Offer {} marked sold out", offer.id);

        let delete = match offer.announcement() {
            Some((chat_id, message_id)) => {
                match self.transport.delete(chat_id, message_id).await {
                    Ok(()) => DeleteStatus::Deleted,
                    Err(e) => {
                        warn!("Announcement delete failed for offer {}: {e}", offer.id);
                        DeleteStatus::Failed(e.to_string())
                    }
                }
            }
            None => DeleteStatus::NoBinding,
        };

        Ok(RetireOutcome {
            offer_id: offer.id,
            delete,
        })
    }

    /// Publish a fresh announcement for an active offer and rebind to it.
    /// The previous message, if any, is left in place.
    pub async fn reannounce(&self, offer_id: i64) -> Result<ReannounceOutcome> {
        let offer = {
            let conn = self.conn.lock().await;
            db::get_offer(&conn, offer_id)?
        };
        let Some(offer) = offer else {
            return Ok(ReannounceOutcome::NotFoundOrInactive);
        };
        if !offer.active {
            return Ok(ReannounceOutcome::NotFoundOrInactive);
        }

        let text = build_announcement(&offer, &self.contact_text);
        match self.transport.send_text(self.announce_chat_id, &text).await {
            Ok(sent) => {
                let conn = self.conn.lock().await;
                db::attach_announcement(&conn, offer.id, sent.chat_id, sent.message_id)?;
                Ok(ReannounceOutcome::Announced {
                    offer_id: offer.id,
                    chat_id: sent.chat_id,
                })
            }
            Err(e) => {
                warn!("Announcement send failed for offer {}: {e}", offer.id);
                Ok(ReannounceOutcome::SendFailed {
                    offer_id: offer.id,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Update the price in place. Any existing announcement text is left
    /// stale; re-announce is the explicit refresh path.
    pub async fn set_price(&self, offer_id: i64, price: &str) -> Result<PriceOutcome> {
        let conn = self.conn.lock().await;
        if db::get_offer(&conn, offer_id)?.is_none() {
            return Ok(PriceOutcome::NotFound);
        }
        db::update_price(&conn, offer_id, price)?;
        info!("Offer {offer_id} price set to {price}");

        Ok(PriceOutcome::Updated {
            offer_id,
            price: price.to_string(),
        })
    }
}
