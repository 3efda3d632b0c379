use anyhow::Result;
use async_trait::async_trait;
use rusqlite::Connection;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use offers_bot::db;
use offers_bot::errors::BotError;
use offers_bot::lifecycle::{
    AnnounceStatus, DeleteStatus, OfferLifecycle, PriceOutcome, QuantityOutcome,
    ReannounceOutcome,
};
use offers_bot::transport::{MessageRef, Transport};

const ANNOUNCE_CHAT: i64 = -100500;
const CONTACT: &str = "LMK if interested.";

/// Recording transport double; flips to failure modes on demand
#[derive(Default)]
struct MockTransport {
    sent: StdMutex<Vec<(i64, String)>>,
    delete_calls: StdMutex<Vec<(i64, i64)>>,
    fail_sends: AtomicBool,
    fail_deletes: AtomicBool,
    next_message_id: AtomicI64,
}

impl MockTransport {
    fn new() -> Self {
        Self::default()
    }

    fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn delete_calls(&self) -> Vec<(i64, i64)> {
        self.delete_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<MessageRef, BotError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BotError::Transport("send failed".to_string()));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MessageRef {
            chat_id,
            message_id,
        })
    }

    async fn send_menu(&self, chat_id: i64, text: &str) -> Result<MessageRef, BotError> {
        self.send_text(chat_id, text).await
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<(), BotError> {
        self.delete_calls.lock().unwrap().push((chat_id, message_id));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BotError::Transport("delete failed".to_string()));
        }
        Ok(())
    }

    async fn download(&self, _file_id: &str) -> Result<String, BotError> {
        Err(BotError::Transport("download not supported".to_string()))
    }

    async fn typing(&self, _chat_id: i64) -> Result<(), BotError> {
        Ok(())
    }
}

fn setup_conn() -> Result<(Arc<Mutex<Connection>>, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let conn = Connection::open(temp_file.path())?;
    db::init_database_schema(&conn)?;
    Ok((Arc::new(Mutex::new(conn)), temp_file))
}

#[tokio::test]
async fn test_create_publishes_and_binds() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;

    assert_eq!(
        created.announcement,
        AnnounceStatus::Sent {
            chat_id: ANNOUNCE_CHAT
        }
    );

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, ANNOUNCE_CHAT);
    assert_eq!(
        sent[0].1,
        "Hey! I have Widget in right now. 5 available at $10. LMK if interested."
    );
    assert!(sent[0].1.contains("5 available at $10."));

    let stored = {
        let conn = conn.lock().await;
        db::get_offer(&conn, created.offer.id)?.unwrap()
    };
    assert!(stored.active);
    assert_eq!(stored.announcement(), Some((ANNOUNCE_CHAT, 1)));

    Ok(())
}

#[tokio::test]
async fn test_create_survives_send_failure() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    transport.set_fail_sends(true);
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;

    assert!(matches!(created.announcement, AnnounceStatus::Failed(_)));

    // The offer exists, active but unannounced; nothing is rolled back
    let stored = {
        let conn = conn.lock().await;
        db::get_offer(&conn, created.offer.id)?.unwrap()
    };
    assert!(stored.active);
    assert_eq!(stored.quantity, 5);
    assert!(stored.announcement().is_none());

    Ok(())
}

#[tokio::test]
async fn test_retire_deletes_bound_announcement_once() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;
    let outcome = lifecycle.retire(created.offer.id).await?.unwrap();

    assert_eq!(outcome.delete, DeleteStatus::Deleted);
    assert_eq!(transport.delete_calls(), vec![(ANNOUNCE_CHAT, 1)]);

    let stored = {
        let conn = conn.lock().await;
        db::get_offer(&conn, created.offer.id)?.unwrap()
    };
    assert_eq!(stored.quantity, 0);
    assert!(!stored.active);

    Ok(())
}

#[tokio::test]
async fn test_retire_survives_delete_failure() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;
    transport.set_fail_deletes(true);

    let outcome = lifecycle.retire(created.offer.id).await?.unwrap();

    assert!(matches!(outcome.delete, DeleteStatus::Failed(_)));
    // Exactly one delete attempt, no retry
    assert_eq!(transport.delete_calls().len(), 1);

    // The repository transition happened regardless
    let stored = {
        let conn = conn.lock().await;
        db::get_offer(&conn, created.offer.id)?.unwrap()
    };
    assert_eq!(stored.quantity, 0);
    assert!(!stored.active);

    Ok(())
}

#[tokio::test]
async fn test_retire_without_binding_skips_delete() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    transport.set_fail_sends(true);
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;
    let outcome = lifecycle.retire(created.offer.id).await?.unwrap();

    assert_eq!(outcome.delete, DeleteStatus::NoBinding);
    assert!(transport.delete_calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_retire_missing_offer() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    assert!(lifecycle.retire(4242).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_restock_reactivates_without_new_announcement() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;
    lifecycle.retire(created.offer.id).await?;
    let sends_before = transport.sent().len();

    let outcome = lifecycle.set_quantity(created.offer.id, 3).await?;

    assert_eq!(
        outcome,
        QuantityOutcome::Restocked {
            offer_id: created.offer.id,
            quantity: 3
        }
    );
    // Restocking re-activates but does not publish anything new
    assert_eq!(transport.sent().len(), sends_before);

    let stored = {
        let conn = conn.lock().await;
        db::get_offer(&conn, created.offer.id)?.unwrap()
    };
    assert!(stored.active);
    assert_eq!(stored.quantity, 3);

    Ok(())
}

#[tokio::test]
async fn test_set_quantity_zero_retires() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;
    let outcome = lifecycle.set_quantity(created.offer.id, 0).await?;

    match outcome {
        QuantityOutcome::SoldOut(retired) => {
            assert_eq!(retired.offer_id, created.offer.id);
            assert_eq!(retired.delete, DeleteStatus::Deleted);
        }
        other => panic!("Expected SoldOut, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_set_quantity_missing_offer() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    assert_eq!(
        lifecycle.set_quantity(4242, 5).await?,
        QuantityOutcome::NotFound
    );

    Ok(())
}

#[tokio::test]
async fn test_reannounce_rebinds_and_keeps_old_message() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;
    let outcome = lifecycle.reannounce(created.offer.id).await?;

    assert_eq!(
        outcome,
        ReannounceOutcome::Announced {
            offer_id: created.offer.id,
            chat_id: ANNOUNCE_CHAT
        }
    );

    // The binding points at the fresh message; the old one was not deleted
    let stored = {
        let conn = conn.lock().await;
        db::get_offer(&conn, created.offer.id)?.unwrap()
    };
    assert_eq!(stored.announcement(), Some((ANNOUNCE_CHAT, 2)));
    assert!(transport.delete_calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_reannounce_rejects_inactive_and_missing() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;
    lifecycle.retire(created.offer.id).await?;

    assert_eq!(
        lifecycle.reannounce(created.offer.id).await?,
        ReannounceOutcome::NotFoundOrInactive
    );
    assert_eq!(
        lifecycle.reannounce(4242).await?,
        ReannounceOutcome::NotFoundOrInactive
    );

    Ok(())
}

#[tokio::test]
async fn test_reannounce_send_failure_keeps_binding() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;
    transport.set_fail_sends(true);

    let outcome = lifecycle.reannounce(created.offer.id).await?;

    assert!(matches!(outcome, ReannounceOutcome::SendFailed { .. }));

    let stored = {
        let conn = conn.lock().await;
        db::get_offer(&conn, created.offer.id)?.unwrap()
    };
    assert_eq!(stored.announcement(), Some((ANNOUNCE_CHAT, 1)));

    Ok(())
}

#[tokio::test]
async fn test_set_price_touches_no_announcement() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    let created = lifecycle.create("Widget", 5, "10").await?;
    let sends_before = transport.sent().len();

    let outcome = lifecycle.set_price(created.offer.id, "12.5").await?;

    assert_eq!(
        outcome,
        PriceOutcome::Updated {
            offer_id: created.offer.id,
            price: "12.5".to_string()
        }
    );
    // The live announcement goes stale on purpose
    assert_eq!(transport.sent().len(), sends_before);
    assert!(transport.delete_calls().is_empty());

    let stored = {
        let conn = conn.lock().await;
        db::get_offer(&conn, created.offer.id)?.unwrap()
    };
    assert_eq!(stored.price, "12.5");
    assert_eq!(stored.announcement(), Some((ANNOUNCE_CHAT, 1)));

    Ok(())
}

#[tokio::test]
async fn test_set_price_missing_offer() -> Result<()> {
    let (conn, _tmp) = setup_conn()?;
    let transport = MockTransport::new();
    let lifecycle = OfferLifecycle::new(Arc::clone(&conn), &transport, ANNOUNCE_CHAT, CONTACT);

    assert_eq!(
        lifecycle.set_price(4242, "10").await?,
        PriceOutcome::NotFound
    );

    Ok(())
}
