use anyhow::Result;
use rusqlite::Connection;
use tempfile::NamedTempFile;

use offers_bot::db::{
    add_offer, attach_announcement, get_offer, get_setting, init_database_schema, list_offers,
    set_active, set_setting, update_price, update_quantity,
};

fn setup_test_db() -> Result<(Connection, NamedTempFile)> {
    let temp_file = NamedTempFile::new()?;
    let conn = Connection::open(temp_file.path())?;
    init_database_schema(&conn)?;
    Ok((conn, temp_file))
}

#[test]
fn test_schema_init_is_idempotent() -> Result<()> {
    let (conn, _temp_file) = setup_test_db()?;

    // Running init again against the same database must not fail
    init_database_schema(&conn)?;

    Ok(())
}

#[test]
fn test_add_offer_assigns_identity() -> Result<()> {
    let (conn, _temp_file) = setup_test_db()?;

    let offer = add_offer(&conn, "Widget", 5, "10")?;

    assert!(offer.id > 0);
    assert!(offer.active);
    assert_eq!(offer.quantity, 5);
    assert_eq!(offer.price, "10");
    assert!(offer.announcement().is_none());

    Ok(())
}

#[test]
fn test_ids_never_reused_after_retire() -> Result<()> {
    let (conn, _temp_file) = setup_test_db()?;

    let first = add_offer(&conn, "First", 1, "1")?;
    set_active(&conn, first.id, false)?;
    update_quantity(&conn, first.id, 0)?;

    // Soft-retired rows keep their ids; new rows always advance
    let second = add_offer(&conn, "Second", 2, "2")?;
    assert!(second.id > first.id);
    assert!(get_offer(&conn, first.id)?.is_some());

    Ok(())
}

#[test]
fn test_retired_offer_state_at_rest() -> Result<()> {
    let (conn, _temp_file) = setup_test_db()?;

    let offer = add_offer(&conn, "Widget", 5, "10")?;
    attach_announcement(&conn, offer.id, -100123, 7)?;

    update_quantity(&conn, offer.id, 0)?;
    set_active(&conn, offer.id, false)?;

    let retired = get_offer(&conn, offer.id)?.unwrap();
    assert_eq!(retired.quantity, 0);
    assert!(!retired.active);
    // The stale binding stays readable for the delete attempt
    assert_eq!(retired.announcement(), Some((-100123, 7)));

    Ok(())
}

#[test]
fn test_list_offers_ordering_and_filter() -> Result<()> {
    let (conn, _temp_file) = setup_test_db()?;

    let a = add_offer(&conn, "A", 1, "1")?;
    let b = add_offer(&conn, "B", 2, "2")?;
    let c = add_offer(&conn, "C", 3, "3")?;
    set_active(&conn, b.id, false)?;

    let active = list_offers(&conn, true)?;
    let ids: Vec<i64> = active.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![c.id, a.id]);

    let all = list_offers(&conn, false)?;
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].id, c.id);

    Ok(())
}

#[test]
fn test_absent_row_updates_return_false() -> Result<()> {
    let (conn, _temp_file) = setup_test_db()?;

    assert!(!update_quantity(&conn, 12345, 1)?);
    assert!(!update_price(&conn, 12345, "1")?);
    assert!(!set_active(&conn, 12345, true)?);
    assert!(!attach_announcement(&conn, 12345, 1, 1)?);

    Ok(())
}

#[test]
fn test_settings_roundtrip_and_upsert() -> Result<()> {
    let (conn, _temp_file) = setup_test_db()?;

    assert!(get_setting(&conn, "missing")?.is_none());

    set_setting(&conn, "announce_chat_id", "-1001")?;
    set_setting(&conn, "announce_chat_id", "-1002")?;

    assert_eq!(
        get_setting(&conn, "announce_chat_id")?.as_deref(),
        Some("-1002")
    );

    Ok(())
}
