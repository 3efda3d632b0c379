use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};

/// Represents an offer row in the database
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub price: String,
    pub active: bool,
    pub created_at: String,
    pub announce_chat_id: Option<i64>,
    pub announce_message_id: Option<i64>,
}

impl Offer {
    /// The (chat, message) pair of the last published announcement, if any.
    /// Both fields are present or both are absent.
    pub fn announcement(&self) -> Option<(i64, i64)> {
        match (self.announce_chat_id, self.announce_message_id) {
            (Some(chat_id), Some(message_id)) => Some((chat_id, message_id)),
            _ => None,
        }
    }
}

/// Initialize the database schema
pub fn init_database_schema(conn: &Connection) -> Result<()> {
    info!("Initializing database schema...");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS offers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            price TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            announce_chat_id INTEGER,
            announce_message_id INTEGER
        )",
        [],
    )
    .context("Failed to create offers table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_offers_active ON offers(active)",
        [],
    )
    .context("Failed to create offers active index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create settings table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Insert a new offer, active, with no announcement binding yet
pub fn add_offer(conn: &Connection, name: &str, quantity: i64, price: &str) -> Result<Offer> {
    let created_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO offers (name, quantity, price, active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        params![name, quantity, price, created_at],
    )
    .context("Failed to insert new offer")?;

    let offer_id = conn.last_insert_rowid();
    info!("Offer created with ID: {}", offer_id);

    get_offer(conn, offer_id)?.context("Failed to load offer after insert")
}

/// Read an offer by ID
pub fn get_offer(conn: &Connection, offer_id: i64) -> Result<Option<Offer>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, quantity, price, active, created_at,
                    announce_chat_id, announce_message_id
             FROM offers WHERE id = ?1",
        )
        .context("Failed to prepare offer read statement")?;

    stmt.query_row(params![offer_id], row_to_offer)
        .optional()
        .context("Failed to read offer")
}

/// List offers, newest-created first
pub fn list_offers(conn: &Connection, active_only: bool) -> Result<Vec<Offer>> {
    let query = if active_only {
        "SELECT id, name, quantity, price, active, created_at,
                announce_chat_id, announce_message_id
         FROM offers WHERE active = 1 ORDER BY created_at DESC, id DESC"
    } else {
        "SELECT id, name, quantity, price, active, created_at,
                announce_chat_id, announce_message_id
         FROM offers ORDER BY created_at DESC, id DESC"
    };

    let mut stmt = conn
        .prepare(query)
        .context("Failed to prepare offer list statement")?;
    let offers = stmt
        .query_map([], row_to_offer)
        .context("Failed to list offers")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Failed to map offer rows")?;

    Ok(offers)
}

/// Flip the active flag; returns whether a row existed
pub fn set_active(conn: &Connection, offer_id: i64, active: bool) -> Result<bool> {
    let rows_affected = conn
        .execute(
            "UPDATE offers SET active = ?1 WHERE id = ?2",
            params![active as i64, offer_id],
        )
        .context("Failed to update offer active flag")?;
    Ok(rows_affected > 0)
}

/// Update quantity; returns whether a row existed
pub fn update_quantity(conn: &Connection, offer_id: i64, quantity: i64) -> Result<bool> {
    let rows_affected = conn
        .execute(
            "UPDATE offers SET quantity = ?1 WHERE id = ?2",
            params![quantity, offer_id],
        )
        .context("Failed to update offer quantity")?;
    Ok(rows_affected > 0)
}

/// Update price; returns whether a row existed
pub fn update_price(conn: &Connection, offer_id: i64, price: &str) -> Result<bool> {
    let rows_affected = conn
        .execute(
            "UPDATE offers SET price = ?1 WHERE id = ?2",
            params![price, offer_id],
        )
        .context("Failed to update offer price")?;
    Ok(rows_affected > 0)
}

/// Record the most recent published announcement location, overwriting any
/// prior binding; returns whether a row existed
pub fn attach_announcement(
    conn: &Connection,
    offer_id: i64,
    chat_id: i64,
    message_id: i64,
) -> Result<bool> {
    let rows_affected = conn
        .execute(
            "UPDATE offers SET announce_chat_id = ?1, announce_message_id = ?2 WHERE id = ?3",
            params![chat_id, message_id, offer_id],
        )
        .context("Failed to attach announcement to offer")?;
    Ok(rows_affected > 0)
}

/// Read a settings value
pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    let mut stmt = conn
        .prepare("SELECT value FROM settings WHERE key = ?1")
        .context("Failed to prepare settings read statement")?;

    stmt.query_row(params![key], |row| row.get::<_, String>(0))
        .optional()
        .context("Failed to read setting")
}

/// Upsert a settings value
pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
        params![key, value],
    )
    .context("Failed to write setting")?;
    Ok(())
}

fn row_to_offer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Offer> {
    Ok(Offer {
        id: row.get(0)?,
        name: row.get(1)?,
        quantity: row.get(2)?,
        price: row.get(3)?,
        active: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        announce_chat_id: row.get(6)?,
        announce_message_id: row.get(7)?,
    })
}
