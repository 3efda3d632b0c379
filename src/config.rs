//! # Bot Configuration Module
//!
//! Environment-level configuration for the offers bot: the admin allow-list,
//! default announcement destination, contact suffix, storage location, and the
//! upload size threshold.

use std::collections::HashSet;
use std::env;

/// Default contact suffix appended to every offer announcement
pub const DEFAULT_CONTACT_TEXT: &str = "LMK if interested.";
/// Default storage location for the offers database
pub const DEFAULT_DB_PATH: &str = "offers.db";
/// Default size threshold routing uploads between the two hosts
pub const DEFAULT_UPLOAD_THRESHOLD_MB: f64 = 200.0;

/// Runtime configuration read from the environment
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Static admin allow-list. Empty means nobody is an admin.
    pub admin_user_ids: HashSet<u64>,
    /// Default announcement destination; settings-table override wins
    pub announce_chat_id: Option<i64>,
    /// Contact suffix appended to announcements
    pub contact_text: String,
    /// SQLite database path
    pub db_path: String,
    /// Size threshold in MB for upload host routing
    pub upload_threshold_mb: f64,
    /// Optional account token for the low-size upload host
    pub catbox_userhash: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            admin_user_ids: HashSet::new(),
            announce_chat_id: None,
            contact_text: DEFAULT_CONTACT_TEXT.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            upload_threshold_mb: DEFAULT_UPLOAD_THRESHOLD_MB,
            catbox_userhash: None,
        }
    }
}

impl BotConfig {
    /// Build the configuration from environment variables.
    ///
    /// Malformed optional values fall back to their defaults rather than
    /// aborting startup; the admin list skips unparseable entries.
    pub fn from_env() -> Self {
        let admin_user_ids = parse_admin_ids(env::var("ADMIN_USER_IDS").ok().as_deref());
        let announce_chat_id = env::var("ANNOUNCE_CHAT_ID")
            .ok()
            .and_then(|v| v.trim().parse().ok());
        let contact_text =
            env::var("CONTACT_TEXT").unwrap_or_else(|_| DEFAULT_CONTACT_TEXT.to_string());
        let db_path = env::var("OFFERS_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
        let upload_threshold_mb = env::var("UPLOAD_THRESHOLD_MB")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(DEFAULT_UPLOAD_THRESHOLD_MB);
        let catbox_userhash = env::var("CATBOX_USERHASH")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Self {
            admin_user_ids,
            announce_chat_id,
            contact_text,
            db_path,
            upload_threshold_mb,
            catbox_userhash,
        }
    }

    /// Whether a user may run admin commands.
    ///
    /// An empty allow-list denies everyone; admin functionality stays off
    /// until `ADMIN_USER_IDS` is populated.
    pub fn is_admin(&self, user_id: Option<u64>) -> bool {
        match user_id {
            Some(id) => self.admin_user_ids.contains(&id),
            None => false,
        }
    }
}

/// Parse the comma-separated admin id list, skipping blanks and junk entries
fn parse_admin_ids(value: Option<&str>) -> HashSet<u64> {
    let mut ids = HashSet::new();
    if let Some(raw) = value {
        for item in raw.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match item.parse() {
                Ok(id) => {
                    ids.insert(id);
                }
                Err(_) => {
                    log::warn!("Ignoring malformed admin id entry: {item}");
                }
            }
        }
    }
    ids
}
