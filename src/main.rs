use anyhow::Result;
use log::{info, warn};
use rusqlite::Connection;
use std::env;
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::Mutex;

use offers_bot::bot;
use offers_bot::config::BotConfig;
use offers_bot::db;
use offers_bot::flow::FlowSessions;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    info!("Starting Offers Telegram Bot");

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Get bot token from environment
    let bot_token = env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN must be set");

    let config = Arc::new(BotConfig::from_env());
    if config.admin_user_ids.is_empty() {
        warn!("ADMIN_USER_IDS is empty; admin commands are disabled for everyone");
    }

    info!("Initializing database at: {}", config.db_path);

    // Create database connection and initialize schema
    let conn = Connection::open(&config.db_path)?;
    db::init_database_schema(&conn)?;

    // Wrap connection in Arc<Mutex> for sharing across async tasks
    let shared_conn = Arc::new(Mutex::new(conn));

    // Per-user flow sessions, in-memory only
    let sessions = FlowSessions::new();

    // Initialize the bot
    let bot = Bot::new(bot_token);

    info!("Bot initialized, starting dispatcher");

    // Set up the dispatcher with shared state
    let handler = dptree::entry().branch(Update::filter_message().endpoint({
        let conn = Arc::clone(&shared_conn);
        let sessions = sessions.clone();
        let config = Arc::clone(&config);
        move |bot: Bot, msg: Message| {
            let conn = Arc::clone(&conn);
            let sessions = sessions.clone();
            let config = Arc::clone(&config);
            async move { bot::message_handler(bot, msg, conn, sessions, config).await }
        }
    }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
