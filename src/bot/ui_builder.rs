//! UI Builder module for the menu keyboard and help text

use teloxide::types::{KeyboardButton, KeyboardMarkup};

/// Menu button labels, mirrored onto their slash commands
const MENU_LABELS: &[(&str, &str)] = &[
    ("📦 Stock", "/stock"),
    ("➕ Add offer", "/add"),
    ("✏️ Set quantity", "/setqty"),
    ("💲 Set price", "/setprice"),
    ("🚫 Sold out", "/soldout"),
    ("📣 Announce", "/announce"),
    ("📤 Upload", "/upload"),
    ("❌ Cancel", "/cancel"),
    ("❓ Help", "/help"),
];

/// Map a menu button label to its canonical command
pub fn command_for_label(text: &str) -> Option<&'static str> {
    MENU_LABELS
        .iter()
        .find(|(label, _)| *label == text)
        .map(|(_, command)| *command)
}

/// Create the persistent reply keyboard mirroring the admin commands
pub fn menu_keyboard() -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = MENU_LABELS
        .chunks(3)
        .map(|chunk| {
            chunk
                .iter()
                .map(|(label, _)| KeyboardButton::new(label.to_string()))
                .collect()
        })
        .collect();

    let mut markup = KeyboardMarkup::new(rows);
    markup.resize_keyboard = true;
    markup
}

/// Build the help message; admin commands only show for admins
pub fn build_help(is_admin: bool) -> String {
    let mut lines = vec![
        "Customer commands:".to_string(),
        "/stock - show current offers".to_string(),
    ];
    if is_admin {
        lines.extend(
            [
                "",
                "Admin commands:",
                "/add Name | qty | price",
                "/setqty <id> <qty>",
                "/setprice <id> <price>",
                "/soldout <id>",
                "/announce <id>",
                "/setannounce [chat id]",
                "/upload [display count]",
                "/menu - show the button menu",
                "/cancel - abort the current step",
                "",
                "Send an admin command without arguments for step-by-step prompts.",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
    }
    lines.join("\n")
}
