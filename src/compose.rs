//! # Announcement Composer Module
//!
//! Pure functions from domain data to outbound text. Announcement and report
//! shapes are fixed: these messages are scanned by humans in a channel, so
//! field order and labels must not change between releases.

use crate::db::Offer;
use crate::upload::{FileMetrics, UploadResult};

/// Render the channel announcement for a single offer
pub fn build_announcement(offer: &Offer, contact_text: &str) -> String {
    format!(
        "Hey! I have {} in right now. {} available at ${}. {}",
        offer.name, offer.quantity, offer.price, contact_text
    )
}

/// Render one line of the stock listing
pub fn format_offer_line(offer: &Offer) -> String {
    format!(
        "#{} - {} — {} @ ${}",
        offer.id, offer.name, offer.quantity, offer.price
    )
}

/// Render the stock listing with its fixed header
pub fn format_stock_list(offers: &[Offer]) -> String {
    let mut lines = vec!["Current stock:".to_string()];
    lines.extend(offers.iter().map(format_offer_line));
    lines.join("\n")
}

/// Resolve the upload report header.
///
/// A custom header wins (newlines flattened); otherwise a display-count
/// comparison line; otherwise the stock default.
pub fn resolve_header(
    custom_header: Option<&str>,
    display_count: Option<&str>,
    metrics: &FileMetrics,
) -> String {
    if let Some(header) = custom_header {
        return header.replace('\n', " ").trim().to_string();
    }
    if let Some(count) = display_count {
        // Numeric display counts get the same digit grouping as the scan count
        let display_text = match count.trim().parse::<u64>() {
            Ok(value) => group_thousands(value),
            Err(_) => count.trim().to_string(),
        };
        return format!(
            "Total lines on this are {display_text}, but here is {}",
            group_thousands(metrics.total_lines)
        );
    }
    "New Sample!".to_string()
}

/// Render the multi-line upload report. Field order is fixed.
pub fn build_upload_report(
    header: &str,
    metrics: &FileMetrics,
    upload: &UploadResult,
    timestamp: &str,
) -> String {
    let success_text = if upload.success { "1/1" } else { "0/1" };
    [
        header.to_string(),
        format!("File: {}", metrics.filename),
        format!("Valid entries: {}", group_thousands(metrics.valid_entries)),
        format!("Total lines: {}", group_thousands(metrics.total_lines)),
        format!("Size: {:.2} MB", metrics.size_mb()),
        format!("{}: {}", upload.host, upload.url),
        format!("Success: {success_text}"),
        format!("Time: {timestamp}"),
    ]
    .join("\n")
}

/// Group a count into comma-separated thousands ("1234567" -> "1,234,567")
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
