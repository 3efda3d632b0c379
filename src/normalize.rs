//! # Input Normalizers Module
//!
//! Canonicalizes raw admin input before it reaches the repository: prices
//! become a stable canonical decimal string (no binary-float drift, idempotent
//! redisplay), quantities become non-negative integers, and the single-shot
//! `/add` payload is split and validated in one place so the guided flow and
//! the direct command share the same rules.

use rust_decimal::Decimal;

use crate::errors::BotError;

/// Parse price text into its canonical string form.
///
/// Integral values render with no fractional part ("10", never "10.00");
/// everything else is rounded to two decimal places with trailing zeros
/// stripped. Fails on unparseable text and on values that are zero or
/// negative.
pub fn normalize_price(text: &str) -> Result<String, BotError> {
    let dec: Decimal = text
        .trim()
        .parse()
        .map_err(|_| BotError::Validation("Price must be a number".to_string()))?;
    if dec <= Decimal::ZERO {
        return Err(BotError::Validation(
            "Price must be greater than zero".to_string(),
        ));
    }
    Ok(dec.round_dp(2).normalize().to_string())
}

/// Parse quantity text into a non-negative integer.
///
/// Zero is valid and is the sentinel for "mark sold out".
pub fn parse_quantity(text: &str) -> Result<i64, BotError> {
    let quantity: i64 = text
        .trim()
        .parse()
        .map_err(|_| BotError::Validation("Quantity must be a whole number".to_string()))?;
    if quantity < 0 {
        return Err(BotError::Validation(
            "Quantity must be zero or greater".to_string(),
        ));
    }
    Ok(quantity)
}

/// Parse an offer id argument.
pub fn parse_offer_id(text: &str) -> Result<i64, BotError> {
    text.trim()
        .parse()
        .map_err(|_| BotError::Validation("Offer id must be a number".to_string()))
}

/// Validate an offer name from the guided add flow.
pub fn validate_offer_name(name: &str) -> Result<String, BotError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BotError::Validation("Name is required".to_string()));
    }
    if trimmed.len() > 255 {
        return Err(BotError::Validation(
            "Name is too long (255 characters max)".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Split and validate a single-shot `/add` payload: `name | qty | price`.
///
/// Quantity must be strictly positive here; creating an offer that is already
/// sold out is rejected.
pub fn parse_add_payload(payload: &str) -> Result<(String, i64, String), BotError> {
    let parts: Vec<&str> = payload.split('|').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(BotError::Validation(
            "Expected three values: name | quantity | price".to_string(),
        ));
    }
    let name = validate_offer_name(parts[0])?;
    let quantity = parse_quantity(parts[1])?;
    if quantity == 0 {
        return Err(BotError::Validation(
            "Quantity must be greater than zero".to_string(),
        ));
    }
    let price = normalize_price(parts[2])?;
    Ok((name, quantity, price))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_price_integral() {
        assert_eq!(normalize_price("10").unwrap(), "10");
        assert_eq!(normalize_price("10.00").unwrap(), "10");
        assert_eq!(normalize_price(" 7 ").unwrap(), "7");
    }

    #[test]
    fn test_normalize_price_rounds_to_two_places() {
        assert_eq!(normalize_price("9.999").unwrap(), "10");
        assert_eq!(normalize_price("3.456").unwrap(), "3.46");
        assert_eq!(normalize_price("0.50").unwrap(), "0.5");
    }

    #[test]
    fn test_normalize_price_idempotent() {
        for input in ["10", "9.999", "3.456", "0.50", "123.4"] {
            let once = normalize_price(input).unwrap();
            let twice = normalize_price(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn test_normalize_price_rejects_non_numbers() {
        assert!(normalize_price("abc").is_err());
        assert!(normalize_price("").is_err());
        assert!(normalize_price("12,50").is_err());
    }

    #[test]
    fn test_normalize_price_rejects_non_positive() {
        assert!(normalize_price("0").is_err());
        assert!(normalize_price("-3").is_err());
        assert!(normalize_price("0.00").is_err());
    }

    #[test]
    fn test_parse_quantity_valid() {
        assert_eq!(parse_quantity("5").unwrap(), 5);
        assert_eq!(parse_quantity("0").unwrap(), 0);
        assert_eq!(parse_quantity(" 12 ").unwrap(), 12);
    }

    #[test]
    fn test_parse_quantity_invalid() {
        assert!(parse_quantity("-1").is_err());
        assert!(parse_quantity("2.5").is_err());
        assert!(parse_quantity("five").is_err());
        assert!(parse_quantity("").is_err());
    }

    #[test]
    fn test_parse_offer_id() {
        assert_eq!(parse_offer_id("42").unwrap(), 42);
        assert!(parse_offer_id("x").is_err());
    }

    #[test]
    fn test_validate_offer_name() {
        assert_eq!(validate_offer_name("  Widget  ").unwrap(), "Widget");
        assert!(validate_offer_name("").is_err());
        assert!(validate_offer_name("   ").is_err());
        assert!(validate_offer_name(&"a".repeat(256)).is_err());
    }

    #[test]
    fn test_parse_add_payload() {
        let (name, qty, price) = parse_add_payload("Widget | 5 | 9.999").unwrap();
        assert_eq!(name, "Widget");
        assert_eq!(qty, 5);
        assert_eq!(price, "10");
    }

    #[test]
    fn test_parse_add_payload_rejects_bad_shapes() {
        assert!(parse_add_payload("Widget | 5").is_err());
        assert!(parse_add_payload(" | 5 | 10").is_err());
        assert!(parse_add_payload("Widget | 0 | 10").is_err());
        assert!(parse_add_payload("Widget | 5 | free").is_err());
    }
}
