//! Phone number normalization.
//!
//! The service accepts numbers however users paste them -- `077 123 4567`,
//! `+94771234567`, `771234567` -- and normalizes them to the bare
//! country-code-prefixed form WhatsApp JIDs are built from.

/// Normalize a free-form phone string to the local convention.
///
/// Strips all non-digit characters, then:
/// - a leading `0` is replaced with the country code,
/// - an exactly-9-digit bare number gets the country code prepended,
/// - anything else is returned as the cleaned digits, unchanged.
///
/// Best-effort by design: no length or prefix validation beyond the above,
/// and idempotent for already-prefixed numbers.
pub fn format_phone_number(raw: &str, country_code: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if let Some(rest) = cleaned.strip_prefix('0') {
        return format!("{country_code}{rest}");
    }
    if cleaned.len() == 9 {
        return format!("{country_code}{cleaned}");
    }
    cleaned
}

/// Build a WhatsApp JID string from a normalized number.
pub fn to_jid(number: &str) -> String {
    format!("{number}@s.whatsapp.net")
}
