//! Internal helpers for model validation and conversion.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation and mapping logic so the engine enforces consistent invariants.

use chrono::{DateTime, Utc};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidInput(format!("invalid {label} id")))
}

pub(crate) fn parse_optional_uuid(value: Option<&str>, label: &str) -> ResultEngine<Option<Uuid>> {
    value.map(|v| parse_uuid(v, label)).transpose()
}

/// Trim and NFC-normalize free text typed by people, so two spellings of the
/// same name compare equal.
pub(crate) fn normalize_text(value: &str) -> String {
    value.trim().nfc().collect()
}

/// Phone numbers are compared without inner whitespace.
pub(crate) fn normalize_phone(value: &str) -> String {
    value.nfc().filter(|c| !c.is_whitespace()).collect()
}

pub(crate) fn required_text(value: &str, label: &str) -> ResultEngine<String> {
    let normalized = normalize_text(value);
    if normalized.is_empty() {
        return Err(EngineError::InvalidInput(format!("{label} must not be empty")));
    }
    Ok(normalized)
}

pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value.map(normalize_text).filter(|s| !s.is_empty())
}

/// A booking period must end strictly after it starts.
pub(crate) fn ensure_period(start: DateTime<Utc>, end: DateTime<Utc>) -> ResultEngine<()> {
    if end <= start {
        return Err(EngineError::InvalidPeriod(format!(
            "end {end} must be after start {start}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_composed_and_decomposed_names_alike() {
        // "é" precomposed vs "e" + combining acute accent.
        assert_eq!(normalize_text(" Bennani\u{e9} "), normalize_text("Bennanie\u{301}"));
        assert_eq!(normalize_phone("06 12 34 56 78"), "0612345678");
    }

    #[test]
    fn required_text_rejects_blank() {
        assert!(required_text("   ", "last name").is_err());
        assert_eq!(required_text(" Amal ", "first name").unwrap(), "Amal");
        assert_eq!(optional_text(Some("  ")), None);
    }
}
