//! Tolerant decoding helpers shared by the source clients.
//!
//! The upstream payloads are loosely typed: ids arrive as numbers or strings
//! depending on endpoint version, and PULL&BEAR serializes prices as strings.

use serde::Deserialize;

/// An id field that may be serialized as a JSON number or string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum UpstreamId {
    Num(i64),
    Str(String),
}

impl UpstreamId {
    /// Canonical string form used as the color identity key.
    pub(crate) fn to_key(&self) -> String {
        match self {
            UpstreamId::Num(n) => n.to_string(),
            UpstreamId::Str(s) => s.clone(),
        }
    }
}

/// Parses the leading digit run of an upstream price string into a minor-unit
/// integer. `"7995"` and `"7995.00"` both yield `Some(7995)`; a string with no
/// leading digits yields `None`.
pub(crate) fn parse_price(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let digits = &trimmed[..end];
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_id_accepts_number_or_string() {
        let num: UpstreamId = serde_json::from_str("712").unwrap();
        assert_eq!(num.to_key(), "712");
        let text: UpstreamId = serde_json::from_str("\"712\"").unwrap();
        assert_eq!(text.to_key(), "712");
    }

    #[test]
    fn parse_price_takes_leading_digits() {
        assert_eq!(parse_price("7995"), Some(7995));
        assert_eq!(parse_price("7995.00"), Some(7995));
        assert_eq!(parse_price(" 159 TL"), Some(159));
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("free"), None);
    }
}
