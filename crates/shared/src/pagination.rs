//! Keyset cursors for change history listings.
//!
//! History is ordered by `(changed_at, id)`. A cursor names the last row a
//! client has seen, and the next page starts strictly after it.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Position in a `(changed_at, id)` ordered listing.
pub type CursorPosition = (DateTime<Utc>, i64);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Invalid cursor format")]
    InvalidFormat,
    #[error("Invalid cursor encoding")]
    InvalidEncoding,
    #[error("Invalid timestamp in cursor")]
    InvalidTimestamp,
    #[error("Invalid ID in cursor")]
    InvalidId,
}

/// Builds the opaque cursor for the row `(changed_at, id)`.
///
/// The payload is `RFC3339:id`, URL-safe base64 without padding. The timestamp
/// keeps its full sub-second precision so the decoded position compares equal
/// to the stored one.
pub fn encode_cursor(changed_at: DateTime<Utc>, id: i64) -> String {
    let raw = format!(
        "{}:{}",
        changed_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        id
    );
    URL_SAFE_NO_PAD.encode(raw)
}

/// Parses a cursor produced by [`encode_cursor`].
pub fn decode_cursor(cursor: &str) -> Result<CursorPosition, CursorError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|_| CursorError::InvalidEncoding)?;
    let raw = std::str::from_utf8(&bytes).map_err(|_| CursorError::InvalidFormat)?;

    // The timestamp itself contains colons; the id follows the last one.
    let (timestamp, id) = raw.rsplit_once(':').ok_or(CursorError::InvalidFormat)?;

    let id = id.parse::<i64>().map_err(|_| CursorError::InvalidId)?;
    let changed_at = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|_| CursorError::InvalidTimestamp)?
        .with_timezone(&Utc);

    Ok((changed_at, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn raw(payload: &str) -> String {
        URL_SAFE_NO_PAD.encode(payload)
    }

    #[test]
    fn test_cursor_points_back_at_its_row() {
        let changed_at = Utc.with_ymd_and_hms(2026, 3, 2, 8, 15, 0).unwrap();

        let cursor = encode_cursor(changed_at, 41);

        assert_eq!(decode_cursor(&cursor), Ok((changed_at, 41)));
    }

    #[test]
    fn test_nanosecond_stamps_survive() {
        let changed_at = Utc
            .with_ymd_and_hms(2026, 7, 9, 23, 59, 59)
            .unwrap()
            .with_nanosecond(123_456_789)
            .unwrap();

        let (decoded, _) = decode_cursor(&encode_cursor(changed_at, 9)).unwrap();

        assert_eq!(decoded, changed_at);
    }

    #[test]
    fn test_positions_order_like_rows() {
        let changed_at = Utc::now();
        let earlier = decode_cursor(&encode_cursor(changed_at, 7)).unwrap();
        let later = decode_cursor(&encode_cursor(changed_at, 8)).unwrap();

        assert!(earlier < later);
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(
            decode_cursor("not base64 at all!"),
            Err(CursorError::InvalidEncoding)
        );
        assert_eq!(decode_cursor(&raw("no-separator")), Err(CursorError::InvalidFormat));
        assert_eq!(
            decode_cursor(&raw("2026-03-02T08:15:00Z:forty-one")),
            Err(CursorError::InvalidId)
        );
        assert_eq!(decode_cursor(&raw("yesterday:12")), Err(CursorError::InvalidTimestamp));
    }

    #[test]
    fn test_rejects_non_utf8_payload() {
        let cursor = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0x3a, 0x31]);
        assert_eq!(decode_cursor(&cursor), Err(CursorError::InvalidFormat));
    }

    #[test]
    fn test_cursor_is_query_safe() {
        let cursor = encode_cursor(Utc::now(), i64::MAX);
        assert!(cursor
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
