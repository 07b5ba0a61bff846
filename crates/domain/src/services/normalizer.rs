//! Fingerprint normalization.
//!
//! Pure data transformation: no I/O, never fails. A malformed MAC must not
//! block ingestion, so it is passed through as reported.

use crate::models::Fingerprint;

/// Number of hex digits in an EUI-48 address.
const MAC_HEX_DIGITS: usize = 12;

/// Canonicalizes a MAC address to lowercase `xxxx.xxxx.xxxx`.
///
/// Separators (`:`, `-`, `.`, or none) and any other non-hex characters are
/// dropped. When the remainder is not exactly 12 hex digits the input is
/// returned unchanged.
pub fn canonicalize_mac(raw: &str) -> String {
    let hex: String = raw
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if hex.len() != MAC_HEX_DIGITS {
        return raw.to_string();
    }

    format!("{}.{}.{}", &hex[0..4], &hex[4..8], &hex[8..12])
}

/// Produces the comparable form of a reported fingerprint.
///
/// Every field is trimmed; the MAC is then canonicalized. An absent
/// `network` stays absent.
pub fn normalize(raw: Fingerprint) -> Fingerprint {
    let trim = |s: String| s.trim().to_string();

    Fingerprint {
        name: trim(raw.name),
        cpu: trim(raw.cpu),
        ram: trim(raw.ram),
        disk: trim(raw.disk),
        sn: trim(raw.sn),
        mac: canonicalize_mac(raw.mac.trim()),
        ip: trim(raw.ip),
        up_ver: trim(raw.up_ver),
        comment: trim(raw.comment),
        network: raw.network.map(trim),
    }
}
