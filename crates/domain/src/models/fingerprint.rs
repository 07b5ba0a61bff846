//! Fingerprint domain model.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Names of every tracked fingerprint field, in storage column order.
pub const FIELD_NAMES: [&str; 10] = [
    "name", "cpu", "ram", "disk", "sn", "mac", "ip", "up_ver", "comment", "network",
];

/// A device's self-reported identity and hardware description.
///
/// `mac` and `sn` are the identity fields; everything else is descriptive.
/// `network` is genuinely optional: `None` means the client did not report it,
/// which is not the same as reporting an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub name: String,
    pub cpu: String,
    pub ram: String,
    pub disk: String,
    pub sn: String,
    pub mac: String,
    pub ip: String,
    pub up_ver: String,
    pub comment: String,
    pub network: Option<String>,
}

impl Fingerprint {
    /// Identity keys usable for matching. Empty identity values are skipped,
    /// so two blank serial numbers never refer to the same device.
    ///
    /// Keys come back sorted, which is the order locks must be taken in.
    pub fn identity_keys(&self) -> Vec<IdentityKey> {
        let mut keys = Vec::with_capacity(2);
        if !self.mac.is_empty() {
            keys.push(IdentityKey::Mac(self.mac.clone()));
        }
        if !self.sn.is_empty() {
            keys.push(IdentityKey::Serial(self.sn.clone()));
        }
        keys.sort();
        keys
    }

    /// Whether the fingerprint carries any identity value at all.
    pub fn has_identity(&self) -> bool {
        !self.mac.is_empty() || !self.sn.is_empty()
    }
}

/// A single identity value a device can be matched by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IdentityKey {
    Mac(String),
    Serial(String),
}

impl IdentityKey {
    /// Stable string form used as the lock key.
    pub fn lock_key(&self) -> String {
        match self {
            IdentityKey::Mac(mac) => format!("mac:{}", mac),
            IdentityKey::Serial(sn) => format!("sn:{}", sn),
        }
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.lock_key())
    }
}

/// Request payload for a fingerprint submission.
///
/// Keys follow what deployed clients send (`Name`, `CPU`, `MAC`, `up_ver`, ...);
/// lower-case aliases are accepted too. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SubmitFingerprintRequest {
    #[serde(default, rename = "Name", alias = "name")]
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: Option<String>,

    #[serde(default, rename = "CPU", alias = "cpu")]
    #[validate(length(max = 255, message = "CPU must be at most 255 characters"))]
    pub cpu: Option<String>,

    #[serde(default, rename = "RAM", alias = "ram")]
    #[validate(length(max = 255, message = "RAM must be at most 255 characters"))]
    pub ram: Option<String>,

    #[serde(default, rename = "Disk", alias = "disk")]
    #[validate(length(max = 255, message = "Disk must be at most 255 characters"))]
    pub disk: Option<String>,

    #[serde(default, rename = "SN", alias = "sn")]
    #[validate(length(max = 255, message = "SN must be at most 255 characters"))]
    pub sn: Option<String>,

    #[serde(default, rename = "MAC", alias = "mac")]
    #[validate(length(max = 255, message = "MAC must be at most 255 characters"))]
    pub mac: Option<String>,

    #[serde(default, rename = "IP", alias = "ip")]
    #[validate(length(max = 255, message = "IP must be at most 255 characters"))]
    pub ip: Option<String>,

    #[serde(default, alias = "UpVer")]
    #[validate(length(max = 255, message = "up_ver must be at most 255 characters"))]
    pub up_ver: Option<String>,

    #[serde(default, alias = "Comment")]
    #[validate(length(max = 65535, message = "comment must be at most 65535 characters"))]
    pub comment: Option<String>,

    #[serde(default, rename = "Network", alias = "network")]
    #[validate(length(max = 255, message = "Network must be at most 255 characters"))]
    pub network: Option<String>,
}

impl From<SubmitFingerprintRequest> for Fingerprint {
    fn from(request: SubmitFingerprintRequest) -> Self {
        Self {
            name: request.name.unwrap_or_default(),
            cpu: request.cpu.unwrap_or_default(),
            ram: request.ram.unwrap_or_default(),
            disk: request.disk.unwrap_or_default(),
            sn: request.sn.unwrap_or_default(),
            mac: request.mac.unwrap_or_default(),
            ip: request.ip.unwrap_or_default(),
            up_ver: request.up_ver.unwrap_or_default(),
            comment: request.comment.unwrap_or_default(),
            network: request.network,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(mac: &str, sn: &str) -> Fingerprint {
        Fingerprint {
            mac: mac.to_string(),
            sn: sn.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_identity_keys_skip_empty_values() {
        assert!(fingerprint("", "").identity_keys().is_empty());
        assert_eq!(
            fingerprint("aabb.ccdd.eeff", "").identity_keys(),
            vec![IdentityKey::Mac("aabb.ccdd.eeff".to_string())]
        );
        assert_eq!(
            fingerprint("", "SN123").identity_keys(),
            vec![IdentityKey::Serial("SN123".to_string())]
        );
    }

    #[test]
    fn test_identity_keys_sorted() {
        let keys = fingerprint("aabb.ccdd.eeff", "SN123").identity_keys();
        assert_eq!(keys.len(), 2);
        assert!(keys[0] < keys[1]);
    }

    #[test]
    fn test_has_identity() {
        assert!(!fingerprint("", "").has_identity());
        assert!(fingerprint("x", "").has_identity());
        assert!(fingerprint("", "y").has_identity());
    }

    #[test]
    fn test_lock_key_format() {
        assert_eq!(
            IdentityKey::Mac("aabb.ccdd.eeff".into()).lock_key(),
            "mac:aabb.ccdd.eeff"
        );
        assert_eq!(IdentityKey::Serial("SN1".into()).lock_key(), "sn:SN1");
    }

    #[test]
    fn test_request_accepts_client_keys() {
        let json = r#"{
            "Name": "host-01", "CPU": "Xeon", "RAM": "16GB", "Disk": "512GB",
            "SN": "SN123", "MAC": "AA:BB:CC:DD:EE:FF", "IP": "10.0.0.5",
            "up_ver": "1.2.0", "comment": "rack 4", "Network": "ethernet"
        }"#;
        let request: SubmitFingerprintRequest = serde_json::from_str(json).unwrap();
        let fp: Fingerprint = request.into();

        assert_eq!(fp.name, "host-01");
        assert_eq!(fp.mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(fp.up_ver, "1.2.0");
        assert_eq!(fp.network.as_deref(), Some("ethernet"));
    }

    #[test]
    fn test_request_accepts_lowercase_aliases() {
        let json = r#"{"name": "host-02", "mac": "aabbccddeeff", "sn": "X1"}"#;
        let request: SubmitFingerprintRequest = serde_json::from_str(json).unwrap();
        let fp: Fingerprint = request.into();

        assert_eq!(fp.name, "host-02");
        assert_eq!(fp.mac, "aabbccddeeff");
        assert_eq!(fp.sn, "X1");
    }

    #[test]
    fn test_missing_fields_default_to_empty_and_network_absent() {
        let request: SubmitFingerprintRequest = serde_json::from_str("{}").unwrap();
        let fp: Fingerprint = request.into();

        assert_eq!(fp, Fingerprint::default());
        assert!(fp.network.is_none());
    }

    #[test]
    fn test_null_network_is_absent_but_empty_network_is_kept() {
        let absent: SubmitFingerprintRequest =
            serde_json::from_str(r#"{"Network": null}"#).unwrap();
        let empty: SubmitFingerprintRequest =
            serde_json::from_str(r#"{"Network": ""}"#).unwrap();

        assert_eq!(Fingerprint::from(absent).network, None);
        assert_eq!(Fingerprint::from(empty).network, Some(String::new()));
    }

    #[test]
    fn test_request_validation_rejects_oversized_fields() {
        let request = SubmitFingerprintRequest {
            name: Some("x".repeat(256)),
            ..Default::default()
        };
        assert!(request.validate().is_err());

        let request = SubmitFingerprintRequest {
            name: Some("x".repeat(255)),
            comment: Some("y".repeat(1000)),
            ..Default::default()
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_validation_accepts_line_endings_in_identity() {
        // Collectors often pipe command output straight into these fields.
        let request = SubmitFingerprintRequest {
            mac: Some("AA:BB:CC:DD:EE:FF\n".to_string()),
            sn: Some("SN-1\r\n".to_string()),
            ..Default::default()
        };
        assert!(request.validate().is_ok());

        let fingerprint = crate::services::normalizer::normalize(Fingerprint::from(request));
        assert_eq!(fingerprint.mac, "aabb.ccdd.eeff");
        assert_eq!(fingerprint.sn, "SN-1");
    }
}
