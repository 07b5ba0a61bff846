//! Field-by-field comparison of a stored device against a new report.

use crate::models::Fingerprint;

/// Outcome of comparing the stored fingerprint with an incoming one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintDiff {
    Identical,
    /// The incoming fingerprint replaces the stored one wholesale; `fields`
    /// names what differed.
    Changed {
        fields: Vec<&'static str>,
        incoming: Fingerprint,
    },
}

impl FingerprintDiff {
    pub fn is_identical(&self) -> bool {
        matches!(self, FingerprintDiff::Identical)
    }
}

/// Exact string equality on every tracked field, no case folding.
pub fn diff(current: &Fingerprint, incoming: &Fingerprint) -> FingerprintDiff {
    let checks: [(&'static str, bool); 10] = [
        ("name", current.name == incoming.name),
        ("cpu", current.cpu == incoming.cpu),
        ("ram", current.ram == incoming.ram),
        ("disk", current.disk == incoming.disk),
        ("sn", current.sn == incoming.sn),
        ("mac", current.mac == incoming.mac),
        ("ip", current.ip == incoming.ip),
        ("up_ver", current.up_ver == incoming.up_ver),
        ("comment", current.comment == incoming.comment),
        ("network", current.network == incoming.network),
    ];

    let fields: Vec<&'static str> = checks
        .iter()
        .filter(|(_, same)| !same)
        .map(|(name, _)| *name)
        .collect();

    if fields.is_empty() {
        FingerprintDiff::Identical
    } else {
        FingerprintDiff::Changed {
            fields,
            incoming: incoming.clone(),
        }
    }
}
