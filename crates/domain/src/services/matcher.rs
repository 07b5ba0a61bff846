//! Identity matching.

use tracing::debug;

use crate::error::StoreResult;
use crate::models::{DeviceRecord, Fingerprint};
use crate::store::DeviceTransaction;

/// Looks up the device a normalized fingerprint belongs to.
///
/// Matches on non-empty `mac` or non-empty `sn`; when several devices
/// qualify, the one with the lowest id wins. Read-only.
pub async fn find_match(
    tx: &mut dyn DeviceTransaction,
    fingerprint: &Fingerprint,
) -> StoreResult<Option<DeviceRecord>> {
    if !fingerprint.has_identity() {
        debug!("Fingerprint has no identity values, treating as new device");
        return Ok(None);
    }

    let mac = Some(fingerprint.mac.as_str()).filter(|m| !m.is_empty());
    let sn = Some(fingerprint.sn.as_str()).filter(|s| !s.is_empty());

    let matched = tx.find_by_identity(mac, sn).await?;
    if let Some(device) = &matched {
        debug!(device_id = device.id, mac = ?mac, sn = ?sn, "Fingerprint matched existing device");
    }
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DeviceStore, InMemoryDeviceStore};
    use chrono::Utc;

    fn fingerprint(mac: &str, sn: &str) -> Fingerprint {
        Fingerprint {
            mac: mac.to_string(),
            sn: sn.to_string(),
            ..Default::default()
        }
    }

    async fn seeded_store(devices: &[Fingerprint]) -> InMemoryDeviceStore {
        let store = InMemoryDeviceStore::new();
        let mut tx = store.begin().await.unwrap();
        for fp in devices {
            tx.insert_device(fp, Utc::now()).await.unwrap();
        }
        tx.commit().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_match_by_mac() {
        let store = seeded_store(&[fingerprint("aabb.ccdd.eeff", "SN-1")]).await;
        let mut tx = store.begin().await.unwrap();

        let found = find_match(tx.as_mut(), &fingerprint("aabb.ccdd.eeff", ""))
            .await
            .unwrap();
        assert_eq!(found.unwrap().fingerprint.sn, "SN-1");
    }

    #[tokio::test]
    async fn test_match_by_serial_when_mac_changed() {
        let store = seeded_store(&[fingerprint("aabb.ccdd.eeff", "SN-1")]).await;
        let mut tx = store.begin().await.unwrap();

        let found = find_match(tx.as_mut(), &fingerprint("0000.1111.2222", "SN-1"))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_blank_identity_never_matches() {
        let store = seeded_store(&[fingerprint("", "")]).await;
        let mut tx = store.begin().await.unwrap();

        let found = find_match(tx.as_mut(), &fingerprint("", "")).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_blank_serial_does_not_match_other_blank_serials() {
        let store = seeded_store(&[fingerprint("aabb.ccdd.eeff", "")]).await;
        let mut tx = store.begin().await.unwrap();

        let found = find_match(tx.as_mut(), &fingerprint("0000.1111.2222", ""))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_first_match_by_id_wins() {
        let store = seeded_store(&[
            fingerprint("", "SN-1"),
            fingerprint("aabb.ccdd.eeff", ""),
        ])
        .await;
        let mut tx = store.begin().await.unwrap();

        let found = find_match(tx.as_mut(), &fingerprint("aabb.ccdd.eeff", "SN-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, 1);
    }
}
