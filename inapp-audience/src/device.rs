//! Device state snapshot and test-device identifiers.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Snapshot of the device attributes an audience can target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceState {
    /// User-visible notifications are allowed.
    pub notifications_opted_in: bool,
    /// Location permission granted and updates enabled.
    pub location_opted_in: bool,
    /// Preferred locales, most preferred first (`en-US`, `fr`).
    pub locales: Vec<String>,
    /// Numeric application version code.
    pub app_version_code: i64,
    /// Application version name (`4.2.1`, `1.0-SNAPSHOT`).
    pub app_version_name: Option<String>,
    /// Tags set locally on the device.
    pub tags: BTreeSet<String>,
    /// Channel identifier, once the device has registered.
    pub channel_id: Option<String>,
}

/// First 16 bytes of the SHA-256 digest of a channel identifier.
#[must_use]
pub fn test_device_digest(channel_id: &str) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(channel_id.as_bytes());
    let hash = hasher.finalize();

    let mut digest = [0u8; 16];
    digest.copy_from_slice(&hash[..16]);
    digest
}

/// Base64 form of [`test_device_digest`], as listed in `test_devices`.
#[must_use]
pub fn test_device_id(channel_id: &str) -> String {
    BASE64.encode(test_device_digest(channel_id))
}

/// Returns true if the channel's digest appears in the allowlist.
///
/// Entries that are not valid base64 never match.
pub(crate) fn is_test_device(test_devices: &[String], channel_id: Option<&str>) -> bool {
    let Some(channel_id) = channel_id else {
        return false;
    };
    let digest = test_device_digest(channel_id);

    test_devices.iter().any(|entry| {
        BASE64
            .decode(entry.trim())
            .is_ok_and(|decoded| decoded.as_slice() == digest.as_slice())
    })
}
