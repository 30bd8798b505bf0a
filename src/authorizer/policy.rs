//! Pure binding policy: decides what to do with a claim against one snapshot
//! of a license record. No I/O happens here.

use chrono::{DateTime, Utc};

use super::RejectReason;
use crate::models::{BindingPatch, DeviceClaim, LicenseRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Known device with consistent attributes; nothing to write.
    Allow,
    /// New binding; the patch must be applied before reporting success.
    Bind(BindingPatch),
    Reject(RejectReason),
}

/// Evaluate a normalized claim against a record snapshot.
pub fn evaluate(record: &LicenseRecord, claim: &DeviceClaim, now: DateTime<Utc>) -> Decision {
    if record.is_expired_at(now) {
        return Decision::Reject(RejectReason::CodeExpired);
    }

    if record.max_devices == 1 {
        evaluate_single_device(record, claim)
    } else {
        evaluate_multi_device(record, claim)
    }
}

fn evaluate_single_device(record: &LicenseRecord, claim: &DeviceClaim) -> Decision {
    if record.devices.is_empty() {
        return Decision::Bind(patch_with(vec![claim.device_id.clone()], claim));
    }

    // Device id mismatch wins over attribute mismatch
    if !record.devices.contains(&claim.device_id) {
        return Decision::Reject(RejectReason::DeviceIdMismatch);
    }
    if !attributes_match(record, claim) {
        return Decision::Reject(RejectReason::DeviceInfoMismatch);
    }
    Decision::Allow
}

fn evaluate_multi_device(record: &LicenseRecord, claim: &DeviceClaim) -> Decision {
    if record.devices.contains(&claim.device_id) {
        return if attributes_match(record, claim) {
            Decision::Allow
        } else {
            Decision::Reject(RejectReason::DeviceInfoMismatch)
        };
    }

    if record.devices.len() >= record.max_devices.max(0) as usize {
        return Decision::Reject(RejectReason::DeviceLimitReached);
    }

    let mut devices = record.devices.clone();
    devices.push(claim.device_id.clone());
    Decision::Bind(patch_with(devices, claim))
}

fn patch_with(devices: Vec<String>, claim: &DeviceClaim) -> BindingPatch {
    BindingPatch {
        devices,
        device_name: claim.device_name.clone(),
        os_version: claim.os_version.clone(),
        fingerprint: claim.fingerprint.clone(),
    }
}

/// Every pinned (non-empty) attribute on the record must equal the claim's value.
pub fn attributes_match(record: &LicenseRecord, claim: &DeviceClaim) -> bool {
    pinned_matches(&record.device_name, &claim.device_name)
        && pinned_matches(&record.os_version, &claim.os_version)
        && pinned_matches(&record.fingerprint, &claim.fingerprint)
}

fn pinned_matches(pinned: &Option<String>, claimed: &Option<String>) -> bool {
    match pinned.as_deref() {
        None | Some("") => true,
        Some(pinned) => claimed.as_deref() == Some(pinned),
    }
}
