use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A license code and its device binding state.
///
/// `devices` holds the bound device ids in binding order. The three attribute
/// fields are the values captured at the most recent binding; once non-empty
/// they are pinned and must be matched by every later claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub id: String,
    pub code: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_devices: i32,
    pub devices: Vec<String>,
    pub device_name: Option<String>,
    pub os_version: Option<String>,
    pub fingerprint: Option<String>,
    /// Bumped on every write to the binding state; used for compare-and-swap.
    pub version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl LicenseRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at < now)
    }

    /// The view handed back to a device after a successful authorization.
    pub fn view(&self) -> LicenseView {
        LicenseView {
            code: self.code.clone(),
            expires_at: self.expires_at,
            max_devices: self.max_devices,
            device_name: self.device_name.clone(),
            os_version: self.os_version.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

/// Public projection of a license. Never includes the device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseView {
    pub code: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_devices: i32,
    pub device_name: Option<String>,
    pub os_version: Option<String>,
    pub fingerprint: Option<String>,
}

/// Replacement for the binding state of a license, applied atomically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingPatch {
    pub devices: Vec<String>,
    pub device_name: Option<String>,
    pub os_version: Option<String>,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateLicense {
    pub code: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_max_devices")]
    pub max_devices: i32,
}

fn default_max_devices() -> i32 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateLicense {
    /// Absent = leave unchanged, `null` = never expires
    #[serde(default, deserialize_with = "crate::util::deserialize_some")]
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub max_devices: Option<i32>,
}
