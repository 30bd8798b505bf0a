use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::device::{DeviceClaim, non_empty};

/// A rejected authorization attempt, as handed to a failure sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Empty when the request carried no code
    pub code: String,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub os_version: Option<String>,
    pub fingerprint: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(
        code: &str,
        claim: &DeviceClaim,
        message: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            code: code.to_string(),
            device_id: Some(claim.device_id.clone()).filter(|id| !id.is_empty()),
            device_name: non_empty(&claim.device_name),
            os_version: non_empty(&claim.os_version),
            fingerprint: non_empty(&claim.fingerprint),
            message: message.into(),
            created_at,
        }
    }
}

/// A stored failure record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedAuth {
    pub id: String,
    pub code: String,
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub os_version: Option<String>,
    pub fingerprint: Option<String>,
    pub message: String,
    pub created_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct FailedAuthQuery {
    pub limit: Option<i64>,
}

impl FailedAuthQuery {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}
