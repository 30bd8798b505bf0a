//! Device binding authorization.
//!
//! [`Authorizer::authorize`] decides whether a device may use a license code,
//! binds new devices when there is capacity, and reports every rejection to a
//! [`FailureSink`] exactly once.
//!
//! # Concurrency
//!
//! The fetch-decide-update sequence is serialized per code through a
//! compare-and-swap on the record's `version`: [`LicenseStore::update`] only
//! applies when the record still carries the version the decision was computed
//! from. On conflict the record is fetched again and the decision recomputed,
//! so two devices racing for the last slot cannot both bind.

mod memory;
pub mod policy;

pub use memory::{MemoryFailureLog, MemoryLicenseStore};
pub use policy::Decision;

use std::sync::Arc;

use serde::Serialize;
use strum::AsRefStr;
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::error::StorageError;
use crate::models::{BindingPatch, DeviceClaim, FailureRecord, LicenseRecord, LicenseView};

/// How many times a bind is recomputed after losing a compare-and-swap race.
///
/// Each lost race means another binder committed in between, so running out of
/// attempts takes at least this many concurrent writers to the same code within
/// one request. The caller then sees `StorageError::Conflict`, not a rejection.
pub const MAX_BIND_ATTEMPTS: u32 = 5;

/// Why a claim was turned away. The message is what lands in the failure log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, AsRefStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("code and device id required")]
    MissingInput,
    #[error("invalid code")]
    InvalidCode,
    #[error("code expired")]
    CodeExpired,
    #[error("device id mismatch")]
    DeviceIdMismatch,
    #[error("device info mismatch")]
    DeviceInfoMismatch,
    #[error("device limit reached")]
    DeviceLimitReached,
}

impl RejectReason {
    /// Caller-fixable input problems, as opposed to policy rejections.
    pub fn is_validation(&self) -> bool {
        matches!(self, RejectReason::MissingInput)
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(RejectReason),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type AuthResult = Result<LicenseView, AuthError>;

/// Lookup and compare-and-swap update of license records.
pub trait LicenseStore {
    fn find(&self, code: &str) -> Result<Option<LicenseRecord>, StorageError>;

    /// Replace the binding state of `code` if its version is still
    /// `expected_version`. Returns `None` when the version moved on (or the
    /// record disappeared) and the caller must decide again.
    fn update(
        &self,
        code: &str,
        expected_version: i64,
        patch: &BindingPatch,
    ) -> Result<Option<LicenseRecord>, StorageError>;
}

/// Append-only destination for rejected attempts.
pub trait FailureSink {
    fn append(&self, record: &FailureRecord) -> Result<(), StorageError>;
}

impl<T: LicenseStore + ?Sized> LicenseStore for &T {
    fn find(&self, code: &str) -> Result<Option<LicenseRecord>, StorageError> {
        (**self).find(code)
    }

    fn update(
        &self,
        code: &str,
        expected_version: i64,
        patch: &BindingPatch,
    ) -> Result<Option<LicenseRecord>, StorageError> {
        (**self).update(code, expected_version, patch)
    }
}

impl<T: LicenseStore + ?Sized> LicenseStore for Arc<T> {
    fn find(&self, code: &str) -> Result<Option<LicenseRecord>, StorageError> {
        (**self).find(code)
    }

    fn update(
        &self,
        code: &str,
        expected_version: i64,
        patch: &BindingPatch,
    ) -> Result<Option<LicenseRecord>, StorageError> {
        (**self).update(code, expected_version, patch)
    }
}

impl<T: FailureSink + ?Sized> FailureSink for &T {
    fn append(&self, record: &FailureRecord) -> Result<(), StorageError> {
        (**self).append(record)
    }
}

impl<T: FailureSink + ?Sized> FailureSink for Arc<T> {
    fn append(&self, record: &FailureRecord) -> Result<(), StorageError> {
        (**self).append(record)
    }
}

pub struct Authorizer<S, F, C = SystemClock> {
    store: S,
    failures: F,
    clock: C,
}

impl<S: LicenseStore, F: FailureSink> Authorizer<S, F> {
    pub fn new(store: S, failures: F) -> Self {
        Self::with_clock(store, failures, SystemClock)
    }
}

impl<S: LicenseStore, F: FailureSink, C: Clock> Authorizer<S, F, C> {
    pub fn with_clock(store: S, failures: F, clock: C) -> Self {
        Self {
            store,
            failures,
            clock,
        }
    }

    pub fn authorize(&self, code: &str, claim: &DeviceClaim) -> AuthResult {
        let claim = claim.normalized();

        if code.is_empty() || claim.device_id.is_empty() {
            return Err(self.reject(code, &claim, RejectReason::MissingInput));
        }

        for attempt in 1..=MAX_BIND_ATTEMPTS {
            let Some(record) = self.store.find(code)? else {
                return Err(self.reject(code, &claim, RejectReason::InvalidCode));
            };

            let patch = match policy::evaluate(&record, &claim, self.clock.now_utc()) {
                Decision::Allow => return Ok(record.view()),
                Decision::Reject(reason) => return Err(self.reject(code, &claim, reason)),
                Decision::Bind(patch) => patch,
            };

            match self.store.update(code, record.version, &patch)? {
                Some(updated) => {
                    tracing::info!(
                        code,
                        device_id = %claim.device_id,
                        bound = updated.devices.len(),
                        max_devices = updated.max_devices,
                        "bound device to license"
                    );
                    return Ok(updated.view());
                }
                None => {
                    tracing::debug!(code, attempt, "license changed during bind, retrying");
                }
            }
        }

        Err(StorageError::Conflict {
            code: code.to_string(),
            attempts: MAX_BIND_ATTEMPTS,
        }
        .into())
    }

    /// Record the rejection and build the error. Every rejection path goes
    /// through here so each failed call logs exactly once.
    fn reject(&self, code: &str, claim: &DeviceClaim, reason: RejectReason) -> AuthError {
        let record = FailureRecord::new(code, claim, reason.to_string(), self.clock.now_utc());

        if let Err(e) = self.failures.append(&record) {
            tracing::error!(
                code,
                reason = reason.as_ref(),
                error = %e,
                "failed to record authorization failure"
            );
        }

        tracing::debug!(
            code,
            device_id = %claim.device_id,
            reason = reason.as_ref(),
            "authorization rejected"
        );
        AuthError::Rejected(reason)
    }
}
