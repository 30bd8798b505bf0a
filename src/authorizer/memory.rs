//! In-memory store and failure log, for tests and embedding.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{FailureSink, LicenseStore};
use crate::error::StorageError;
use crate::models::{BindingPatch, FailureRecord, LicenseRecord};

fn poisoned(what: &str) -> StorageError {
    StorageError::Unavailable(format!("{what} lock poisoned"))
}

#[derive(Debug, Default)]
pub struct MemoryLicenseStore {
    records: RwLock<HashMap<String, LicenseRecord>>,
}

impl MemoryLicenseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an unbound license, replacing any record with the same code.
    pub fn create(
        &self,
        code: &str,
        max_devices: i32,
        expires_at: Option<DateTime<Utc>>,
    ) -> LicenseRecord {
        let now = Utc::now().timestamp();
        let record = LicenseRecord {
            id: Uuid::new_v4().to_string(),
            code: code.to_string(),
            expires_at,
            max_devices,
            devices: Vec::new(),
            device_name: None,
            os_version: None,
            fingerprint: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        self.insert(record.clone());
        record
    }

    pub fn insert(&self, record: LicenseRecord) {
        if let Ok(mut records) = self.records.write() {
            records.insert(record.code.clone(), record);
        }
    }

    pub fn get(&self, code: &str) -> Option<LicenseRecord> {
        self.records.read().ok()?.get(code).cloned()
    }
}

impl LicenseStore for MemoryLicenseStore {
    fn find(&self, code: &str) -> Result<Option<LicenseRecord>, StorageError> {
        let records = self.records.read().map_err(|_| poisoned("license store"))?;
        Ok(records.get(code).cloned())
    }

    fn update(
        &self,
        code: &str,
        expected_version: i64,
        patch: &BindingPatch,
    ) -> Result<Option<LicenseRecord>, StorageError> {
        let mut records = self.records.write().map_err(|_| poisoned("license store"))?;
        let Some(record) = records.get_mut(code) else {
            return Ok(None);
        };
        if record.version != expected_version {
            return Ok(None);
        }

        record.devices = patch.devices.clone();
        record.device_name = patch.device_name.clone();
        record.os_version = patch.os_version.clone();
        record.fingerprint = patch.fingerprint.clone();
        record.version += 1;
        record.updated_at = Utc::now().timestamp();
        Ok(Some(record.clone()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryFailureLog {
    records: Mutex<Vec<FailureRecord>>,
}

impl MemoryFailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<FailureRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FailureSink for MemoryFailureLog {
    fn append(&self, record: &FailureRecord) -> Result<(), StorageError> {
        self.records
            .lock()
            .map_err(|_| poisoned("failure log"))?
            .push(record.clone());
        Ok(())
    }
}
