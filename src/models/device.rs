/// Identifying attributes presented by a device trying to use a license code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceClaim {
    pub device_id: String,
    pub device_name: Option<String>,
    pub os_version: Option<String>,
    pub fingerprint: Option<String>,
}

impl DeviceClaim {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn with_os_version(mut self, os_version: impl Into<String>) -> Self {
        self.os_version = Some(os_version.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Empty optional attributes mean "not provided".
    pub fn normalized(&self) -> Self {
        Self {
            device_id: self.device_id.clone(),
            device_name: non_empty(&self.device_name),
            os_version: non_empty(&self.os_version),
            fingerprint: non_empty(&self.fingerprint),
        }
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(String::from)
}
