use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::authorizer::{AuthError, Authorizer, RejectReason};
use crate::db::{AppState, SqliteFailureLog, SqliteLicenseStore};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::{DeviceClaim, LicenseView};
use crate::util::RequestInfo;

/// Every field is optional on the wire so that missing values reach the
/// authorizer (and the failure log) instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub fingerprint: Option<String>,
}

impl AuthorizeRequest {
    pub fn claim(&self) -> DeviceClaim {
        DeviceClaim {
            device_id: self.device_id.clone().unwrap_or_default(),
            device_name: self.device_name.clone(),
            os_version: self.os_version.clone(),
            fingerprint: self.fingerprint.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AuthorizeResponse {
    fn granted(license: LicenseView) -> Self {
        Self {
            success: true,
            license: Some(license),
            reason: None,
            message: None,
        }
    }

    fn rejected(reason: RejectReason) -> Self {
        Self {
            success: false,
            license: None,
            reason: Some(reason),
            message: Some(reason.to_string()),
        }
    }
}

pub async fn authorize_device(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AuthorizeRequest>,
) -> Result<Response> {
    let code = request.code.clone().unwrap_or_default();
    let claim = request.claim();

    let conn = state.db.get()?;
    let authorizer = Authorizer::new(
        SqliteLicenseStore::new(&conn),
        SqliteFailureLog::new(state.failures.clone()),
    );

    match authorizer.authorize(&code, &claim) {
        Ok(license) => Ok(Json(AuthorizeResponse::granted(license)).into_response()),
        Err(AuthError::Rejected(reason)) => {
            let info = RequestInfo::from_headers(&headers);
            tracing::info!(
                code = %code,
                device_id = %claim.device_id,
                ip = ?info.ip,
                user_agent = ?info.user_agent,
                reason = reason.as_ref(),
                "device authorization rejected"
            );

            let status = if reason.is_validation() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::UNAUTHORIZED
            };
            Ok((status, Json(AuthorizeResponse::rejected(reason))).into_response())
        }
        Err(AuthError::Storage(e)) => Err(e.into()),
    }
}
