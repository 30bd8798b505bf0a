use axum::extract::State;

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::models::{FailedAuth, FailedAuthQuery};

pub async fn list_failed_auths(
    State(state): State<AppState>,
    Query(query): Query<FailedAuthQuery>,
) -> Result<Json<Vec<FailedAuth>>> {
    let conn = state.failures.get()?;
    let records = queries::list_failed_auths(&conn, query.limit())?;
    Ok(Json(records))
}
