//! Tenant utility routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::routes::{error_response, require_json};
use crate::state::AppState;

/// POST `/api/resolve-tenant`: `{hostname}` → `{hostname, tenant|null}`.
pub async fn resolve_tenant(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let body = require_json(body)?;
    let hostname = body
        .get("hostname")
        .and_then(Value::as_str)
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "bad request", "detail": "hostname is required" })),
            )
        })?;

    let tenant = state
        .service
        .resolve_hostname(hostname)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "hostname": hostname, "tenant": tenant })))
}

/// POST `/api/refresh-schema`: `{tenant?}` → `{status, tenant}`.
pub async fn refresh_schema(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let body = require_json(body)?;
    let tenant = body.get("tenant").and_then(Value::as_str);

    let refreshed = state
        .service
        .refresh_schema(tenant)
        .await
        .map_err(error_response)?;

    Ok(Json(json!({ "status": "ok", "tenant": refreshed })))
}
