//! Route handlers.

pub mod explain;
pub mod health;
pub mod tenant;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use explain_core::ExplainError;
use serde_json::{json, Value};

/// Map a pipeline error to the wire error shape.
pub(crate) fn error_response(err: ExplainError) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match &err {
        ExplainError::BadRequest(detail) | ExplainError::BadTenant(detail) => {
            json!({ "error": "bad request", "detail": detail })
        }
        other => json!({ "error": "server error", "detail": other.to_string() }),
    };
    (status, Json(body))
}

/// Unwrap a JSON body, turning extractor rejections into our error shape.
pub(crate) fn require_json(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Value, (StatusCode, Json<Value>)> {
    match body {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "bad request", "detail": rejection.body_text() })),
        )),
    }
}

/// JSON 404 for unknown routes.
pub async fn not_found() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "no route" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_shapes() {
        let (status, Json(body)) = error_response(ExplainError::bad_request("missing question"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad request");
        assert_eq!(body["detail"], "missing question");

        let (status, Json(body)) =
            error_response(ExplainError::SchemaIncomplete("no pageBuilder".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "server error");
    }
}
