//! Explain route handlers: buffered and streaming.

use std::convert::Infallible;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::stream::Stream;
use futures::StreamExt;
use serde_json::{json, Value};

use explain_core::{orchestrate, ExplainResponse, SseFrame};

use crate::routes::{error_response, require_json};
use crate::state::AppState;

/// POST `/api/explain`: buffered explanation.
pub async fn explain(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ExplainResponse>, (StatusCode, Json<Value>)> {
    let body = require_json(body)?;
    let request = orchestrate::validate_request(&body).map_err(error_response)?;

    let response = state
        .service
        .explain(request)
        .await
        .map_err(error_response)?;

    Ok(Json(response))
}

/// POST `/api/explain/stream`: Server-Sent Events.
///
/// One `metadata` event, then content frames, then `done` (or `error` in
/// its place). A client that disconnects mid-stream just drops the
/// stream; nothing downstream notices.
pub async fn explain_stream(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, Json<Value>)> {
    let body = require_json(body)?;
    let request = orchestrate::validate_request(&body).map_err(error_response)?;

    let frames = state
        .service
        .explain_stream(request)
        .await
        .map_err(error_response)?;

    let events = frames.map(|frame| {
        Ok(match frame {
            SseFrame::Metadata(value) => Event::default().event("metadata").data(value.to_string()),
            SseFrame::Content(text) => Event::default().data(text),
            SseFrame::Done => Event::default().event("done").data("{}"),
            SseFrame::Error(message) => Event::default()
                .event("error")
                .data(json!({ "error": message }).to_string()),
        })
    });

    Ok(Sse::new(events))
}
