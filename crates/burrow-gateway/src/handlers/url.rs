use crate::error::{AppError, Result};
use crate::model::{BatchResponseItem, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Extension, Json};
use burrow_core::{BatchItem, OwnerId, ShortId, Shortened};
use tracing::debug;

fn status_for(shortened: &Shortened) -> StatusCode {
    if shortened.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    }
}

/// `POST /` with the URL as the plain-text body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    body: String,
) -> Result<Response> {
    if body.is_empty() {
        return Err(AppError::BadRequest("empty request body".to_string()));
    }

    let shortened = state.shortener().shorten(&body, &owner).await?;
    let short_url = state.short_url(shortened.short_id());
    Ok((status_for(&shortened), short_url).into_response())
}

/// `POST /api/shorten` with `{"url": ...}`.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    body: Bytes,
) -> Result<Response> {
    let request: ShortenRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))?;

    let shortened = state.shortener().shorten(&request.url, &owner).await?;
    let response = ShortenResponse {
        result: state.short_url(shortened.short_id()),
    };
    Ok((status_for(&shortened), Json(response)).into_response())
}

/// `POST /api/shorten/batch` with `[{"correlation_id", "original_url"}]`.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    body: Bytes,
) -> Result<Response> {
    let items: Vec<BatchItem> = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid request body: {e}")))?;

    let entries = state.shortener().shorten_batch(items, &owner).await?;
    let response: Vec<BatchResponseItem> = entries
        .into_iter()
        .map(|entry| BatchResponseItem {
            short_url: state.short_url(&entry.short_id),
            correlation_id: entry.correlation_id,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// `GET /{id}` redirects to the original URL.
pub async fn redirect_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = ShortId::new(id);
    match state.shortener().resolve(&id).await? {
        Some(url) => {
            debug!(short_id = %id, "redirecting");
            Ok(Redirect::temporary(&url).into_response())
        }
        None => Err(AppError::BadRequest(format!("unknown short id: {id}"))),
    }
}
