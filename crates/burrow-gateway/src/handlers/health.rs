use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

/// `GET /ping` reports whether the record store's database is reachable.
pub async fn ping_handler(State(state): State<AppState>) -> StatusCode {
    match state.shortener().health_check().await {
        Ok(()) => StatusCode::OK,
        Err(err) => {
            warn!(error = %err, "health check failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
