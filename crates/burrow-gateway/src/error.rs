use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use burrow_core::ShortenerError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Shortener(#[from] ShortenerError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Shortener(
                ShortenerError::EmptyUrl
                | ShortenerError::EmptyBatch
                | ShortenerError::EmptyBatchUrl(_),
            ) => StatusCode::BAD_REQUEST,
            AppError::Shortener(ShortenerError::Storage(err)) => {
                error!(error = %err, "storage failure while handling request");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burrow_core::StorageError;

    #[test]
    fn validation_errors_are_bad_requests() {
        let response = AppError::from(ShortenerError::EmptyUrl).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = AppError::BadRequest("nope".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_errors_are_internal() {
        let err = ShortenerError::Storage(StorageError::Timeout("pool".to_string()));
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
