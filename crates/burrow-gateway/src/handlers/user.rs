use crate::error::Result;
use crate::model::UserUrl;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use burrow_core::{Listing, OwnerId};

/// `GET /api/user/urls` lists the caller's URLs, `204` when there are none.
pub async fn list_user_urls_handler(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Response> {
    match state.shortener().list_by_owner(&owner).await? {
        Listing::Empty => Ok(StatusCode::NO_CONTENT.into_response()),
        Listing::Urls(pairs) => {
            let urls: Vec<UserUrl> = pairs
                .into_iter()
                .map(|pair| UserUrl {
                    short_url: state.short_url(&pair.short_id),
                    original_url: pair.original_url,
                })
                .collect();
            Ok(Json(urls).into_response())
        }
    }
}
