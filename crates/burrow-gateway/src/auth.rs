//! Anonymous, cookie-based identity.
//!
//! Every request is attributed to an owner. The owner ID travels in the
//! `user_id` cookie as `<uuid>.<signature>`, where the signature is the
//! base64url HMAC-SHA256 of the UUID. A request without a valid cookie is
//! given a fresh UUID and the signed cookie is set on the response.

use crate::state::AppState;
use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use burrow_core::OwnerId;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const USER_COOKIE: &str = "user_id";

const COOKIE_MAX_AGE_SECS: u64 = 30 * 24 * 60 * 60;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
#[error("invalid cookie signing key")]
pub struct InvalidKey;

/// Signs and verifies identity cookie values.
#[derive(Clone)]
pub struct CookieSigner {
    mac: HmacSha256,
}

impl CookieSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, InvalidKey> {
        let mac = HmacSha256::new_from_slice(secret.as_ref()).map_err(|_| InvalidKey)?;
        Ok(Self { mac })
    }

    fn signature(&self, owner: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(owner.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// Returns the cookie value for `owner`.
    pub fn sign(&self, owner: &OwnerId) -> String {
        format!("{}.{}", owner, URL_SAFE.encode(self.signature(owner.as_str())))
    }

    /// Returns the owner named by a cookie value if its signature is valid.
    pub fn verify(&self, value: &str) -> Option<OwnerId> {
        let (owner, signature) = value.split_once('.')?;
        if owner.is_empty() || signature.contains('.') {
            return None;
        }

        let signature = URL_SAFE.decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(owner.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(OwnerId::new(owner))
    }
}

impl std::fmt::Debug for CookieSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieSigner").finish_non_exhaustive()
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn set_cookie_header(value: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{USER_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={COOKIE_MAX_AGE_SECS}"
    ))
    .ok()
}

/// Resolves the request's owner and stores it in the request extensions.
pub async fn identify(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let signer = state.signer();
    let known = cookie_value(req.headers(), USER_COOKIE).and_then(|value| signer.verify(value));

    let (owner, issued) = match known {
        Some(owner) => (owner, None),
        None => {
            let owner = OwnerId::new(Uuid::new_v4().to_string());
            debug!(owner = %owner, "issuing identity cookie");
            let cookie = signer.sign(&owner);
            (owner, Some(cookie))
        }
    };

    req.extensions_mut().insert(owner.clone());
    let mut response = next.run(req).await;

    let headers = response.headers_mut();
    if let Some(cookie) = issued {
        match set_cookie_header(&cookie) {
            Some(value) => {
                headers.append(SET_COOKIE, value);
            }
            None => warn!(owner = %owner, "identity cookie is not a valid header value"),
        }
    }
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {owner}")) {
        headers.insert(AUTHORIZATION, value);
    }

    response
}
