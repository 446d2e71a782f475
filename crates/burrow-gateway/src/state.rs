use crate::auth::CookieSigner;
use burrow_core::{ShortId, Shortener};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    base_url: String,
    signer: CookieSigner,
}

impl AppState {
    pub fn new(
        shortener: Arc<dyn Shortener>,
        public_base_url: impl Into<String>,
        signer: CookieSigner,
    ) -> Self {
        Self {
            shortener,
            base_url: public_base_url.into().trim_end_matches('/').to_string(),
            signer,
        }
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn signer(&self) -> &CookieSigner {
        &self.signer
    }

    /// Public short URL for `id`.
    pub fn short_url(&self, id: &ShortId) -> String {
        id.to_url(&self.base_url)
    }
}
