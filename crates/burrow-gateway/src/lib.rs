//! HTTP gateway for the Burrow URL shortener.
//!
//! Exposes the [`burrow_core::Shortener`] workflow over axum, attributes
//! every request to an anonymous owner through a signed cookie, and holds
//! the command line configuration of the `burrow` binary.

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
mod handlers;
pub mod model;
pub mod state;

pub use app::App;
pub use auth::CookieSigner;
pub use config::{Cli, Config, StorageBackend};
pub use state::AppState;
