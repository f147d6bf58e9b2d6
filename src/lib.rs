//! A "join the list" backend: validates an email, stores it, enrolls it in the mailing audience
//! and sends a confirmation email.

pub mod app;
pub mod config;
pub mod contact_store;
pub mod database;
pub mod email_client;
mod error;
pub mod templ_manager;
pub mod web;

// re-exports
pub use app::{App, AppState};
pub use email_client::EmailClient;
pub use error::{Error, Result};
pub use web::serve;

use tracing_subscriber::EnvFilter;

/// Compact, timeless output for local development. `RUST_LOG` overrides the `debug` default.
pub fn init_dbg_tracing() {
    tracing_subscriber::fmt()
        .without_time()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .compact()
        .init();
}

pub fn init_production_tracing() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
