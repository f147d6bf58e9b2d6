//! Persistence of subscriber contacts.
//!
//! A contact is keyed on its email, storing the same email again only moves `subscribed_at`.

mod postgres;
mod rest;

pub use postgres::PgContactStore;
pub use rest::RestContactStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::web::types::ValidEmail;

// ###################################
// ->   TRAIT
// ###################################
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Inserts the record, or overwrites `subscribed_at` if the email is already stored.
    async fn upsert(&self, record: &ContactRecord) -> Result<()>;
}

// ###################################
// ->   STRUCTS
// ###################################
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactRecord {
    pub email: String,
    pub subscribed_at: DateTime<Utc>,
}

impl ContactRecord {
    pub fn new(email: &ValidEmail, subscribed_at: DateTime<Utc>) -> Self {
        Self {
            email: email.as_ref().to_owned(),
            subscribed_at,
        }
    }
}

// ###################################
// ->   ERROR & RESULT
// ###################################
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse url: {0}")]
    UrlParsing(String),
    #[error("contact store rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}
