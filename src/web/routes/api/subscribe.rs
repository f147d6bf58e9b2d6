use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, Uri},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn, Span};

use crate::{
    contact_store::{self, ContactRecord},
    email_client::{self, OutgoingEmail},
    web::{
        types::{email_field, DataParsingError, RequestOrigin, ValidEmail, WORDMARK_PATH},
        WebResult,
    },
    AppState,
};

pub const CONFIRMATION_SUBJECT: &str = "Blow";

// ###################################
// ->   ERROR
// ###################################
#[derive(Debug, thiserror::Error)]
pub enum SubscribeError {
    #[error("request body could not be read: {0}")]
    UnreadableBody(#[source] BytesRejection),
    #[error("request body is not valid json: {0}")]
    MalformedBody(#[source] serde_json::Error),
    #[error("request body is json null")]
    NullBody,
    #[error("data parsing error: {0}")]
    DataParsing(#[from] DataParsingError),

    #[error("failed to save subscription: {0}")]
    Persistence(#[source] contact_store::Error),
    #[error("failed to send confirmation email: {0}")]
    Delivery(#[source] email_client::Error),
    #[error("failed to render confirmation email: {0}")]
    Render(#[from] tera::Error),
}

/// Outcome of adding the subscriber to the audience.
/// Enrollment is optional, none of these stop the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enrollment {
    Enrolled,
    /// No audience is configured.
    Skipped,
    Failed,
}

// ###################################
// ->   API
// ###################################
/// Validates the email, stores it, enrolls it in the audience and sends a confirmation email.
///
/// Storing and sending are required steps, a failure aborts the request with an error.
/// Enrollment only logs its failures.
#[tracing::instrument(
    name = "Subscribing to the list",
    skip_all,
    fields(subscriber_email = tracing::field::Empty)
)]
pub async fn subscribe(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: Result<Bytes, BytesRejection>,
) -> WebResult<Json<Value>> {
    let body = body.map_err(SubscribeError::UnreadableBody)?;
    let body: Value = serde_json::from_slice(&body).map_err(SubscribeError::MalformedBody)?;
    if body.is_null() {
        return Err(SubscribeError::NullBody.into());
    }
    let email = email_field(&body).map_err(SubscribeError::DataParsing)?;
    let email = ValidEmail::parse(email).map_err(SubscribeError::DataParsing)?;
    Span::current().record("subscriber_email", email.as_ref());

    let record = ContactRecord::new(&email, Utc::now());
    app_state
        .contact_store
        .upsert(&record)
        .await
        .map_err(SubscribeError::Persistence)?;

    let enrollment = enroll(&app_state, &email).await;
    debug!(?enrollment, "audience enrollment done");

    let trust_forwarded = app_state.settings.trust_forwarded_headers;
    let wordmark_url = RequestOrigin::from_request(&headers, &uri, trust_forwarded)
        .map(|origin| origin.asset_url(WORDMARK_PATH))
        .unwrap_or_else(|| {
            let base_url = app_state.settings.base_url.trim_end_matches('/');
            format!("{base_url}/{WORDMARK_PATH}")
        });
    send_confirmation_email(&app_state, &email, &wordmark_url).await?;

    info!("New subscriber successfully added to the list.");

    Ok(Json(json!({ "success": true })))
}

// ###################################
// ->   HELPERS
// ###################################
async fn enroll(app_state: &AppState, email: &ValidEmail) -> Enrollment {
    let Some(audience_id) = app_state.settings.audience_id.as_deref() else {
        return Enrollment::Skipped;
    };

    match app_state.audience.add_contact(audience_id, email).await {
        Ok(()) => Enrollment::Enrolled,
        Err(er) => {
            // The provider key may not be allowed to manage audiences.
            warn!(error = %er, audience_id, "failed to add contact to audience, continuing");
            Enrollment::Failed
        }
    }
}

#[tracing::instrument(name = "Sending confirmation email", skip(app_state, email))]
async fn send_confirmation_email(
    app_state: &AppState,
    email: &ValidEmail,
    wordmark_url: &str,
) -> Result<(), SubscribeError> {
    let (html, text) = app_state
        .templ_mgr
        .render_confirmation(wordmark_url, app_state.settings.send_html)?;

    let outgoing = OutgoingEmail {
        to: email,
        subject: CONFIRMATION_SUBJECT,
        text: &text,
        html: html.as_deref(),
    };

    app_state
        .email_delivery
        .send_email(&outgoing)
        .await
        .map_err(SubscribeError::Delivery)
}
