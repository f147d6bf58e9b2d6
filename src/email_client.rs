use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::web::types::ValidEmail;

// ###################################
// ->   TRAITS
// ###################################
/// Sends transactional emails.
#[async_trait]
pub trait EmailDelivery: Send + Sync {
    async fn send_email(&self, email: &OutgoingEmail<'_>) -> Result<()>;
}

/// Manages the membership of mailing audiences.
#[async_trait]
pub trait AudienceService: Send + Sync {
    /// Adds `email` to the audience as a subscribed contact.
    async fn add_contact(&self, audience_id: &str, email: &ValidEmail) -> Result<()>;
}

// ###################################
// ->   STRUCTS
// ###################################
#[derive(Debug)]
pub struct OutgoingEmail<'a> {
    pub to: &'a ValidEmail,
    pub subject: &'a str,
    pub text: &'a str,
    pub html: Option<&'a str>,
}

/// HTTP client for the email provider, covers both sending and audience membership.
///
/// The base `url` should not carry a path without a trailing slash, endpoints are joined onto it.
#[derive(Debug)]
pub struct EmailClient {
    pub http_client: Client,
    pub url: reqwest::Url,
    pub sender: String,
    auth_token: SecretString,
}

impl EmailClient {
    pub fn new<S: AsRef<str>>(
        url: S,
        sender: String,
        auth_token: SecretString,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let url =
            reqwest::Url::parse(url.as_ref()).map_err(|e| Error::UrlParsing(e.to_string()))?;

        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(EmailClient {
            http_client,
            url,
            sender,
            auth_token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<reqwest::Url> {
        self.url
            .join(path)
            .map_err(|e| Error::UrlParsing(e.to_string()))
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: reqwest::Url, body: &T) -> Result<()> {
        let resp = self
            .http_client
            .post(url)
            .bearer_auth(self.auth_token.expose_secret())
            .json(body)
            .send()
            .await?;

        reject_unsuccessful(resp).await
    }
}

#[async_trait]
impl EmailDelivery for EmailClient {
    #[tracing::instrument(name = "Sending email", skip_all, fields(subject = email.subject))]
    async fn send_email(&self, email: &OutgoingEmail<'_>) -> Result<()> {
        let url = self.endpoint("emails")?;

        let email_content = EmailContent {
            from: &self.sender,
            to: [email.to.as_ref()],
            subject: email.subject,
            text: email.text,
            html: email.html,
        };

        self.post_json(url, &email_content).await
    }
}

#[async_trait]
impl AudienceService for EmailClient {
    #[tracing::instrument(name = "Adding contact to audience", skip(self, email))]
    async fn add_contact(&self, audience_id: &str, email: &ValidEmail) -> Result<()> {
        let url = self.endpoint(&format!("audiences/{audience_id}/contacts"))?;

        let contact = NewContact {
            email: email.as_ref(),
            unsubscribed: false,
        };

        self.post_json(url, &contact).await
    }
}

#[derive(Serialize)]
pub struct EmailContent<'a> {
    pub from: &'a str,
    pub to: [&'a str; 1],
    pub subject: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<&'a str>,
}

#[derive(Serialize)]
pub struct NewContact<'a> {
    pub email: &'a str,
    pub unsubscribed: bool,
}

// ###################################
// ->   HELPERS
// ###################################
/// The provider reports failures as non-2xx responses with a JSON description in the body.
async fn reject_unsuccessful(resp: Response) -> Result<()> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }

    let body = resp.text().await.unwrap_or_default();
    Err(Error::Rejected {
        status: status.as_u16(),
        body,
    })
}

// ###################################
// ->   ERROR & RESULT
// ###################################
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse url: {0}")]
    UrlParsing(String),
    #[error("email provider rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
}
