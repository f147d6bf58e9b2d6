use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};

use super::{ContactRecord, ContactStore, Error, Result};

/// Contact store behind a PostgREST compatible API, upserting into `table`.
#[derive(Debug)]
pub struct RestContactStore {
    pub http_client: Client,
    pub url: reqwest::Url,
    api_key: SecretString,
}

impl RestContactStore {
    pub fn new<S: AsRef<str>>(
        project_url: S,
        table: &str,
        api_key: SecretString,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let url = reqwest::Url::parse(project_url.as_ref())
            .and_then(|url| url.join(&format!("rest/v1/{table}")))
            .map_err(|e| Error::UrlParsing(e.to_string()))?;

        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            url,
            api_key,
        })
    }
}

#[async_trait]
impl ContactStore for RestContactStore {
    #[tracing::instrument(name = "Upserting contact", skip_all)]
    async fn upsert(&self, record: &ContactRecord) -> Result<()> {
        let api_key = self.api_key.expose_secret();

        let resp = self
            .http_client
            .post(self.url.clone())
            .query(&[("on_conflict", "email")])
            .header("apikey", api_key)
            .bearer_auth(api_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record)
            .send()
            .await?;

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
}
