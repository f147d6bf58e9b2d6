//! Spawns the app against mock servers for the contact store and the email provider.
use std::{net::SocketAddr, sync::OnceLock};

use anyhow::Result;
use blowlist::{
    config::{get_or_init_config, AppConfig},
    init_dbg_tracing, App,
};
use reqwest::Response;
use serde_json::Value;
use wiremock::MockServer;

pub struct TestApp {
    pub addr: SocketAddr,
    pub http_client: reqwest::Client,
    pub email_server: MockServer,
    pub store_server: MockServer,
}

/// Set `TEST_LOG` to see the app's logs while the tests run.
fn init_test_subscriber() {
    static SUBSCRIBER: OnceLock<()> = OnceLock::new();
    SUBSCRIBER.get_or_init(|| {
        if std::env::var_os("TEST_LOG").is_some() {
            init_dbg_tracing();
        }
    });
}

impl TestApp {
    /// Spawns the app without an audience configured.
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with_audience(None).await
    }

    pub async fn spawn_with_audience(audience_id: Option<&str>) -> Result<Self> {
        let audience_id = audience_id.map(str::to_string);
        Self::spawn_with(move |config| config.email_config.audience_id = audience_id).await
    }

    /// Tries to spawn a separate task to serve our app on a random port.
    /// `customize` runs last, after the config points at the mock servers.
    pub async fn spawn_with(customize: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        init_test_subscriber();

        let email_server = MockServer::start().await;
        let store_server = MockServer::start().await;

        let mut config = get_or_init_config().clone();
        // Trying to bind port 0 will trigger an OS scan for an available port
        config.net_config.host = [127, 0, 0, 1];
        config.net_config.app_port = 0;
        config.email_config.url = email_server.uri();
        config.email_config.sender_addr = "Blow <hello@blow.example>".to_string();
        config.email_config.audience_id = None;
        config.email_config.send_html = true;
        config.email_config.timeout_millis = 200;
        config.store_config.backend = blowlist::config::StoreBackend::Rest;
        config.store_config.url = store_server.uri();
        config.store_config.table = "subscribers".to_string();
        config.store_config.timeout_millis = 200;
        config.net_config.trust_forwarded_headers = false;
        customize(&mut config);

        let app = App::build_from_config(config).await?;
        let addr = app.listener.local_addr()?;

        tokio::spawn(blowlist::serve(app));

        Ok(TestApp {
            addr,
            http_client: reqwest::Client::new(),
            email_server,
            store_server,
        })
    }

    pub async fn api_subscribe_post(&self, body: &Value) -> Result<Response> {
        let res = self
            .http_client
            .post(format!("http://{}/api/subscribe", self.addr))
            .json(body)
            .send()
            .await?;
        Ok(res)
    }

    pub async fn api_subscribe_post_raw(&self, body: &'static str) -> Result<Response> {
        let res = self
            .http_client
            .post(format!("http://{}/api/subscribe", self.addr))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;
        Ok(res)
    }

    /// JSON bodies of every request the mock server at `server` received on `path`.
    pub async fn received_json(server: &MockServer, path: &str) -> Result<Vec<Value>> {
        let requests = server.received_requests().await.unwrap_or_default();
        requests
            .iter()
            .filter(|req| req.url.path() == path)
            .map(|req| -> Result<Value> { Ok(serde_json::from_slice(&req.body)?) })
            .collect()
    }
}
