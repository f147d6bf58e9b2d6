use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};
use wiremock::{
    matchers::{any, method, path, query_param},
    Mock, ResponseTemplate,
};

use crate::helpers::TestApp;

const STORE_PATH: &str = "/rest/v1/subscribers";

async fn mount_store(app: &TestApp, status: u16, expect: u64) {
    Mock::given(path(STORE_PATH))
        .and(method("POST"))
        .and(query_param("on_conflict", "email"))
        .respond_with(ResponseTemplate::new(status))
        .expect(expect)
        .mount(&app.store_server)
        .await;
}

async fn mount_emails(app: &TestApp, status: u16, expect: u64) {
    Mock::given(path("/emails"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(status))
        .expect(expect)
        .mount(&app.email_server)
        .await;
}

async fn status_and_body(res: reqwest::Response) -> Result<(StatusCode, Value)> {
    let status = res.status();
    let body = res.json::<Value>().await?;
    Ok((status, body))
}

#[tokio::test]
async fn api_subscribe_ok() -> Result<()> {
    let app = TestApp::spawn().await?;
    mount_store(&app, 201, 1).await;
    mount_emails(&app, 200, 1).await;

    let start = Utc::now();
    let res = app.api_subscribe_post(&json!({ "email": "a@b.com" })).await?;
    let end = Utc::now();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()
            .get("content-type")
            .and_then(|ct| ct.to_str().ok()),
        Some("application/json")
    );
    assert_eq!(res.json::<Value>().await?, json!({ "success": true }));

    let records = TestApp::received_json(&app.store_server, STORE_PATH).await?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["email"], "a@b.com");
    let subscribed_at = records[0]["subscribed_at"]
        .as_str()
        .map(DateTime::parse_from_rfc3339)
        .expect("subscribed_at should be a string")?
        .with_timezone(&Utc);
    assert!(start <= subscribed_at && subscribed_at <= end);

    let emails = TestApp::received_json(&app.email_server, "/emails").await?;
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0]["to"], json!(["a@b.com"]));
    assert_eq!(emails[0]["subject"], "Blow");
    assert_eq!(emails[0]["from"], "Blow <hello@blow.example>");
    assert_eq!(emails[0]["text"].as_str().map(str::trim), Some("You're on the list."));
    let html = emails[0]["html"].as_str().unwrap_or_default();
    let wordmark = format!("http:&#x2F;&#x2F;{}&#x2F;wordmark.svg", app.addr);
    assert!(html.contains(&wordmark), "html: {html}");

    Ok(())
}

#[tokio::test]
async fn api_subscribe_missing_email_400() -> Result<()> {
    let app = TestApp::spawn().await?;
    mount_store(&app, 201, 0).await;
    mount_emails(&app, 200, 0).await;

    let cases = [
        (json!({}), "empty json"),
        (json!({ "name": "John Doe" }), "missing email"),
        (json!({ "email": null }), "null email"),
        (json!({ "email": 42 }), "number email"),
        (json!({ "email": ["a@b.com"] }), "array email"),
        (json!({ "email": "" }), "empty email"),
    ];

    for (body, description) in cases {
        let (status, body) = status_and_body(app.api_subscribe_post(&body).await?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{description}");
        assert_eq!(body, json!({ "error": "Email is required" }), "{description}");
    }

    Ok(())
}

#[tokio::test]
async fn api_subscribe_invalid_email_400_without_side_effects() -> Result<()> {
    let app = TestApp::spawn_with_audience(Some("aud_1")).await?;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.store_server)
        .await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let cases = [
        "not-an-email",
        "ursuladomain.com",
        "ursula@domain",
        "ursula le@guin.com",
        " a@b.com",
        "a@b@c.com",
    ];

    for email in cases {
        let (status, body) =
            status_and_body(app.api_subscribe_post(&json!({ "email": email })).await?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{email:?}");
        assert_eq!(body, json!({ "error": "Invalid email format" }), "{email:?}");
    }

    Ok(())
}

#[tokio::test]
async fn api_subscribe_malformed_json_500() -> Result<()> {
    let app = TestApp::spawn().await?;
    mount_store(&app, 201, 0).await;
    mount_emails(&app, 200, 0).await;

    for body in ["{", "email=a@b.com", "null"] {
        let (status, body) = status_and_body(app.api_subscribe_post_raw(body).await?).await?;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }

    Ok(())
}

#[tokio::test]
async fn api_subscribe_store_failure_500_and_nothing_else() -> Result<()> {
    let app = TestApp::spawn_with_audience(Some("aud_1")).await?;
    mount_store(&app, 500, 1).await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let (status, body) =
        status_and_body(app.api_subscribe_post(&json!({ "email": "a@b.com" })).await?).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to save subscription" }));

    Ok(())
}

#[tokio::test]
async fn api_subscribe_enrollment_failure_still_sends_and_succeeds() -> Result<()> {
    let app = TestApp::spawn_with_audience(Some("aud_1")).await?;
    mount_store(&app, 201, 1).await;
    Mock::given(path("/audiences/aud_1/contacts"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&app.email_server)
        .await;
    mount_emails(&app, 200, 1).await;

    let res = app.api_subscribe_post(&json!({ "email": "a@b.com" })).await?;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await?, json!({ "success": true }));

    Ok(())
}

#[tokio::test]
async fn api_subscribe_enrolls_subscribed_contact() -> Result<()> {
    let app = TestApp::spawn_with_audience(Some("aud_1")).await?;
    mount_store(&app, 201, 1).await;
    Mock::given(path("/audiences/aud_1/contacts"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&app.email_server)
        .await;
    mount_emails(&app, 200, 1).await;

    let res = app.api_subscribe_post(&json!({ "email": "a@b.com" })).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let contacts = TestApp::received_json(&app.email_server, "/audiences/aud_1/contacts").await?;
    assert_eq!(
        contacts,
        vec![json!({ "email": "a@b.com", "unsubscribed": false })]
    );

    Ok(())
}

#[tokio::test]
async fn api_subscribe_delivery_failure_500_keeps_record() -> Result<()> {
    let app = TestApp::spawn().await?;
    mount_store(&app, 201, 1).await;
    mount_emails(&app, 422, 1).await;

    let (status, body) =
        status_and_body(app.api_subscribe_post(&json!({ "email": "a@b.com" })).await?).await?;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to send confirmation email" }));

    Ok(())
}

#[tokio::test]
async fn api_subscribe_twice_upserts_twice_and_sends_twice() -> Result<()> {
    let app = TestApp::spawn().await?;
    mount_store(&app, 201, 2).await;
    mount_emails(&app, 200, 2).await;

    for _ in 0..2 {
        let res = app.api_subscribe_post(&json!({ "email": "a@b.com" })).await?;
        assert_eq!(res.status(), StatusCode::OK);
    }

    let records = TestApp::received_json(&app.store_server, STORE_PATH).await?;
    assert!(records.iter().all(|record| record["email"] == "a@b.com"));

    Ok(())
}

#[tokio::test]
async fn api_subscribe_oversized_body_500_json() -> Result<()> {
    let app = TestApp::spawn().await?;
    mount_store(&app, 201, 0).await;
    mount_emails(&app, 200, 0).await;

    let padding = "a".repeat(3 * 1024 * 1024);
    let res = app
        .api_subscribe_post(&json!({ "email": "a@b.com", "padding": padding }))
        .await?;

    assert_eq!(
        res.headers()
            .get("content-type")
            .and_then(|ct| ct.to_str().ok()),
        Some("application/json")
    );
    let (status, body) = status_and_body(res).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Internal server error" }));

    Ok(())
}

#[tokio::test]
async fn api_subscribe_ignores_forwarded_origin_by_default() -> Result<()> {
    let app = TestApp::spawn().await?;
    mount_store(&app, 201, 1).await;
    mount_emails(&app, 200, 1).await;

    let res = app
        .http_client
        .post(format!("http://{}/api/subscribe", app.addr))
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-host", "evil.example")
        .json(&json!({ "email": "a@b.com" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let emails = TestApp::received_json(&app.email_server, "/emails").await?;
    let html = emails[0]["html"].as_str().unwrap_or_default();
    assert!(!html.contains("evil.example"), "html: {html}");
    let wordmark = format!("http:&#x2F;&#x2F;{}&#x2F;wordmark.svg", app.addr);
    assert!(html.contains(&wordmark), "html: {html}");

    Ok(())
}

#[tokio::test]
async fn api_subscribe_uses_forwarded_origin_for_wordmark() -> Result<()> {
    let app = TestApp::spawn_with(|config| config.net_config.trust_forwarded_headers = true).await?;
    mount_store(&app, 201, 1).await;
    mount_emails(&app, 200, 1).await;

    let res = app
        .http_client
        .post(format!("http://{}/api/subscribe", app.addr))
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-host", "blow.example")
        .json(&json!({ "email": "a@b.com" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let emails = TestApp::received_json(&app.email_server, "/emails").await?;
    let html = emails[0]["html"].as_str().unwrap_or_default();
    assert!(html.contains("https:&#x2F;&#x2F;blow.example&#x2F;wordmark.svg"));

    Ok(())
}
