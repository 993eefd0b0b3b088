#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use noted::{
    app::build_app,
    config::{AppConfig, Environment, JwtConfig, MailConfig, StoreBackend},
    mail::MemoryMailer,
    state::AppState,
};
use serde_json::Value;
use tower::ServiceExt;

pub fn config(environment: Environment) -> AppConfig {
    AppConfig {
        environment,
        store: StoreBackend::Memory,
        jwt: JwtConfig {
            access_secret: "it-access-secret".into(),
            refresh_secret: "it-refresh-secret".into(),
            issuer: "noted".into(),
            audience: "noted-users".into(),
            access_ttl_minutes: 15,
            refresh_ttl_minutes: 60 * 24 * 7,
        },
        mail: MailConfig {
            sender: "site@noted.local".into(),
            relay_url: None,
            relay_token: None,
        },
        frontend_url: "http://localhost:5173".into(),
        reset_ttl_minutes: 30,
        purge_interval_secs: 300,
        conceal_unknown_reset_email: false,
    }
}

pub struct TestApp {
    pub router: Router,
    pub mailer: Arc<MemoryMailer>,
    pub state: AppState,
}

pub fn test_app_with(config: AppConfig) -> TestApp {
    let mailer = Arc::new(MemoryMailer::new());
    let state = AppState::in_memory(config, mailer.clone());
    TestApp {
        router: build_app(state.clone()),
        mailer,
        state,
    }
}

pub fn test_app() -> TestApp {
    test_app_with(config(Environment::Development))
}

pub struct TestResponse {
    pub status: u16,
    pub set_cookies: Vec<String>,
    pub body: Value,
}

impl TestResponse {
    /// `name=value` pairs from Set-Cookie, joined for a Cookie header.
    pub fn cookie_header(&self) -> String {
        self.set_cookies
            .iter()
            .filter_map(|c| c.split(';').next())
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.set_cookies
            .iter()
            .find(|c| c.starts_with(&format!("{name}=")))
            .cloned()
    }
}

async fn into_test_response(res: Response<Body>) -> TestResponse {
    let status = res.status().as_u16();
    let set_cookies = res
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect();
    let bytes = res
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse {
        status,
        set_cookies,
        body,
    }
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    cookies: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header(header::COOKIE, cookies);
    }
    let req = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };
    let res = router.clone().oneshot(req).await.expect("oneshot");
    into_test_response(res).await
}

/// Sends `body` verbatim, with whatever content type (or none) the caller picks.
pub async fn send_raw(
    router: &Router,
    method: &str,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let req = builder.body(Body::from(body.to_string())).expect("request");
    let res = router.clone().oneshot(req).await.expect("oneshot");
    into_test_response(res).await
}

/// Pulls the raw reset token out of the last reset email.
pub async fn last_reset_token(mailer: &MemoryMailer) -> String {
    let sent = mailer.sent().await;
    let mail = sent
        .iter()
        .rev()
        .find(|m| m.subject == "Password Reset Request")
        .expect("reset email sent");
    let marker = "/resetpassword/";
    let start = mail.text.find(marker).expect("reset url") + marker.len();
    mail.text[start..]
        .split_whitespace()
        .next()
        .expect("token")
        .to_string()
}
