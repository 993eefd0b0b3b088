//! Outgoing mail.
//!
//! Handlers build an [`EmailMessage`] and hand it to the [`Mailer`] held in
//! the application state. Which mailer is used is decided at startup:
//! a [`RelayMailer`] when `MAIL_RELAY_URL` is configured, otherwise a
//! [`LogMailer`] that only records recipient and subject.
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),
    #[error("mail delivery disabled")]
    Disabled,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub send_to: String,
    pub sent_from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Development mailer. Bodies may carry reset links, so they are never logged.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            send_to = %message.send_to,
            subject = %message.subject,
            "mail delivery stub"
        );
        Ok(())
    }
}

/// Posts each message as JSON to an HTTP mail relay.
#[derive(Debug, Clone)]
pub struct RelayMailer {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl RelayMailer {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            token,
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let mut req = self.http.post(&self.url).json(message);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            return Err(MailError::Rejected(res.status().as_u16()));
        }
        debug!(send_to = %message.send_to, subject = %message.subject, "mail relayed");
        Ok(())
    }
}

/// Keeps every message in memory. Used with the in-memory store backend.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: bool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            failing: true,
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if self.failing {
            return Err(MailError::Disabled);
        }
        self.sent.lock().await.push(message.clone());
        Ok(())
    }
}

pub fn mailer_from_config(cfg: &MailConfig) -> std::sync::Arc<dyn Mailer> {
    match &cfg.relay_url {
        Some(url) => std::sync::Arc::new(RelayMailer::new(url.clone(), cfg.relay_token.clone())),
        None => std::sync::Arc::new(LogMailer),
    }
}

pub fn welcome_email(sender: &str, to: &str, user_name: &str, login_url: &str) -> EmailMessage {
    EmailMessage {
        subject: "Welcome to Noted!".into(),
        send_to: to.into(),
        sent_from: sender.into(),
        reply_to: None,
        html: format!(
            "<p>Hello {name},</p><p>Your Noted account is ready.</p>\
             <p><a href=\"{url}\">Log in</a></p>",
            name = escape_html(user_name),
            url = escape_html(login_url),
        ),
        text: format!("Hello {user_name},\n\nYour Noted account is ready.\nLog in: {login_url}\n"),
    }
}

pub fn password_reset_email(sender: &str, to: &str, user_name: &str, reset_url: &str) -> EmailMessage {
    EmailMessage {
        subject: "Password Reset Request".into(),
        send_to: to.into(),
        sent_from: sender.into(),
        reply_to: None,
        html: format!(
            "<p>Hello {name},</p>\
             <p>We have received a password reset request from your account. \
             If this is an error, please ignore this email.</p>\
             <p><a href=\"{url}\">Reset Password</a></p>\
             <p><strong>Notice:</strong> This link expires in 30 minutes</p>",
            name = escape_html(user_name),
            url = escape_html(reset_url),
        ),
        text: format!(
            "Hello {user_name},\n\nWe have received a password reset request from your account. \
             If this is an error, please ignore this email.\n\nReset Password: {reset_url}\n\n\
             Notice: This link expires in 30 minutes\n"
        ),
    }
}

pub fn contact_email(
    site_address: &str,
    user_name: &str,
    user_email: &str,
    subject: &str,
    message: &str,
) -> EmailMessage {
    EmailMessage {
        subject: format!("Contact Form: {subject}"),
        send_to: site_address.into(),
        sent_from: site_address.into(),
        reply_to: Some(user_email.into()),
        html: format!(
            "<p>From: {name} &lt;{email}&gt;</p><p>Subject: {subject}</p><p>{message}</p>",
            name = escape_html(user_name),
            email = escape_html(user_email),
            subject = escape_html(subject),
            message = escape_html(message),
        ),
        text: format!("From: {user_name} <{user_email}>\nSubject: {subject}\n\n{message}\n"),
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
