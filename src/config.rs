use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Where users and token ledgers live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Sender of outgoing mail and recipient of contact-form messages.
    pub sender: String,
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub store: StoreBackend,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub frontend_url: String,
    pub reset_ttl_minutes: i64,
    pub purge_interval_secs: u64,
    pub conceal_unknown_reset_email: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = match std::env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        let store = match std::env::var("STORE_BACKEND").as_deref() {
            Ok("memory") => StoreBackend::Memory,
            _ => StoreBackend::Postgres {
                database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            },
        };

        let jwt = JwtConfig {
            access_secret: required("JWT_SECRET")?,
            refresh_secret: required("REFRESH_TOKEN_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "noted".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "noted-users".into()),
            access_ttl_minutes: parsed_or("ACCESS_TOKEN_TTL_MINUTES", 15),
            refresh_ttl_minutes: parsed_or("REFRESH_TOKEN_TTL_MINUTES", 60 * 24 * 7),
        };
        anyhow::ensure!(
            jwt.access_secret != jwt.refresh_secret,
            "JWT_SECRET and REFRESH_TOKEN_SECRET must differ"
        );

        let mail = MailConfig {
            sender: std::env::var("EMAIL_USER").unwrap_or_else(|_| "noreply@noted.local".into()),
            relay_url: std::env::var("MAIL_RELAY_URL").ok().filter(|v| !v.is_empty()),
            relay_token: std::env::var("MAIL_RELAY_TOKEN").ok().filter(|v| !v.is_empty()),
        };

        Ok(Self {
            environment,
            store,
            jwt,
            mail,
            frontend_url: std::env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into())
                .trim_end_matches('/')
                .to_string(),
            reset_ttl_minutes: parsed_or("RESET_TOKEN_TTL_MINUTES", 30),
            purge_interval_secs: parsed_or("TOKEN_PURGE_INTERVAL_SECS", 300),
            conceal_unknown_reset_email: std::env::var("CONCEAL_UNKNOWN_RESET_EMAIL")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    let value = std::env::var(key).with_context(|| format!("{key} is not set"))?;
    anyhow::ensure!(!value.trim().is_empty(), "{key} is empty");
    Ok(value)
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
