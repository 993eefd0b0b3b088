//! Noted: cookie-based account and session service.
//!
//! Users register and log in with email and password. A short-lived access
//! token and a rotating refresh token travel as httpOnly cookies; the
//! refresh token and password-reset grants are kept as SHA-256 digests in
//! server-side ledgers. [`client::ApiClient`] consumes the API and replays
//! requests after a single-flight refresh.
pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod contact;
pub mod error;
pub mod extract;
pub mod mail;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
