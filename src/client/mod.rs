//! HTTP client for the Noted API.
//!
//! Tokens live only in the client's cookie jar. Every call goes through
//! [`ApiClient::execute`], which answers a 401 by joining a single-flight
//! refresh and replaying the request once.
mod single_flight;

use std::sync::Arc;

use reqwest::{cookie::Jar, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub use single_flight::RefreshCoordinator;

use crate::auth::dto::{
    ChangePasswordRequest, ContactRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
    PublicUser, RegisterRequest, ResetPasswordRequest, UpdateUserRequest,
};

const REFRESH_PATH: &str = "/api/users/refresh";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{status}: {message}")]
    Api { status: u16, message: String },
    #[error("session expired, please login")]
    SessionExpired,
}

/// Notified once per failed refresh flight. The place to send the user back
/// to the login screen.
pub trait SessionListener: Send + Sync {
    fn session_expired(&self);
}

/// A request as seen by the retry interceptor.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    /// Set once the request has been replayed after a refresh.
    pub retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            retried: false,
        }
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    cookies: Arc<Jar>,
    refresh: Arc<RefreshCoordinator>,
    listener: Option<Arc<dyn SessionListener>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let cookies = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .cookie_provider(cookies.clone())
            .build()?;
        Ok(Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            cookies,
            refresh: Arc::new(RefreshCoordinator::new()),
            listener: None,
        })
    }

    pub fn with_listener(mut self, listener: Arc<dyn SessionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Cookie jar shared by every request of this client.
    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.cookies.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn dispatch(&self, req: &ApiRequest) -> Result<Response, ClientError> {
        let mut builder = self.http.request(req.method.clone(), self.url(&req.path));
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?)
    }

    /// Exchanges the refresh cookie for a new pair. Joins a flight already in progress.
    async fn refresh_session(&self) -> bool {
        self.refresh
            .run(|| async {
                let ok = match self.http.post(self.url(REFRESH_PATH)).send().await {
                    Ok(res) if res.status().is_success() => true,
                    Ok(res) => {
                        debug!(status = %res.status(), "refresh rejected");
                        false
                    }
                    Err(e) => {
                        warn!(error = %e, "refresh request failed");
                        false
                    }
                };
                if !ok {
                    if let Some(listener) = &self.listener {
                        listener.session_expired();
                    }
                }
                ok
            })
            .await
    }

    /// Sends `req`; a 401 triggers one refresh and one replay.
    #[tracing::instrument(skip(self, req), fields(method = %req.method, path = %req.path))]
    pub async fn execute(&self, mut req: ApiRequest) -> Result<Response, ClientError> {
        loop {
            let res = self.dispatch(&req).await?;
            if res.status() != StatusCode::UNAUTHORIZED || req.retried || req.path == REFRESH_PATH
            {
                return Ok(res);
            }
            req.retried = true;
            if !self.refresh_session().await {
                return Err(ClientError::SessionExpired);
            }
            debug!("replaying request after refresh");
        }
    }

    async fn call<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T, ClientError> {
        let res = self.execute(req).await?;
        let status = res.status();
        if !status.is_success() {
            let message = match res.json::<ErrorBody>().await {
                Ok(body) => body.message,
                Err(_) => status.to_string(),
            };
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res.json::<T>().await?)
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<PublicUser, ClientError> {
        let body = RegisterRequest {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        };
        self.call(ApiRequest::new(Method::POST, "/api/users/register").json(&body)?)
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let body = LoginRequest {
            email: email.into(),
            password: password.into(),
        };
        self.call(ApiRequest::new(Method::POST, "/api/users/login").json(&body)?)
            .await
    }

    pub async fn refresh(&self) -> Result<MessageResponse, ClientError> {
        self.call(ApiRequest::new(Method::POST, REFRESH_PATH)).await
    }

    pub async fn logout(&self) -> Result<MessageResponse, ClientError> {
        self.call(ApiRequest::new(Method::GET, "/api/users/logout"))
            .await
    }

    pub async fn logged_in(&self) -> Result<bool, ClientError> {
        self.call(ApiRequest::new(Method::GET, "/api/users/loggedin"))
            .await
    }

    pub async fn get_user(&self) -> Result<PublicUser, ClientError> {
        self.call(ApiRequest::new(Method::GET, "/api/users/getuser"))
            .await
    }

    pub async fn update_user(&self, update: &UpdateUserRequest) -> Result<PublicUser, ClientError> {
        self.call(ApiRequest::new(Method::PATCH, "/api/users/updateuser").json(update)?)
            .await
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        password: &str,
    ) -> Result<MessageResponse, ClientError> {
        let body = ChangePasswordRequest {
            old_password: old_password.into(),
            password: password.into(),
        };
        self.call(ApiRequest::new(Method::PATCH, "/api/users/changepassword").json(&body)?)
            .await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<MessageResponse, ClientError> {
        let body = ForgotPasswordRequest {
            email: email.into(),
        };
        self.call(ApiRequest::new(Method::POST, "/api/users/forgotpassword").json(&body)?)
            .await
    }

    pub async fn reset_password(
        &self,
        reset_token: &str,
        password: &str,
    ) -> Result<MessageResponse, ClientError> {
        let body = ResetPasswordRequest {
            password: password.into(),
        };
        let path = format!("/api/users/resetpassword/{reset_token}");
        self.call(ApiRequest::new(Method::PUT, path).json(&body)?)
            .await
    }

    pub async fn contact_us(
        &self,
        subject: &str,
        message: &str,
    ) -> Result<MessageResponse, ClientError> {
        let body = ContactRequest {
            subject: subject.into(),
            message: message.into(),
        };
        self.call(ApiRequest::new(Method::POST, "/api/contactus").json(&body)?)
            .await
    }
}
