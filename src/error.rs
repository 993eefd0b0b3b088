use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::{
    auth::{jwt::TokenError, password::PasswordHashError, repo::StoreError},
    mail::MailError,
    state::AppState,
};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    /// Same message whether the email is unknown or the password is wrong.
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Email not sent, please try again")]
    EmailDelivery(#[source] MailError),
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidCredentials => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::EmailDelivery(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Cause chain, only ever shown outside production.
    fn detail(&self) -> String {
        match self {
            AppError::Internal(e) => format!("{e:?}"),
            AppError::EmailDelivery(e) => format!("{self}: {e}"),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => {
                AppError::validation("Email has already been registered")
            }
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AppError::unauthorized("Token expired, please login again"),
            TokenError::Invalid => AppError::unauthorized("Invalid token, please login again"),
            signing @ TokenError::Signing(_) => AppError::Internal(signing.into()),
        }
    }
}

impl From<PasswordHashError> for AppError {
    fn from(e: PasswordHashError) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Attached to error responses so the formatter layer can enrich them.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub detail: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!(error = %self.detail(), "request failed");
        } else {
            warn!(%status, %message, "request rejected");
        }

        let report = ErrorReport {
            message: message.clone(),
            detail: self.detail(),
        };
        let mut response = (status, Json(json!({ "message": message }))).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// The one place error bodies are shaped: `{"message"}` in production,
/// `{"message", "stack"}` everywhere else.
pub async fn format_error_response(State(state): State<AppState>, response: Response) -> Response {
    if state.config.environment.is_production() {
        return response;
    }
    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };
    let (mut parts, _) = response.into_parts();
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    let body = Json(json!({
        "message": report.message,
        "stack": report.detail,
    }));
    (parts, body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(AppError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_hide_cause_in_message() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused"));
        assert_eq!(err.to_string(), "Internal server error");
        assert!(err.detail().contains("connection refused"));
    }

    #[test]
    fn duplicate_email_maps_to_validation() {
        let err: AppError = StoreError::DuplicateEmail.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Email has already been registered");
    }

    #[test]
    fn hashing_failures_are_internal() {
        let hash_err = crate::auth::password::verify_password("x", "not-a-phc-string").unwrap_err();
        let err: AppError = StoreError::from(hash_err).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn token_errors_distinguish_expiry() {
        assert_eq!(
            AppError::from(TokenError::Expired).to_string(),
            "Token expired, please login again"
        );
        assert_eq!(
            AppError::from(TokenError::Invalid).to_string(),
            "Invalid token, please login again"
        );
        assert_eq!(AppError::from(TokenError::Invalid).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn response_carries_report_extension() {
        let res = AppError::not_found("Invalid or Expired Token").into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let report = res.extensions().get::<ErrorReport>().expect("report attached");
        assert_eq!(report.message, "Invalid or Expired Token");
    }
}
