use axum::{extract::State, routing::post, Json, Router};
use tracing::{error, info, instrument};

use crate::{
    auth::{
        dto::{ContactRequest, MessageResponse},
        extractors::CurrentUser,
    },
    error::AppError,
    extract::AppJson,
    mail::contact_email,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(contact_us))
}

/// Forwards a signed-in user's message to the site mailbox, reply-to the user.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn contact_us(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<ContactRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let subject = payload.subject.trim();
    let message = payload.message.trim();
    if subject.is_empty() || message.is_empty() {
        return Err(AppError::validation("Please add subject and message"));
    }

    let site = &state.config.mail.sender;
    let email = contact_email(site, &user.name, &user.email, subject, message);
    state.mailer.send(&email).await.map_err(|e| {
        error!(error = %e, "contact email failed");
        AppError::EmailDelivery(e)
    })?;

    info!("contact message sent");
    Ok(Json(MessageResponse::success("Email Sent")))
}
