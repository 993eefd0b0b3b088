use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    auth::{
        cookies::{clear_token_cookies, cookie_value, set_token_cookies, ACCESS_COOKIE, REFRESH_COOKIE},
        dto::{
            ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
            PublicUser, RegisterRequest, ResetPasswordRequest, UpdateUserRequest,
        },
        claims::TokenKind,
        extractors::CurrentUser,
        jwt::{JwtKeys, TokenPair},
        services,
    },
    error::AppError,
    extract::AppJson,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", get(logout))
        .route("/loggedin", get(logged_in))
        .route("/getuser", get(get_user))
        .route("/updateuser", patch(update_user))
        .route("/changepassword", patch(change_password))
        .route("/forgotpassword", post(forgot_password))
        .route("/resetpassword/:resetToken", put(reset_password))
}

/// Cookie lifetimes match the `exp` the keys put into each token.
fn with_tokens(state: &AppState, jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    let keys = JwtKeys::from_ref(state);
    set_token_cookies(
        jar,
        tokens,
        keys.ttl(TokenKind::Access),
        keys.ttl(TokenKind::Refresh),
        state.config.environment,
    )
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, Json<PublicUser>), AppError> {
    let session = services::register(&state, payload, OffsetDateTime::now_utc()).await?;
    let jar = with_tokens(&state, jar, &session.tokens);
    Ok((StatusCode::CREATED, jar, Json(session.user)))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<(CookieJar, Json<PublicUser>), AppError> {
    let session = services::login(&state, payload, OffsetDateTime::now_utc()).await?;
    let jar = with_tokens(&state, jar, &session.tokens);
    Ok((jar, Json(session.user)))
}

#[instrument(skip(state, jar))]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AppError> {
    let presented = cookie_value(&jar, REFRESH_COOKIE);
    let tokens = services::refresh_session(&state, presented, OffsetDateTime::now_utc()).await?;
    let jar = with_tokens(&state, jar, &tokens);
    Ok((jar, Json(MessageResponse::new("Token refreshed successfully"))))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    services::logout(&state, cookie_value(&jar, REFRESH_COOKIE)).await;
    let jar = clear_token_cookies(jar, state.config.environment);
    info!("user logged out");
    (jar, Json(MessageResponse::new("Successfully Logged Out")))
}

#[instrument(skip(state, jar))]
pub async fn logged_in(State(state): State<AppState>, jar: CookieJar) -> Json<bool> {
    Json(services::is_logged_in(&state, cookie_value(&jar, ACCESS_COOKIE)))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_user(CurrentUser(user): CurrentUser) -> Json<PublicUser> {
    Json(user)
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let updated = services::update_profile(&state, user.id, payload).await?;
    Ok(Json(updated))
}

#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::change_password(&state, user.id, payload).await?;
    Ok(Json(MessageResponse::new("Password change successful")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::forgot_password(&state, &payload.email, OffsetDateTime::now_utc()).await?;
    Ok(Json(MessageResponse::success("Reset Email Sent")))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    services::reset_password(
        &state,
        &reset_token,
        &payload.password,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(MessageResponse::new(
        "Password Reset Successful, Please Login",
    )))
}
