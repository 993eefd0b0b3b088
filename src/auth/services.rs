use std::time::Duration;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use time::{Duration as TimeDuration, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    dto::{ChangePasswordRequest, LoginRequest, PublicUser, RegisterRequest, UpdateUserRequest},
    jwt::{JwtKeys, TokenPair},
    password::{hash_password, verify_password},
    repo::StoreError,
    repo_types::{NewUser, ProfileUpdate},
    tokens::{generate_reset_token, hash_token},
    validation::{is_valid_email, validate_password_strength, MAX_BIO_LEN},
};
use crate::{
    error::AppError,
    mail::{password_reset_email, welcome_email},
    state::AppState,
};

lazy_static! {
    // Verified against when the email is unknown so both login failures cost the same.
    static ref DECOY_HASH: Option<String> = hash_password("Decoy-Passw0rd").ok();
}

/// A signed-in user together with the tokens that go into cookies.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

fn after(now: OffsetDateTime, ttl: Duration) -> OffsetDateTime {
    now + TimeDuration::seconds(ttl.as_secs() as i64)
}

async fn open_session(
    state: &AppState,
    user: PublicUser,
    now: OffsetDateTime,
) -> Result<Session, AppError> {
    let keys = JwtKeys::from_ref(state);
    let tokens = keys.issue_pair(user.id)?;
    state
        .refresh_tokens
        .insert(
            user.id,
            &hash_token(&tokens.refresh),
            now,
            after(now, keys.refresh_ttl),
        )
        .await?;
    Ok(Session { user, tokens })
}

pub async fn register(
    state: &AppState,
    req: RegisterRequest,
    now: OffsetDateTime,
) -> Result<Session, AppError> {
    let name = req.name.trim().to_string();
    let email = req.email.trim().to_string();
    if name.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Please fill in all required fields"));
    }
    if !is_valid_email(&email) {
        return Err(AppError::validation("Please enter a valid email"));
    }
    validate_password_strength(&req.password)?;

    if state.users.find_by_email(&email).await?.is_some() {
        warn!("registration with an already registered email");
        return Err(AppError::validation("Email has already been registered"));
    }

    let user = state
        .users
        .create(NewUser {
            name,
            email,
            password: req.password,
        })
        .await?;
    let session = open_session(state, user.to_public(), now).await?;

    let cfg = &state.config;
    let message = welcome_email(
        &cfg.mail.sender,
        &user.email,
        &user.name,
        &format!("{}/login", cfg.frontend_url),
    );
    if let Err(e) = state.mailer.send(&message).await {
        warn!(error = %e, user_id = %user.id, "welcome email failed");
    }

    info!(user_id = %user.id, "user registered");
    Ok(session)
}

pub async fn login(
    state: &AppState,
    req: LoginRequest,
    now: OffsetDateTime,
) -> Result<Session, AppError> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Please add email and password"));
    }

    let Some(user) = state.users.find_by_email(email).await? else {
        if let Some(decoy) = DECOY_HASH.as_deref() {
            let _ = verify_password(&req.password, decoy);
        }
        warn!("login with unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&req.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with invalid password");
        return Err(AppError::InvalidCredentials);
    }

    // One live session per user: a new login revokes every earlier refresh token.
    let revoked = state.refresh_tokens.delete_for_user(user.id).await?;
    let session = open_session(state, user.to_public(), now).await?;
    info!(user_id = %user.id, revoked, "user logged in");
    Ok(session)
}

/// Exchanges a refresh token for a new pair and rotates its ledger record in place.
pub async fn refresh_session(
    state: &AppState,
    refresh_token: Option<String>,
    now: OffsetDateTime,
) -> Result<TokenPair, AppError> {
    let Some(refresh_token) = refresh_token else {
        return Err(AppError::unauthorized(
            "Refresh token not found, please login",
        ));
    };

    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify_refresh(&refresh_token).map_err(|e| {
        warn!(error = %e, "refresh token rejected");
        AppError::unauthorized("Invalid refresh token, please login")
    })?;

    let Some(record) = state
        .refresh_tokens
        .find_active(claims.sub, &hash_token(&refresh_token), now)
        .await?
    else {
        warn!(user_id = %claims.sub, "refresh token not in ledger");
        return Err(AppError::unauthorized("Invalid or expired refresh token"));
    };

    let tokens = keys.issue_pair(claims.sub)?;
    let rotated = state
        .refresh_tokens
        .rotate(
            record.id,
            &hash_token(&tokens.refresh),
            now,
            after(now, keys.refresh_ttl),
        )
        .await?;
    if !rotated {
        // revoked between lookup and rotation
        warn!(user_id = %claims.sub, "refresh record vanished during rotation");
        return Err(AppError::unauthorized("Invalid or expired refresh token"));
    }

    debug!(user_id = %claims.sub, "refresh token rotated");
    Ok(tokens)
}

/// Best-effort revocation. Never fails: cookies are cleared regardless.
pub async fn logout(state: &AppState, refresh_token: Option<String>) {
    let Some(refresh_token) = refresh_token else {
        return;
    };
    match state
        .refresh_tokens
        .delete_by_hash(&hash_token(&refresh_token))
        .await
    {
        Ok(true) => debug!("refresh token revoked"),
        Ok(false) => debug!("logout without a live refresh record"),
        Err(e) => warn!(error = %e, "refresh token revocation failed"),
    }
}

pub fn is_logged_in(state: &AppState, access_token: Option<String>) -> bool {
    access_token
        .map(|t| JwtKeys::from_ref(state).verify_access(&t).is_ok())
        .unwrap_or(false)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    req: UpdateUserRequest,
) -> Result<PublicUser, AppError> {
    let update = ProfileUpdate {
        name: non_empty(req.name),
        photo: non_empty(req.photo),
        phone: non_empty(req.phone),
        bio: non_empty(req.bio),
    };
    if update
        .bio
        .as_ref()
        .is_some_and(|bio| bio.chars().count() > MAX_BIO_LEN)
    {
        return Err(AppError::validation(
            "Bio must not be more than 250 characters",
        ));
    }

    let user = state
        .users
        .update_profile(user_id, update)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    info!(user_id = %user.id, "profile updated");
    Ok(user.to_public())
}

pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> Result<(), AppError> {
    if req.old_password.is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Please add old and new password"));
    }
    validate_password_strength(&req.password)?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if !verify_password(&req.old_password, &user.password_hash)? {
        warn!(user_id = %user.id, "password change with wrong old password");
        return Err(AppError::validation("Old password is incorrect"));
    }

    state.users.set_password(user.id, &req.password).await?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

/// Issues a fresh reset token, replacing any outstanding one, and mails it.
pub async fn forgot_password(
    state: &AppState,
    email: &str,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AppError::validation("Please add an email"));
    }

    let Some(user) = state.users.find_by_email(email).await? else {
        if state.config.conceal_unknown_reset_email {
            info!("password reset requested for unknown email");
            return Ok(());
        }
        return Err(AppError::not_found("User does not exist"));
    };

    let replaced = state.reset_tokens.delete_for_user(user.id).await?;
    let raw = generate_reset_token(user.id);
    let ttl = Duration::from_secs((state.config.reset_ttl_minutes.max(0) as u64) * 60);
    state
        .reset_tokens
        .insert(user.id, &hash_token(&raw), now, after(now, ttl))
        .await?;

    let cfg = &state.config;
    let reset_url = format!("{}/resetpassword/{}", cfg.frontend_url, raw);
    let message = password_reset_email(&cfg.mail.sender, &user.email, &user.name, &reset_url);
    state.mailer.send(&message).await.map_err(|e| {
        error!(error = %e, user_id = %user.id, "reset email failed");
        AppError::EmailDelivery(e)
    })?;

    info!(user_id = %user.id, replaced, "password reset issued");
    Ok(())
}

/// Consumes a reset token and stores the new password.
pub async fn reset_password(
    state: &AppState,
    raw_token: &str,
    password: &str,
    now: OffsetDateTime,
) -> Result<(), AppError> {
    validate_password_strength(password)?;

    let Some(record) = state
        .reset_tokens
        .find_active(&hash_token(raw_token), now)
        .await?
    else {
        warn!("reset with unknown or expired token");
        return Err(AppError::not_found("Invalid or Expired Token"));
    };

    let user = state
        .users
        .find_by_id(record.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    // Consume before writing so a concurrent second use loses.
    if !state.reset_tokens.delete(record.id).await? {
        return Err(AppError::not_found("Invalid or Expired Token"));
    }
    match state.users.set_password(user.id, password).await {
        Ok(true) => {}
        Ok(false) => return Err(AppError::not_found("User not found")),
        Err(e) => {
            error!(error = %e, user_id = %user.id, "password reset write failed, restoring grant");
            if let Err(restore) = state
                .reset_tokens
                .insert(
                    record.user_id,
                    &record.token_hash,
                    record.created_at,
                    record.expires_at,
                )
                .await
            {
                error!(error = %restore, user_id = %user.id, "reset grant could not be restored");
            }
            return Err(e.into());
        }
    }

    info!(user_id = %user.id, "password reset completed");
    Ok(())
}

pub async fn purge_expired_tokens(
    state: &AppState,
    now: OffsetDateTime,
) -> Result<(u64, u64), StoreError> {
    let refresh = state.refresh_tokens.purge_expired(now).await?;
    let reset = state.reset_tokens.purge_expired(now).await?;
    Ok((refresh, reset))
}

/// Background deletion of expired ledger rows.
pub fn spawn_token_purger(state: AppState) -> JoinHandle<()> {
    let every = Duration::from_secs(state.config.purge_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            match purge_expired_tokens(&state, OffsetDateTime::now_utc()).await {
                Ok((0, 0)) => {}
                Ok((refresh, reset)) => info!(refresh, reset, "expired tokens purged"),
                Err(e) => error!(error = %e, "token purge failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{memory_state, memory_state_with_mailer};
    use crate::auth::repo::UserStore;
    use crate::mail::MemoryMailer;
    use std::sync::Arc;

    fn alice() -> RegisterRequest {
        RegisterRequest {
            name: "Alice".into(),
            email: "alice@x.com".into(),
            password: "Passw0rd".into(),
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn registered_user_can_log_in_with_same_password() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        let session = register(&state, alice(), now).await.expect("register");
        let stored = state
            .users
            .find_by_email("alice@x.com")
            .await
            .expect("lookup")
            .expect("stored");
        assert_ne!(stored.password_hash, "Passw0rd");
        let again = login(&state, login_req("alice@x.com", "Passw0rd"), now)
            .await
            .expect("login");
        assert_eq!(again.user, session.user);
    }

    #[tokio::test]
    async fn login_failures_look_identical() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        register(&state, alice(), now).await.expect("register");
        let wrong_pw = login(&state, login_req("alice@x.com", "Wr0ngPass"), now)
            .await
            .unwrap_err();
        let no_user = login(&state, login_req("nobody@x.com", "Passw0rd"), now)
            .await
            .unwrap_err();
        assert_eq!(wrong_pw.to_string(), no_user.to_string());
        assert_eq!(wrong_pw.status(), no_user.status());
    }

    #[tokio::test]
    async fn weak_password_is_rejected_at_registration() {
        let state = memory_state();
        let mut req = alice();
        req.password = "password".into();
        let err = register(&state, req, OffsetDateTime::now_utc()).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        register(&state, alice(), now).await.expect("register");
        let err = register(&state, alice(), now).await.unwrap_err();
        assert_eq!(err.to_string(), "Email has already been registered");
    }

    #[tokio::test]
    async fn registration_survives_welcome_email_failure() {
        let state = memory_state_with_mailer(Arc::new(MemoryMailer::failing()));
        register(&state, alice(), OffsetDateTime::now_utc())
            .await
            .expect("register despite mail failure");
    }

    #[tokio::test]
    async fn rotated_refresh_token_cannot_be_replayed() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        let session = register(&state, alice(), now).await.expect("register");
        let first = session.tokens.refresh.clone();

        let next = refresh_session(&state, Some(first.clone()), now)
            .await
            .expect("first refresh");
        let replay = refresh_session(&state, Some(first), now).await.unwrap_err();
        assert_eq!(replay.status(), axum::http::StatusCode::UNAUTHORIZED);

        refresh_session(&state, Some(next.refresh), now)
            .await
            .expect("rotated token still works");
    }

    #[tokio::test]
    async fn second_login_revokes_first_session() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        register(&state, alice(), now).await.expect("register");
        let a = login(&state, login_req("alice@x.com", "Passw0rd"), now)
            .await
            .expect("login a");
        let b = login(&state, login_req("alice@x.com", "Passw0rd"), now)
            .await
            .expect("login b");
        assert!(refresh_session(&state, Some(a.tokens.refresh), now).await.is_err());
        assert!(refresh_session(&state, Some(b.tokens.refresh), now).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_requires_a_cookie_and_a_valid_signature() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        let missing = refresh_session(&state, None, now).await.unwrap_err();
        assert_eq!(missing.to_string(), "Refresh token not found, please login");
        let forged = refresh_session(&state, Some("forged".into()), now)
            .await
            .unwrap_err();
        assert_eq!(forged.to_string(), "Invalid refresh token, please login");
    }

    #[tokio::test]
    async fn refresh_rejects_record_past_ledger_expiry() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        let session = register(&state, alice(), now).await.expect("register");
        let later = now + TimeDuration::days(8);
        let err = refresh_session(&state, Some(session.tokens.refresh), later)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid or expired refresh token");
    }

    #[tokio::test]
    async fn logout_revokes_and_tolerates_unknown_tokens() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        let session = register(&state, alice(), now).await.expect("register");
        logout(&state, Some(session.tokens.refresh.clone())).await;
        assert!(refresh_session(&state, Some(session.tokens.refresh.clone()), now)
            .await
            .is_err());
        logout(&state, Some(session.tokens.refresh)).await;
        logout(&state, None).await;
    }

    #[tokio::test]
    async fn update_profile_ignores_blank_fields_and_limits_bio() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        let session = register(&state, alice(), now).await.expect("register");
        let updated = update_profile(
            &state,
            session.user.id,
            UpdateUserRequest {
                name: Some("  ".into()),
                phone: Some("+44 1234".into()),
                ..Default::default()
            },
        )
        .await
        .expect("update");
        assert_eq!(updated.name, "Alice");
        assert_eq!(updated.phone, "+44 1234");
        assert_eq!(updated.email, "alice@x.com");

        let err = update_profile(
            &state,
            session.user.id,
            UpdateUserRequest {
                bio: Some("x".repeat(MAX_BIO_LEN + 1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Bio must not be more than 250 characters");
    }

    #[tokio::test]
    async fn change_password_checks_old_password() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        let session = register(&state, alice(), now).await.expect("register");
        let err = change_password(
            &state,
            session.user.id,
            ChangePasswordRequest {
                old_password: "Wr0ngPass".into(),
                password: "N3wPassword".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Old password is incorrect");

        change_password(
            &state,
            session.user.id,
            ChangePasswordRequest {
                old_password: "Passw0rd".into(),
                password: "N3wPassword".into(),
            },
        )
        .await
        .expect("change password");
        assert!(login(&state, login_req("alice@x.com", "Passw0rd"), now).await.is_err());
        login(&state, login_req("alice@x.com", "N3wPassword"), now)
            .await
            .expect("login with new password");
    }

    fn reset_token_from(mail: &crate::mail::EmailMessage) -> String {
        let start = mail.text.find("/resetpassword/").expect("reset url") + "/resetpassword/".len();
        mail.text[start..]
            .split_whitespace()
            .next()
            .expect("token")
            .to_string()
    }

    #[tokio::test]
    async fn reset_token_is_single_use() {
        let mailer = Arc::new(MemoryMailer::new());
        let state = memory_state_with_mailer(mailer.clone());
        let now = OffsetDateTime::now_utc();
        register(&state, alice(), now).await.expect("register");
        forgot_password(&state, "alice@x.com", now).await.expect("forgot");
        let sent = mailer.sent().await;
        let token = reset_token_from(sent.last().expect("reset mail"));

        reset_password(&state, &token, "Fresh1Pass", now)
            .await
            .expect("first reset");
        let err = reset_password(&state, &token, "Other1Pass", now)
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
        login(&state, login_req("alice@x.com", "Fresh1Pass"), now)
            .await
            .expect("login with reset password");
    }

    /// Delegates to the memory store but refuses every password write.
    struct ReadOnlyPasswords(crate::auth::memory::MemoryUserStore);

    #[async_trait::async_trait]
    impl crate::auth::repo::UserStore for ReadOnlyPasswords {
        async fn find_by_email(
            &self,
            email: &str,
        ) -> Result<Option<crate::auth::repo_types::User>, StoreError> {
            self.0.find_by_email(email).await
        }
        async fn find_by_id(
            &self,
            id: Uuid,
        ) -> Result<Option<crate::auth::repo_types::User>, StoreError> {
            self.0.find_by_id(id).await
        }
        async fn find_profile(&self, id: Uuid) -> Result<Option<PublicUser>, StoreError> {
            self.0.find_profile(id).await
        }
        async fn create(
            &self,
            new_user: NewUser,
        ) -> Result<crate::auth::repo_types::User, StoreError> {
            self.0.create(new_user).await
        }
        async fn update_profile(
            &self,
            id: Uuid,
            update: ProfileUpdate,
        ) -> Result<Option<crate::auth::repo_types::User>, StoreError> {
            self.0.update_profile(id, update).await
        }
        async fn set_password(&self, _id: Uuid, _plain: &str) -> Result<bool, StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn failed_reset_write_keeps_the_grant() {
        use crate::auth::memory::{
            MemoryRefreshTokenStore, MemoryResetTokenStore, MemoryUserStore,
        };

        let mailer = Arc::new(MemoryMailer::new());
        let state = AppState::from_parts(
            crate::test_support::test_config(),
            Arc::new(ReadOnlyPasswords(MemoryUserStore::new())),
            Arc::new(MemoryRefreshTokenStore::new()),
            Arc::new(MemoryResetTokenStore::new()),
            mailer.clone(),
        );
        let now = OffsetDateTime::now_utc();
        register(&state, alice(), now).await.expect("register");
        forgot_password(&state, "alice@x.com", now).await.expect("forgot");
        let token = reset_token_from(mailer.sent().await.last().expect("reset mail"));

        let err = reset_password(&state, &token, "Fresh1Pass", now)
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        let grant = state
            .reset_tokens
            .find_active(&hash_token(&token), now)
            .await
            .expect("lookup");
        assert!(grant.is_some(), "token usable again after a failed write");
    }

    #[tokio::test]
    async fn reset_token_expires_after_thirty_minutes() {
        let mailer = Arc::new(MemoryMailer::new());
        let state = memory_state_with_mailer(mailer.clone());
        let t = OffsetDateTime::now_utc();
        register(&state, alice(), t).await.expect("register");
        forgot_password(&state, "alice@x.com", t).await.expect("forgot");
        let token = reset_token_from(mailer.sent().await.last().expect("reset mail"));

        let err = reset_password(&state, &token, "Fresh1Pass", t + TimeDuration::minutes(31))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid or Expired Token");
    }

    #[tokio::test]
    async fn second_forgot_request_invalidates_first_token() {
        let mailer = Arc::new(MemoryMailer::new());
        let state = memory_state_with_mailer(mailer.clone());
        let now = OffsetDateTime::now_utc();
        let session = register(&state, alice(), now).await.expect("register");

        forgot_password(&state, "alice@x.com", now).await.expect("forgot 1");
        let first = reset_token_from(mailer.sent().await.last().expect("mail 1"));
        forgot_password(&state, "alice@x.com", now).await.expect("forgot 2");
        let second = reset_token_from(mailer.sent().await.last().expect("mail 2"));
        assert_ne!(first, second);

        assert!(reset_password(&state, &first, "Fresh1Pass", now).await.is_err());
        reset_password(&state, &second, "Fresh1Pass", now)
            .await
            .expect("latest token works");
        assert_eq!(
            state
                .reset_tokens
                .delete_for_user(session.user.id)
                .await
                .expect("cleanup"),
            0
        );
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email() {
        let state = memory_state();
        let err = forgot_password(&state, "ghost@x.com", OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "User does not exist");

        let mut config = (*state.config).clone();
        config.conceal_unknown_reset_email = true;
        let concealed = crate::test_support::memory_state_with_config(config);
        forgot_password(&concealed, "ghost@x.com", OffsetDateTime::now_utc())
            .await
            .expect("concealed policy answers success");
    }

    #[tokio::test]
    async fn forgot_password_surfaces_mail_failure() {
        let state = memory_state_with_mailer(Arc::new(MemoryMailer::failing()));
        let now = OffsetDateTime::now_utc();
        register(&state, alice(), now).await.expect("register");
        let err = forgot_password(&state, "alice@x.com", now).await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Email not sent, please try again");
    }

    #[tokio::test]
    async fn purge_removes_only_expired_rows() {
        let state = memory_state();
        let now = OffsetDateTime::now_utc();
        register(&state, alice(), now).await.expect("register");
        forgot_password(&state, "alice@x.com", now).await.expect("forgot");
        let (refresh, reset) = purge_expired_tokens(&state, now).await.expect("purge");
        assert_eq!((refresh, reset), (0, 0));
        let (refresh, reset) = purge_expired_tokens(&state, now + TimeDuration::days(8))
            .await
            .expect("purge later");
        assert_eq!((refresh, reset), (1, 1));
    }
}
