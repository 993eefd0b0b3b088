use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use tracing::warn;

use super::{
    cookies::{cookie_value, ACCESS_COOKIE},
    dto::PublicUser,
    jwt::JwtKeys,
};
use crate::{error::AppError, state::AppState};

/// Guard for protected routes: verifies the access cookie and loads the
/// user it names, without the password hash.
pub struct CurrentUser(pub PublicUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = cookie_value(&jar, ACCESS_COOKIE)
            .ok_or_else(|| AppError::unauthorized("Not authorized, please login"))?;

        let claims = JwtKeys::from(&state.config.jwt).verify_access(&token)?;

        let user = state
            .users
            .find_profile(claims.sub)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "access token for a missing user");
                AppError::unauthorized("User not found")
            })?;
        Ok(CurrentUser(user))
    }
}
