use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration as TimeDuration, OffsetDateTime};

use super::jwt::TokenPair;
use crate::config::Environment;

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn build(name: &'static str, value: String, expires: OffsetDateTime, env: Environment) -> Cookie<'static> {
    let (same_site, secure) = if env.is_production() {
        (SameSite::None, true)
    } else {
        (SameSite::Lax, false)
    };
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .expires(expires)
        .build()
}

/// Puts both tokens on the jar as httpOnly cookies.
pub fn set_token_cookies(
    jar: CookieJar,
    pair: &TokenPair,
    access_ttl: std::time::Duration,
    refresh_ttl: std::time::Duration,
    env: Environment,
) -> CookieJar {
    let now = OffsetDateTime::now_utc();
    let access_exp = now + TimeDuration::seconds(access_ttl.as_secs() as i64);
    let refresh_exp = now + TimeDuration::seconds(refresh_ttl.as_secs() as i64);
    jar.add(build(ACCESS_COOKIE, pair.access.clone(), access_exp, env))
        .add(build(REFRESH_COOKIE, pair.refresh.clone(), refresh_exp, env))
}

/// Overwrites both cookies with empty values that expired at the epoch.
pub fn clear_token_cookies(jar: CookieJar, env: Environment) -> CookieJar {
    jar.add(build(ACCESS_COOKIE, String::new(), OffsetDateTime::UNIX_EPOCH, env))
        .add(build(REFRESH_COOKIE, String::new(), OffsetDateTime::UNIX_EPOCH, env))
}

/// Cookie value, treating an empty value as absent.
pub fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
