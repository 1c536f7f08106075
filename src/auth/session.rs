use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use std::sync::Arc;

use super::{AuthError, IdentityClaim, TokenService, TokenUse};

/// Name of the cookie carrying the refresh token.
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Resolves the session identity from the `refresh_token` cookie.
#[derive(Clone, Debug)]
pub struct SessionGuard {
    tokens: Arc<TokenService>,
}

impl SessionGuard {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// Validates the raw refresh-token cookie value.
    pub fn authenticate_session(&self, cookie: Option<&str>) -> Result<IdentityClaim, AuthError> {
        self.authenticate_session_at(cookie, Utc::now())
    }

    pub fn authenticate_session_at(
        &self,
        cookie: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<IdentityClaim, AuthError> {
        let token = cookie
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingSession)?;

        let claim = self.tokens.verify(TokenUse::Refresh, token)?;
        if claim.is_expired_at(now) {
            return Err(AuthError::SessionExpired);
        }
        Ok(claim)
    }

    /// Same as [`SessionGuard::authenticate_session`], reading the cookie
    /// from request headers.
    pub fn authenticate_headers(&self, headers: &HeaderMap) -> Result<IdentityClaim, AuthError> {
        let cookie = refresh_cookie_value(headers);
        self.authenticate_session(cookie.as_deref())
    }

    /// `Set-Cookie` value carrying a freshly issued refresh token.
    pub fn session_cookie(&self, refresh_token: String) -> Cookie<'static> {
        let config = self.tokens.config();
        Cookie::build((REFRESH_COOKIE, refresh_token))
            .path("/")
            .http_only(config.refresh_cookie_http_only)
            .secure(config.refresh_cookie_secure)
            .same_site(SameSite::Lax)
            .max_age(CookieDuration::seconds(
                config.refresh_token_ttl.as_secs() as i64
            ))
            .build()
    }

    /// `Set-Cookie` value that removes the session cookie.
    pub fn cleared_cookie(&self) -> Cookie<'static> {
        Cookie::build((REFRESH_COOKIE, ""))
            .path("/")
            .max_age(CookieDuration::ZERO)
            .build()
    }
}

/// Value of the `refresh_token` cookie across all `Cookie` headers, if any.
pub fn refresh_cookie_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| Cookie::split_parse(value))
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
}
