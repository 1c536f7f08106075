use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthConfig, AuthError};

/// Which secret signed a token and what it may be used for.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Claim structure for both token kinds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,         // Subject (user ID)
    pub token_use: TokenUse, // Access or refresh
    pub jti: String,         // Unique token id
    pub iat: i64,            // Issued at
    pub exp: i64,            // Expiration time
    pub iss: String,         // Issuer
}

/// Identity carried by a verified token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityClaim {
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl IdentityClaim {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Issues and verifies HS256 tokens. Access and refresh tokens are signed
/// with separate secrets, so one kind can never be replayed as the other.
///
/// Expiry is deliberately not enforced by [`TokenService::verify`]; callers
/// decide how an expired token is reported (see [`TokenService::is_expired`]).
#[derive(Clone)]
pub struct TokenService {
    config: AuthConfig,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("config", &self.config)
            .finish()
    }
}

impl TokenService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn issue_access(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue_at(TokenUse::Access, user_id, Utc::now())
    }

    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue_at(TokenUse::Refresh, user_id, Utc::now())
    }

    /// Issues a token of `kind` as if the current time were `now`.
    pub fn issue_at(
        &self,
        kind: TokenUse,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let ttl = ChronoDuration::from_std(self.ttl(kind))
            .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;
        let claims = Claims {
            sub: user_id.to_string(),
            token_use: kind,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.config.issuer.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret(kind).as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Checks signature, issuer and token kind and returns the embedded identity.
    pub fn verify(&self, kind: TokenUse, token: &str) -> Result<IdentityClaim, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_issuer(&[self.config.issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind).as_bytes()),
            &validation,
        )
        .map_err(|_| AuthError::InvalidToken)?
        .claims;

        if claims.token_use != kind {
            return Err(AuthError::InvalidToken);
        }

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(AuthError::InvalidToken)?;

        Ok(IdentityClaim {
            user_id,
            expires_at,
        })
    }

    /// Whether a token of `kind` has passed its embedded expiry.
    pub fn is_expired(&self, kind: TokenUse, token: &str) -> Result<bool, AuthError> {
        Ok(self.verify(kind, token)?.is_expired_at(Utc::now()))
    }

    fn secret(&self, kind: TokenUse) -> &str {
        match kind {
            TokenUse::Access => &self.config.access_secret,
            TokenUse::Refresh => &self.config.refresh_secret,
        }
    }

    fn ttl(&self, kind: TokenUse) -> std::time::Duration {
        match kind {
            TokenUse::Access => self.config.access_token_ttl,
            TokenUse::Refresh => self.config.refresh_token_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn service() -> TokenService {
        TokenService::new(AuthConfig::for_tests())
    }

    #[test]
    fn access_token_round_trips_identity() {
        let tokens = service();
        let user_id = Uuid::new_v4();
        let token = tokens.issue_access(user_id).unwrap();

        let claim = tokens.verify(TokenUse::Access, &token).unwrap();
        assert_eq!(claim.user_id, user_id);
        assert!(!tokens.is_expired(TokenUse::Access, &token).unwrap());
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let tokens = service();
        let refresh = tokens.issue_refresh(Uuid::new_v4()).unwrap();
        assert_matches!(
            tokens.verify(TokenUse::Access, &refresh),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn lifetimes_follow_config() {
        let tokens = service();
        let now = Utc::now();
        let user_id = Uuid::new_v4();

        let access = tokens.issue_at(TokenUse::Access, user_id, now).unwrap();
        let refresh = tokens.issue_at(TokenUse::Refresh, user_id, now).unwrap();

        let access = tokens.verify(TokenUse::Access, &access).unwrap();
        let refresh = tokens.verify(TokenUse::Refresh, &refresh).unwrap();
        assert_eq!(access.expires_at.timestamp() - now.timestamp(), 60);
        assert_eq!(refresh.expires_at.timestamp() - now.timestamp(), 604_800);
    }

    #[test]
    fn expired_token_still_verifies_but_reports_expiry() {
        let tokens = service();
        let issued = Utc::now() - ChronoDuration::seconds(120);
        let token = tokens
            .issue_at(TokenUse::Access, Uuid::new_v4(), issued)
            .unwrap();

        assert!(tokens.verify(TokenUse::Access, &token).is_ok());
        assert!(tokens.is_expired(TokenUse::Access, &token).unwrap());
    }

    #[test]
    fn tampered_or_garbage_tokens_are_invalid() {
        let tokens = service();
        let mut token = tokens.issue_access(Uuid::new_v4()).unwrap();
        token.push('x');
        assert_matches!(
            tokens.verify(TokenUse::Access, &token),
            Err(AuthError::InvalidToken)
        );
        assert_matches!(
            tokens.verify(TokenUse::Refresh, "not-a-jwt"),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let tokens = service();
        let mut other_config = AuthConfig::for_tests();
        other_config.issuer = "someone-else".into();
        let other = TokenService::new(other_config);

        let token = other.issue_access(Uuid::new_v4()).unwrap();
        assert_matches!(
            tokens.verify(TokenUse::Access, &token),
            Err(AuthError::InvalidToken)
        );
    }
}
