use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{password, AuthError, IdentityClaim, TokenService};
use crate::entities::{user, IdList};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::CommerceRepository;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterUser {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginCredentials {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Public projection of a user. Never carries the password hash.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UserView {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub work_at: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserView {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            work_at: model.work_at.0,
            created_at: model.created_at,
        }
    }
}

/// Result of a successful login. The refresh token travels in the session
/// cookie, the access token in the response body.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub user: user::Model,
    pub access_token: String,
    pub refresh_token: String,
}

/// Registration, login and access token renewal.
#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn CommerceRepository>,
    tokens: Arc<TokenService>,
    event_sender: Arc<EventSender>,
}

impl AccountService {
    pub fn new(
        repo: Arc<dyn CommerceRepository>,
        tokens: Arc<TokenService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            repo,
            tokens,
            event_sender,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn register(&self, input: RegisterUser) -> Result<user::Model, ServiceError> {
        input.validate()?;
        password::validate_password(&input.password)?;

        let email = normalize_email(&input.email);
        if self.repo.find_user_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict("email already registered".to_string()));
        }

        let password_hash = password::hash_password_blocking(input.password).await?;
        let now = Utc::now();
        let user = self
            .repo
            .insert_user(user::Model {
                id: Uuid::new_v4(),
                name: input.name.trim().to_string(),
                email,
                password_hash,
                work_at: IdList::new(),
                created_at: now,
                updated_at: now,
            })
            .await?;

        self.event_sender
            .send_or_log(Event::UserRegistered { user_id: user.id })
            .await;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: LoginCredentials) -> Result<SessionTokens, ServiceError> {
        credentials.validate()?;

        let email = normalize_email(&credentials.email);
        let Some(user) = self.repo.find_user_by_email(&email).await? else {
            // Hash anyway so unknown emails cost the same as wrong passwords.
            let _ = password::hash_password_blocking(credentials.password).await;
            warn!("login with unknown email");
            return Err(AuthError::InvalidCredentials.into());
        };

        password::verify_password_blocking(credentials.password, user.password_hash.clone())
            .await
            .map_err(|err| {
                warn!(user_id = %user.id, "login with wrong password");
                ServiceError::from(err)
            })?;

        let access_token = self.tokens.issue_access(user.id)?;
        let refresh_token = self.tokens.issue_refresh(user.id)?;
        info!(user_id = %user.id, "user logged in");

        Ok(SessionTokens {
            user,
            access_token,
            refresh_token,
        })
    }

    /// Issues a fresh access token for an already verified session.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn refresh(&self, session: &IdentityClaim) -> Result<String, ServiceError> {
        let user = self.repo.get_user(session.user_id).await?;
        Ok(self.tokens.issue_access(user.id)?)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<user::Model, ServiceError> {
        self.repo.get_user(user_id).await
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, TokenUse};
    use crate::repositories::InMemoryCommerceRepository;
    use assert_matches::assert_matches;

    fn service() -> (AccountService, Arc<TokenService>) {
        let tokens = Arc::new(TokenService::new(AuthConfig::for_tests()));
        let (events, _rx) = EventSender::channel(16);
        let service = AccountService::new(
            Arc::new(InMemoryCommerceRepository::new()),
            tokens.clone(),
            Arc::new(events),
        );
        (service, tokens)
    }

    fn registration(email: &str) -> RegisterUser {
        RegisterUser {
            name: "Dana".into(),
            email: email.into(),
            password: "correct horse battery".into(),
        }
    }

    #[tokio::test]
    async fn register_then_login_issues_both_tokens() {
        let (accounts, tokens) = service();
        let user = accounts.register(registration("Dana@Shop.test")).await.unwrap();
        assert_eq!(user.email, "dana@shop.test");
        assert_ne!(user.password_hash, "correct horse battery");

        let session = accounts
            .login(LoginCredentials {
                email: "dana@shop.test".into(),
                password: "correct horse battery".into(),
            })
            .await
            .unwrap();

        let access = tokens.verify(TokenUse::Access, &session.access_token).unwrap();
        let refresh = tokens.verify(TokenUse::Refresh, &session.refresh_token).unwrap();
        assert_eq!(access.user_id, user.id);
        assert_eq!(refresh.user_id, user.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let (accounts, _) = service();
        accounts.register(registration("dup@shop.test")).await.unwrap();
        let again = accounts.register(registration("DUP@shop.test")).await;
        assert_matches!(again, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn short_password_is_rejected() {
        let (accounts, _) = service();
        let mut input = registration("weak@shop.test");
        input.password = "short".into();
        assert_matches!(
            accounts.register(input).await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (accounts, _) = service();
        accounts.register(registration("eve@shop.test")).await.unwrap();

        let wrong = accounts
            .login(LoginCredentials {
                email: "eve@shop.test".into(),
                password: "not the password".into(),
            })
            .await
            .unwrap_err();
        let unknown = accounts
            .login(LoginCredentials {
                email: "nobody@shop.test".into(),
                password: "whatever123".into(),
            })
            .await
            .unwrap_err();

        assert_eq!(wrong.status_code(), unknown.status_code());
        assert_eq!(wrong.response_message(), unknown.response_message());
    }

    #[tokio::test]
    async fn refresh_issues_access_token_for_session_user() {
        let (accounts, tokens) = service();
        let user = accounts.register(registration("ren@shop.test")).await.unwrap();
        let session = IdentityClaim {
            user_id: user.id,
            expires_at: Utc::now() + chrono::Duration::days(1),
        };

        let access = accounts.refresh(&session).await.unwrap();
        assert_eq!(tokens.verify(TokenUse::Access, &access).unwrap().user_id, user.id);
    }

    #[test]
    fn user_view_hides_password_hash() {
        let now = Utc::now();
        let view = UserView::from(user::Model {
            id: Uuid::new_v4(),
            name: "Hidden".into(),
            email: "hidden@shop.test".into(),
            password_hash: "$argon2id$secret".into(),
            work_at: IdList::new(),
            created_at: now,
            updated_at: now,
        });
        let json = serde_json::to_string(&view).unwrap();
        assert!(!json.contains("argon2"));
    }
}
