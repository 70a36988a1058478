use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    emails,
    error::AuthError,
    jwt::JwtKeys,
    password::{hash_password, verify_decoy, verify_password},
    repo::UserRepo,
    repo_types::{NewUser, User},
    utils::{generate_token, hash_token, is_valid_email, normalize_email},
};
use crate::mailer::Mailer;

/// Registration, verification, login and password reset over a user store,
/// a mail channel and the session token signer.
pub struct AuthService {
    repo: Arc<dyn UserRepo>,
    mailer: Arc<dyn Mailer>,
    keys: JwtKeys,
    frontend_url: String,
    reset_ttl: Duration,
}

impl AuthService {
    pub fn new(
        repo: Arc<dyn UserRepo>,
        mailer: Arc<dyn Mailer>,
        keys: JwtKeys,
        frontend_url: impl Into<String>,
        reset_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            mailer,
            keys,
            frontend_url: frontend_url.into(),
            reset_ttl,
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    #[instrument(skip(self, password, name))]
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::Validation("Invalid email".into()));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required".into()));
        }

        if self.repo.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::DuplicateUser);
        }

        let token = generate_token();
        let user = self
            .repo
            .create(NewUser {
                email: email.clone(),
                name: name.trim().to_string(),
                password_hash: hash_password(password)?,
                verification_token_hash: hash_token(&token),
            })
            .await?;
        info!(user_id = %user.id, "user registered");

        self.mailer
            .send(&emails::verification_email(&email, &self.frontend_url, &token))
            .await
            .map_err(AuthError::Mail)?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }
        let mut user = self
            .repo
            .find_by_verification_token(&hash_token(token))
            .await?
            .ok_or(AuthError::InvalidToken)?;

        user.mark_verified();
        self.repo.save(&user).await?;
        info!(user_id = %user.id, "email verified");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let mut user = self
            .repo
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token = generate_token();
        user.begin_reset(hash_token(&token), OffsetDateTime::now_utc() + self.reset_ttl);
        self.repo.save(&user).await?;
        info!(user_id = %user.id, "password reset requested");

        self.mailer
            .send(&emails::reset_email(&user.email, &self.frontend_url, &token))
            .await
            .map_err(AuthError::Mail)?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidOrExpiredToken);
        }
        if new_password.is_empty() {
            return Err(AuthError::Validation("Password is required".into()));
        }
        let now = OffsetDateTime::now_utc();
        let mut user = self
            .repo
            .find_by_reset_token(&hash_token(token), now)
            .await?
            .filter(|u| u.reset_pending_at(now))
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        user.password_hash = hash_password(new_password)?;
        user.clear_reset();
        self.repo.save(&user).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    /// Returns a signed session token for a verified user.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.repo.find_by_email(&email).await? else {
            warn!(email = %email, "login unknown email");
            verify_decoy(password);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_verified {
            warn!(user_id = %user.id, "login before email verification");
            return Err(AuthError::EmailNotVerified);
        }

        let token = self.keys.issue(user.id)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.repo
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::Unauthorized)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{
        auth::repo::memory::MemoryUserRepo, config::JwtConfig, mailer::testing::RecordingMailer,
    };

    pub(crate) struct Harness {
        pub service: Arc<AuthService>,
        pub repo: Arc<MemoryUserRepo>,
        pub mailer: RecordingMailer,
    }

    pub(crate) fn test_keys() -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            ttl_seconds: 3600,
        })
    }

    pub(crate) fn harness_with(mailer: RecordingMailer, reset_ttl: Duration) -> Harness {
        let repo = Arc::new(MemoryUserRepo::default());
        let service = Arc::new(AuthService::new(
            repo.clone(),
            Arc::new(mailer.clone()),
            test_keys(),
            "https://app.example.com",
            reset_ttl,
        ));
        Harness {
            service,
            repo,
            mailer,
        }
    }

    pub(crate) fn harness() -> Harness {
        harness_with(RecordingMailer::default(), Duration::hours(1))
    }

    async fn registered_and_verified(h: &Harness, email: &str, password: &str) {
        h.service.register(email, password, "A").await.unwrap();
        let token = h.mailer.last_token_for(email).unwrap();
        h.service.verify_email(&token).await.unwrap();
    }

    #[tokio::test]
    async fn register_persists_unverified_user_and_mails_link() {
        let h = harness();
        h.service.register(" A@X.com ", "pw1", "A").await.unwrap();

        let user = h.repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(!user.is_verified);
        assert_eq!(user.name, "A");
        assert_ne!(user.password_hash, "pw1");

        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Verify Email");
        let token = h.mailer.last_token_for("a@x.com").unwrap();
        assert_eq!(user.verification_token_hash, Some(hash_token(&token)));
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let h = harness();
        h.service.register("a@x.com", "pw1", "A").await.unwrap();
        let err = h.service.register("A@x.com", "pw2", "B").await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUser));
        assert_eq!(h.repo.len(), 1);
    }

    #[tokio::test]
    async fn invalid_registration_input_is_rejected() {
        let h = harness();
        assert!(matches!(
            h.service.register("not-an-email", "pw1", "A").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            h.service.register("a@x.com", "", "A").await,
            Err(AuthError::Validation(_))
        ));
        assert_eq!(h.repo.len(), 0);
    }

    #[tokio::test]
    async fn mail_failure_surfaces_but_keeps_record() {
        let h = harness_with(RecordingMailer::failing(), Duration::hours(1));
        let err = h.service.register("a@x.com", "pw1", "A").await.unwrap_err();
        assert!(matches!(err, AuthError::Mail(_)));
        assert_eq!(h.repo.len(), 1);
    }

    #[tokio::test]
    async fn unverified_user_cannot_log_in() {
        let h = harness();
        h.service.register("a@x.com", "pw1", "A").await.unwrap();
        let err = h.service.login("a@x.com", "pw1").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailNotVerified));
    }

    #[tokio::test]
    async fn wrong_password_beats_unverified() {
        let h = harness();
        h.service.register("a@x.com", "pw1", "A").await.unwrap();
        let err = h.service.login("a@x.com", "nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let err = h.service.login("b@x.com", "pw1").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn verification_token_works_exactly_once() {
        let h = harness();
        h.service.register("a@x.com", "pw1", "A").await.unwrap();
        let token = h.mailer.last_token_for("a@x.com").unwrap();

        h.service.verify_email(&token).await.unwrap();
        let user = h.repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(user.is_verified);
        assert!(user.verification_token_hash.is_none());

        let err = h.service.verify_email(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn unknown_or_empty_verification_token_is_invalid() {
        let h = harness();
        assert!(matches!(
            h.service.verify_email("bogus").await,
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            h.service.verify_email("").await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn login_token_decodes_to_user_identity() {
        let h = harness();
        registered_and_verified(&h, "a@x.com", "pw1").await;

        let token = h.service.login("a@x.com", "pw1").await.unwrap();
        let claims = test_keys().verify(&token).unwrap();
        let user = h.repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(h.service.profile(claims.sub).await.unwrap().email, "a@x.com");
    }

    #[tokio::test]
    async fn reset_for_unknown_email_is_not_found() {
        let h = harness();
        let err = h.service.request_password_reset("ghost@x.com").await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn reset_replaces_password_and_clears_window() {
        let h = harness();
        registered_and_verified(&h, "a@x.com", "pw1").await;

        h.service.request_password_reset("a@x.com").await.unwrap();
        let token = h.mailer.last_token_for("a@x.com").unwrap();
        let user = h.repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(user.reset_pending_at(OffsetDateTime::now_utc()));

        h.service.reset_password(&token, "pw2").await.unwrap();
        let user = h.repo.find_by_email("a@x.com").await.unwrap().unwrap();
        assert!(user.reset_token_hash().is_none());
        assert!(user.reset_expires_at().is_none());

        assert!(matches!(
            h.service.login("a@x.com", "pw1").await,
            Err(AuthError::InvalidCredentials)
        ));
        h.service.login("a@x.com", "pw2").await.unwrap();

        // One-time use.
        assert!(matches!(
            h.service.reset_password(&token, "pw3").await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn only_latest_reset_token_is_accepted() {
        let h = harness();
        registered_and_verified(&h, "a@x.com", "pw1").await;

        h.service.request_password_reset("a@x.com").await.unwrap();
        let first = h.mailer.last_token_for("a@x.com").unwrap();
        h.service.request_password_reset("a@x.com").await.unwrap();
        let second = h.mailer.last_token_for("a@x.com").unwrap();
        assert_ne!(first, second);

        assert!(matches!(
            h.service.reset_password(&first, "pw2").await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
        h.service.reset_password(&second, "pw2").await.unwrap();
    }

    #[tokio::test]
    async fn expired_reset_token_is_rejected() {
        let h = harness_with(RecordingMailer::default(), Duration::seconds(-1));
        registered_and_verified(&h, "a@x.com", "pw1").await;

        h.service.request_password_reset("a@x.com").await.unwrap();
        let token = h.mailer.last_token_for("a@x.com").unwrap();
        let err = h.service.reset_password(&token, "pw2").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidOrExpiredToken));

        // Password unchanged.
        h.service.login("a@x.com", "pw1").await.unwrap();
    }

    #[tokio::test]
    async fn worked_example() {
        let h = harness();
        h.service.register("a@x.com", "pw1", "A").await.unwrap();
        assert!(matches!(
            h.service.login("a@x.com", "pw1").await,
            Err(AuthError::EmailNotVerified)
        ));
        let token = h.mailer.last_token_for("a@x.com").unwrap();
        h.service.verify_email(&token).await.unwrap();
        let session = h.service.login("a@x.com", "pw1").await.unwrap();
        assert!(!session.is_empty());
    }
}
