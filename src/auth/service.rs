//! Authentication Service
//! Mission: Orchestrate login, registration, password reset and account changes

use crate::auth::{
    error::{AuthError, StoreError},
    jwt::{IssuedToken, JwtHandler},
    models::{Role, User},
    password::{check_length, PasswordHasher},
    reset_store::{ResetRecord, ResetTokenStore},
    user_store::CredentialStore,
};
use crate::config::AuthConfig;
use chrono::{DateTime, Utc};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Successful login: the authenticated user and their session token
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: IssuedToken,
    pub issued_at: DateTime<Utc>,
}

/// Shared auth state handed to every request handler
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn CredentialStore>,
    resets: Arc<dyn ResetTokenStore>,
    jwt: Arc<JwtHandler>,
    hasher: PasswordHasher,
    default_role: Role,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn CredentialStore>,
        resets: Arc<dyn ResetTokenStore>,
    ) -> Self {
        Self {
            users,
            resets,
            jwt: Arc::new(JwtHandler::new(
                &config.jwt_secret,
                config.session_ttl,
                config.reset_ttl,
            )),
            hasher: PasswordHasher::new(config.bcrypt_cost),
            default_role: config.default_role,
            store_timeout: config.store_timeout,
        }
    }

    pub fn jwt(&self) -> Arc<JwtHandler> {
        self.jwt.clone()
    }

    /// Create an account. Self-service registration may pick teacher or
    /// student; admins are only made by bootstrap or promotion.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        role: Option<&str>,
    ) -> Result<User, AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::InvalidInput("email and password required"));
        }
        check_length(password)?;

        let role = match role.map(str::trim).filter(|r| !r.is_empty()) {
            None => self.default_role,
            Some(raw) => Role::parse(raw).ok_or(AuthError::InvalidInput("unknown role"))?,
        };
        if role == Role::Admin {
            return Err(AuthError::Forbidden);
        }

        self.create_user(email, password, role).await
    }

    /// Verify credentials and issue a session token
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let found = match self
            .store("find_by_email", self.users.find_by_email(email))
            .await
        {
            // A record that cannot be read is not an account anyone can log into
            Err(AuthError::CorruptRecord) => None,
            other => other?,
        };

        let Some(user) = found else {
            self.verify_dummy(password).await;
            debug!("Login rejected: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.verify_password(password, &user.password_hash).await {
            debug!(user_id = %user.id, "Login rejected: password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let issued_at = Utc::now();
        let session = self.jwt.issue_session(&user, issued_at).map_err(|e| {
            error!(error = %e, "Session token issuance failed");
            AuthError::TokenIssuance
        })?;

        info!(user_id = %user.id, role = %user.role, "Login successful");
        Ok(LoginOutcome {
            user,
            session,
            issued_at,
        })
    }

    /// Issue a single-use reset token for an existing account.
    ///
    /// The server-side record is written before the token is returned.
    pub async fn request_reset(&self, email: &str) -> Result<IssuedToken, AuthError> {
        let user = self
            .store("find_by_email", self.users.find_by_email(email))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let issued = self.jwt.issue_reset(&user.email, Utc::now()).map_err(|e| {
            error!(error = %e, "Reset token issuance failed");
            AuthError::TokenIssuance
        })?;

        self.resets
            .insert(
                &issued.token,
                ResetRecord {
                    email: user.email.clone(),
                    expires_at: issued.expires_at,
                },
            )
            .await;

        info!(user_id = %user.id, "Password reset token issued");
        Ok(issued)
    }

    pub async fn complete_reset(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        self.complete_reset_at(token, new_password, Utc::now()).await
    }

    /// Consume a reset token and replace the password. At most one call per
    /// token ever succeeds; a failed persist leaves the token usable.
    ///
    /// Claim, persist and release run on their own task, so a caller that
    /// goes away mid-flight cannot leave the claim dangling. The reset either
    /// lands and consumes the token or fails and releases it.
    pub async fn complete_reset_at(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::InvalidInput("new password required"));
        }
        check_length(new_password)?;

        let service = self.clone();
        let owned_token = token.to_string();
        let new_password = new_password.to_string();
        let task = tokio::spawn(async move {
            service
                .consume_reset(&owned_token, &new_password, now)
                .await
        });

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Reset task failed");
                Err(AuthError::PersistenceUnavailable)
            }
        }
    }

    async fn consume_reset(
        &self,
        token: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let Some(record) = self.resets.claim(token).await else {
            debug!("Reset rejected: token unknown, consumed or in use");
            return Err(AuthError::InvalidOrExpiredToken);
        };

        let verified = self.jwt.verify_reset(token, now);
        let claims = match verified {
            Ok(claims) => claims,
            Err(reason) => {
                self.resets.remove(token).await;
                debug!(%reason, "Reset rejected: token failed verification");
                return Err(AuthError::InvalidOrExpiredToken);
            }
        };
        if claims.email != record.email {
            self.resets.remove(token).await;
            warn!("Reset rejected: token does not match its record");
            return Err(AuthError::InvalidOrExpiredToken);
        }

        match self.apply_reset(&record.email, new_password).await {
            Ok(user_id) => {
                self.resets.remove(token).await;
                info!(%user_id, "Password reset completed");
                Ok(())
            }
            Err(AuthError::UserNotFound) => {
                self.resets.remove(token).await;
                Err(AuthError::UserNotFound)
            }
            Err(err) => {
                self.resets.release(token).await;
                Err(err)
            }
        }
    }

    async fn apply_reset(&self, email: &str, new_password: &str) -> Result<Uuid, AuthError> {
        let user = self
            .store("find_by_email", self.users.find_by_email(email))
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let digest = self.hash_password(new_password).await?;
        self.store(
            "update_password",
            self.users.update_password(user.id, &digest),
        )
        .await?;
        Ok(user.id)
    }

    /// Current identity for an authenticated caller
    pub async fn profile(&self, user_id: Uuid) -> Result<User, AuthError> {
        self.store("find_by_id", self.users.find_by_id(user_id))
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Change the caller's email and/or password. Empty fields are ignored.
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        email: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<User, AuthError> {
        if let Some(password) = new_password {
            check_length(password)?;
        }
        let user = self.profile(user_id).await?;

        if let Some(email) = email.filter(|e| !e.is_empty() && *e != user.email) {
            self.store("update_email", self.users.update_email(user_id, email))
                .await?;
        }

        if let Some(password) = new_password.filter(|p| !p.is_empty()) {
            let digest = self.hash_password(password).await?;
            self.store(
                "update_password",
                self.users.update_password(user_id, &digest),
            )
            .await?;
        }

        self.profile(user_id).await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AuthError> {
        self.store("list_all", self.users.list_all()).await
    }

    /// Takes effect at the user's next login; live session tokens keep the
    /// role they were issued with until they expire.
    pub async fn update_role(&self, user_id: Uuid, role: Role) -> Result<(), AuthError> {
        self.store("update_role", self.users.update_role(user_id, role))
            .await?;
        info!(%user_id, %role, "User role updated");
        Ok(())
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.store("delete", self.users.delete(user_id)).await?;
        info!(%user_id, "User deleted");
        Ok(())
    }

    /// Create the bootstrap admin unless the email is already registered.
    /// Returns true when an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        if let Some(existing) = self
            .store("find_by_email", self.users.find_by_email(email))
            .await?
        {
            if existing.role != Role::Admin {
                warn!(user_id = %existing.id, role = %existing.role, "Bootstrap admin email belongs to a non-admin account");
            }
            return Ok(false);
        }

        let admin = self.create_user(email, password, Role::Admin).await?;
        info!(user_id = %admin.id, "Bootstrap admin created");
        Ok(true)
    }

    /// Drop expired reset records; called by the periodic sweeper
    pub async fn purge_expired_resets(&self, now: DateTime<Utc>) -> usize {
        self.resets.purge_expired(now).await
    }

    async fn create_user(&self, email: &str, password: &str, role: Role) -> Result<User, AuthError> {
        check_length(password)?;
        if self
            .store("find_by_email", self.users.find_by_email(email))
            .await?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: self.hash_password(password).await?,
            role,
            created_at: Utc::now().to_rfc3339(),
        };
        self.store("create", self.users.create(&user)).await?;
        Ok(user)
    }

    /// Apply the store deadline and fold outages into `PersistenceUnavailable`
    async fn store<T, F>(&self, op: &'static str, fut: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(StoreError::Unavailable(reason))) => {
                warn!(op, %reason, "Credential store unavailable");
                Err(AuthError::PersistenceUnavailable)
            }
            Ok(Err(StoreError::Corrupt(reason))) => {
                error!(op, %reason, "Credential store returned an unreadable record");
                Err(AuthError::CorruptRecord)
            }
            Ok(Err(err)) => Err(err.into()),
            Err(_) => {
                warn!(
                    op,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "Credential store deadline exceeded"
                );
                Err(AuthError::PersistenceUnavailable)
            }
        }
    }

    async fn hash_password(&self, plaintext: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| {
                error!(error = %e, "Hashing task failed");
                AuthError::Hashing
            })?
    }

    async fn verify_password(&self, plaintext: &str, digest: &str) -> bool {
        let hasher = self.hasher.clone();
        let plaintext = plaintext.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &digest))
            .await
            .unwrap_or(false)
    }

    async fn verify_dummy(&self, plaintext: &str) {
        let hasher = self.hasher.clone();
        let plaintext = plaintext.to_string();
        let _ = tokio::task::spawn_blocking(move || hasher.verify_dummy(&plaintext)).await;
    }
}
