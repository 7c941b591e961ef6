//! Authentication service layer
//!
//! Signup, login, token issuance/rotation and bearer verification. Every
//! issued token pair is backed by a session row; a token that verifies
//! cryptographically but has no active row is rejected.

use super::jwt::{generate_token, validate_token, JwtConfig, TokenKind};
use super::models::{AuthResponse, LoginRequest, SignupRequest, TokenPair};
use super::password::{validate_password_strength, PasswordCodec};
use chrono::Utc;
use std::sync::Arc;
use todoguard_core::{
    DomainError, NewUser, Result, Session, SessionRepository, Store, User, UserRepository, UserRole,
};
use uuid::Uuid;

/// Authentication service
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt: JwtConfig,
    passwords: PasswordCodec,
    enforce_password_strength: bool,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn Store>,
        jwt: JwtConfig,
        passwords: PasswordCodec,
        enforce_password_strength: bool,
    ) -> Self {
        Self {
            store,
            jwt,
            passwords,
            enforce_password_strength,
        }
    }

    /// Decrypt a client password blob; every failure is `InvalidCredentials`
    fn decrypt_password(&self, encrypted: &str) -> Result<String> {
        self.passwords.decrypt(encrypted).map_err(|e| {
            tracing::debug!(error = %e, "Password decryption failed");
            DomainError::InvalidCredentials
        })
    }

    /// Register a new `user` account and open its first session
    pub async fn sign_up(&self, request: SignupRequest) -> Result<AuthResponse> {
        let password = self.decrypt_password(&request.password)?;

        if self.enforce_password_strength {
            validate_password_strength(&password).map_err(DomainError::BadRequest)?;
        }

        let password_hash = self
            .passwords
            .hash(&password)
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        let user = self
            .store
            .create_user(NewUser {
                name: request.name.trim().to_string(),
                email: request.email.trim().to_lowercase(),
                password_hash: Some(password_hash),
                role: UserRole::User,
            })
            .await?;

        let tokens = self.generate_token(&user).await?;
        tracing::info!(user_id = %user.id, "User signed up");

        Ok(AuthResponse::new(user, tokens))
    }

    /// Authenticate by email, encrypted password and role
    pub async fn sign_in(&self, request: LoginRequest, role: UserRole) -> Result<AuthResponse> {
        let password = self.decrypt_password(&request.password)?;
        let email = request.email.trim().to_lowercase();

        let user = self
            .store
            .find_user_by_email_and_role(&email, role)
            .await?
            .ok_or_else(|| role.not_found_error())?;

        let hash = user
            .password
            .as_deref()
            .ok_or(DomainError::EmptyPassword)?;

        if !self.passwords.verify(hash, &password) {
            return Err(DomainError::InvalidCredentials);
        }

        if !user.can_login() {
            return Err(DomainError::UserBlocked);
        }

        let now = Utc::now();
        self.store.record_login(user.id, now).await?;

        let tokens = self.generate_token(&user).await?;
        let user = User {
            last_login_time: Some(now),
            ..user
        };

        Ok(AuthResponse::new(user, tokens))
    }

    /// Mint an access/refresh pair and persist it as a session
    pub async fn generate_token(&self, user: &User) -> Result<TokenPair> {
        let tokens = self.mint_pair(user.id)?;
        self.store
            .upsert_session(user.id, &tokens.access_token, &tokens.refresh_token)
            .await?;
        Ok(tokens)
    }

    /// Resolve a bearer token to its user.
    ///
    /// Refresh flow checks the token against the refresh secret and the
    /// session's refresh column; otherwise the access secret and column.
    pub async fn verify_access_token(&self, token: &str, refresh_flow: bool) -> Result<User> {
        let kind = if refresh_flow {
            TokenKind::Refresh
        } else {
            TokenKind::Access
        };

        let claims = validate_token(&self.jwt, kind, token).map_err(|e| {
            tracing::debug!(error = %e, ?kind, "Token verification failed");
            DomainError::DeviceSessionExpired
        })?;

        let user = self
            .store
            .find_user(claims.id)
            .await?
            .ok_or(DomainError::DeviceSessionExpired)?;

        self.active_session(user.id, token, kind)
            .await?
            .ok_or(DomainError::DeviceSessionExpired)?;

        Ok(user)
    }

    /// Exchange a refresh token for a new pair; the session row is updated in place
    pub async fn rotate_refresh_token(&self, refresh_token: &str, user_id: Uuid) -> Result<TokenPair> {
        let session = self
            .store
            .find_active_session_by_refresh_token(user_id, refresh_token)
            .await?
            .ok_or(DomainError::DeviceSessionExpired)?;

        let tokens = self.mint_pair(user_id)?;
        self.store
            .rotate_session(
                session.id,
                refresh_token,
                &tokens.access_token,
                &tokens.refresh_token,
            )
            .await?
            .ok_or(DomainError::DeviceSessionExpired)?;

        Ok(tokens)
    }

    /// Deactivate the session holding `access_token`
    pub async fn sign_out(&self, user_id: Uuid, access_token: &str) -> Result<Session> {
        let session = self
            .store
            .find_active_session_by_access_token(user_id, access_token)
            .await?
            .ok_or(DomainError::DeviceSessionExpired)?;

        self.store.deactivate_session(session.id).await?;
        Ok(session)
    }

    async fn active_session(
        &self,
        user_id: Uuid,
        token: &str,
        kind: TokenKind,
    ) -> Result<Option<Session>> {
        match kind {
            TokenKind::Access => {
                self.store
                    .find_active_session_by_access_token(user_id, token)
                    .await
            }
            TokenKind::Refresh => {
                self.store
                    .find_active_session_by_refresh_token(user_id, token)
                    .await
            }
        }
    }

    fn mint_pair(&self, user_id: Uuid) -> Result<TokenPair> {
        let access_token = generate_token(&self.jwt, TokenKind::Access, user_id)
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        let refresh_token = generate_token(&self.jwt, TokenKind::Refresh, user_id)
            .map_err(|e| DomainError::Internal(e.to_string()))?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}
