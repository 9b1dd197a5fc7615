//! Explicit caller identity.
//!
//! There is no ambient "current user": every store, service and screen call
//! takes an [`Identity`]. Sign-in replaces it with a [`Session`]; sign-out
//! drops the session locally.

pub mod identity_toolkit;

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::store::StoreError;

pub use identity_toolkit::IdentityToolkitClient;

/// Minimum password length accepted by the identity provider.
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});

// ═══════════════════════════════════════════════════════════
// Session / Identity
// ═══════════════════════════════════════════════════════════

/// A signed-in user. Tokens are zeroed on drop and never printed.
#[derive(Clone)]
pub struct Session {
    user_id: String,
    email: Option<String>,
    id_token: Zeroizing<String>,
    refresh_token: Zeroizing<String>,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        email: Option<String>,
        id_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email,
            id_token: Zeroizing::new(id_token.into()),
            refresh_token: Zeroizing::new(refresh_token.into()),
            expires_at,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Bearer token for the document database.
    pub fn id_token(&self) -> &str {
        &self.id_token
    }

    pub fn refresh_token(&self) -> &str {
        &self.refresh_token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("id_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    SignedIn(Session),
}

impl Identity {
    /// The session to act under, or `Unauthenticated` when there is none or
    /// it has expired.
    pub fn require(&self) -> Result<&Session, StoreError> {
        self.require_at(Utc::now())
    }

    pub fn require_at(&self, now: DateTime<Utc>) -> Result<&Session, StoreError> {
        match self {
            Identity::SignedIn(session) if !session.is_expired_at(now) => Ok(session),
            _ => Err(StoreError::Unauthenticated),
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::SignedIn(session) => Some(session.user_id()),
            Identity::Anonymous => None,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.require().is_ok()
    }

    /// Local sign-out: the session (and its tokens) are dropped.
    pub fn sign_out(&mut self) {
        if let Identity::SignedIn(session) = std::mem::take(self) {
            tracing::info!(user_id = %session.user_id(), "Signed out");
        }
    }

    #[cfg(test)]
    pub(crate) fn signed_in_for_tests(user_id: &str) -> Self {
        Identity::SignedIn(Session::new(
            user_id,
            None,
            "test-id-token",
            "test-refresh-token",
            Utc::now() + chrono::Duration::hours(1),
        ))
    }

    #[cfg(test)]
    pub(crate) fn expired_for_tests(user_id: &str) -> Self {
        Identity::SignedIn(Session::new(
            user_id,
            None,
            "stale",
            "stale",
            Utc::now() - chrono::Duration::minutes(1),
        ))
    }
}

// ═══════════════════════════════════════════════════════════
// Credentials
// ═══════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: Zeroizing<String>,
}

impl Credentials {
    /// Trims the email and checks its shape. The password is checked by the
    /// provider on sign-in, and by [`validate_sign_up`] on sign-up.
    pub fn new(email: &str, password: &str) -> Result<Self, AuthError> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(AuthError::PasswordRequired);
        }
        Ok(Self {
            email,
            password: Zeroizing::new(password.to_string()),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

pub fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::EmailRequired);
    }
    if !EMAIL_PATTERN.is_match(email) {
        return Err(AuthError::InvalidEmail);
    }
    Ok(email.to_string())
}

/// Sign-up form: both passwords must match and meet the minimum length.
pub fn validate_sign_up(email: &str, password: &str, confirm: &str) -> Result<Credentials, AuthError> {
    if password != confirm {
        return Err(AuthError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword(format!(
            "Password should be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Credentials::new(email, password)
}

// ═══════════════════════════════════════════════════════════
// Errors / provider seam
// ═══════════════════════════════════════════════════════════

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Please enter your email address")]
    EmailRequired,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please enter your password")]
    PasswordRequired,

    #[error("Passwords do not match!")]
    PasswordMismatch,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("An account already exists for this email")]
    EmailExists,

    #[error("Weak password: {0}")]
    WeakPassword(String),

    #[error("Too many attempts. Please try again later")]
    TooManyAttempts,

    #[error("This account has been disabled")]
    UserDisabled,

    #[error("Authentication failed ({code}): {message}")]
    Provider { code: String, message: String },

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Unexpected authentication response: {0}")]
    InvalidResponse(String),
}

/// Identity provider operations. Sign-out has no remote counterpart.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError>;
}

/// Sign in and replace `identity` with the new session. On failure the
/// previous identity is left untouched.
pub async fn sign_in<P: AuthProvider>(
    provider: &P,
    identity: &mut Identity,
    email: &str,
    password: &str,
) -> Result<(), AuthError> {
    let credentials = Credentials::new(email, password)?;
    let session = provider.sign_in(&credentials).await.inspect_err(|e| {
        tracing::warn!(error = %e, "Sign-in failed");
    })?;
    tracing::info!(user_id = %session.user_id(), "Signed in");
    *identity = Identity::SignedIn(session);
    Ok(())
}

pub async fn sign_up<P: AuthProvider>(
    provider: &P,
    identity: &mut Identity,
    email: &str,
    password: &str,
    confirm: &str,
) -> Result<(), AuthError> {
    let credentials = validate_sign_up(email, password, confirm)?;
    let session = provider.sign_up(&credentials).await.inspect_err(|e| {
        tracing::warn!(error = %e, "Sign-up failed");
    })?;
    tracing::info!(user_id = %session.user_id(), "Account created");
    *identity = Identity::SignedIn(session);
    Ok(())
}

pub async fn reset_password<P: AuthProvider>(provider: &P, email: &str) -> Result<(), AuthError> {
    let email = validate_email(email)?;
    provider.send_password_reset(&email).await?;
    tracing::info!("Password reset email requested");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        accept: bool,
    }

    #[async_trait]
    impl AuthProvider for FixedProvider {
        async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
            if self.accept {
                Ok(Session::new(
                    "uid-1",
                    Some(credentials.email.clone()),
                    "tok",
                    "ref",
                    Utc::now() + chrono::Duration::hours(1),
                ))
            } else {
                Err(AuthError::InvalidCredentials)
            }
        }

        async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError> {
            self.sign_in(credentials).await
        }

        async fn send_password_reset(&self, _email: &str) -> Result<(), AuthError> {
            Ok(())
        }
    }

    #[test]
    fn anonymous_is_default_and_unauthenticated() {
        let identity = Identity::default();
        assert!(matches!(identity.require(), Err(StoreError::Unauthenticated)));
        assert_eq!(identity.user_id(), None);
    }

    #[test]
    fn expired_session_is_rejected() {
        let identity = Identity::expired_for_tests("u1");
        assert!(matches!(identity.require(), Err(StoreError::Unauthenticated)));
        assert_eq!(identity.user_id(), Some("u1"));
        assert!(!identity.is_signed_in());
    }

    #[test]
    fn sign_out_drops_session() {
        let mut identity = Identity::signed_in_for_tests("u1");
        assert!(identity.is_signed_in());
        identity.sign_out();
        assert!(matches!(identity, Identity::Anonymous));
    }

    #[test]
    fn debug_output_redacts_tokens() {
        let identity = Identity::signed_in_for_tests("u1");
        let text = format!("{identity:?}");
        assert!(text.contains("u1"));
        assert!(!text.contains("test-id-token"));

        let creds = Credentials::new("a@b.co", "hunter22").unwrap();
        assert!(!format!("{creds:?}").contains("hunter22"));
    }

    #[test]
    fn email_shape_is_checked() {
        assert_eq!(validate_email("  me@example.com ").unwrap(), "me@example.com");
        assert_eq!(validate_email(""), Err(AuthError::EmailRequired));
        assert_eq!(validate_email("not-an-email"), Err(AuthError::InvalidEmail));
        assert_eq!(validate_email("a b@c.de"), Err(AuthError::InvalidEmail));
    }

    #[test]
    fn sign_up_requires_matching_passwords() {
        assert_eq!(
            validate_sign_up("me@example.com", "secret1", "secret2").unwrap_err(),
            AuthError::PasswordMismatch
        );
        assert!(matches!(
            validate_sign_up("me@example.com", "abc", "abc").unwrap_err(),
            AuthError::WeakPassword(_)
        ));
        assert!(validate_sign_up("me@example.com", "secret1", "secret1").is_ok());
    }

    #[tokio::test]
    async fn sign_in_replaces_identity() {
        let mut identity = Identity::Anonymous;
        sign_in(&FixedProvider { accept: true }, &mut identity, "me@example.com", "pw")
            .await
            .unwrap();
        assert_eq!(identity.user_id(), Some("uid-1"));
    }

    #[tokio::test]
    async fn failed_sign_in_keeps_previous_identity() {
        let mut identity = Identity::signed_in_for_tests("old");
        let err = sign_in(&FixedProvider { accept: false }, &mut identity, "me@example.com", "pw")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert_eq!(identity.user_id(), Some("old"));
    }

    #[tokio::test]
    async fn reset_requires_email() {
        let err = reset_password(&FixedProvider { accept: true }, "  ").await.unwrap_err();
        assert_eq!(err, AuthError::EmailRequired);
    }
}
