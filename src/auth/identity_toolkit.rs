use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::{AuthError, AuthProvider, Credentials, Session};
use crate::config::{AppConfig, ConfigError};

/// Identity Toolkit REST client (email + password accounts).
pub struct IdentityToolkitClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl IdentityToolkitClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        config.require_remote()?;
        Ok(Self::new(&config.auth_base_url, &config.api_key))
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}?key={}", self.base_url, method, self.api_key)
    }

    async fn call<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<R, AuthError> {
        let response = self
            .client
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    AuthError::Transport(format!("Cannot reach identity provider at {}", self.base_url))
                } else {
                    // The request URL carries the API key.
                    AuthError::Transport(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(method, status = status.as_u16(), "Identity provider rejected request");
            return Err(map_provider_error(&body));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(e.to_string()))
    }

    async fn password_account(&self, method: &str, credentials: &Credentials) -> Result<Session, AuthError> {
        let body = PasswordRequest {
            email: &credentials.email,
            password: credentials.password.as_str(),
            return_secure_token: true,
        };
        let reply: TokenResponse = self.call(method, &body).await?;
        reply.into_session()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    refresh_token: String,
    /// Seconds, sent as a string.
    expires_in: String,
    #[serde(default)]
    email: Option<String>,
}

impl TokenResponse {
    fn into_session(self) -> Result<Session, AuthError> {
        let secs: i64 = self
            .expires_in
            .parse()
            .map_err(|_| AuthError::InvalidResponse(format!("expiresIn {:?}", self.expires_in)))?;
        let expires_at = TimeDelta::try_seconds(secs)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| AuthError::InvalidResponse(format!("expiresIn {} out of range", secs)))?;
        Ok(Session::new(
            self.local_id,
            self.email,
            self.id_token,
            self.refresh_token,
            expires_at,
        ))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Map `{"error":{"message":"CODE : detail"}}` to an [`AuthError`].
fn map_provider_error(body: &str) -> AuthError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string());
    let (code, detail) = match message.split_once(" : ") {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            AuthError::InvalidCredentials
        }
        "EMAIL_EXISTS" => AuthError::EmailExists,
        "INVALID_EMAIL" => AuthError::InvalidEmail,
        "WEAK_PASSWORD" => AuthError::WeakPassword(detail.to_string()),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyAttempts,
        "USER_DISABLED" => AuthError::UserDisabled,
        other => AuthError::Provider {
            code: other.to_string(),
            message: detail.to_string(),
        },
    }
}

#[async_trait]
impl AuthProvider for IdentityToolkitClient {
    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.password_account("signInWithPassword", credentials).await
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        self.password_account("signUp", credentials).await
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let body = OobRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        let _: serde_json::Value = self.call("sendOobCode", &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    async fn accounts(
        Path(method): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        if query.get("key").map(String::as_str) != Some("test-key") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": 400, "message": "API key not valid"}})),
            );
        }
        match method.as_str() {
            "accounts:signInWithPassword" if body["password"] == "right-pass" => (
                StatusCode::OK,
                Json(json!({
                    "localId": "uid-42",
                    "idToken": "id-token",
                    "refreshToken": "refresh-token",
                    "expiresIn": "3600",
                    "email": body["email"],
                })),
            ),
            "accounts:signInWithPassword" => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": 400, "message": "INVALID_LOGIN_CREDENTIALS"}})),
            ),
            "accounts:signUp" => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": {"code": 400, "message": "WEAK_PASSWORD : Password should be at least 6 characters"}})),
            ),
            "accounts:sendOobCode" if body["requestType"] == "PASSWORD_RESET" => {
                (StatusCode::OK, Json(json!({"email": body["email"]})))
            }
            _ => (StatusCode::NOT_FOUND, Json(json!({}))),
        }
    }

    async fn spawn_provider() -> String {
        let app = Router::new().route("/v1/:method", post(accounts));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    fn creds(password: &str) -> Credentials {
        Credentials::new("me@example.com", password).unwrap()
    }

    #[tokio::test]
    async fn sign_in_returns_session() {
        let client = IdentityToolkitClient::new(&spawn_provider().await, "test-key");
        let session = client.sign_in(&creds("right-pass")).await.unwrap();
        assert_eq!(session.user_id(), "uid-42");
        assert_eq!(session.id_token(), "id-token");
        assert_eq!(session.email(), Some("me@example.com"));
        assert!(!session.is_expired_at(Utc::now()));
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let client = IdentityToolkitClient::new(&spawn_provider().await, "test-key");
        let err = client.sign_in(&creds("wrong")).await.unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[tokio::test]
    async fn provider_detail_is_kept() {
        let client = IdentityToolkitClient::new(&spawn_provider().await, "test-key");
        let err = client.sign_up(&creds("abc")).await.unwrap_err();
        assert_eq!(
            err,
            AuthError::WeakPassword("Password should be at least 6 characters".into())
        );
    }

    #[tokio::test]
    async fn password_reset_sends_oob_request() {
        let client = IdentityToolkitClient::new(&spawn_provider().await, "test-key");
        client.send_password_reset("me@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_provider_is_transport_error() {
        let client = IdentityToolkitClient::new("http://127.0.0.1:9", "test-key");
        let err = client.sign_in(&creds("x")).await.unwrap_err();
        assert!(matches!(err, AuthError::Transport(_)));
    }

    #[test]
    fn unknown_codes_fall_through() {
        assert_eq!(
            map_provider_error(r#"{"error":{"message":"OPERATION_NOT_ALLOWED"}}"#),
            AuthError::Provider {
                code: "OPERATION_NOT_ALLOWED".into(),
                message: String::new()
            }
        );
        assert_eq!(map_provider_error(r#"{"error":{"message":"EMAIL_EXISTS"}}"#), AuthError::EmailExists);
    }

    #[test]
    fn from_config_needs_api_key() {
        let config = AppConfig::default();
        assert!(matches!(
            IdentityToolkitClient::from_config(&config),
            Err(ConfigError::Missing("api_key"))
        ));
    }

    fn token_reply(expires_in: &str) -> TokenResponse {
        TokenResponse {
            local_id: "uid-42".into(),
            id_token: "id-token".into(),
            refresh_token: String::new(),
            expires_in: expires_in.into(),
            email: None,
        }
    }

    #[test]
    fn out_of_range_expiry_is_invalid_response() {
        let err = token_reply(&i64::MAX.to_string()).into_session().unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
        let err = token_reply("soon").into_session().unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
        assert!(token_reply("3600").into_session().is_ok());
    }

    #[tokio::test]
    async fn transport_error_hides_api_key() {
        // Accepts the connection, then drops it without replying.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });
        let client = IdentityToolkitClient::new(&format!("http://{addr}/v1"), "secret-key");
        let err = client.sign_in(&creds("x")).await.unwrap_err();
        match err {
            AuthError::Transport(message) => assert!(!message.contains("secret-key"), "{message}"),
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn endpoint_format() {
        let client = IdentityToolkitClient::new("https://id.example.com/v1/", "k");
        assert_eq!(
            client.endpoint("signUp"),
            "https://id.example.com/v1/accounts:signUp?key=k"
        );
    }
}
