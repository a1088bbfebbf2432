//! Startup credentials.
//!
//! Credentials are resolved exactly once, before any store or broker client is
//! built. A failure here is fatal: the process must not start serving with
//! missing credentials.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[cfg(feature = "aws")]
pub mod lambda;

#[cfg(feature = "aws")]
pub use lambda::LambdaSecretsBootstrap;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    /// The remote secrets call itself failed.
    #[error("secrets call failed: {0}")]
    Invoke(String),

    /// The remote function ran and reported an error.
    #[error("secrets function reported an error: {0}")]
    Remote(String),

    /// The response did not have the expected shape.
    #[error("malformed secrets payload: {0}")]
    Malformed(String),

    /// A required value was absent from the environment.
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("secrets bootstrap timed out after {0:?}")]
    Timeout(Duration),
}

/// Access key pair used by the store and broker clients.
///
/// Immutable once resolved. `Debug` output is redacted and the type is not
/// serializable, so it cannot end up in logs or responses by accident.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(rename = "AWS_ACCESS_KEY_ID")]
    access_key_id: String,
    #[serde(rename = "AWS_SECRET_ACCESS_KEY")]
    secret_access_key: String,
    #[serde(rename = "AWS_SESSION_TOKEN", default)]
    session_token: Option<String>,
}

impl Credentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    pub fn secret_access_key(&self) -> &str {
        &self.secret_access_key
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Resolves the process-wide credentials.
#[async_trait]
pub trait SecretsBootstrap: Send + Sync {
    async fn resolve(&self) -> Result<Credentials, BootstrapError>;
}

/// Run a bootstrap, turning a stall into [`BootstrapError::Timeout`].
pub async fn resolve_with_timeout<S>(
    bootstrap: &S,
    limit: Duration,
) -> Result<Credentials, BootstrapError>
where
    S: SecretsBootstrap + ?Sized,
{
    tokio::time::timeout(limit, bootstrap.resolve())
        .await
        .map_err(|_| BootstrapError::Timeout(limit))?
}

/// Reads credentials from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretsBootstrap;

impl EnvSecretsBootstrap {
    pub fn resolve_from<F>(lookup: F) -> Result<Credentials, BootstrapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access =
            lookup("AWS_ACCESS_KEY_ID").ok_or(BootstrapError::Missing("AWS_ACCESS_KEY_ID"))?;
        let secret =
            lookup("AWS_SECRET_ACCESS_KEY")
                .ok_or(BootstrapError::Missing("AWS_SECRET_ACCESS_KEY"))?;

        let mut creds = Credentials::new(access, secret);
        if let Some(token) = lookup("AWS_SESSION_TOKEN") {
            creds = creds.with_session_token(token);
        }
        Ok(creds)
    }
}

#[async_trait]
impl SecretsBootstrap for EnvSecretsBootstrap {
    async fn resolve(&self) -> Result<Credentials, BootstrapError> {
        Self::resolve_from(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }
}

/// Fixed credentials (tests/dev).
#[derive(Debug, Clone)]
pub struct StaticSecrets(pub Credentials);

#[async_trait]
impl SecretsBootstrap for StaticSecrets {
    async fn resolve(&self) -> Result<Credentials, BootstrapError> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct InvocationPayload {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
    body: Option<String>,
}

#[derive(Deserialize)]
struct SecretBody {
    secret: String,
}

/// Decode the response of the secrets function.
///
/// The function answers with a JSON document. On failure it carries
/// `errorMessage`; on success `body` is a JSON *string* whose `secret` member
/// is itself a JSON *string* holding the key pair.
pub fn parse_lambda_payload(payload: &[u8]) -> Result<Credentials, BootstrapError> {
    let outer: InvocationPayload = serde_json::from_slice(payload)
        .map_err(|e| BootstrapError::Malformed(format!("payload: {e}")))?;

    if let Some(message) = outer.error_message {
        return Err(BootstrapError::Remote(message));
    }

    let body = outer
        .body
        .ok_or_else(|| BootstrapError::Malformed("payload has no body".to_string()))?;
    let body: SecretBody = serde_json::from_str(&body)
        .map_err(|e| BootstrapError::Malformed(format!("body: {e}")))?;

    serde_json::from_str(&body.secret)
        .map_err(|e| BootstrapError::Malformed(format!("secret: {e}")))
}
