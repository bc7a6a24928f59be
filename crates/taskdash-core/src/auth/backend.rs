use async_trait::async_trait;
use serde::Deserialize;

use crate::api::ApiError;

/// Body of a successful `POST /auth/login/`.
/// Both fields are optional on the wire so a partial response can be
/// reported as a protocol error instead of a parse failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginTokens {
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Body of a successful `POST /auth/refresh/`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshedToken {
    #[serde(default)]
    pub access: Option<String>,
}

/// Auth endpoints the session manager talks to.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, login: &str, password: &str) -> Result<LoginTokens, ApiError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError>;

    /// Ask the server whether `token` is currently valid
    async fn verify(&self, token: &str) -> Result<bool, ApiError>;

    async fn register(&self, login: &str, password: &str) -> Result<(), ApiError>;
}
