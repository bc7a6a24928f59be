//! API client for the ML task backend.
//!
//! Auth endpoints return typed [`ApiError`]s so the session manager can
//! classify failures. Data endpoints return `anyhow::Result` with context.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, multipart, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{AuthBackend, LoginTokens, RefreshedToken};
use crate::models::{MlModel, Page, PageSchema, Task, TaskDetail, TaskDetailSchema, TaskSchema};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/api/v1/auth/login/";
const REFRESH_PATH: &str = "/api/v1/auth/refresh/";
const VERIFY_PATH: &str = "/api/v1/auth/verify/";
const REGISTER_PATH: &str = "/api/v1/auth/register/";
const MODELS_PATH: &str = "/api/v1/ml/models/";
const TASKS_PATH: &str = "/api/v1/ml/tasks/";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Shown when an upload fails without a server message
const UPLOAD_FAILED: &str = "failed to upload file";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    token: &'a str,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verify: bool,
}

/// API client for the task backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client for `base_url` (scheme + host, no `/api` suffix)
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
            initial_backoff: self.initial_backoff,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            Self::check_response(response).await.map(Some)
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn parse_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// POST a JSON body without auth or retries (auth endpoints)
    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        let response = Self::check_response(response).await?;
        Self::parse_json(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(self.auth_headers()?)
                .query(query)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return Self::parse_json(response)
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// List the models a task can be created against
    pub async fn list_models(&self) -> Result<Vec<MlModel>> {
        self.get(MODELS_PATH, &[]).await
    }

    /// Fetch one page of the current user's tasks
    pub async fn list_tasks(&self, current_page: u32, batch_size: u32) -> Result<Page<Task>> {
        let raw: PageSchema<TaskSchema> = self
            .get(
                TASKS_PATH,
                &[
                    ("current_page", current_page.to_string()),
                    ("batch_size", batch_size.to_string()),
                ],
            )
            .await?;
        debug!(count = raw.data.len(), total = raw.total_count, "Tasks fetched");
        Ok(Page::from_schema(raw))
    }

    pub async fn get_task(&self, task_id: &str) -> Result<TaskDetail> {
        let raw: TaskDetailSchema = self.get(&format!("{}{}/", TASKS_PATH, task_id), &[]).await?;
        Ok(raw.into())
    }

    /// Upload `bytes` as a new task for `model_id`.
    ///
    /// On rejection the error carries the server's `detail` (or `error`)
    /// message when there is one.
    pub async fn upload_task(&self, model_id: &str, file_name: &str, bytes: Vec<u8>) -> Result<TaskDetail> {
        let url = self.url(&format!("{}{}/", TASKS_PATH, model_id));
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .put(&url)
            .headers(self.auth_headers()?)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("Failed to send upload to {}", url))?;

        let response = match Self::check_response(response).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Upload rejected");
                let message = e
                    .detail()
                    .or_else(|| e.error_message())
                    .unwrap_or_else(|| UPLOAD_FAILED.to_string());
                return Err(anyhow::Error::new(e).context(message));
            }
        };

        let raw: TaskDetailSchema = Self::parse_json(response)
            .await
            .context("Failed to parse upload response")?;
        Ok(raw.into())
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, login: &str, password: &str) -> Result<LoginTokens, ApiError> {
        self.post_json(LOGIN_PATH, &LoginRequest { login, password }).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        self.post_json(REFRESH_PATH, &TokenRequest { token: refresh_token })
            .await
    }

    async fn verify(&self, token: &str) -> Result<bool, ApiError> {
        let response: VerifyResponse = self.post_json(VERIFY_PATH, &TokenRequest { token }).await?;
        Ok(response.verify)
    }

    async fn register(&self, login: &str, password: &str) -> Result<(), ApiError> {
        let url = self.url(REGISTER_PATH);
        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { login, password })
            .send()
            .await?;
        Self::check_response(response).await?;
        Ok(())
    }
}
