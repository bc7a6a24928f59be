//! In-process stand-in for the auth endpoints, shared by session and guard tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::backend::{AuthBackend, LoginTokens, RefreshedToken};
use crate::api::ApiError;

pub(crate) enum LoginReply {
    Tokens(LoginTokens),
    Status(u16, String),
}

pub(crate) struct FakeBackend {
    pub valid_tokens: Mutex<HashSet<String>>,
    pub login_reply: Mutex<LoginReply>,
    /// `None` makes the refresh endpoint fail with a server error
    pub refresh_reply: Mutex<Option<RefreshedToken>>,
    pub verify_fails: Mutex<bool>,
    /// Tokens whose verification fails in transport
    pub unreachable_tokens: Mutex<HashSet<String>>,
    pub register_reply: Mutex<Option<(u16, &'static str)>>,
    /// When set, login and register wait for a notification before replying
    pub hold: Mutex<Option<Arc<Notify>>>,
    pub login_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub verify_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            valid_tokens: Mutex::new(HashSet::new()),
            login_reply: Mutex::new(LoginReply::Tokens(LoginTokens {
                access: Some("A".into()),
                refresh: Some("R".into()),
            })),
            refresh_reply: Mutex::new(Some(RefreshedToken {
                access: Some("A2".into()),
            })),
            verify_fails: Mutex::new(false),
            unreachable_tokens: Mutex::new(HashSet::new()),
            register_reply: Mutex::new(None),
            hold: Mutex::new(None),
            login_calls: AtomicUsize::new(0),
            register_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_valid(tokens: &[&str]) -> Self {
        let backend = Self::new();
        backend
            .valid_tokens
            .lock()
            .unwrap()
            .extend(tokens.iter().map(|t| t.to_string()));
        backend
    }

    pub fn set_login_reply(&self, reply: LoginReply) {
        *self.login_reply.lock().unwrap() = reply;
    }

    pub fn set_refresh_reply(&self, reply: Option<RefreshedToken>) {
        *self.refresh_reply.lock().unwrap() = reply;
    }

    pub fn set_verify_fails(&self, fails: bool) {
        *self.verify_fails.lock().unwrap() = fails;
    }

    /// Make login and register wait on `gate` until notified
    pub fn hold_replies(&self, gate: Arc<Notify>) {
        *self.hold.lock().unwrap() = Some(gate);
    }

    pub fn register_count(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    async fn wait_if_held(&self) {
        let gate = self.hold.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    pub fn fail_verify_for(&self, token: &str) {
        self.unreachable_tokens.lock().unwrap().insert(token.to_string());
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn verify_count(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn login_count(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    fn status_error(status: u16, body: &str) -> ApiError {
        let status = reqwest::StatusCode::from_u16(status).unwrap();
        ApiError::from_status(status, body)
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn login(&self, _login: &str, _password: &str) -> Result<LoginTokens, ApiError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;
        match &*self.login_reply.lock().unwrap() {
            LoginReply::Tokens(tokens) => Ok(tokens.clone()),
            LoginReply::Status(status, body) => Err(Self::status_error(*status, body)),
        }
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedToken, ApiError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.refresh_reply.lock().unwrap() {
            Some(reply) => Ok(reply.clone()),
            None => Err(Self::status_error(503, "unavailable")),
        }
    }

    async fn verify(&self, token: &str) -> Result<bool, ApiError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        let unreachable = self.unreachable_tokens.lock().unwrap().contains(token);
        if unreachable || *self.verify_fails.lock().unwrap() {
            return Err(ApiError::InvalidResponse("connection reset".into()));
        }
        Ok(self.valid_tokens.lock().unwrap().contains(token))
    }

    async fn register(&self, _login: &str, _password: &str) -> Result<(), ApiError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        self.wait_if_held().await;
        match *self.register_reply.lock().unwrap() {
            None => Ok(()),
            Some((status, body)) => Err(Self::status_error(status, body)),
        }
    }
}
