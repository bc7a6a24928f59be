use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use super::backend::{AuthBackend, RefreshedToken};
use super::store::TokenStore;
use super::{CredentialPair, SessionError};
use crate::api::ApiError;

/// Message left in `SessionState::error` when a refresh cannot recover the session
pub const SESSION_EXPIRED: &str = "session expired";

/// Session validity as tracked by the manager.
///
/// ```text
/// Unauthenticated --login--> AccessValid
/// Unauthenticated --load(complete pair)--> Unverified
/// Unverified --check(access)=true--> AccessValid
/// Unverified --check(access)=false--> AccessExpiredRefreshValid
/// AccessValid --check(access)=false--> AccessExpiredRefreshValid
/// AccessExpiredRefreshValid --refresh ok--> AccessValid
/// AccessExpiredRefreshValid --refresh fails / check(refresh)=false--> Invalid
/// any --logout--> Unauthenticated
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Unauthenticated,
    /// Tokens read from storage that nothing has verified yet
    Unverified,
    AccessValid,
    AccessExpiredRefreshValid,
    Invalid,
}

/// Everything the UI reads about the session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub credentials: CredentialPair,
    pub status: SessionStatus,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Owner of the in-memory session and the only writer of the token store.
///
/// Share it behind an `Arc`; every operation takes `&self`. The state lock
/// is never held across a network call, so concurrent `login`/`refresh`
/// calls are last-write-wins on both memory and storage.
pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    store: Arc<dyn TokenStore>,
    state: Mutex<SessionState>,
}

/// Clears `is_loading` on every exit path, including a dropped future
struct LoadingFlag<'a>(&'a SessionManager);

impl<'a> LoadingFlag<'a> {
    fn raise(manager: &'a SessionManager) -> Self {
        let mut state = manager.lock();
        state.is_loading = true;
        state.error = None;
        Self(manager)
    }
}

impl Drop for LoadingFlag<'_> {
    fn drop(&mut self) {
        self.0.lock().is_loading = false;
    }
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AuthBackend>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            backend,
            store,
            state: Mutex::new(SessionState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock().status
    }

    pub fn credentials(&self) -> CredentialPair {
        self.lock().credentials.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock().credentials.access_token.clone()
    }

    /// True only for a complete pair whose access token is believed valid
    pub fn is_authenticated(&self) -> bool {
        let state = self.lock();
        state.status == SessionStatus::AccessValid && state.credentials.is_complete()
    }

    // =========================================================================
    // Login / registration
    // =========================================================================

    pub async fn login(&self, login: &str, password: &str) -> Result<(), SessionError> {
        let _loading = LoadingFlag::raise(self);

        let result = self.request_tokens(login, password).await;
        match result {
            Ok(pair) => {
                {
                    let mut state = self.lock();
                    state.credentials = pair.clone();
                    state.status = SessionStatus::AccessValid;
                }
                if let Err(e) = self.store.save(&pair) {
                    warn!(error = %e, "Failed to persist tokens after login");
                }
                info!("Login successful");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Login failed");
                self.lock().error = Some(e.to_string());
                Err(e)
            }
        }
    }

    async fn request_tokens(&self, login: &str, password: &str) -> Result<CredentialPair, SessionError> {
        let tokens = self
            .backend
            .login(login, password)
            .await
            .map_err(Self::classify_login_error)?;

        match (non_empty(tokens.access), non_empty(tokens.refresh)) {
            (Some(access), Some(refresh)) => Ok(CredentialPair::new(access, refresh)),
            _ => Err(SessionError::Protocol(
                "server response is missing tokens".to_string(),
            )),
        }
    }

    fn classify_login_error(err: ApiError) -> SessionError {
        debug!(error = %err, "Classifying login error");
        if err.status() == Some(401) {
            SessionError::InvalidCredentials
        } else if let Some(detail) = err.detail() {
            SessionError::Rejected(detail)
        } else {
            SessionError::LoginFailed
        }
    }

    /// Create an account. Tokens are untouched; log in afterwards.
    pub async fn register(&self, login: &str, password: &str) -> Result<(), SessionError> {
        let _loading = LoadingFlag::raise(self);

        match self.backend.register(login, password).await {
            Ok(()) => {
                info!("Registration successful");
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Registration failed");
                let e = match err.detail() {
                    Some(detail) => SessionError::Rejected(detail),
                    None => SessionError::RegistrationFailed,
                };
                self.lock().error = Some(e.to_string());
                Err(e)
            }
        }
    }

    // =========================================================================
    // Logout / refresh / verification
    // =========================================================================

    /// Drop both tokens from memory and storage. Never fails.
    pub fn logout(&self) {
        {
            let mut state = self.lock();
            state.credentials = CredentialPair::empty();
            state.status = SessionStatus::Unauthenticated;
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted tokens");
        }
        debug!("Logged out");
    }

    /// Trade the refresh token for a new access token.
    ///
    /// Any failure after the request is sent ends the session: both tokens are
    /// cleared and `error` is set to [`SESSION_EXPIRED`].
    pub async fn refresh(&self) -> Result<String, SessionError> {
        let refresh_token = self
            .lock()
            .credentials
            .refresh_token
            .clone()
            .ok_or(SessionError::NoRefreshToken)?;

        match self.backend.refresh(&refresh_token).await {
            Ok(RefreshedToken { access }) => match non_empty(access) {
                Some(access) => {
                    {
                        let mut state = self.lock();
                        state.credentials.access_token = Some(access.clone());
                        state.status = SessionStatus::AccessValid;
                        state.error = None;
                    }
                    if let Err(e) = self.store.save_access(&access) {
                        warn!(error = %e, "Failed to persist refreshed access token");
                    }
                    debug!("Access token refreshed");
                    Ok(access)
                }
                None => {
                    warn!("Refresh response carried no access token");
                    self.expire();
                    Err(SessionError::RefreshFailed)
                }
            },
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.expire();
                Err(SessionError::RefreshFailed)
            }
        }
    }

    fn expire(&self) {
        {
            let mut state = self.lock();
            state.credentials = CredentialPair::empty();
            state.status = SessionStatus::Invalid;
            state.error = Some(SESSION_EXPIRED.to_string());
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted tokens");
        }
    }

    /// Ask the server whether `token` is valid.
    ///
    /// Transport or parse failures yield `VerificationFailed` and leave the
    /// session alone; that says nothing about the token itself.
    pub async fn check(&self, token: &str) -> Result<bool, SessionError> {
        let verified = self.backend.verify(token).await.map_err(|e| {
            error!(error = %e, "Token verification request failed");
            SessionError::VerificationFailed
        })?;
        self.record_verification(token, verified);
        Ok(verified)
    }

    fn record_verification(&self, token: &str, verified: bool) {
        let mut state = self.lock();
        let is_access = state.credentials.access_token.as_deref() == Some(token);
        let is_refresh = state.credentials.refresh_token.as_deref() == Some(token);
        let has_refresh = state.credentials.refresh_token.is_some();

        let next = if is_access {
            match (verified, has_refresh) {
                (true, true) => SessionStatus::AccessValid,
                (true, false) => SessionStatus::Invalid,
                (false, true) => SessionStatus::AccessExpiredRefreshValid,
                (false, false) => SessionStatus::Invalid,
            }
        } else if is_refresh {
            match (verified, state.status) {
                (false, _) => SessionStatus::Invalid,
                (true, status @ (SessionStatus::AccessValid | SessionStatus::Unverified)) => status,
                (true, _) => SessionStatus::AccessExpiredRefreshValid,
            }
        } else {
            return;
        };
        state.status = next;
    }

    /// Reconcile memory with storage (another process or a restart may have
    /// changed it) and return what was loaded.
    pub fn load(&self) -> CredentialPair {
        let pair = match self.store.load() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted tokens, treating as logged out");
                CredentialPair::empty()
            }
        };

        let mut state = self.lock();
        if pair.is_empty() {
            state.status = SessionStatus::Unauthenticated;
        } else if pair.is_partial() {
            state.status = SessionStatus::Invalid;
        } else if state.credentials != pair {
            state.status = SessionStatus::Unverified;
        }
        state.credentials = pair.clone();
        debug!(
            has_access = pair.access_token.is_some(),
            has_refresh = pair.refresh_token.is_some(),
            "Tokens loaded"
        );
        pair
    }
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::backend::LoginTokens;
    use crate::auth::store::MemoryTokenStore;
    use crate::auth::testing::{FakeBackend, LoginReply};
    use tokio::sync::Notify;

    fn manager(backend: FakeBackend) -> (Arc<FakeBackend>, Arc<MemoryTokenStore>, SessionManager) {
        let backend = Arc::new(backend);
        let store = Arc::new(MemoryTokenStore::new());
        let session = SessionManager::new(backend.clone(), store.clone());
        (backend, store, session)
    }

    #[tokio::test]
    async fn test_login_persists_both_tokens() {
        let (_backend, store, session) = manager(FakeBackend::new());

        session.login("someone", "secret1").await.expect("login");

        let state = session.state();
        assert_eq!(state.credentials, CredentialPair::new("A", "R"));
        assert_eq!(store.load().unwrap(), state.credentials);
        assert_eq!(state.status, SessionStatus::AccessValid);
        assert!(!state.is_loading);
        assert!(state.error.is_none());
        assert!(session.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_missing_refresh_is_protocol_error() {
        let (backend, store, session) = manager(FakeBackend::new());
        store.save(&CredentialPair::new("old-a", "old-r")).unwrap();
        session.load();

        backend.set_login_reply(LoginReply::Tokens(LoginTokens {
            access: Some("A".into()),
            refresh: None,
        }));
        let err = session.login("someone", "secret1").await.unwrap_err();

        assert!(matches!(err, SessionError::Protocol(_)));
        assert_eq!(session.credentials(), CredentialPair::new("old-a", "old-r"));
        assert_eq!(store.load().unwrap(), CredentialPair::new("old-a", "old-r"));
        assert!(!session.state().is_loading);
    }

    #[tokio::test]
    async fn test_login_error_classification() {
        let (backend, _store, session) = manager(FakeBackend::new());

        backend.set_login_reply(LoginReply::Status(401, r#"{"detail": "nope"}"#.into()));
        assert_eq!(
            session.login("someone", "secret1").await.unwrap_err(),
            SessionError::InvalidCredentials
        );

        backend.set_login_reply(LoginReply::Status(400, r#"{"detail": "Account locked"}"#.into()));
        let err = session.login("someone", "secret1").await.unwrap_err();
        assert_eq!(err, SessionError::Rejected("Account locked".into()));
        assert_eq!(session.state().error.as_deref(), Some("Account locked"));

        backend.set_login_reply(LoginReply::Status(502, "bad gateway".into()));
        assert_eq!(
            session.login("someone", "secret1").await.unwrap_err(),
            SessionError::LoginFailed
        );
        assert!(!session.state().is_loading);
    }

    #[tokio::test]
    async fn test_login_detail_read_from_long_error_body() {
        let (backend, _store, session) = manager(FakeBackend::new());
        let body = serde_json::json!({"detail": "Account locked", "trace": "x".repeat(600)});

        backend.set_login_reply(LoginReply::Status(400, body.to_string()));
        assert_eq!(
            session.login("someone", "secret1").await.unwrap_err(),
            SessionError::Rejected("Account locked".into())
        );
    }

    #[tokio::test]
    async fn test_login_is_loading_while_in_flight() {
        let (backend, _store, session) = manager(FakeBackend::new());
        let session = Arc::new(session);
        let gate = Arc::new(Notify::new());
        backend.hold_replies(gate.clone());

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.login("someone", "secret1").await }
        });
        while backend.login_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(session.state().is_loading);
        gate.notify_one();
        call.await.unwrap().expect("login");
        assert!(!session.state().is_loading);
    }

    #[tokio::test]
    async fn test_failed_register_is_loading_while_in_flight() {
        let (backend, _store, session) = manager(FakeBackend::new());
        *backend.register_reply.lock().unwrap() = Some((400, r#"{"detail": "Login taken"}"#));
        let session = Arc::new(session);
        let gate = Arc::new(Notify::new());
        backend.hold_replies(gate.clone());

        let call = tokio::spawn({
            let session = session.clone();
            async move { session.register("someone", "secret1").await }
        });
        while backend.register_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(session.state().is_loading);
        gate.notify_one();
        assert!(call.await.unwrap().is_err());
        let state = session.state();
        assert!(!state.is_loading);
        assert_eq!(state.error.as_deref(), Some("Login taken"));
    }

    #[tokio::test]
    async fn test_login_resets_previous_error() {
        let (backend, _store, session) = manager(FakeBackend::new());
        backend.set_login_reply(LoginReply::Status(401, "".into()));
        let _ = session.login("someone", "secret1").await;
        assert!(session.state().error.is_some());

        backend.set_login_reply(LoginReply::Tokens(LoginTokens {
            access: Some("A".into()),
            refresh: Some("R".into()),
        }));
        session.login("someone", "secret1").await.expect("login");
        assert!(session.state().error.is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_everything_and_is_idempotent() {
        let (_backend, store, session) = manager(FakeBackend::new());
        session.login("someone", "secret1").await.expect("login");

        session.logout();
        let once = session.state();
        session.logout();
        let twice = session.state();

        assert_eq!(once, twice);
        assert!(twice.credentials.is_empty());
        assert_eq!(twice.status, SessionStatus::Unauthenticated);
        assert_eq!(store.load().unwrap(), CredentialPair::empty());
        assert_eq!(session.load(), CredentialPair::empty());
    }

    #[tokio::test]
    async fn test_refresh_without_token_makes_no_request() {
        let (backend, _store, session) = manager(FakeBackend::new());

        assert_eq!(session.refresh().await.unwrap_err(), SessionError::NoRefreshToken);
        assert_eq!(backend.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_updates_only_access_token() {
        let (backend, store, session) = manager(FakeBackend::new());
        store
            .save(&CredentialPair {
                access_token: None,
                refresh_token: Some("R".into()),
            })
            .unwrap();
        session.load();

        let access = session.refresh().await.expect("refresh");

        assert_eq!(access, "A2");
        assert_eq!(backend.refresh_count(), 1);
        assert_eq!(session.credentials(), CredentialPair::new("A2", "R"));
        assert_eq!(store.load().unwrap(), CredentialPair::new("A2", "R"));
        assert_eq!(session.status(), SessionStatus::AccessValid);
    }

    #[tokio::test]
    async fn test_refresh_failure_expires_session() {
        let (backend, store, session) = manager(FakeBackend::new());
        session.login("someone", "secret1").await.expect("login");

        backend.set_refresh_reply(None);
        assert_eq!(session.refresh().await.unwrap_err(), SessionError::RefreshFailed);

        let state = session.state();
        assert!(state.credentials.is_empty());
        assert_eq!(state.error.as_deref(), Some(SESSION_EXPIRED));
        assert_eq!(state.status, SessionStatus::Invalid);
        assert!(store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_without_access_in_response_expires_session() {
        let (backend, store, session) = manager(FakeBackend::new());
        session.login("someone", "secret1").await.expect("login");

        backend.set_refresh_reply(Some(RefreshedToken { access: None }));
        assert_eq!(session.refresh().await.unwrap_err(), SessionError::RefreshFailed);
        assert!(session.credentials().is_empty());
        assert!(store.load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_drives_status() {
        let (backend, _store, session) = manager(FakeBackend::with_valid(&["R"]));
        session.login("someone", "secret1").await.expect("login");

        assert!(!session.check("A").await.unwrap());
        assert_eq!(session.status(), SessionStatus::AccessExpiredRefreshValid);

        backend.valid_tokens.lock().unwrap().remove("R");
        assert!(!session.check("R").await.unwrap());
        assert_eq!(session.status(), SessionStatus::Invalid);

        session.logout();
        assert_eq!(session.status(), SessionStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_check_transport_failure_keeps_session() {
        let (backend, _store, session) = manager(FakeBackend::new());
        session.login("someone", "secret1").await.expect("login");

        backend.set_verify_fails(true);
        assert_eq!(session.check("A").await.unwrap_err(), SessionError::VerificationFailed);
        assert_eq!(session.credentials(), CredentialPair::new("A", "R"));
        assert_eq!(session.status(), SessionStatus::AccessValid);
    }

    #[tokio::test]
    async fn test_load_reconciles_external_changes() {
        let (_backend, store, session) = manager(FakeBackend::new());
        assert_eq!(session.load(), CredentialPair::empty());
        assert_eq!(session.status(), SessionStatus::Unauthenticated);

        store.save(&CredentialPair::new("X", "Y")).unwrap();
        assert_eq!(session.load(), CredentialPair::new("X", "Y"));
        assert_eq!(session.credentials(), CredentialPair::new("X", "Y"));
        assert_eq!(session.status(), SessionStatus::Unverified);
        assert!(!session.is_authenticated());

        store
            .save(&CredentialPair {
                access_token: Some("Z".into()),
                refresh_token: None,
            })
            .unwrap();
        session.load();
        assert_eq!(session.status(), SessionStatus::Invalid);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_register_surfaces_server_detail() {
        let (backend, _store, session) = manager(FakeBackend::new());
        session.register("someone", "secret1").await.expect("register");

        *backend.register_reply.lock().unwrap() = Some((400, r#"{"detail": "Login taken"}"#));
        assert_eq!(
            session.register("someone", "secret1").await.unwrap_err(),
            SessionError::Rejected("Login taken".into())
        );

        *backend.register_reply.lock().unwrap() = Some((500, "boom"));
        assert_eq!(
            session.register("someone", "secret1").await.unwrap_err(),
            SessionError::RegistrationFailed
        );
        assert!(session.credentials().is_empty());
        assert_eq!(backend.login_count(), 0);
    }
}
