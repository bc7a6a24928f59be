//! Navigation gates.
//!
//! A guard is mounted per navigation. `resolve` runs the whole decision to
//! completion before the caller renders anything; dropping the guard (or
//! cancelling its token) abandons an in-flight decision, and an abandoned
//! decision never redirects.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::SessionManager;
use crate::router::Route;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardKind {
    /// Protected pages: needs a valid session, refreshes when it can
    Authenticated,
    /// Login/registration: sends users with a usable session home
    Unauthenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Proceed,
    Redirect(Route),
    /// The mount went away before a decision was reached
    Abandoned,
}

pub struct RouteGuard {
    kind: GuardKind,
    session: Arc<SessionManager>,
    cancel: CancellationToken,
    // One decision at a time per mount
    serial: Mutex<()>,
}

impl RouteGuard {
    pub fn mount(kind: GuardKind, session: Arc<SessionManager>, cancel: CancellationToken) -> Self {
        Self {
            kind,
            session,
            cancel,
            serial: Mutex::new(()),
        }
    }

    pub fn authenticated(session: Arc<SessionManager>) -> Self {
        Self::mount(GuardKind::Authenticated, session, CancellationToken::new())
    }

    pub fn unauthenticated(session: Arc<SessionManager>) -> Self {
        Self::mount(GuardKind::Unauthenticated, session, CancellationToken::new())
    }

    /// Abandon any decision in progress
    pub fn unmount(&self) {
        self.cancel.cancel();
    }

    pub async fn resolve(&self) -> GuardOutcome {
        let _turn = self.serial.lock().await;
        if self.cancel.is_cancelled() {
            return GuardOutcome::Abandoned;
        }

        let decision = async {
            match self.kind {
                GuardKind::Authenticated => self.require_session().await,
                GuardKind::Unauthenticated => self.require_no_session().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                debug!(kind = ?self.kind, "Guard unmounted before deciding");
                GuardOutcome::Abandoned
            }
            outcome = decision => outcome,
        }
    }

    async fn require_session(&self) -> GuardOutcome {
        let session = &self.session;
        let pair = session.load();

        if let Some(access) = pair.access_token.as_deref() {
            match session.check(access).await {
                Ok(true) => return GuardOutcome::Proceed,
                Ok(false) => debug!("Access token rejected"),
                Err(e) => {
                    // The token may still be fine; keep it for the next attempt
                    warn!(error = %e, "Could not verify access token");
                    return GuardOutcome::Redirect(Route::Login);
                }
            }
        }

        let refresh_valid = match pair.refresh_token.as_deref() {
            None => false,
            Some(refresh) => match session.check(refresh).await {
                Ok(valid) => valid,
                Err(e) => {
                    warn!(error = %e, "Could not verify refresh token");
                    false
                }
            },
        };

        if !refresh_valid {
            session.logout();
            return GuardOutcome::Redirect(Route::Login);
        }

        // A verified refresh token is always worth a refresh, whether the
        // access token was missing or rejected.
        match session.refresh().await {
            Ok(_) => GuardOutcome::Proceed,
            Err(e) => {
                warn!(error = %e, "Refresh failed, forcing logout");
                session.logout();
                GuardOutcome::Redirect(Route::Login)
            }
        }
    }

    async fn require_no_session(&self) -> GuardOutcome {
        let session = &self.session;
        let pair = session.load();

        if pair.is_empty() {
            session.logout();
            return GuardOutcome::Proceed;
        }

        if let Some(access) = pair.access_token.as_deref() {
            if matches!(session.check(access).await, Ok(true)) {
                return GuardOutcome::Redirect(Route::Home);
            }
        }

        if let Some(refresh) = pair.refresh_token.as_deref() {
            if matches!(session.check(refresh).await, Ok(true)) {
                return match session.refresh().await {
                    Ok(_) => GuardOutcome::Redirect(Route::Home),
                    Err(e) => {
                        warn!(error = %e, "Refresh failed on login page");
                        GuardOutcome::Proceed
                    }
                };
            }
        }

        GuardOutcome::Proceed
    }
}

impl Drop for RouteGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
