//! Client routes and the navigation loop that runs their guards.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::auth::{GuardKind, GuardOutcome, RouteGuard, SessionManager};

/// Upper bound on guard redirects followed for a single navigation
const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Task list
    Home,
    Login,
    Registration,
    CreateTask,
    TaskDetail(String),
    NotFound(String),
}

/// Who may see a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    Unauthenticated,
    Public,
}

impl Route {
    pub fn parse(path: &str) -> Self {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["registration"] => Route::Registration,
            ["create"] => Route::CreateTask,
            [id] => Route::TaskDetail(id.to_string()),
            _ => Route::NotFound(path.to_string()),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login/".to_string(),
            Route::Registration => "/registration/".to_string(),
            Route::CreateTask => "/create/".to_string(),
            Route::TaskDetail(id) => format!("/{}/", id),
            Route::NotFound(path) => path.clone(),
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Home | Route::CreateTask | Route::TaskDetail(_) => Access::Authenticated,
            Route::Login | Route::Registration => Access::Unauthenticated,
            Route::NotFound(_) => Access::Public,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Guards are satisfied; render this route
    Render(Route),
    /// Cancelled before any route could render
    Abandoned,
    /// Guards kept bouncing; the last route attempted
    TooManyRedirects(Route),
}

pub struct Router {
    session: Arc<SessionManager>,
}

impl Router {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Run guards for `route`, following redirects, until something renders.
    /// Each hop mounts its own guard whose lifetime is tied to `cancel`.
    pub async fn navigate(&self, route: Route, cancel: &CancellationToken) -> Navigation {
        let mut current = route;

        for _ in 0..=MAX_REDIRECTS {
            let kind = match current.access() {
                Access::Public => return Navigation::Render(current),
                Access::Authenticated => GuardKind::Authenticated,
                Access::Unauthenticated => GuardKind::Unauthenticated,
            };

            let guard = RouteGuard::mount(kind, self.session.clone(), cancel.child_token());
            match guard.resolve().await {
                GuardOutcome::Proceed => return Navigation::Render(current),
                GuardOutcome::Abandoned => return Navigation::Abandoned,
                GuardOutcome::Redirect(next) => {
                    debug!(from = %current, to = %next, "Guard redirect");
                    current = next;
                }
            }
        }

        warn!(route = %current, "Too many redirects");
        Navigation::TooManyRedirects(current)
    }
}
