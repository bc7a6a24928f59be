//! Authentication: tokens, their storage, the session that owns them, and
//! the route guards that consult it.
//!
//! This module provides:
//! - `CredentialPair`: access/refresh token pair
//! - `TokenStore`: durable mirror of the pair (file, OS keyring, memory)
//! - `SessionManager`: in-memory session state and the login/refresh/verify
//!   operations, the only writer of the store
//! - `RouteGuard`: gates that allow or redirect a navigation based on the
//!   session

pub mod backend;
pub mod credentials;
pub mod error;
pub mod guard;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{AuthBackend, LoginTokens, RefreshedToken};
pub use credentials::CredentialPair;
pub use error::{SessionError, StoreError};
pub use guard::{GuardKind, GuardOutcome, RouteGuard};
pub use session::{SessionManager, SessionState, SessionStatus, SESSION_EXPIRED};
pub use store::{FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore};
