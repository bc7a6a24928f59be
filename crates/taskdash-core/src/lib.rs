//! Core library for taskdash.
//!
//! Provides the pieces a dashboard front-end needs to talk to the ML task
//! backend:
//!
//! - `config`: configuration file and environment overrides
//! - `api`: REST client and error classification
//! - `models`: wire schemas and their domain counterparts
//! - `auth`: token storage, session manager, route guards
//! - `router`: client routes and guarded navigation
//! - `forms`: login, registration and upload form validation

pub mod api;
pub mod auth;
pub mod config;
pub mod forms;
pub mod models;
pub mod router;

pub use api::{ApiClient, ApiError};
pub use auth::{
    CredentialPair, FileTokenStore, KeyringTokenStore, MemoryTokenStore, RouteGuard,
    SessionError, SessionManager, SessionStatus, TokenStore,
};
pub use config::{Config, TokenStorage};
pub use router::{Navigation, Route, Router};
