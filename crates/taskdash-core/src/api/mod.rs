//! REST API client module for the ML task backend.
//!
//! This module provides the `ApiClient` for the auth endpoints (login,
//! refresh, verify, register) and the task endpoints (models, task list,
//! task detail, upload).
//!
//! Protected endpoints use `Authorization: Bearer <access token>`.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::{ApiError, ServerMessage};
