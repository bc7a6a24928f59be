use thiserror::Error;

/// Failures surfaced by session operations.
///
/// `Display` is the message shown to the user next to the form that
/// triggered the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid login or password")]
    InvalidCredentials,

    #[error("Malformed server response: {0}")]
    Protocol(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Could not refresh the session, please log in again")]
    RefreshFailed,

    #[error("Could not verify token")]
    VerificationFailed,

    #[error("Login failed")]
    LoginFailed,

    #[error("Registration failed")]
    RegistrationFailed,

    /// Message supplied by the server in its `detail` field
    #[error("{0}")]
    Rejected(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access token file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse token file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}
