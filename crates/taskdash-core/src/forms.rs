//! Client-side validation for the login, registration and upload forms.
//!
//! Validation returns every failing field at once so the form can show all
//! messages inline; an empty list means the input may be submitted.

use std::fmt;

/// Minimum login length
pub const MIN_LOGIN_LEN: usize = 6;

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn check_min_len(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    label: &str,
    value: &str,
    min: usize,
) {
    let len = value.chars().count();
    if len == 0 {
        errors.push(FieldError::new(field, format!("{} is required", label)));
    } else if len < min {
        errors.push(FieldError::new(
            field,
            format!("{} must be at least {} characters", label, min),
        ));
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub login: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_min_len(&mut errors, "login", "Login", &self.login, MIN_LOGIN_LEN);
        check_min_len(&mut errors, "password", "Password", &self.password, MIN_PASSWORD_LEN);
        errors
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub login: String,
    pub password: String,
    pub password_repeated: String,
    /// Terms consent checkbox
    pub is_confirm: bool,
}

impl RegistrationForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        check_min_len(&mut errors, "login", "Login", &self.login, MIN_LOGIN_LEN);
        check_min_len(&mut errors, "password", "Password", &self.password, MIN_PASSWORD_LEN);

        if self.password_repeated.is_empty() {
            errors.push(FieldError::new("password_repeated", "Password confirmation is required"));
        } else if self.password_repeated != self.password {
            errors.push(FieldError::new("password_repeated", "Passwords do not match"));
        }

        if !self.is_confirm {
            errors.push(FieldError::new("is_confirm", "Consent is required"));
        }
        errors
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub model_id: String,
    pub file_name: Option<String>,
}

impl UploadForm {
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();
        if self.model_id.trim().is_empty() {
            errors.push(FieldError::new("model_id", "Choose a model"));
        }
        if self.file_name.as_deref().map_or(true, str::is_empty) {
            errors.push(FieldError::new("file", "Choose a file to upload"));
        }
        errors
    }
}
