use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::users::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("All fields are required")]
    MissingFields,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Invalid email")]
    InvalidEmail,
    #[error("Password must be at least 8 characters")]
    PasswordTooShort,
    #[error("Email already in use")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Not signed in")]
    Unauthorized,
    #[error("Unknown sign-in provider")]
    UnknownProvider,
    #[error("Sign-in request expired or was tampered with")]
    InvalidState,
    #[error("Provider did not return an email address")]
    MissingEmail,
    #[error("Sign-in was cancelled at the provider")]
    AccessDenied,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingFields
            | AuthError::PasswordMismatch
            | AuthError::InvalidEmail
            | AuthError::PasswordTooShort
            | AuthError::InvalidState
            | AuthError::MissingEmail => StatusCode::BAD_REQUEST,
            AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::InvalidCredentials | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::AccessDenied => StatusCode::FORBIDDEN,
            AuthError::UnknownProvider => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short code carried in `?error=` on redirects back to the auth pages.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingFields => "MissingFields",
            AuthError::PasswordMismatch => "PasswordMismatch",
            AuthError::InvalidEmail => "InvalidEmail",
            AuthError::PasswordTooShort => "PasswordTooShort",
            AuthError::EmailTaken => "EmailTaken",
            AuthError::InvalidCredentials | AuthError::Unauthorized => "CredentialsSignin",
            AuthError::UnknownProvider => "UnknownProvider",
            AuthError::InvalidState => "OAuthState",
            AuthError::MissingEmail => "OAuthAccountNotLinked",
            AuthError::AccessDenied => "AccessDenied",
            AuthError::Internal(_) => "Default",
        }
    }

    /// User-facing text for a redirect error code.
    pub fn message_for_code(code: &str) -> &'static str {
        match code {
            "MissingFields" => "All fields are required",
            "PasswordMismatch" => "Passwords do not match",
            "InvalidEmail" => "Invalid email",
            "PasswordTooShort" => "Password must be at least 8 characters",
            "EmailTaken" => "Email already in use",
            "CredentialsSignin" => "Invalid email or password",
            "UnknownProvider" => "Unknown sign-in provider",
            "OAuthState" => "Sign-in request expired, please try again",
            "OAuthAccountNotLinked" => "Your account has no email address we can use",
            "AccessDenied" => "Sign-in was cancelled",
            _ => "Sign in failed, please try again",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate => AuthError::EmailTaken,
            StoreError::Other(e) => AuthError::Internal(e),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AuthError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
