use serde::{Deserialize, Serialize};

use super::credentials::Registration;
use crate::users::{Provider, User};

/// Request body for `POST /api/auth/register`. Fields default to empty so a
/// missing field is reported as a validation error, not a decode failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl From<RegisterRequest> for Registration {
    fn from(req: RegisterRequest) -> Self {
        Registration {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            password: req.password,
            confirm_password: Some(req.confirm_password),
        }
    }
}

/// Form posted to the credentials callback by the sign-in and sign-up pages.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsForm {
    pub email: String,
    pub password: String,
    pub firstname: String,
    pub lastname: String,
    #[serde(rename = "confirmPassword")]
    pub confirm_password: Option<String>,
    #[serde(rename = "isSignUp")]
    pub is_sign_up: Option<String>,
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

impl CredentialsForm {
    pub fn is_sign_up(&self) -> bool {
        self.is_sign_up.as_deref() == Some("true")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackUrlQuery {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Entry of `GET /api/auth/providers`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfo {
    pub id: Provider,
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub signin_url: String,
    pub callback_url: String,
}

/// Body of `GET /api/me`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub image: Option<String>,
    pub provider: Provider,
    pub email_verified: bool,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_hex(),
            name: user.display_name(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            image: user.image,
            provider: user.provider,
            email_verified: user.email_verified.is_some(),
        }
    }
}

/// Keeps redirects on this site: only absolute paths, never `//host`.
pub fn safe_callback_url(url: Option<&str>) -> String {
    match url {
        Some(u) if u.starts_with('/') && !u.starts_with("//") && !u.starts_with("/\\") => {
            u.to_string()
        }
        _ => "/".to_string(),
    }
}
