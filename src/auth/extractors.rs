use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use super::{error::AuthError, session::{SessionClaims, SessionKeys}};

/// Verified session of the caller, read from the session cookie or an
/// `Authorization: Bearer` header.
pub struct CurrentUser(pub SessionClaims);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        let token = match jar.get(&keys.cookie_name) {
            Some(cookie) => cookie.value().to_string(),
            None => parts
                .headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::to_string)
                .ok_or(AuthError::Unauthorized)?,
        };

        match keys.verify(&token) {
            Ok(claims) => Ok(CurrentUser(claims)),
            Err(e) => {
                warn!(error = %e, "invalid or expired session");
                Err(AuthError::Unauthorized)
            }
        }
    }
}
