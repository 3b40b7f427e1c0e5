use crate::state::AppState;
use axum::Router;

pub mod credentials;
pub(crate) mod dto;
pub mod error;
pub(crate) mod extractors;
pub mod handlers;
pub mod oauth;
pub mod password;
pub mod session;

pub use error::AuthError;
pub use extractors::CurrentUser;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
