use axum::{
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use mongodb::bson::oid::ObjectId;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        credentials::{self, Registration},
        dto::{
            safe_callback_url, CallbackUrlQuery, CredentialsForm, MessageResponse,
            OAuthCallbackQuery, ProfileResponse, ProviderInfo, RegisterRequest,
        },
        error::AuthError,
        extractors::CurrentUser,
        oauth,
        session::{SessionKeys, SessionResponse, SessionUser},
    },
    state::AppState,
    users::Provider,
};

pub const STATE_COOKIE: &str = "fitness.oauth-state";
pub const CALLBACK_COOKIE: &str = "fitness.callback-url";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/callback/credentials", post(credentials_callback))
        .route("/api/auth/signin/:provider", get(oauth_signin))
        .route("/api/auth/callback/:provider", get(oauth_callback))
        .route("/api/auth/session", get(session))
        .route("/api/auth/providers", get(providers))
        .route("/api/auth/signout", post(signout))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/api/me", get(get_me))
}

fn parse_provider(raw: &str) -> Result<Provider, AuthError> {
    match raw.parse::<Provider>() {
        Ok(Provider::Credentials) | Err(_) => Err(AuthError::UnknownProvider),
        Ok(p) => Ok(p),
    }
}

fn error_redirect(page: &str, err: &AuthError) -> Redirect {
    if let AuthError::Internal(e) = err {
        error!(error = %e, "sign-in failed");
    }
    Redirect::to(&format!("{page}?error={}", err.code()))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    credentials::register(state.users.as_ref(), payload.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Registered successfully".into(),
        }),
    ))
}

/// Credentials sign-in (and sign-up when `isSignUp=true`) from the HTML forms.
#[instrument(skip(state, jar, form))]
pub async fn credentials_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<CredentialsForm>,
) -> Response {
    let keys = SessionKeys::from_ref(&state);
    let sign_up = form.is_sign_up();
    let callback = safe_callback_url(form.callback_url.as_deref());

    let result = if sign_up {
        let reg = Registration {
            first_name: form.firstname,
            last_name: form.lastname,
            email: form.email,
            password: form.password,
            confirm_password: form.confirm_password,
        };
        credentials::sign_up(state.users.as_ref(), reg).await
    } else {
        credentials::authorize(state.users.as_ref(), &form.email, &form.password).await
    };

    match result.and_then(|user| keys.issue(jar, &user).map_err(AuthError::from)) {
        Ok(jar) => (jar, Redirect::to(&callback)).into_response(),
        Err(e) => {
            let page = if sign_up { "/auth/signup" } else { "/auth/signin" };
            error_redirect(page, &e).into_response()
        }
    }
}

/// Starts the authorization-code flow for an OAuth provider.
#[instrument(skip(state, jar))]
pub async fn oauth_signin(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackUrlQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), AuthError> {
    let provider = parse_provider(&provider)?;
    let csrf = oauth::new_state();
    let url = state.oauth.authorization_url(provider, &csrf)?;

    let keys = SessionKeys::from_ref(&state);
    let callback = safe_callback_url(query.callback_url.as_deref());
    let jar = jar
        .add(keys.transient_cookie(STATE_COOKIE, csrf))
        .add(keys.transient_cookie(CALLBACK_COOKIE, callback));

    info!(%provider, "redirecting to provider");
    Ok((jar, Redirect::to(&url)))
}

async fn complete_oauth(
    state: &AppState,
    provider: &str,
    query: OAuthCallbackQuery,
    jar: &CookieJar,
) -> Result<SessionUser, AuthError> {
    let provider = parse_provider(provider)?;
    if let Some(err) = query.error {
        warn!(%provider, error = %err, "provider returned an error");
        return Err(AuthError::AccessDenied);
    }

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    match (&query.state, &expected) {
        (Some(got), Some(want)) if got == want => {}
        _ => {
            warn!(%provider, "oauth state mismatch");
            return Err(AuthError::InvalidState);
        }
    }
    let code = query.code.ok_or(AuthError::InvalidState)?;

    let token = state.oauth.exchange_code(provider, &code).await?;
    let profile = state.oauth.fetch_profile(provider, &token.access_token).await?;
    oauth::sign_in(state.users.as_ref(), profile).await
}

#[instrument(skip(state, query, jar))]
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthCallbackQuery>,
    jar: CookieJar,
) -> Response {
    let keys = SessionKeys::from_ref(&state);
    let callback = safe_callback_url(jar.get(CALLBACK_COOKIE).map(|c| c.value()));

    let result = complete_oauth(&state, &provider, query, &jar).await;
    let jar = jar
        .remove(Cookie::build(STATE_COOKIE).path("/"))
        .remove(Cookie::build(CALLBACK_COOKIE).path("/"));

    match result.and_then(|user| keys.issue(jar.clone(), &user).map_err(AuthError::from)) {
        Ok(jar) => (jar, Redirect::to(&callback)).into_response(),
        Err(e) => (jar, error_redirect("/auth/signin", &e)).into_response(),
    }
}

pub async fn session(
    user: Option<CurrentUser>,
) -> Result<Json<Option<SessionResponse>>, AuthError> {
    match user {
        Some(CurrentUser(claims)) => Ok(Json(Some(SessionResponse::try_from(&claims)?))),
        None => Ok(Json(None)),
    }
}

pub async fn providers(State(state): State<AppState>) -> Json<Vec<ProviderInfo>> {
    let base = state.config.public_url.trim_end_matches('/');
    let mut list = vec![ProviderInfo {
        id: Provider::Credentials,
        name: Provider::Credentials.display_name(),
        kind: "credentials",
        signin_url: format!("{base}/auth/signin"),
        callback_url: format!("{base}/api/auth/callback/credentials"),
    }];
    for provider in state.config.enabled_providers() {
        list.push(ProviderInfo {
            id: provider,
            name: provider.display_name(),
            kind: "oauth",
            signin_url: format!("{base}/api/auth/signin/{provider}"),
            callback_url: state
                .config
                .provider(provider)
                .map(|c| c.redirect_uri.clone())
                .unwrap_or_default(),
        });
    }
    Json(list)
}

pub async fn signout(
    State(state): State<AppState>,
    Query(query): Query<CallbackUrlQuery>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let keys = SessionKeys::from_ref(&state);
    let callback = safe_callback_url(query.callback_url.as_deref());
    (keys.clear(jar), Redirect::to(&callback))
}

#[instrument(skip(state, claims))]
pub async fn get_me(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
) -> Result<Json<ProfileResponse>, AuthError> {
    let id = ObjectId::parse_str(&claims.sub).map_err(|_| AuthError::Unauthorized)?;
    let user = state.users.find_by_id(&id).await?.ok_or_else(|| {
        warn!(user_id = %claims.sub, "session for missing user");
        AuthError::Unauthorized
    })?;
    Ok(Json(ProfileResponse::from(user)))
}
