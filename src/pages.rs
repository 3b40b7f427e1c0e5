//! Server-rendered sign-in, sign-up and home pages.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use reqwest::Url;
use serde::Deserialize;

use crate::{
    auth::{dto::safe_callback_url, AuthError, CurrentUser},
    state::AppState,
    users::Provider,
};

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub error: Option<String>,
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/home", get(home))
        .route("/auth/signin", get(signin_page))
        .route("/auth/signup", get(signup_page))
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
</head>
<body>
<main class="auth-card">
{body}
</main>
</body>
</html>"#,
        title = text(title),
    ))
}

fn error_banner(code: Option<&str>) -> String {
    code.map(|c| {
        format!(
            r#"<div class="error" role="alert">{}</div>"#,
            text(AuthError::message_for_code(c))
        )
    })
    .unwrap_or_default()
}

fn provider_buttons(state: &AppState, verb: &str, callback: &str) -> String {
    let providers = state.config.enabled_providers();
    if providers.is_empty() {
        return String::new();
    }
    let base = state.config.public_url.trim_end_matches('/');
    let buttons: String = providers
        .iter()
        .filter_map(|p: &Provider| {
            let href = Url::parse_with_params(
                &format!("{base}/api/auth/signin/{p}"),
                &[("callbackUrl", callback)],
            )
            .ok()?;
            Some(format!(
                r#"<a class="oauth" href="{href}">{verb} with {name}</a>
"#,
                href = attr(href.as_str()),
                name = p.display_name(),
            ))
        })
        .collect();
    format!(r#"<div class="divider"><span>Or continue with</span></div>
{buttons}"#)
}

pub async fn home(user: Option<CurrentUser>) -> Html<String> {
    let body = match user {
        Some(CurrentUser(claims)) => format!(
            r#"<h1>Welcome, {first} {last}!</h1>
<p>Email: {email}</p>
<form method="post" action="/api/auth/signout">
<button type="submit">Sign out</button>
</form>"#,
            first = text(&claims.first_name),
            last = text(&claims.last_name),
            email = text(&claims.email),
        ),
        None => r#"<h1>Welcome to Fitness App</h1>
<p>Please <a href="/auth/signin">sign in</a> to continue.</p>"#
            .to_string(),
    };
    layout("Fitness App", &body)
}

pub async fn signin_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Html<String> {
    let callback = safe_callback_url(query.callback_url.as_deref());
    let body = format!(
        r#"<h2>Sign In</h2>
{error}
<form method="post" action="/api/auth/callback/credentials">
<input type="hidden" name="callbackUrl" value="{cb}">
<input type="email" name="email" placeholder="Email" required>
<input type="password" name="password" placeholder="Password" required>
<button type="submit">Sign In</button>
</form>
{oauth}
<p>Don't have an account? <a href="/auth/signup">Register</a></p>"#,
        error = error_banner(query.error.as_deref()),
        cb = attr(&callback),
        oauth = provider_buttons(&state, "Sign in", &callback),
    );
    layout("Sign In", &body)
}

pub async fn signup_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
    user: Option<CurrentUser>,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    let callback = safe_callback_url(query.callback_url.as_deref());
    let body = format!(
        r#"<h2>Create your account</h2>
{error}
<form method="post" action="/api/auth/callback/credentials">
<input type="hidden" name="isSignUp" value="true">
<input type="hidden" name="callbackUrl" value="{cb}">
<label for="firstname">First name</label>
<input id="firstname" name="firstname" type="text" required>
<label for="lastname">Last name</label>
<input id="lastname" name="lastname" type="text" required>
<label for="email">Email address</label>
<input id="email" name="email" type="email" required>
<label for="password">Password</label>
<input id="password" name="password" type="password" required minlength="{min}">
<p class="hint">Minimum {min} characters</p>
<label for="confirmPassword">Confirm password</label>
<input id="confirmPassword" name="confirmPassword" type="password" required minlength="{min}">
<button type="submit">Sign up</button>
</form>
{oauth}
<p>Already have an account? <a href="/auth/signin">Sign in</a></p>"#,
        error = error_banner(query.error.as_deref()),
        cb = attr(&callback),
        min = crate::auth::credentials::MIN_PASSWORD_LEN,
        oauth = provider_buttons(&state, "Sign up", &callback),
    );
    layout("Sign Up", &body).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_values_cannot_break_out() {
        let escaped = attr(r#"/x"><script>alert(1)</script>"#);
        assert!(!escaped.contains('"'));
        assert!(!escaped.contains("<script>"));
    }

    #[test]
    fn unknown_error_code_gets_generic_message() {
        let banner = error_banner(Some("<img>"));
        assert!(banner.contains("Sign in failed"));
        assert!(!banner.contains("<img>"));
    }
}
