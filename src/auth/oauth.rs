use anyhow::{anyhow, Context};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::{error::AuthError, session::SessionUser};
use crate::{
    config::{AppConfig, ProviderConfig},
    users::{NewUser, Provider, UserStore},
};

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookUserInfo {
    id: String,
    email: Option<String>,
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    picture: Option<FacebookPicture>,
}

/// Provider profile normalized across providers.
#[derive(Debug, Clone, PartialEq)]
pub struct OAuthProfile {
    pub provider: Provider,
    pub provider_user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub image: Option<String>,
    pub email_verified: bool,
}

impl OAuthProfile {
    /// First and last name: given/family name when the provider sends them,
    /// otherwise split from the display name.
    pub fn name_parts(&self) -> (String, String) {
        match (&self.given_name, &self.family_name) {
            (Some(first), last) if !first.trim().is_empty() => (
                first.trim().to_string(),
                last.as_deref().unwrap_or("").trim().to_string(),
            ),
            _ => split_name(self.name.as_deref().unwrap_or("")),
        }
    }
}

/// Splits a display name on whitespace: the first token (or `User`) and the
/// rest joined by single spaces.
pub fn split_name(name: &str) -> (String, String) {
    let mut parts = name.split_whitespace();
    let first = parts.next().unwrap_or("User").to_string();
    let last = parts.collect::<Vec<_>>().join(" ");
    (first, last)
}

/// Random value for the OAuth `state` parameter.
pub fn new_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// HTTP side of the authorization-code flow for the configured providers.
pub struct OAuthClient {
    http: Client,
    google: Option<ProviderConfig>,
    facebook: Option<ProviderConfig>,
}

impl OAuthClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: Client::new(),
            google: config.google.clone(),
            facebook: config.facebook.clone(),
        }
    }

    fn provider(&self, provider: Provider) -> Result<&ProviderConfig, AuthError> {
        match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Facebook => self.facebook.as_ref(),
            Provider::Credentials => None,
        }
        .ok_or(AuthError::UnknownProvider)
    }

    pub fn authorization_url(&self, provider: Provider, state: &str) -> Result<String, AuthError> {
        let cfg = self.provider(provider)?;
        let url = Url::parse_with_params(
            &cfg.auth_url,
            &[
                ("client_id", cfg.client_id.as_str()),
                ("redirect_uri", cfg.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", cfg.scope.as_str()),
                ("state", state),
            ],
        )
        .context("build authorization url")?;
        Ok(url.into())
    }

    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, provider: Provider, code: &str) -> Result<TokenResponse, AuthError> {
        let cfg = self.provider(provider)?;
        let params = [
            ("client_id", cfg.client_id.as_str()),
            ("client_secret", cfg.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", cfg.redirect_uri.as_str()),
        ];

        let request = match provider {
            // Graph API token endpoint takes its parameters in the query string.
            Provider::Facebook => self.http.get(&cfg.token_url).query(&params),
            _ => self.http.post(&cfg.token_url).form(&params),
        };
        let response = request.send().await.context("token request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("{provider} token exchange failed: {status} {body}").into());
        }

        let token: TokenResponse = response.json().await.context("decode token response")?;
        debug!(%provider, expires_in = ?token.expires_in, "token exchange successful");
        Ok(token)
    }

    #[instrument(skip(self, access_token))]
    pub async fn fetch_profile(&self, provider: Provider, access_token: &str) -> Result<OAuthProfile, AuthError> {
        let cfg = self.provider(provider)?;
        let profile = match provider {
            Provider::Facebook => {
                let info: FacebookUserInfo = self
                    .http
                    .get(&cfg.userinfo_url)
                    .query(&[("fields", "id,name,email,first_name,last_name,picture.type(large)")])
                    .bearer_auth(access_token)
                    .send()
                    .await
                    .context("facebook profile request")?
                    .error_for_status()
                    .context("facebook profile status")?
                    .json()
                    .await
                    .context("decode facebook profile")?;
                OAuthProfile {
                    provider,
                    provider_user_id: info.id,
                    // Facebook only returns emails it has confirmed.
                    email_verified: info.email.is_some(),
                    email: info.email,
                    name: info.name,
                    given_name: info.first_name,
                    family_name: info.last_name,
                    image: info.picture.and_then(|p| p.data.url),
                }
            }
            _ => {
                let info: GoogleUserInfo = self
                    .http
                    .get(&cfg.userinfo_url)
                    .bearer_auth(access_token)
                    .send()
                    .await
                    .context("google profile request")?
                    .error_for_status()
                    .context("google profile status")?
                    .json()
                    .await
                    .context("decode google profile")?;
                OAuthProfile {
                    provider,
                    provider_user_id: info.sub,
                    email: info.email,
                    email_verified: info.email_verified,
                    name: info.name,
                    given_name: info.given_name,
                    family_name: info.family_name,
                    image: info.picture,
                }
            }
        };
        Ok(profile)
    }
}

/// Sign-in callback for OAuth logins: links the profile to the account with
/// the same email, creating it on first login and refreshing the image.
#[instrument(skip(store, profile), fields(provider = %profile.provider))]
pub async fn sign_in(store: &dyn UserStore, profile: OAuthProfile) -> Result<SessionUser, AuthError> {
    let email = profile
        .email
        .as_deref()
        .map(super::credentials::normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or(AuthError::MissingEmail)?;

    if let Some(mut existing) = store.find_by_email(&email).await? {
        if let Some(image) = profile.image.as_deref() {
            if existing.image.as_deref() != Some(image) {
                store.update_image(&existing.id, image).await?;
                existing.image = Some(image.to_string());
                debug!(user_id = %existing.id, "profile image updated");
            }
        }
        info!(user_id = %existing.id, %email, "oauth login");
        return Ok(SessionUser::from(&existing));
    }

    let (first_name, last_name) = profile.name_parts();
    let user = store
        .insert(NewUser {
            email,
            password_hash: None,
            first_name,
            last_name,
            image: profile.image,
            email_verified: profile.email_verified,
            provider: profile.provider,
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, provider_user_id = %profile.provider_user_id, "oauth account created");
    Ok(SessionUser::from(&user))
}
