use serde::Deserialize;

use crate::users::Provider;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_name: String,
    pub secure_cookies: bool,
}

/// Client registration for one OAuth provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scope: String,
}

impl ProviderConfig {
    /// Reads `{PREFIX}_CLIENT_ID` / `{PREFIX}_CLIENT_SECRET`; the provider is
    /// disabled unless both are set.
    fn from_env(provider: Provider, public_url: &str) -> Option<Self> {
        let prefix = provider.as_str().to_uppercase();
        let client_id = std::env::var(format!("{prefix}_CLIENT_ID")).ok()?;
        let client_secret = std::env::var(format!("{prefix}_CLIENT_SECRET")).ok()?;
        let redirect_uri = std::env::var(format!("{prefix}_REDIRECT_URI"))
            .unwrap_or_else(|_| default_redirect_uri(public_url, provider));
        Some(Self::with_defaults(provider, client_id, client_secret, redirect_uri))
    }

    pub fn with_defaults(
        provider: Provider,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        let (auth_url, token_url, userinfo_url, scope) = match provider {
            Provider::Facebook => (
                "https://www.facebook.com/v18.0/dialog/oauth",
                "https://graph.facebook.com/v18.0/oauth/access_token",
                "https://graph.facebook.com/me",
                "email public_profile",
            ),
            // Credentials never reaches here; Google is the fallback shape.
            Provider::Google | Provider::Credentials => (
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
                "https://openidconnect.googleapis.com/v1/userinfo",
                "openid email profile",
            ),
        };
        Self {
            client_id,
            client_secret,
            redirect_uri,
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            userinfo_url: userinfo_url.into(),
            scope: scope.into(),
        }
    }
}

fn default_redirect_uri(public_url: &str, provider: Provider) -> String {
    format!(
        "{}/api/auth/callback/{}",
        public_url.trim_end_matches('/'),
        provider.as_str()
    )
}

const DEFAULT_SESSION_TTL_MINUTES: i64 = 60 * 24 * 30;
const MAX_SESSION_TTL_MINUTES: i64 = 60 * 24 * 365;

fn parse_ttl_minutes(raw: Option<String>) -> anyhow::Result<i64> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_SESSION_TTL_MINUTES);
    };
    let minutes: i64 = raw
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("SESSION_TTL_MINUTES must be an integer, got {raw:?}"))?;
    if !(1..=MAX_SESSION_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!("SESSION_TTL_MINUTES must be between 1 and {MAX_SESSION_TTL_MINUTES}");
    }
    Ok(minutes)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub mongodb_uri: String,
    pub mongodb_db: Option<String>,
    pub public_url: String,
    pub session: SessionConfig,
    pub google: Option<ProviderConfig>,
    pub facebook: Option<ProviderConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mongodb_uri = std::env::var("MONGODB_URI")
            .map_err(|_| anyhow::anyhow!("MONGODB_URI must be set"))?;
        let mongodb_db = std::env::var("MONGODB_DB").ok();
        let public_url =
            std::env::var("PUBLIC_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        let session = SessionConfig {
            secret: std::env::var("AUTH_SECRET")
                .map_err(|_| anyhow::anyhow!("AUTH_SECRET must be set"))?,
            issuer: std::env::var("AUTH_ISSUER").unwrap_or_else(|_| "fitness-auth".into()),
            audience: std::env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "fitness-web".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("SESSION_TTL_MINUTES").ok())?,
            cookie_name: std::env::var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "fitness.session-token".into()),
            secure_cookies: std::env::var("COOKIE_SECURE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        };
        let google = ProviderConfig::from_env(Provider::Google, &public_url);
        let facebook = ProviderConfig::from_env(Provider::Facebook, &public_url);

        Ok(Self {
            mongodb_uri,
            mongodb_db,
            public_url,
            session,
            google,
            facebook,
        })
    }

    pub fn provider(&self, provider: Provider) -> Option<&ProviderConfig> {
        match provider {
            Provider::Google => self.google.as_ref(),
            Provider::Facebook => self.facebook.as_ref(),
            Provider::Credentials => None,
        }
    }

    /// OAuth providers that have a client registration, in display order.
    pub fn enabled_providers(&self) -> Vec<Provider> {
        [Provider::Google, Provider::Facebook]
            .into_iter()
            .filter(|p| self.provider(*p).is_some())
            .collect()
    }
}
