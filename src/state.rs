use std::sync::Arc;

use crate::auth::oauth::OAuthClient;
use crate::config::AppConfig;
use crate::db;
use crate::users::{MongoUserStore, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
    pub oauth: Arc<OAuthClient>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let database = db::database(&config).await?;
        let store = MongoUserStore::new(&database);
        store.ensure_indexes().await?;

        Ok(Self::from_parts(Arc::new(store), config))
    }

    pub fn from_parts(users: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        let oauth = Arc::new(OAuthClient::new(&config));
        Self {
            users,
            config,
            oauth,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{ProviderConfig, SessionConfig};
        use crate::users::{memory::MemoryUserStore, Provider};

        let config = Arc::new(AppConfig {
            mongodb_uri: "mongodb://localhost:27017".into(),
            mongodb_db: Some("fitness-test".into()),
            public_url: "http://localhost:8080".into(),
            session: SessionConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
                cookie_name: "fitness.session-token".into(),
                secure_cookies: false,
            },
            google: Some(ProviderConfig::with_defaults(
                Provider::Google,
                "google-client".into(),
                "google-secret".into(),
                "http://localhost:8080/api/auth/callback/google".into(),
            )),
            facebook: None,
        });

        Self::from_parts(Arc::new(MemoryUserStore::default()), config)
    }
}
