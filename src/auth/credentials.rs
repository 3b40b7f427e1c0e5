use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::{
    error::AuthError,
    password::{hash_password, verify_password},
    session::SessionUser,
};
use crate::users::{NewUser, Provider, User, UserStore};

pub const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

lazy_static! {
    // Checked in place of a missing stored hash.
    static ref DUMMY_HASH: String =
        hash_password("fitness-auth-dummy-password").unwrap_or_default();
}

fn burn_verify(password: &str) {
    let _ = verify_password(password, &DUMMY_HASH);
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Sign-up input. `confirm_password` is checked only when the caller collects it.
#[derive(Debug, Clone, Default)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: Option<String>,
}

impl Registration {
    fn validate(&self) -> Result<String, AuthError> {
        let missing = self.first_name.trim().is_empty()
            || self.last_name.trim().is_empty()
            || self.email.trim().is_empty()
            || self.password.is_empty()
            || self.confirm_password.as_deref() == Some("");
        if missing {
            return Err(AuthError::MissingFields);
        }
        if let Some(confirm) = &self.confirm_password {
            if confirm != &self.password {
                return Err(AuthError::PasswordMismatch);
            }
        }
        let email = normalize_email(&self.email);
        if !is_valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }
        Ok(email)
    }
}

/// Creates a credentials account with a freshly hashed password.
#[instrument(skip(store, reg), fields(email = %reg.email))]
pub async fn register(store: &dyn UserStore, reg: Registration) -> Result<User, AuthError> {
    let email = reg.validate().map_err(|e| {
        warn!(reason = e.code(), "registration rejected");
        e
    })?;

    if store.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AuthError::EmailTaken);
    }

    let hash = hash_password(&reg.password)?;
    let user = store
        .insert(NewUser {
            email,
            password_hash: Some(hash),
            first_name: reg.first_name,
            last_name: reg.last_name,
            image: None,
            email_verified: false,
            provider: Provider::Credentials,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Registers and returns the session claims of the new account.
pub async fn sign_up(store: &dyn UserStore, reg: Registration) -> Result<SessionUser, AuthError> {
    let user = register(store, reg).await?;
    Ok(SessionUser::from(&user))
}

/// Checks an email/password pair. Unknown email, password-less accounts and
/// wrong passwords are indistinguishable to the caller.
#[instrument(skip(store, password))]
pub async fn authorize(
    store: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<SessionUser, AuthError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::InvalidCredentials);
    }

    let user = match store.find_credentials(&email).await? {
        Some(u) => u,
        None => {
            burn_verify(password);
            warn!(%email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    let Some(hash) = user.password.as_deref() else {
        burn_verify(password);
        warn!(%email, provider = %user.provider, "login on account without password");
        return Err(AuthError::InvalidCredentials);
    };

    if !verify_password(password, hash)? {
        warn!(%email, user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    info!(user_id = %user.id, %email, "user logged in");
    Ok(SessionUser::from(&user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::{memory::MemoryUserStore, StoreError};
    use async_trait::async_trait;
    use mongodb::bson::oid::ObjectId;

    /// Loses the race: the pre-check sees nothing but the unique index rejects the write.
    struct RacingStore;

    #[async_trait]
    impl UserStore for RacingStore {
        async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }
        async fn find_credentials(&self, _email: &str) -> anyhow::Result<Option<User>> {
            Ok(None)
        }
        async fn find_by_id(&self, _id: &ObjectId) -> anyhow::Result<Option<User>> {
            Ok(None)
        }
        async fn insert(&self, _user: NewUser) -> Result<User, StoreError> {
            Err(StoreError::Duplicate)
        }
        async fn update_image(&self, _id: &ObjectId, _image: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn registration(email: &str) -> Registration {
        Registration {
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            email: email.into(),
            password: "hunter22hunter".into(),
            confirm_password: Some("hunter22hunter".into()),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("jane@example.com"));
        assert!(!is_valid_email("jane@localhost"));
        assert!(!is_valid_email("not an email"));
        assert_eq!(normalize_email("  Jane@Example.com "), "jane@example.com");
    }

    #[tokio::test]
    async fn register_hashes_and_normalizes() {
        let store = MemoryUserStore::default();
        let user = register(&store, registration(" Jane@Example.com"))
            .await
            .expect("register");
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.provider, Provider::Credentials);
        assert!(user.password.is_none());

        let stored = store
            .find_credentials("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        let hash = stored.password.expect("hash persisted");
        assert_ne!(hash, "hunter22hunter");
        assert!(verify_password("hunter22hunter", &hash).unwrap());
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let store = MemoryUserStore::default();
        register(&store, registration("jane@example.com")).await.unwrap();
        let err = register(&store, registration("JANE@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn register_rejects_mismatched_passwords() {
        let store = MemoryUserStore::default();
        let mut reg = registration("jane@example.com");
        reg.confirm_password = Some("something-else".into());
        let err = register(&store, reg).await.unwrap_err();
        assert!(matches!(err, AuthError::PasswordMismatch));
        assert!(store.find_by_email("jane@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn register_rejects_missing_fields_and_short_password() {
        let store = MemoryUserStore::default();
        let mut reg = registration("jane@example.com");
        reg.last_name = "  ".into();
        assert!(matches!(
            register(&store, reg).await.unwrap_err(),
            AuthError::MissingFields
        ));

        let mut reg = registration("jane@example.com");
        reg.password = "short".into();
        reg.confirm_password = None;
        assert!(matches!(
            register(&store, reg).await.unwrap_err(),
            AuthError::PasswordTooShort
        ));
    }

    #[tokio::test]
    async fn authorize_returns_claims_for_correct_password() {
        let store = MemoryUserStore::default();
        let user = register(&store, registration("jane@example.com")).await.unwrap();

        let claims = authorize(&store, "Jane@Example.com ", "hunter22hunter")
            .await
            .expect("authorize");
        assert_eq!(claims.id, user.id.to_hex());
        assert_eq!(claims.name, "Jane Doe");
        assert_eq!(claims.first_name, "Jane");
        assert_eq!(claims.last_name, "Doe");

        let json = serde_json::to_value(&claims).unwrap();
        assert!(json.get("password").is_none());
    }

    #[tokio::test]
    async fn authorize_denies_wrong_password_and_unknown_email() {
        let store = MemoryUserStore::default();
        register(&store, registration("jane@example.com")).await.unwrap();

        assert!(matches!(
            authorize(&store, "jane@example.com", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authorize(&store, "nobody@example.com", "hunter22hunter").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            authorize(&store, "", "").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn authorize_denies_oauth_only_account() {
        let store = MemoryUserStore::default();
        store
            .insert(NewUser {
                email: "oauth@example.com".into(),
                password_hash: None,
                first_name: "O".into(),
                last_name: "Auth".into(),
                image: None,
                email_verified: true,
                provider: Provider::Google,
            })
            .await
            .unwrap();
        assert!(matches!(
            authorize(&store, "oauth@example.com", "anything-at-all").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn register_maps_duplicate_insert_to_email_taken() {
        let result = register(&RacingStore, registration("race@example.com")).await;
        assert!(matches!(result, Err(AuthError::EmailTaken)));
    }

    #[test]
    fn dummy_hash_is_argon2_and_rejects_everything() {
        assert!(DUMMY_HASH.starts_with("$argon2"));
        assert!(!verify_password("hunter22hunter", &DUMMY_HASH).unwrap());
    }
}
