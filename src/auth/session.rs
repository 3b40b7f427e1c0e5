use axum::extract::FromRef;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{config::SessionConfig, state::AppState, users::User};

/// Minimal claim set of a signed-in user. Only non-secret fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub image: Option<String>,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            email: user.email.clone(),
            name: user.display_name(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            image: user.image.clone(),
        }
    }
}

/// JWT payload of the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub image: Option<String>,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
    pub jti: Uuid,
}

impl SessionClaims {
    pub fn user(&self) -> SessionUser {
        SessionUser {
            id: self.sub.clone(),
            email: self.email.clone(),
            name: self.name.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            image: self.image.clone(),
        }
    }
}

/// Body of `GET /api/auth/session`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: SessionUser,
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
}

impl TryFrom<&SessionClaims> for SessionResponse {
    type Error = anyhow::Error;

    fn try_from(claims: &SessionClaims) -> Result<Self, Self::Error> {
        Ok(Self {
            user: claims.user(),
            expires: OffsetDateTime::from_unix_timestamp(claims.exp as i64)?,
        })
    }
}

/// Signing material plus cookie settings, derived from config.
#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
    pub cookie_name: String,
    pub secure_cookies: bool,
}

impl From<&SessionConfig> for SessionKeys {
    fn from(cfg: &SessionConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
            cookie_name: cfg.cookie_name.clone(),
            secure_cookies: cfg.secure_cookies,
        }
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        SessionKeys::from(&state.config.session)
    }
}

impl SessionKeys {
    pub fn sign(&self, user: &SessionUser) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + self.ttl;
        let claims = SessionClaims {
            sub: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            image: user.image.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.id, "session signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<SessionClaims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "session verified");
        Ok(data.claims)
    }

    fn cookie<'a>(&self, name: String, value: String, max_age: Duration) -> Cookie<'a> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .max_age(max_age)
            .build()
    }

    /// Signs a session for `user` and stores it in the session cookie.
    pub fn issue(&self, jar: CookieJar, user: &SessionUser) -> anyhow::Result<CookieJar> {
        let token = self.sign(user)?;
        Ok(jar.add(self.cookie(self.cookie_name.clone(), token, self.ttl)))
    }

    pub fn clear(&self, jar: CookieJar) -> CookieJar {
        jar.remove(Cookie::build(self.cookie_name.clone()).path("/"))
    }

    /// Short-lived cookie used during the OAuth round trip.
    pub fn transient_cookie<'a>(&self, name: &str, value: String) -> Cookie<'a> {
        self.cookie(name.to_string(), value, Duration::minutes(15))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(issuer: &str, audience: &str) -> SessionKeys {
        SessionKeys::from(&SessionConfig {
            secret: "test-secret".into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 5,
            cookie_name: "test.session".into(),
            secure_cookies: false,
        })
    }

    fn user() -> SessionUser {
        SessionUser {
            id: "6650f1c2a1b2c3d4e5f60718".into(),
            email: "jane@example.com".into(),
            name: "Jane Doe".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            image: None,
        }
    }

    #[test]
    fn sign_and_verify_session() {
        let keys = keys("iss", "aud");
        let token = keys.sign(&user()).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.user(), user());
        assert_eq!(claims.iss, "iss");
        assert_eq!(claims.aud, "aud");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn verify_rejects_wrong_audience() {
        let token = keys("iss", "good-aud").sign(&user()).unwrap();
        assert!(keys("iss", "bad-aud").verify(&token).is_err());
    }

    #[test]
    fn verify_rejects_expired_token() {
        let keys = keys("iss", "aud");
        let now = OffsetDateTime::now_utc();
        let claims = SessionClaims {
            sub: "x".into(),
            email: "x@example.com".into(),
            name: "X".into(),
            first_name: "X".into(),
            last_name: String::new(),
            image: None,
            iat: (now - Duration::hours(2)).unix_timestamp() as usize,
            exp: (now - Duration::hours(1)).unix_timestamp() as usize,
            iss: "iss".into(),
            aud: "aud".into(),
            jti: Uuid::new_v4(),
        };
        let token = encode(&Header::default(), &claims, &keys.encoding).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn claims_carry_no_secret_fields() {
        let token = keys("iss", "aud").sign(&user()).unwrap();
        let claims = keys("iss", "aud").verify(&token).unwrap();
        let json = serde_json::to_value(&claims).unwrap();
        let obj = json.as_object().unwrap();
        assert!(!obj.contains_key("password"));
        assert!(obj.contains_key("firstName"));
        assert!(obj.contains_key("lastName"));
    }

    #[test]
    fn issued_cookie_is_http_only() {
        let keys = keys("iss", "aud");
        let jar = keys.issue(CookieJar::new(), &user()).unwrap();
        let cookie = jar.get("test.session").expect("cookie set");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert!(keys.verify(cookie.value()).is_ok());
    }
}
