use std::{fmt, str::FromStr};

use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

/// How an account was first created.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Credentials,
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Credentials => "credentials",
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Credentials => "Credentials",
            Provider::Google => "Google",
            Provider::Facebook => "Facebook",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credentials" => Ok(Provider::Credentials),
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            other => anyhow::bail!("unknown provider: {other}"),
        }
    }
}

/// User document in the `users` collection.
///
/// `password` is only populated by the credential lookup; every other read
/// projects it away.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(alias = "firstname")]
    pub first_name: String,
    #[serde(alias = "lastname")]
    pub last_name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<DateTime>,
    #[serde(default)]
    pub provider: Provider,
    // Adapter-written documents carry no timestamps.
    #[serde(default = "DateTime::now")]
    pub created_at: DateTime,
    #[serde(default = "DateTime::now")]
    pub updated_at: DateTime,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    /// Copy of the document without the password hash.
    pub fn without_password(mut self) -> Self {
        self.password = None;
        self
    }
}

/// Fields supplied when an account is created.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub image: Option<String>,
    pub email_verified: bool,
    pub provider: Provider,
}

impl NewUser {
    pub fn into_document(self) -> User {
        let now = DateTime::now();
        User {
            id: ObjectId::new(),
            email: self.email.trim().to_lowercase(),
            password: self.password_hash,
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            image: self.image,
            email_verified: self.email_verified.then_some(now),
            provider: self.provider,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson;

    #[test]
    fn provider_parses_path_segments() {
        assert_eq!("google".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("facebook".parse::<Provider>().unwrap(), Provider::Facebook);
        assert!("github".parse::<Provider>().is_err());
    }

    #[test]
    fn new_user_normalizes_email_and_names() {
        let user = NewUser {
            email: "  Jane.Doe@Example.COM ".into(),
            password_hash: None,
            first_name: " Jane ".into(),
            last_name: "Doe ".into(),
            image: None,
            email_verified: true,
            provider: Provider::Google,
        }
        .into_document();
        assert_eq!(user.email, "jane.doe@example.com");
        assert_eq!(user.display_name(), "Jane Doe");
        assert!(user.email_verified.is_some());
    }

    #[test]
    fn legacy_lowercase_name_fields_are_accepted() {
        let doc = bson::doc! {
            "_id": ObjectId::new(),
            "email": "old@example.com",
            "firstname": "Old",
            "lastname": "Schema",
            "createdAt": DateTime::now(),
            "updatedAt": DateTime::now(),
        };
        let user: User = bson::from_document(doc).expect("legacy document decodes");
        assert_eq!(user.first_name, "Old");
        assert_eq!(user.last_name, "Schema");
        assert_eq!(user.provider, Provider::Credentials);
        assert!(user.password.is_none());
    }

    #[test]
    fn adapter_document_without_timestamps_decodes() {
        let verified = DateTime::now();
        let doc = bson::doc! {
            "_id": ObjectId::new(),
            "email": "ada@example.com",
            "firstname": "Ada",
            "lastname": "Lovelace",
            "emailVerified": verified,
            "image": "https://img.example/ada.png",
        };
        let user: User = bson::from_document(doc).expect("adapter document decodes");
        assert_eq!(user.display_name(), "Ada Lovelace");
        assert_eq!(user.email_verified, Some(verified));
        assert_eq!(user.image.as_deref(), Some("https://img.example/ada.png"));
        assert_eq!(user.provider, Provider::Credentials);
    }

    #[test]
    fn document_omits_absent_password() {
        let user = NewUser {
            email: "a@b.co".into(),
            password_hash: None,
            first_name: "A".into(),
            last_name: "B".into(),
            image: None,
            email_verified: false,
            provider: Provider::Facebook,
        }
        .into_document();
        let doc = bson::to_document(&user).unwrap();
        assert!(!doc.contains_key("password"));
        assert_eq!(doc.get_str("provider").unwrap(), "facebook");
        assert_eq!(doc.get_str("firstName").unwrap(), "A");
    }
}
