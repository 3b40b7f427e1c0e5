use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, DateTime};
use tokio::sync::RwLock;

use super::{NewUser, StoreError, User, UserStore};

/// Map-backed store with the same uniqueness and projection rules as Mongo.
#[derive(Default)]
pub struct MemoryUserStore {
    by_email: RwLock<HashMap<String, User>>,
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .by_email
            .read()
            .await
            .get(email)
            .cloned()
            .map(User::without_password))
    }

    async fn find_credentials(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.by_email.read().await.get(email).cloned())
    }

    async fn find_by_id(&self, id: &ObjectId) -> anyhow::Result<Option<User>> {
        Ok(self
            .by_email
            .read()
            .await
            .values()
            .find(|u| &u.id == id)
            .cloned()
            .map(User::without_password))
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.into_document();
        let mut users = self.by_email.write().await;
        if users.contains_key(&user.email) {
            return Err(StoreError::Duplicate);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(user.without_password())
    }

    async fn update_image(&self, id: &ObjectId, image: &str) -> anyhow::Result<()> {
        let mut users = self.by_email.write().await;
        if let Some(user) = users.values_mut().find(|u| &u.id == id) {
            user.image = Some(image.to_string());
            user.updated_at = DateTime::now();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::Provider;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.into(),
            password_hash: Some("hash".into()),
            first_name: "Test".into(),
            last_name: "User".into(),
            image: None,
            email_verified: false,
            provider: Provider::Credentials,
        }
    }

    #[tokio::test]
    async fn default_lookups_hide_password() {
        let store = MemoryUserStore::default();
        let created = store.insert(new_user("t@example.com")).await.unwrap();
        assert!(created.password.is_none());

        let found = store.find_by_email("t@example.com").await.unwrap().unwrap();
        assert!(found.password.is_none());
        let by_id = store.find_by_id(&created.id).await.unwrap().unwrap();
        assert!(by_id.password.is_none());

        let creds = store.find_credentials("t@example.com").await.unwrap().unwrap();
        assert_eq!(creds.password.as_deref(), Some("hash"));
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = MemoryUserStore::default();
        store.insert(new_user("dup@example.com")).await.unwrap();
        let err = store.insert(new_user("DUP@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }
}
