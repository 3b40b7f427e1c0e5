use async_trait::async_trait;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    options::{FindOneOptions, IndexOptions},
    Collection, Database, IndexModel,
};
use tracing::{debug, info};

use super::model::{NewUser, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email already registered")]
    Duplicate,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Persistence seam for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Lookup by normalized email, password hash excluded.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    /// Lookup by normalized email including the password hash.
    async fn find_credentials(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: &ObjectId) -> anyhow::Result<Option<User>>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update_image(&self, id: &ObjectId, image: &str) -> anyhow::Result<()>;
}

pub struct MongoUserStore {
    users: Collection<User>,
}

impl MongoUserStore {
    pub fn new(db: &Database) -> Self {
        Self {
            users: db.collection::<User>("users"),
        }
    }

    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        self.users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
                None,
            )
            .await?;
        info!("users indexes ensured");
        Ok(())
    }

    fn without_password() -> FindOneOptions {
        FindOneOptions::builder()
            .projection(doc! { "password": 0 })
            .build()
    }

    async fn find_one(
        &self,
        filter: Document,
        options: Option<FindOneOptions>,
    ) -> anyhow::Result<Option<User>> {
        Ok(self.users.find_one(filter, options).await?)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    // Server reports duplicate keys as E11000.
    err.to_string().contains("E11000")
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one(doc! { "email": email }, Some(Self::without_password()))
            .await
    }

    async fn find_credentials(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_one(doc! { "email": email }, None).await
    }

    async fn find_by_id(&self, id: &ObjectId) -> anyhow::Result<Option<User>> {
        self.find_one(doc! { "_id": *id }, Some(Self::without_password()))
            .await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let user = user.into_document();
        match self.users.insert_one(&user, None).await {
            Ok(_) => {
                debug!(user_id = %user.id, "user inserted");
                Ok(user.without_password())
            }
            Err(e) if is_duplicate_key(&e) => Err(StoreError::Duplicate),
            Err(e) => Err(StoreError::Other(e.into())),
        }
    }

    async fn update_image(&self, id: &ObjectId, image: &str) -> anyhow::Result<()> {
        self.users
            .update_one(
                doc! { "_id": *id },
                doc! { "$set": { "image": image, "updatedAt": DateTime::now() } },
                None,
            )
            .await?;
        Ok(())
    }
}
