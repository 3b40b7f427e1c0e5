mod model;
mod repo;
#[cfg(test)]
pub(crate) mod memory;

pub use model::{NewUser, Provider, User};
pub use repo::{MongoUserStore, StoreError, UserStore};
