use std::sync::Arc;

use tracing::info;

use crate::database::models::{NewUser, User};
use crate::database::{DatabaseError, EntityStore};
use crate::error::ApiError;

const LIST_FAILED: &str = "Fetching users failed, please try again later.";
const SIGNUP_FAILED: &str = "Signing up failed, please try again later.";
const EMAIL_TAKEN: &str = "User exists already, please login instead.";

/// Registers and lists users. Credentials and tokens live elsewhere.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn EntityStore>,
}

impl UserService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<User>, ApiError> {
        self.store
            .list_users()
            .await
            .map_err(ApiError::store_failure(LIST_FAILED))
    }

    pub async fn register(&self, user: NewUser) -> Result<User, ApiError> {
        match self.store.insert_user(user).await {
            Ok(created) => {
                info!(user_id = %created.id, "Registered user");
                Ok(created)
            }
            Err(DatabaseError::Conflict(_)) => Err(ApiError::conflict(EMAIL_TAKEN)),
            Err(other) => Err(ApiError::store_failure(SIGNUP_FAILED)(other)),
        }
    }
}
