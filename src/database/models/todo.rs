use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub creator: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    /// Applies an edit. Address and creator are never touched.
    pub fn apply(&mut self, changes: TodoChanges) {
        self.title = changes.title;
        self.description = changes.description;
        self.updated_at = Utc::now();
    }
}

/// Fields supplied by the caller when creating a todo; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub address: String,
    pub creator: Uuid,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TodoChanges {
    pub title: String,
    pub description: String,
}

/// A todo with its creator resolved into the full user record.
#[derive(Debug, Clone, Serialize)]
pub struct TodoWithCreator {
    pub todo: Todo,
    pub creator: User,
}
