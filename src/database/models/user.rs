use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::todo::Todo;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Ids of the todos this user created, in creation order.
    pub todos: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Returns a copy whose reference list has `todo_id` appended.
    /// Appending an id that is already present is a no-op.
    pub fn with_todo(&self, todo_id: Uuid) -> User {
        let mut todos = self.todos.clone();
        if !todos.contains(&todo_id) {
            todos.push(todo_id);
        }
        User { todos, ..self.clone() }
    }

    /// Returns a copy whose reference list no longer contains `todo_id`.
    pub fn without_todo(&self, todo_id: Uuid) -> User {
        let todos = self.todos.iter().copied().filter(|id| *id != todo_id).collect();
        User { todos, ..self.clone() }
    }

    pub fn owns(&self, todo_id: Uuid) -> bool {
        self.todos.contains(&todo_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// A user with its todo references resolved into full records.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithTodos {
    pub user: User,
    pub todos: Vec<Todo>,
}
