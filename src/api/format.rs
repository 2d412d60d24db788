//! Response bodies. Each payload sits under a named key: `todo`, `todos`, `user`, `users` or `message`.

use serde::Serialize;

use crate::database::models::{Todo, User};

#[derive(Debug, Serialize)]
pub struct TodoBody {
    pub todo: Todo,
}

#[derive(Debug, Serialize)]
pub struct TodosBody {
    pub todos: Vec<Todo>,
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UsersBody {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl From<Todo> for TodoBody {
    fn from(todo: Todo) -> Self {
        Self { todo }
    }
}

impl From<Vec<Todo>> for TodosBody {
    fn from(todos: Vec<Todo>) -> Self {
        Self { todos }
    }
}
