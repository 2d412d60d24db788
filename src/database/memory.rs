//! In-process entity store.
//!
//! Backs the `TODO_STORE=memory` mode and the test suites. Transactions take
//! the table lock for their whole lifetime and write into a staged copy, so
//! they run one at a time and an uncommitted transaction leaves no trace.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{NewTodo, NewUser, Todo, TodoWithCreator, User, UserWithTodos};
use super::store::{EntityStore, StoreTransaction};

/// Store operations that can be made to fail once, for exercising rollback paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    FindUser,
    FindTodo,
    SaveTodo,
    Begin,
    InsertTodo,
    RemoveTodo,
    SaveUser,
    Commit,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    todos: HashMap<Uuid, Todo>,
}

#[derive(Debug, Default)]
struct Faults {
    armed: StdMutex<HashSet<FailPoint>>,
}

impl Faults {
    fn arm(&self, point: FailPoint) {
        self.armed.lock().unwrap_or_else(|e| e.into_inner()).insert(point);
    }

    fn check(&self, point: FailPoint) -> Result<(), DatabaseError> {
        let tripped = self.armed.lock().unwrap_or_else(|e| e.into_inner()).remove(&point);
        if tripped {
            return Err(DatabaseError::Backend(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call reaching `point` fail with a backend error
    pub fn fail_next(&self, point: FailPoint) {
        self.faults.arm(point);
    }

    pub async fn todo_count(&self) -> usize {
        self.tables.lock().await.todos.len()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        self.faults.check(FailPoint::FindUser)?;
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_todo_by_id(&self, id: Uuid) -> Result<Option<Todo>, DatabaseError> {
        self.faults.check(FailPoint::FindTodo)?;
        Ok(self.tables.lock().await.todos.get(&id).cloned())
    }

    async fn find_user_with_todos(&self, id: Uuid) -> Result<Option<UserWithTodos>, DatabaseError> {
        self.faults.check(FailPoint::FindUser)?;
        let tables = self.tables.lock().await;
        let Some(user) = tables.users.get(&id).cloned() else {
            return Ok(None);
        };
        let todos = user
            .todos
            .iter()
            .filter_map(|todo_id| tables.todos.get(todo_id).cloned())
            .collect();
        Ok(Some(UserWithTodos { user, todos }))
    }

    async fn find_todo_with_creator(&self, id: Uuid) -> Result<Option<TodoWithCreator>, DatabaseError> {
        self.faults.check(FailPoint::FindTodo)?;
        let tables = self.tables.lock().await;
        let Some(todo) = tables.todos.get(&id).cloned() else {
            return Ok(None);
        };
        let creator = tables.users.get(&todo.creator).cloned().ok_or_else(|| {
            DatabaseError::Inconsistent(format!("todo {} references missing user {}", todo.id, todo.creator))
        })?;
        Ok(Some(TodoWithCreator { todo, creator }))
    }

    async fn save_todo(&self, todo: &Todo) -> Result<(), DatabaseError> {
        self.faults.check(FailPoint::SaveTodo)?;
        let mut tables = self.tables.lock().await;
        let stored = tables
            .todos
            .get_mut(&todo.id)
            .ok_or_else(|| DatabaseError::NotFound(format!("todo {}", todo.id)))?;
        stored.title = todo.title.clone();
        stored.description = todo.description.clone();
        stored.updated_at = todo.updated_at;
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(DatabaseError::Conflict(format!("email {} already registered", user.email)));
        }
        let created = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            todos: Vec::new(),
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError> {
        self.faults.check(FailPoint::Begin)?;
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            staged,
            faults: self.faults.clone(),
        }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    faults: Arc<Faults>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn lock_user(&mut self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.staged.users.get(&id).cloned())
    }

    async fn insert_todo(&mut self, todo: NewTodo) -> Result<Todo, DatabaseError> {
        self.faults.check(FailPoint::InsertTodo)?;
        let now = Utc::now();
        let created = Todo {
            id: Uuid::new_v4(),
            title: todo.title,
            description: todo.description,
            address: todo.address,
            creator: todo.creator,
            created_at: now,
            updated_at: now,
        };
        self.staged.todos.insert(created.id, created.clone());
        Ok(created)
    }

    async fn remove_todo(&mut self, id: Uuid) -> Result<(), DatabaseError> {
        self.faults.check(FailPoint::RemoveTodo)?;
        self.staged
            .todos
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound(format!("todo {}", id)))
    }

    async fn save_user(&mut self, user: &User) -> Result<(), DatabaseError> {
        self.faults.check(FailPoint::SaveUser)?;
        match self.staged.users.get_mut(&user.id) {
            Some(stored) => {
                *stored = user.clone();
                Ok(())
            }
            None => Err(DatabaseError::NotFound(format!("user {}", user.id))),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.faults.check(FailPoint::Commit)?;
        let MemoryTransaction { mut guard, staged, .. } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        Ok(())
    }
}
