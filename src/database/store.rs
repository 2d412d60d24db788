use async_trait::async_trait;
use futures::future::BoxFuture;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{NewTodo, NewUser, Todo, TodoWithCreator, User, UserWithTodos};

/// Persistence for users and todos.
///
/// Every lookup reports absence as `Ok(None)`; `Err` is reserved for faults in
/// the backend itself. Writes touching more than one record go through a
/// [`StoreTransaction`] obtained from [`EntityStore::begin`].
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    async fn find_todo_by_id(&self, id: Uuid) -> Result<Option<Todo>, DatabaseError>;

    /// User plus its todos, ordered as in the user's reference list.
    async fn find_user_with_todos(&self, id: Uuid) -> Result<Option<UserWithTodos>, DatabaseError>;

    /// Todo plus its creator. A todo whose creator is gone is reported as
    /// [`DatabaseError::Inconsistent`].
    async fn find_todo_with_creator(&self, id: Uuid) -> Result<Option<TodoWithCreator>, DatabaseError>;

    /// Single-record write of a todo's mutable fields.
    async fn save_todo(&self, todo: &Todo) -> Result<(), DatabaseError>;

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError>;

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Handle for a unit of writes that commit together or not at all.
///
/// Dropping a handle without calling [`commit`](StoreTransaction::commit)
/// discards everything written through it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Re-reads a user and holds it against concurrent writers until the
    /// transaction ends.
    async fn lock_user(&mut self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    async fn insert_todo(&mut self, todo: NewTodo) -> Result<Todo, DatabaseError>;

    async fn remove_todo(&mut self, id: Uuid) -> Result<(), DatabaseError>;

    /// Persists the user, replacing its todo reference list wholesale.
    async fn save_user(&mut self, user: &User) -> Result<(), DatabaseError>;

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;
}

/// Runs `f` inside a transaction.
///
/// Commits when `f` returns `Ok`. Any error from `f` rolls the transaction
/// back and is returned unchanged.
pub async fn run_transaction<T, F>(store: &dyn EntityStore, f: F) -> Result<T, DatabaseError>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut dyn StoreTransaction) -> BoxFuture<'t, Result<T, DatabaseError>>,
{
    let mut tx = store.begin().await?;

    let outcome = f(tx.as_mut()).await;
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            tracing::warn!("Rolling back transaction: {}", err);
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}
