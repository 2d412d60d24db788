use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{NewTodo, NewUser, Todo, TodoWithCreator, User, UserWithTodos};
use super::store::{EntityStore, StoreTransaction};

const USER_COLUMNS: &str = "id, name, email, todos, created_at";
const TODO_COLUMNS: &str = "id, title, description, address, creator, created_at, updated_at";

/// PostgreSQL-backed entity store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_todo_by_id(&self, id: Uuid) -> Result<Option<Todo>, DatabaseError> {
        let todo = sqlx::query_as::<_, Todo>(&format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(todo)
    }

    async fn find_user_with_todos(&self, id: Uuid) -> Result<Option<UserWithTodos>, DatabaseError> {
        let Some(user) = self.find_user_by_id(id).await? else {
            return Ok(None);
        };

        // Keep the order of the reference list rather than table order
        let todos = sqlx::query_as::<_, Todo>(
            "SELECT t.id, t.title, t.description, t.address, t.creator, t.created_at, t.updated_at
             FROM unnest($1::uuid[]) WITH ORDINALITY AS r(id, ord)
             JOIN todos t ON t.id = r.id
             ORDER BY r.ord",
        )
        .bind(&user.todos)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(UserWithTodos { user, todos }))
    }

    async fn find_todo_with_creator(&self, id: Uuid) -> Result<Option<TodoWithCreator>, DatabaseError> {
        let Some(todo) = self.find_todo_by_id(id).await? else {
            return Ok(None);
        };

        let creator = self.find_user_by_id(todo.creator).await?.ok_or_else(|| {
            DatabaseError::Inconsistent(format!("todo {} references missing user {}", todo.id, todo.creator))
        })?;

        Ok(Some(TodoWithCreator { todo, creator }))
    }

    async fn save_todo(&self, todo: &Todo) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE todos SET title = $2, description = $3, updated_at = $4 WHERE id = $1")
            .bind(todo.id)
            .bind(&todo.title)
            .bind(&todo.description)
            .bind(todo.updated_at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("todo {}", todo.id)));
        }
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, DatabaseError> {
        sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, name, email, todos, created_at)
             VALUES ($1, $2, $3, '{{}}', $4)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_write(e, &format!("email {} already registered", user.email)))
    }

    async fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at"))
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Wraps a sqlx transaction; sqlx rolls it back if it is dropped uncommitted
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn lock_user(&mut self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn insert_todo(&mut self, todo: NewTodo) -> Result<Todo, DatabaseError> {
        let now = Utc::now();
        let created = sqlx::query_as::<_, Todo>(&format!(
            "INSERT INTO todos (id, title, description, address, creator, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {TODO_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(&todo.address)
        .bind(todo.creator)
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(created)
    }

    async fn remove_todo(&mut self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("todo {}", id)));
        }
        Ok(())
    }

    async fn save_user(&mut self, user: &User) -> Result<(), DatabaseError> {
        let result = sqlx::query("UPDATE users SET name = $2, email = $3, todos = $4 WHERE id = $1")
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.todos)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
