use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::models::{NewTodo, Todo, TodoChanges, TodoWithCreator};
use crate::database::{run_transaction, DatabaseError, EntityStore};
use crate::error::ApiError;

pub const FIND_FAILED: &str = "Something went wrong, could not find a todo.";
pub const TODO_NOT_FOUND: &str = "Could not find todo for the provided id.";
pub const FETCH_BY_OWNER_FAILED: &str = "Fetching todos failed, please try again later.";
pub const OWNER_HAS_NO_TODOS: &str = "Could not find todos for the provided user id.";
pub const CREATE_FAILED: &str = "Creating todo failed, please try again.";
pub const CALLER_NOT_FOUND: &str = "Could not find user for provided id.";
pub const UPDATE_FAILED: &str = "Something went wrong, could not update todo.";
pub const UPDATE_FORBIDDEN: &str = "You are not allowed to edit this todo.";
pub const DELETE_FAILED: &str = "Something went wrong, could not delete todo.";
pub const DELETE_NOT_FOUND: &str = "Could not find todo for this id.";
pub const DELETE_FORBIDDEN: &str = "You are not allowed to delete this todo.";

pub const DELETED: &str = "Deleted todo.";

/// Input for [`TodoService::create`]. Already validated by the caller.
#[derive(Debug, Clone)]
pub struct NewTodoInput {
    pub title: String,
    pub description: String,
    pub address: String,
}

/// Create, read, update and delete for todos, with owner checks on mutation.
///
/// A todo and its creator's reference list are always written together:
/// create and delete run inside one store transaction, so the todo exists
/// exactly when its id is in the creator's list.
#[derive(Clone)]
pub struct TodoService {
    store: Arc<dyn EntityStore>,
}

impl TodoService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn get_by_id(&self, todo_id: Uuid) -> Result<Todo, ApiError> {
        self.store
            .find_todo_by_id(todo_id)
            .await
            .map_err(ApiError::store_failure(FIND_FAILED))?
            .ok_or_else(|| ApiError::not_found(TODO_NOT_FOUND))
    }

    /// Todos of `user_id` in the order they were created.
    ///
    /// A user with no todos is reported the same way as a missing user.
    pub async fn get_by_owner(&self, user_id: Uuid) -> Result<Vec<Todo>, ApiError> {
        let populated = self
            .store
            .find_user_with_todos(user_id)
            .await
            .map_err(ApiError::store_failure(FETCH_BY_OWNER_FAILED))?;

        match populated {
            Some(owner) if !owner.todos.is_empty() => Ok(owner.todos),
            _ => Err(ApiError::not_found(OWNER_HAS_NO_TODOS)),
        }
    }

    pub async fn create(&self, caller_id: Uuid, input: NewTodoInput) -> Result<Todo, ApiError> {
        let caller = self
            .store
            .find_user_by_id(caller_id)
            .await
            .map_err(ApiError::store_failure(CREATE_FAILED))?
            .ok_or_else(|| ApiError::not_found(CALLER_NOT_FOUND))?;

        let draft = NewTodo {
            title: input.title,
            description: input.description,
            address: input.address,
            creator: caller.id,
        };

        let todo = run_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let owner = tx
                    .lock_user(draft.creator)
                    .await?
                    .ok_or_else(|| DatabaseError::Inconsistent(format!("user {} vanished", draft.creator)))?;
                let todo = tx.insert_todo(draft).await?;
                tx.save_user(&owner.with_todo(todo.id)).await?;
                Ok::<_, DatabaseError>(todo)
            })
        })
        .await
        .map_err(ApiError::store_failure(CREATE_FAILED))?;

        info!(todo_id = %todo.id, creator = %caller_id, "Created todo");
        Ok(todo)
    }

    pub async fn update(&self, caller_id: Uuid, todo_id: Uuid, changes: TodoChanges) -> Result<Todo, ApiError> {
        let mut todo = self
            .store
            .find_todo_by_id(todo_id)
            .await
            .map_err(ApiError::store_failure(UPDATE_FAILED))?
            .ok_or_else(|| ApiError::not_found(TODO_NOT_FOUND))?;

        if todo.creator != caller_id {
            warn!(todo_id = %todo_id, caller = %caller_id, "Rejected edit by non-owner");
            return Err(ApiError::unauthorized(UPDATE_FORBIDDEN));
        }

        todo.apply(changes);
        self.store
            .save_todo(&todo)
            .await
            .map_err(missing_or_failed(TODO_NOT_FOUND, UPDATE_FAILED))?;

        debug!(todo_id = %todo_id, "Updated todo");
        Ok(todo)
    }

    /// Removes the todo and unlinks it from its creator. Returns the confirmation message.
    pub async fn delete(&self, caller_id: Uuid, todo_id: Uuid) -> Result<&'static str, ApiError> {
        let TodoWithCreator { todo, creator } = self
            .store
            .find_todo_with_creator(todo_id)
            .await
            .map_err(ApiError::store_failure(DELETE_FAILED))?
            .ok_or_else(|| ApiError::not_found(DELETE_NOT_FOUND))?;

        if creator.id != caller_id {
            warn!(todo_id = %todo_id, caller = %caller_id, "Rejected delete by non-owner");
            return Err(ApiError::unauthorized(DELETE_FORBIDDEN));
        }

        let (todo_id, owner_id) = (todo.id, creator.id);
        run_transaction(self.store.as_ref(), move |tx| {
            Box::pin(async move {
                let owner = tx
                    .lock_user(owner_id)
                    .await?
                    .ok_or_else(|| DatabaseError::Inconsistent(format!("user {} vanished", owner_id)))?;
                // A concurrent delete may have unlinked it after our lookup
                if !owner.owns(todo_id) {
                    return Err(DatabaseError::NotFound(format!("todo {}", todo_id)));
                }
                tx.remove_todo(todo_id).await?;
                tx.save_user(&owner.without_todo(todo_id)).await?;
                Ok::<_, DatabaseError>(())
            })
        })
        .await
        .map_err(missing_or_failed(DELETE_NOT_FOUND, DELETE_FAILED))?;

        info!(todo_id = %todo_id, creator = %owner_id, "Deleted todo");
        Ok(DELETED)
    }
}

/// Like [`ApiError::store_failure`], except that a record which disappeared
/// between the lookup and the write is still reported as not found.
fn missing_or_failed(not_found: &'static str, failed: &'static str) -> impl FnOnce(DatabaseError) -> ApiError {
    move |err| match err {
        DatabaseError::NotFound(what) => {
            debug!("Record gone before write: {}", what);
            ApiError::not_found(not_found)
        }
        other => ApiError::store_failure(failed)(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{NewUser, User};
    use crate::database::{FailPoint, MemoryStore};

    struct Fixture {
        store: MemoryStore,
        service: TodoService,
    }

    impl Fixture {
        fn new() -> Self {
            let store = MemoryStore::new();
            let service = TodoService::new(Arc::new(store.clone()));
            Self { store, service }
        }

        async fn user(&self, name: &str) -> User {
            self.store
                .insert_user(NewUser {
                    name: name.to_string(),
                    email: format!("{}@example.com", name.to_lowercase()),
                })
                .await
                .unwrap()
        }

        async fn reload_user(&self, id: Uuid) -> User {
            self.store.find_user_by_id(id).await.unwrap().unwrap()
        }
    }

    fn milk() -> NewTodoInput {
        NewTodoInput {
            title: "Buy milk".to_string(),
            description: "Get 2% milk".to_string(),
            address: "5 Main St".to_string(),
        }
    }

    fn changes(title: &str) -> TodoChanges {
        TodoChanges {
            title: title.to_string(),
            description: "Get oat milk instead".to_string(),
        }
    }

    #[tokio::test]
    async fn create_links_todo_to_caller() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;

        let todo = fx.service.create(u1.id, milk()).await.unwrap();

        assert_eq!(todo.creator, u1.id);
        assert_eq!(todo.title, "Buy milk");
        assert!(fx.reload_user(u1.id).await.owns(todo.id));

        let listed = fx.service.get_by_owner(u1.id).await.unwrap();
        assert_eq!(listed, vec![todo]);
    }

    #[tokio::test]
    async fn create_for_unknown_caller_is_not_found() {
        let fx = Fixture::new();
        let err = fx.service.create(Uuid::new_v4(), milk()).await.unwrap_err();
        assert_eq!(err, ApiError::not_found(CALLER_NOT_FOUND));
        assert_eq!(fx.store.todo_count().await, 0);
    }

    #[tokio::test]
    async fn create_accepts_five_character_description() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let input = NewTodoInput {
            description: "12345".to_string(),
            ..milk()
        };
        let todo = fx.service.create(u1.id, input).await.unwrap();
        assert_eq!(todo.description, "12345");
    }

    #[tokio::test]
    async fn create_rolls_back_when_owner_save_fails() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        fx.store.fail_next(FailPoint::SaveUser);

        let err = fx.service.create(u1.id, milk()).await.unwrap_err();

        assert_eq!(err, ApiError::internal_server_error(CREATE_FAILED));
        assert_eq!(fx.store.todo_count().await, 0);
        assert!(fx.reload_user(u1.id).await.todos.is_empty());
    }

    #[tokio::test]
    async fn create_reports_commit_failure_generically() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        fx.store.fail_next(FailPoint::Commit);

        let err = fx.service.create(u1.id, milk()).await.unwrap_err();

        assert_eq!(err.message(), CREATE_FAILED);
        assert_eq!(fx.store.todo_count().await, 0);
    }

    #[tokio::test]
    async fn get_by_id_is_repeatable() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let todo = fx.service.create(u1.id, milk()).await.unwrap();

        let first = fx.service.get_by_id(todo.id).await.unwrap();
        let second = fx.service.get_by_id(todo.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, todo);
    }

    #[tokio::test]
    async fn get_by_id_missing_and_faulty() {
        let fx = Fixture::new();
        let missing = fx.service.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(missing.status_code(), 404);

        fx.store.fail_next(FailPoint::FindTodo);
        let faulty = fx.service.get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(faulty, ApiError::internal_server_error(FIND_FAILED));
    }

    #[tokio::test]
    async fn get_by_owner_treats_empty_list_as_not_found() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;

        let empty = fx.service.get_by_owner(u1.id).await.unwrap_err();
        let unknown = fx.service.get_by_owner(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(empty, ApiError::not_found(OWNER_HAS_NO_TODOS));
        assert_eq!(unknown, empty);
    }

    #[tokio::test]
    async fn get_by_owner_keeps_insertion_order() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let mut created = Vec::new();
        for title in ["first", "second", "third"] {
            let input = NewTodoInput {
                title: title.to_string(),
                ..milk()
            };
            created.push(fx.service.create(u1.id, input).await.unwrap().id);
        }

        let listed: Vec<Uuid> = fx.service.get_by_owner(u1.id).await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(listed, created);
    }

    #[tokio::test]
    async fn update_by_owner_changes_title_and_description_only() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let todo = fx.service.create(u1.id, milk()).await.unwrap();

        let updated = fx.service.update(u1.id, todo.id, changes("Buy oat milk")).await.unwrap();

        assert_eq!(updated.title, "Buy oat milk");
        assert_eq!(updated.description, "Get oat milk instead");
        assert_eq!(updated.address, todo.address);
        assert_eq!(updated.creator, todo.creator);
        assert_eq!(fx.service.get_by_id(todo.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn update_by_stranger_is_rejected_and_changes_nothing() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let u2 = fx.user("U2").await;
        let todo = fx.service.create(u1.id, milk()).await.unwrap();

        let err = fx.service.update(u2.id, todo.id, changes("Hijacked")).await.unwrap_err();

        assert_eq!(err, ApiError::unauthorized(UPDATE_FORBIDDEN));
        assert_eq!(fx.service.get_by_id(todo.id).await.unwrap().title, "Buy milk");
    }

    #[tokio::test]
    async fn update_missing_todo_is_not_found_before_authorization() {
        let fx = Fixture::new();
        let u2 = fx.user("U2").await;
        let err = fx.service.update(u2.id, Uuid::new_v4(), changes("x")).await.unwrap_err();
        assert_eq!(err, ApiError::not_found(TODO_NOT_FOUND));
    }

    #[tokio::test]
    async fn update_store_failure_is_generic() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let todo = fx.service.create(u1.id, milk()).await.unwrap();
        fx.store.fail_next(FailPoint::SaveTodo);

        let err = fx.service.update(u1.id, todo.id, changes("Buy oat milk")).await.unwrap_err();
        assert_eq!(err, ApiError::internal_server_error(UPDATE_FAILED));
        assert_eq!(fx.service.get_by_id(todo.id).await.unwrap().title, "Buy milk");
    }

    #[tokio::test]
    async fn delete_by_owner_removes_todo_and_reference() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let keep = fx.service.create(u1.id, milk()).await.unwrap();
        let todo = fx.service.create(u1.id, milk()).await.unwrap();

        let message = fx.service.delete(u1.id, todo.id).await.unwrap();

        assert_eq!(message, DELETED);
        assert_eq!(fx.service.get_by_id(todo.id).await.unwrap_err().status_code(), 404);
        assert_eq!(fx.reload_user(u1.id).await.todos, vec![keep.id]);
    }

    #[tokio::test]
    async fn delete_by_stranger_is_rejected() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let u2 = fx.user("U2").await;
        let todo = fx.service.create(u1.id, milk()).await.unwrap();

        let err = fx.service.delete(u2.id, todo.id).await.unwrap_err();

        assert_eq!(err, ApiError::unauthorized(DELETE_FORBIDDEN));
        assert!(fx.service.get_by_id(todo.id).await.is_ok());
        assert!(fx.reload_user(u1.id).await.owns(todo.id));
    }

    #[tokio::test]
    async fn delete_missing_todo_is_not_found() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let err = fx.service.delete(u1.id, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err, ApiError::not_found(DELETE_NOT_FOUND));
    }

    #[tokio::test]
    async fn delete_rolls_back_when_owner_save_fails() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let todo = fx.service.create(u1.id, milk()).await.unwrap();
        fx.store.fail_next(FailPoint::SaveUser);

        let err = fx.service.delete(u1.id, todo.id).await.unwrap_err();

        assert_eq!(err, ApiError::internal_server_error(DELETE_FAILED));
        assert!(fx.service.get_by_id(todo.id).await.is_ok());
        assert!(fx.reload_user(u1.id).await.owns(todo.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_deletes_report_not_found_for_the_loser() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;

        for _ in 0..100 {
            let todo = fx.service.create(u1.id, milk()).await.unwrap();
            let (a, b) = tokio::join!(fx.service.delete(u1.id, todo.id), fx.service.delete(u1.id, todo.id));

            let mut outcomes = [a, b];
            outcomes.sort_by_key(|r| r.is_err());
            assert_eq!(outcomes[0], Ok(DELETED));
            assert_eq!(outcomes[1], Err(ApiError::not_found(DELETE_NOT_FOUND)));
        }

        assert_eq!(fx.store.todo_count().await, 0);
        assert!(fx.reload_user(u1.id).await.todos.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn update_racing_delete_never_fails_generically() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;

        for _ in 0..100 {
            let todo = fx.service.create(u1.id, milk()).await.unwrap();
            let (updated, deleted) = tokio::join!(
                fx.service.update(u1.id, todo.id, changes("Buy oat milk")),
                fx.service.delete(u1.id, todo.id)
            );

            assert_eq!(deleted, Ok(DELETED));
            match updated {
                Ok(todo) => assert_eq!(todo.title, "Buy oat milk"),
                Err(err) => assert_eq!(err, ApiError::not_found(TODO_NOT_FOUND)),
            }
        }
    }

    #[tokio::test]
    async fn save_of_vanished_todo_maps_to_not_found() {
        let err = missing_or_failed(TODO_NOT_FOUND, UPDATE_FAILED)(DatabaseError::NotFound("todo x".into()));
        assert_eq!(err, ApiError::not_found(TODO_NOT_FOUND));

        let err = missing_or_failed(TODO_NOT_FOUND, UPDATE_FAILED)(DatabaseError::Backend("boom".into()));
        assert_eq!(err, ApiError::internal_server_error(UPDATE_FAILED));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_and_deletes_keep_references_in_step() {
        let fx = Fixture::new();
        let u1 = fx.user("U1").await;
        let user_id = u1.id;

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let service = fx.service.clone();
                tokio::spawn(async move {
                    let todo = service.create(user_id, milk()).await.unwrap();
                    if i % 2 == 0 {
                        service.delete(user_id, todo.id).await.unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let owner = fx.reload_user(u1.id).await;
        assert_eq!(owner.todos.len(), 25);
        assert_eq!(fx.store.todo_count().await, 25);
        for todo_id in &owner.todos {
            let todo = fx.service.get_by_id(*todo_id).await.unwrap();
            assert_eq!(todo.creator, u1.id);
        }
    }
}
