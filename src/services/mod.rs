pub mod todo_service;
pub mod user_service;

pub use todo_service::{NewTodoInput, TodoService};
pub use user_service::UserService;
