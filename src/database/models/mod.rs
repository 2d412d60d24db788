pub mod todo;
pub mod user;

pub use todo::{NewTodo, Todo, TodoChanges, TodoWithCreator};
pub use user::{NewUser, User, UserWithTodos};
