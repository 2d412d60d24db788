// handlers/public/mod.rs - handlers that need no caller identity
//
// Reads of todos are open to anyone; users can be listed and registered.
pub mod system;
pub mod todos;
pub mod users;
