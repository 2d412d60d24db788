pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::{FailPoint, MemoryStore};
pub use postgres::PgStore;
pub use store::{run_transaction, EntityStore, StoreTransaction};
