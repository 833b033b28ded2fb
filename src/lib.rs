// TodoStore - Lazily-opened, versioned local persistence for Todo records

pub mod config;
mod db;
pub mod error;
pub mod global;
pub mod key;
pub mod schema;
pub mod store;
pub mod todo;

// Re-export main types for convenience
pub use config::{Location, StoreConfig};
pub use error::{Result, StoreError};
pub use global::{add_todo, configure, delete_todo, get_all_todos, get_todo, global, update_todo};
pub use key::Key;
pub use schema::{CONTAINER, SCHEMA_VERSION, Upgrade};
pub use store::{ConnectionState, RecordStore};
pub use todo::Todo;
