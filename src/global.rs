// Process-wide default store and free-function API

use crate::config::StoreConfig;
use crate::error::Result;
use crate::key::Key;
use crate::store::RecordStore;
use crate::todo::Todo;
use serde::Serialize;
use std::sync::OnceLock;

static GLOBAL: OnceLock<RecordStore> = OnceLock::new();

/// Choose the configuration of the process-wide store
///
/// Must run before the first call to [`global`] or any free function here.
/// Returns the config back if the store was already created.
pub fn configure(config: StoreConfig) -> std::result::Result<(), StoreConfig> {
    GLOBAL.set(RecordStore::new(config)).map_err(RecordStore::into_config)
}

/// The process-wide store, created with `StoreConfig::default()` unless
/// [`configure`] ran first
pub fn global() -> &'static RecordStore {
    GLOBAL.get_or_init(|| RecordStore::new(StoreConfig::default()))
}

pub async fn add_todo<T: Serialize + ?Sized>(todo: &T) -> Result<Key> {
    global().add(todo).await
}

pub async fn get_todo(id: impl Into<Key>) -> Result<Option<Todo>> {
    global().get(id).await
}

pub async fn get_all_todos() -> Result<Vec<Todo>> {
    global().get_all().await
}

/// Create-or-replace; see [`RecordStore::update`]
pub async fn update_todo<T: Serialize + ?Sized>(todo: &T) -> Result<Key> {
    global().update(todo).await
}

pub async fn delete_todo(id: impl Into<Key>) -> Result<()> {
    global().delete(id).await
}
