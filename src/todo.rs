// The Todo record and the plain-data normalization applied before writes

use crate::error::{Result, StoreError};
use crate::key::Key;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored record: a primary key plus an opaque payload
///
/// Serializes as one flat JSON object, `{"id": ..., <fields>}`. The store
/// never interprets `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    id: Key,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Todo {
    /// Create a record with an empty payload
    pub fn new(id: impl Into<Key>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Deep-copy any serializable value into a storable record
    ///
    /// Only plain data survives persistence. The value is rendered to a
    /// `serde_json::Value`, so anything that has no JSON form is rejected,
    /// such as maps whose keys are not strings or integers. Non-finite floats
    /// become `null`. The result must be an object whose `id` is an integer
    /// or a non-empty string.
    pub fn normalize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(|e| StoreError::Normalize(e.to_string()))?;
        Self::from_value(value)
    }

    /// Build a record from a JSON object carrying an `id` field
    pub fn from_value(value: Value) -> Result<Self> {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Normalize(format!(
                    "expected an object, got {}",
                    json_kind(&other)
                )));
            }
        };

        let id = fields
            .remove("id")
            .ok_or_else(|| StoreError::Normalize("record has no id field".to_string()))?;
        let id: Key = serde_json::from_value(id)
            .map_err(|_| StoreError::Normalize("id must be an integer or a string".to_string()))?;
        id.validate()?;

        Ok(Self { id, fields })
    }

    pub fn id(&self) -> &Key {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a payload field, returning the previous value
    ///
    /// The key lives outside the payload, so `id` cannot be set this way.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let name = name.into();
        if name == "id" {
            return Err(StoreError::Normalize(
                "id is the primary key and cannot be set as a field".to_string(),
            ));
        }
        Ok(self.fields.insert(name, value.into()))
    }

    /// Builder form of [`Todo::insert`]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        self.insert(name, value)?;
        Ok(self)
    }

    /// The record as a single JSON object
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 1);
        map.insert("id".to_string(), id_value(&self.id));
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Convert back into a typed struct
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_value()).map_err(|e| StoreError::Normalize(e.to_string()))
    }

    pub(crate) fn to_stored(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| StoreError::Normalize(e.to_string()))
    }

    pub(crate) fn from_stored(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| StoreError::transaction(format!("corrupt stored record: {}", e)))
    }
}

fn id_value(key: &Key) -> Value {
    match key {
        Key::Int(i) => Value::from(*i),
        Key::Text(s) => Value::from(s.as_str()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Task {
        id: i64,
        title: String,
        done: bool,
        tags: Vec<String>,
    }

    #[test]
    fn test_normalize_typed_struct() {
        let task = Task {
            id: 1,
            title: "Buy milk".to_string(),
            done: false,
            tags: vec!["errand".to_string()],
        };

        let todo = Todo::normalize(&task).unwrap();
        assert_eq!(todo.id(), &Key::Int(1));
        assert_eq!(todo.field("title"), Some(&json!("Buy milk")));
        assert!(todo.field("id").is_none());

        let back: Task = todo.to_typed().unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_normalize_rejects_non_object() {
        let err = Todo::normalize(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, StoreError::Normalize(ref msg) if msg.contains("an array")));
    }

    #[test]
    fn test_normalize_rejects_missing_or_bad_id() {
        assert!(matches!(
            Todo::from_value(json!({"title": "x"})),
            Err(StoreError::Normalize(_))
        ));
        assert!(matches!(
            Todo::from_value(json!({"id": null})),
            Err(StoreError::Normalize(_))
        ));
        assert!(matches!(
            Todo::from_value(json!({"id": 1.5})),
            Err(StoreError::Normalize(_))
        ));
        assert!(matches!(
            Todo::from_value(json!({"id": "  "})),
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_normalize_rejects_non_string_map_keys() {
        let mut grid: HashMap<(i32, i32), &'static str> = HashMap::new();
        grid.insert((0, 0), "origin");

        #[derive(Serialize)]
        struct WithGrid {
            id: i64,
            grid: HashMap<(i32, i32), &'static str>,
        }
        let err = Todo::normalize(&WithGrid { id: 1, grid }).unwrap_err();
        assert!(matches!(err, StoreError::Normalize(_)));
    }

    #[test]
    fn test_normalize_drops_non_finite_floats() {
        #[derive(Serialize)]
        struct Reading {
            id: &'static str,
            value: f64,
        }
        let todo = Todo::normalize(&Reading {
            id: "r1",
            value: f64::NAN,
        })
        .unwrap();
        assert_eq!(todo.field("value"), Some(&Value::Null));
    }

    #[test]
    fn test_insert_rejects_id_field() {
        let mut todo = Todo::new(1);
        assert!(todo.insert("id", 2).is_err());
        assert_eq!(todo.insert("title", "a").unwrap(), None);
        assert_eq!(todo.insert("title", "b").unwrap(), Some(json!("a")));
    }

    #[test]
    fn test_stored_form_is_flat_object() {
        let todo = Todo::new("t1").with_field("done", true).unwrap();
        let stored = todo.to_stored().unwrap();
        let value: Value = serde_json::from_str(&stored).unwrap();
        assert_eq!(value, json!({"id": "t1", "done": true}));

        let back = Todo::from_stored(&stored).unwrap();
        assert_eq!(back, todo);
    }

    #[test]
    fn test_from_stored_reports_corruption_as_transaction_error() {
        assert!(matches!(Todo::from_stored("{not json"), Err(StoreError::Transaction(_))));
    }
}
