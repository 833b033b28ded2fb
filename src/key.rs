// Primary keys for stored records

use crate::error::{Result, StoreError};
use rusqlite::ToSql;
use rusqlite::types::ToSqlOutput;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// Longest text key accepted, in bytes
pub const MAX_TEXT_KEY_LEN: usize = 256;

/// Primary key of a record
///
/// Keys order integers before strings, integers numerically and strings
/// bytewise. This is also the order `get_all` returns records in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    /// Reject keys that can never identify a record
    pub fn validate(&self) -> Result<()> {
        match self {
            Key::Int(_) => Ok(()),
            Key::Text(s) if s.trim().is_empty() => Err(StoreError::InvalidKey(
                "key cannot be empty or whitespace-only".to_string(),
            )),
            Key::Text(s) if s.len() > MAX_TEXT_KEY_LEN => Err(StoreError::InvalidKey(format!(
                "key too long: {} bytes (max {})",
                s.len(),
                MAX_TEXT_KEY_LEN
            ))),
            Key::Text(_) => Ok(()),
        }
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Int(i) => write!(f, "{}", i),
            Key::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Parses canonical integers (`42`, `-7`) as `Key::Int`, everything else as
/// `Key::Text`, so `007` and `+7` stay text
impl FromStr for Key {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(i) if i.to_string() == s => Key::Int(i),
            _ => Key::Text(s.to_string()),
        })
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Int(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Int(i64::from(i))
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Text(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Text(s)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

// The id column has no declared type, so integers and text keep their
// storage class and sort the same way `Key` does.
impl ToSql for Key {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Key::Int(i) => Ok(ToSqlOutput::from(*i)),
            Key::Text(s) => Ok(ToSqlOutput::from(s.as_str())),
        }
    }
}
