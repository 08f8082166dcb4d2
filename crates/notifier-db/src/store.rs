//! Key-value store operations and change notifications.
//!
//! Every write runs in its own transaction and is committed before the call
//! returns. Subscribers receive one [`StoreChange`] per key whose value
//! actually changed.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::{Database, DbError};

/// A partial record: key -> JSON value.
pub type Record = serde_json::Map<String, Value>;

/// One key changing value. `None` means the key is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

impl Database {
    /// Read the given keys. Absent keys are missing from the result.
    pub fn get(&self, keys: &[&str]) -> Result<Record, DbError> {
        self.with_conn(|conn| {
            let mut record = Record::new();
            for key in keys {
                if let Some(value) = read_value(conn, key)? {
                    record.insert((*key).to_string(), value);
                }
            }
            Ok(record)
        })
    }

    /// Read one key.
    pub fn get_value(&self, key: &str) -> Result<Option<Value>, DbError> {
        self.with_conn(|conn| read_value(conn, key))
    }

    /// Read one key and deserialize it.
    pub fn get_typed<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, DbError> {
        match self.get_value(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Write every key of `record` in a single transaction.
    pub fn set(&self, record: Record) -> Result<(), DbError> {
        let changes = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut changes = Vec::new();
            for (key, value) in record {
                if let Some(change) = write_value(&tx, &key, Some(value))? {
                    changes.push(change);
                }
            }
            tx.commit()?;
            Ok(changes)
        })?;
        self.publish(changes);
        Ok(())
    }

    /// Serialize and write a single key.
    pub fn set_typed<T: Serialize>(&self, key: &str, value: &T) -> Result<(), DbError> {
        let mut record = Record::new();
        record.insert(key.to_string(), serde_json::to_value(value)?);
        self.set(record)
    }

    /// Remove the given keys. Missing keys are ignored.
    pub fn remove(&self, keys: &[&str]) -> Result<(), DbError> {
        let changes = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut changes = Vec::new();
            for key in keys {
                if let Some(change) = write_value(&tx, key, None)? {
                    changes.push(change);
                }
            }
            tx.commit()?;
            Ok(changes)
        })?;
        self.publish(changes);
        Ok(())
    }

    /// Read-modify-write one key atomically.
    ///
    /// `f` receives the current value (or `T::default()` when absent) and
    /// returns its result plus whether the value should be written back.
    pub fn update_typed<T, R, F>(&self, key: &str, f: F) -> Result<R, DbError>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> Result<(R, bool), DbError>,
    {
        let (result, change) = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut current: T = match read_value(&tx, key)? {
                Some(value) => serde_json::from_value(value)?,
                None => T::default(),
            };
            let (result, dirty) = f(&mut current)?;
            let change = if dirty {
                write_value(&tx, key, Some(serde_json::to_value(&current)?))?
            } else {
                None
            };
            tx.commit()?;
            Ok((result, change))
        })?;
        self.publish(change.into_iter().collect());
        Ok(result)
    }

    /// Subscribe to store changes committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn publish(&self, changes: Vec<StoreChange>) {
        for change in changes {
            tracing::trace!(key = %change.key, "Store value changed");
            // No subscribers is fine.
            let _ = self.changes.send(change);
        }
    }
}

fn read_value(conn: &Connection, key: &str) -> Result<Option<Value>, DbError> {
    let raw: Option<String> = conn
        .query_row("SELECT value FROM store WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    match raw {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

fn write_value(
    conn: &Connection,
    key: &str,
    value: Option<Value>,
) -> Result<Option<StoreChange>, DbError> {
    let old_value = read_value(conn, key)?;
    if old_value == value {
        return Ok(None);
    }

    match &value {
        Some(v) => {
            conn.execute(
                "INSERT INTO store (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = CURRENT_TIMESTAMP",
                rusqlite::params![key, v.to_string()],
            )?;
        }
        None => {
            conn.execute("DELETE FROM store WHERE key = ?1", [key])?;
        }
    }

    Ok(Some(StoreChange {
        key: key.to_string(),
        old_value,
        new_value: value,
    }))
}
