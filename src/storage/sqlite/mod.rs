pub mod operations;
pub mod queries;
pub mod schema;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;

use crate::storage::keys::{Namespace, RecordKey};

pub use operations::RecordStore;
pub use queries::records::PutOp;
pub use schema::*;

impl PutOp {
    pub fn new<T: Serialize + ?Sized>(key: impl Display, value: &T) -> Result<Self> {
        let key = key.to_string();
        let value = serde_json::to_string(value)
            .with_context(|| format!("Failed to encode record: {key}"))?;
        Ok(Self { key, value })
    }
}

impl RecordStore {
    pub fn put<T: Serialize + ?Sized>(&self, key: &RecordKey, value: &T) -> Result<()> {
        let op = PutOp::new(key, value)?;
        self.with_conn(|conn| queries::records::put(conn, &op.key, &op.value))
    }

    /// Writes `ops` atomically: either every op lands or none does.
    pub fn batch_put(&self, ops: &[PutOp]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| queries::records::batch_put(conn, ops))
    }

    /// `Ok(None)` when the key is absent; `Err` only for I/O or decode failures.
    pub fn get<T: DeserializeOwned>(&self, key: &RecordKey) -> Result<Option<T>> {
        let key = key.to_string();
        let raw = self.with_conn(|conn| queries::records::get(conn, &key))?;
        raw.map(|raw| {
            serde_json::from_str(&raw).with_context(|| format!("Corrupt record value: {key}"))
        })
        .transpose()
    }

    /// Streams raw `(key, json)` pairs in `[low, high)` in key order.
    ///
    /// The store stays locked while `visit` runs, so `visit` must not call
    /// back into the store.
    pub fn scan_range<F>(&self, low: &str, high: &str, visit: F) -> Result<()>
    where
        F: FnMut(&str, &str) -> Result<()>,
    {
        self.with_conn(|conn| queries::records::scan_range(conn, low, high, visit))
    }

    /// Logical keys of a namespace in key order; values are not decoded.
    pub fn namespace_keys(&self, namespace: Namespace) -> Result<Vec<String>> {
        let (low, high) = namespace.range();
        let mut keys = Vec::new();
        self.scan_range(&low, &high, |key, _| {
            keys.push(namespace.strip(key).unwrap_or(key).to_string());
            Ok(())
        })?;
        Ok(keys)
    }

    pub fn clear_namespace(&self, namespace: Namespace) -> Result<usize> {
        let (low, high) = namespace.range();
        self.with_conn(|conn| queries::records::delete_range(conn, &low, &high))
    }

    pub fn count_namespace(&self, namespace: Namespace) -> Result<u64> {
        let (low, high) = namespace.range();
        self.with_conn(|conn| queries::records::count_range(conn, &low, &high))
    }
}
