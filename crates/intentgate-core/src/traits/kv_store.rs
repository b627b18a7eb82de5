//! Persistent key-value store trait.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::GateResult;

/// Shared, eventually consistent key-value store.
///
/// Every operation is atomic for a single key. There are no multi-key
/// transactions: each domain record and each singleton lives under its own
/// key and is safe to write independently. Concurrent writers race with
/// last-write-wins semantics.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a key.
    async fn get(&self, key: &str) -> GateResult<Option<serde_json::Value>>;

    /// Write a key, replacing any previous value.
    async fn set(&self, key: &str, value: serde_json::Value) -> GateResult<()>;

    /// Remove a key. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> GateResult<()>;

    /// Snapshot every key.
    async fn get_all(&self) -> GateResult<HashMap<String, serde_json::Value>>;
}
