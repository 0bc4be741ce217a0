//! Per-table mutual exclusion for schema mutations.
//!
//! Provision, replace and append each hold the lock for their table name
//! across the whole check, DDL, catalog-write sequence. Mutations on
//! different tables do not contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-table async locks keyed by lower-cased table name.
#[derive(Default, Clone)]
pub struct TableLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

/// Held for the duration of one table mutation.
pub struct TableLockGuard {
    _guard: OwnedMutexGuard<()>,
    key: String,
}

impl TableLockGuard {
    pub fn table_key(&self) -> &str {
        &self.key
    }
}

impl TableLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `table_name`.
    pub async fn lock(&self, table_name: &str) -> TableLockGuard {
        let key = table_name.to_ascii_lowercase();
        let entry = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            // Drop entries nobody is holding or waiting on.
            map.retain(|k, lock| *k == key || Arc::strong_count(lock) > 1);
            Arc::clone(map.entry(key.clone()).or_default())
        };
        TableLockGuard {
            _guard: entry.lock_owned().await,
            key,
        }
    }

    /// Number of tracked table locks.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
