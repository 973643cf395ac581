//! StateStore: redb-backed subscriber persistence.
//!
//! Values are JSON-serialized into redb's `&[u8]` value column. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use submgr_core::{Node, Snapshot, Subscriber};

use crate::error::{StateError, StateResult};
use crate::tables::SUBSCRIBERS;

/// `map_err` closure wrapping a redb error into a `StateError` variant.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe subscriber store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SUBSCRIBERS).map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    /// Insert or update a subscriber.
    pub fn put_subscriber(&self, subscriber: &Subscriber) -> StateResult<()> {
        let value = serde_json::to_vec(subscriber).map_err(|e| StateError::Encode {
            id: subscriber.id.clone(),
            reason: e.to_string(),
        })?;
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut table = txn.open_table(SUBSCRIBERS).map_err(map_err!(Storage))?;
            table
                .insert(subscriber.id.as_str(), value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(id = %subscriber.id, "subscriber stored");
        Ok(())
    }

    pub fn get_subscriber(&self, id: &str) -> StateResult<Option<Subscriber>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(SUBSCRIBERS).map_err(map_err!(Storage))?;
        match table.get(id).map_err(map_err!(Storage))? {
            Some(guard) => {
                let subscriber: Subscriber =
                    serde_json::from_slice(guard.value()).map_err(|e| StateError::corrupt(id, e))?;
                Ok(Some(subscriber))
            }
            None => Ok(None),
        }
    }

    /// List all subscribers in id order.
    pub fn list_subscribers(&self) -> StateResult<Vec<Subscriber>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(SUBSCRIBERS).map_err(map_err!(Storage))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (key, value) = entry.map_err(map_err!(Storage))?;
            let subscriber: Subscriber = serde_json::from_slice(value.value())
                .map_err(|e| StateError::corrupt(key.value(), e))?;
            results.push(subscriber);
        }
        Ok(results)
    }

    /// Delete a subscriber by id. Returns true if it existed.
    pub fn delete_subscriber(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let existed;
        {
            let mut table = txn.open_table(SUBSCRIBERS).map_err(map_err!(Storage))?;
            existed = table.remove(id).map_err(map_err!(Storage))?.is_some();
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(%id, existed, "subscriber deleted");
        Ok(existed)
    }

    /// Join the stored subscribers with the configured fleet.
    pub fn snapshot(&self, nodes: &[Node]) -> StateResult<Snapshot> {
        Ok(Snapshot::new(nodes.to_vec(), self.list_subscribers()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_subscriber(id: &str, level: u32) -> Subscriber {
        let mut s = Subscriber::new(id, &format!("user-{level}"), level);
        s.created_at = 1000;
        s
    }

    #[test]
    fn put_get_subscriber() {
        let store = StateStore::open_in_memory().unwrap();
        let sub = test_subscriber("00000000-0000-0000-0000-000000000001", 5);
        store.put_subscriber(&sub).unwrap();

        let loaded = store.get_subscriber(&sub.id).unwrap().unwrap();
        assert_eq!(loaded, sub);
    }

    #[test]
    fn get_missing_subscriber() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_subscriber("nope").unwrap().is_none());
    }

    #[test]
    fn put_overwrites() {
        let store = StateStore::open_in_memory().unwrap();
        let mut sub = test_subscriber("00000000-0000-0000-0000-000000000001", 5);
        store.put_subscriber(&sub).unwrap();
        sub.level = 9;
        store.put_subscriber(&sub).unwrap();

        assert_eq!(store.list_subscribers().unwrap().len(), 1);
        assert_eq!(store.get_subscriber(&sub.id).unwrap().unwrap().level, 9);
    }

    #[test]
    fn list_is_id_ordered() {
        let store = StateStore::open_in_memory().unwrap();
        for id in ["c", "a", "b"] {
            store.put_subscriber(&test_subscriber(id, 1)).unwrap();
        }
        let ids: Vec<String> = store
            .list_subscribers()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn delete_subscriber() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_subscriber(&test_subscriber("a", 1)).unwrap();

        assert!(store.delete_subscriber("a").unwrap());
        assert!(!store.delete_subscriber("a").unwrap());
        assert!(store.list_subscribers().unwrap().is_empty());
    }

    #[test]
    fn unreadable_record_reports_its_id() {
        let store = StateStore::open_in_memory().unwrap();
        let txn = store.db.begin_write().unwrap();
        {
            let mut table = txn.open_table(SUBSCRIBERS).unwrap();
            table.insert("broken", b"not json".as_slice()).unwrap();
        }
        txn.commit().unwrap();

        match store.get_subscriber("broken") {
            Err(StateError::Corrupt { id, .. }) => assert_eq!(id, "broken"),
            other => panic!("expected corrupt record, got {other:?}"),
        }
        assert!(matches!(
            store.list_subscribers(),
            Err(StateError::Corrupt { .. })
        ));
    }

    #[test]
    fn snapshot_carries_nodes_and_subscribers() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_subscriber(&test_subscriber("a", 1)).unwrap();

        let snapshot = store.snapshot(&[]).unwrap();
        assert!(snapshot.nodes.is_empty());
        assert_eq!(snapshot.subscribers.len(), 1);
        assert!(snapshot.taken_at > 0);
    }

    #[test]
    fn persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("submgr.redb");
        {
            let store = StateStore::open(&path).unwrap();
            store.put_subscriber(&test_subscriber("a", 3)).unwrap();
        }
        let store = StateStore::open(&path).unwrap();
        assert_eq!(store.get_subscriber("a").unwrap().unwrap().level, 3);
    }
}
