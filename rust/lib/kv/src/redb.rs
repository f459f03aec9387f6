use std::path::Path;
use std::sync::Arc;

use redb::{Database, TableDefinition};

use crate::error::KVError;
use crate::traits::KVStore;

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

fn storage<E: std::fmt::Display>(e: E) -> KVError {
    KVError::Storage(e.to_string())
}

/// RedbStore is a KVStore implementation backed by redb, a pure-Rust embedded
/// key-value database. Every write is its own committed transaction.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open or create a redb database at the given path.
    pub fn open(path: &Path) -> Result<Self, KVError> {
        let db = Database::create(path).map_err(storage)?;

        // Create the table up front so read transactions never see it missing.
        let write_txn = db.begin_write().map_err(storage)?;
        {
            let _table = write_txn.open_table(TABLE).map_err(storage)?;
        }
        write_txn.commit().map_err(storage)?;

        tracing::debug!(path = %path.display(), "opened redb store");
        Ok(Self { db: Arc::new(db) })
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KVError> {
        let read_txn = self.db.begin_read().map_err(storage)?;
        let table = read_txn.open_table(TABLE).map_err(storage)?;

        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(storage(e)),
        }
    }

    fn batch_set(&self, entries: &[(&str, &[u8])]) -> Result<(), KVError> {
        let write_txn = self.db.begin_write().map_err(storage)?;
        {
            let mut table = write_txn.open_table(TABLE).map_err(storage)?;
            for (key, value) in entries {
                table.insert(*key, *value).map_err(storage)?;
            }
        }
        write_txn.commit().map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::KVStoreExt;

    fn open_tmp() -> (RedbStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbStore::open(&dir.path().join("t.redb")).unwrap();
        (store, dir)
    }

    #[test]
    fn batch_set_then_get() {
        let (kv, _dir) = open_tmp();
        assert!(kv.get("payment/orders/a").unwrap().is_none());

        kv.batch_set(&[
            ("payment/orders/a", &b"one"[..]),
            ("payment/by-submission/s1", &b"a"[..]),
        ])
        .unwrap();
        assert_eq!(kv.get("payment/orders/a").unwrap().as_deref(), Some(&b"one"[..]));
        assert_eq!(kv.get("payment/by-submission/s1").unwrap().as_deref(), Some(&b"a"[..]));

        kv.batch_set(&[("payment/orders/a", &b"two"[..])]).unwrap();
        assert_eq!(kv.get("payment/orders/a").unwrap().as_deref(), Some(&b"two"[..]));
    }

    #[test]
    fn json_helper() {
        let (kv, _dir) = open_tmp();
        kv.batch_set(&[("k/1", &br#"{"amount":50000}"#[..]), ("k/2", &b"not json"[..])])
            .unwrap();
        let v: serde_json::Value = kv.get_json("k/1").unwrap().unwrap();
        assert_eq!(v["amount"], 50000);

        assert!(kv.get_json::<serde_json::Value>("k/2").is_err());
        assert!(kv.get_json::<serde_json::Value>("k/3").unwrap().is_none());
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.redb");
        {
            let kv = RedbStore::open(&path).unwrap();
            kv.batch_set(&[("a", &b"1"[..])]).unwrap();
        }
        let kv = RedbStore::open(&path).unwrap();
        assert_eq!(kv.get("a").unwrap().as_deref(), Some(&b"1"[..]));
    }
}
