//! # redb-backed Substrate
//!
//! A durable `KvStore` using the redb embedded database.
//!
//! redb provides:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! Each keyspace maps to one redb table: plain `Table<&[u8], &[u8]>` for map
//! keyspaces, `MultimapTable<&[u8], u64>` for set keyspaces. Each primitive
//! runs in its own write transaction. redb serializes writers, so a
//! read-modify-write inside one transaction is atomic, and the set and
//! counter primitives never lose concurrent updates.
//!
//! Tables are created lazily on first write. Reads against a table that does
//! not exist yet behave as reads of an empty table.

use super::{KvPair, KvSet, KvStore, storage_err};
use crate::GraphError;
use redb::{
    Database, MultimapTableDefinition, ReadableDatabase, ReadableMultimapTable, ReadableTable,
    TableDefinition, TableError,
};
use std::collections::BTreeSet;
use std::path::Path;

/// Table for named counters: counter name -> last issued value
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("__counters");

fn map_table(space: &str) -> TableDefinition<'_, &'static [u8], &'static [u8]> {
    TableDefinition::new(space)
}

fn set_table(space: &str) -> MultimapTableDefinition<'_, &'static [u8], u64> {
    MultimapTableDefinition::new(space)
}

/// A disk-backed key-value substrate using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;

        // The counters table is shared by every graph in the file.
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            let _ = write_txn.open_table(COUNTERS).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        Ok(Self { db })
    }

    /// Open a database that must already exist. Nothing is created or
    /// written, so this suits read-only use.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let db = Database::open(path.as_ref()).map_err(storage_err)?;
        Ok(Self { db })
    }
}

impl KvStore for RedbStore {
    fn get(&self, space: &str, key: &[u8]) -> Result<Option<Vec<u8>>, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = match read_txn.open_table(map_table(space)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(storage_err(e)),
        };
        let value = table
            .get(key)
            .map_err(storage_err)?
            .map(|data| data.value().to_vec());
        Ok(value)
    }

    fn put(&self, space: &str, key: &[u8], value: &[u8]) -> Result<(), GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        {
            let mut table = write_txn.open_table(map_table(space)).map_err(storage_err)?;
            table.insert(key, value).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;
        Ok(())
    }

    fn put_if_absent(&self, space: &str, key: &[u8], value: &[u8]) -> Result<bool, GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let inserted = {
            let mut table = write_txn.open_table(map_table(space)).map_err(storage_err)?;
            let exists = table.get(key).map_err(storage_err)?.is_some();
            if !exists {
                table.insert(key, value).map_err(storage_err)?;
            }
            !exists
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(inserted)
    }

    fn remove(&self, space: &str, key: &[u8]) -> Result<bool, GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let removed = {
            let mut table = write_txn.open_table(map_table(space)).map_err(storage_err)?;
            let previous = table.remove(key).map_err(storage_err)?;
            previous.is_some()
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(removed)
    }

    fn contains_key(&self, space: &str, key: &[u8]) -> Result<bool, GraphError> {
        Ok(self.get(space, key)?.is_some())
    }

    fn scan(&self, space: &str, prefix: &[u8]) -> Result<Vec<KvPair>, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = match read_txn.open_table(map_table(space)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(storage_err(e)),
        };

        let mut entries = Vec::new();
        for entry in table.range(prefix..).map_err(storage_err)? {
            let (key, value) = entry.map_err(storage_err)?;
            if !key.value().starts_with(prefix) {
                break;
            }
            entries.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(entries)
    }

    fn increment(&self, counter: &str) -> Result<u64, GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let next = {
            let mut table = write_txn.open_table(COUNTERS).map_err(storage_err)?;
            let current = table
                .get(counter)
                .map_err(storage_err)?
                .map(|v| v.value())
                .unwrap_or(0);
            let next = current.checked_add(1).ok_or_else(|| {
                GraphError::StorageUnavailable(format!("counter {counter} exhausted"))
            })?;
            table.insert(counter, next).map_err(storage_err)?;
            next
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(next)
    }

    fn set_insert(&self, space: &str, key: &[u8], member: u64) -> Result<bool, GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let already_present = {
            let mut table = write_txn
                .open_multimap_table(set_table(space))
                .map_err(storage_err)?;
            table.insert(key, member).map_err(storage_err)?
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(!already_present)
    }

    fn set_remove(&self, space: &str, key: &[u8], member: u64) -> Result<bool, GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let removed = {
            let mut table = write_txn
                .open_multimap_table(set_table(space))
                .map_err(storage_err)?;
            table.remove(key, member).map_err(storage_err)?
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(removed)
    }

    fn set_members(&self, space: &str, key: &[u8]) -> Result<BTreeSet<u64>, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = match read_txn.open_multimap_table(set_table(space)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(BTreeSet::new()),
            Err(e) => return Err(storage_err(e)),
        };

        let mut members = BTreeSet::new();
        for value in table.get(key).map_err(storage_err)? {
            members.insert(value.map_err(storage_err)?.value());
        }
        Ok(members)
    }

    fn scan_sets(&self, space: &str, prefix: &[u8]) -> Result<Vec<KvSet>, GraphError> {
        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = match read_txn.open_multimap_table(set_table(space)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(storage_err(e)),
        };

        let mut entries = Vec::new();
        for entry in table.range(prefix..).map_err(storage_err)? {
            let (key, values) = entry.map_err(storage_err)?;
            if !key.value().starts_with(prefix) {
                break;
            }
            let mut members = BTreeSet::new();
            for value in values {
                members.insert(value.map_err(storage_err)?.value());
            }
            entries.push((key.value().to_vec(), members));
        }
        Ok(entries)
    }

    fn remove_sets(&self, space: &str, prefix: &[u8]) -> Result<usize, GraphError> {
        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let removed = {
            let mut table = write_txn
                .open_multimap_table(set_table(space))
                .map_err(storage_err)?;

            let mut doomed = Vec::new();
            for entry in table.range(prefix..).map_err(storage_err)? {
                let (key, _) = entry.map_err(storage_err)?;
                if !key.value().starts_with(prefix) {
                    break;
                }
                doomed.push(key.value().to_vec());
            }

            for key in &doomed {
                table.remove_all(key.as_slice()).map_err(storage_err)?;
            }
            doomed.len()
        };
        write_txn.commit().map_err(storage_err)?;
        Ok(removed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
