//! The object-details store: a small per-object record used to detect a stale in-memory
//! inventory cache and to enforce that commits advance the version/revision sequence without
//! gaps, per the compare-and-swap protocol the repository façade relies on.

use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::digest::{DigestAlgorithm, HexDigest};
use crate::error::{Result, RocflError};
use crate::types::VersionNum;

const ROW_LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// A single row of the object-details table.
#[derive(Debug, Clone)]
pub struct ObjectDetailsRecord {
    pub object_id: String,
    pub version_num: VersionNum,
    /// `Some` while the HEAD version lives under the mutable-HEAD extension.
    pub revision_num: Option<u32>,
    pub object_root_path: String,
    pub inventory_digest: HexDigest,
    pub digest_algorithm: DigestAlgorithm,
    /// The serialized inventory, cached here to avoid a storage round trip on the next read,
    /// when the backing store is configured to keep it.
    pub inventory_bytes: Option<Vec<u8>>,
    pub update_timestamp: DateTime<Local>,
}

impl ObjectDetailsRecord {
    fn transitions_from(&self, previous: Option<&ObjectDetailsRecord>) -> bool {
        match (previous, self.revision_num) {
            // First record for an object: must be v1, no revision.
            (None, _) => self.version_num == VersionNum::with_width(1, 0) && self.revision_num.is_none(),
            // Mutable-HEAD revision: (v, r_n) -> (v, r_{n+1})
            (Some(prev), Some(next_rev)) => {
                prev.version_num == self.version_num
                    && next_rev == prev.revision_num.map(|r| r + 1).unwrap_or(1)
            }
            // Regular commit, possibly finalizing a mutable HEAD: (v_n, _) -> (v_{n+1}, null)
            (Some(prev), None) => prev.version_num.next().ok() == Some(self.version_num),
        }
    }
}

/// Storage interface for the object-details table. Implementations must perform `update` as an
/// atomic compare-and-swap: the write only applies if the stored row is still in the state the
/// caller last observed.
pub trait DetailsStore {
    /// Returns the current record for `object_id`, or `None` if the object has no record yet
    /// (ie. it has never been committed, or it was purged).
    fn get(&self, object_id: &str) -> Result<Option<ObjectDetailsRecord>>;

    /// Inserts the first record for a brand new object. Fails with `AlreadyExists` if a record
    /// is already present.
    fn add(&self, record: ObjectDetailsRecord) -> Result<()>;

    /// Replaces the current record with `record`, provided `record` represents the next legal
    /// transition from whatever is currently stored. Fails with `RocflError::OutOfSync` if the
    /// stored row has moved on, and `RocflError::Lock` if the row lock could not be acquired
    /// within the configured wait.
    fn update(&self, record: ObjectDetailsRecord) -> Result<()>;

    /// Deletes the record for `object_id`, if any. Never fails because the object does not
    /// exist; `purge_object` must be able to call this unconditionally.
    fn remove(&self, object_id: &str) -> Result<()>;
}

/// Default, process-local details store. Suitable whenever the repository is only ever driven
/// from within this process; lost on restart.
pub struct MemDetailsStore {
    rows: Mutex<HashMap<String, ObjectDetailsRecord>>,
    lock_timeout: Duration,
}

impl MemDetailsStore {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(10))
    }

    pub fn with_timeout(lock_timeout: Duration) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            lock_timeout,
        }
    }

    fn lock(&self, object_id: &str) -> Result<std::sync::MutexGuard<HashMap<String, ObjectDetailsRecord>>> {
        let start = Instant::now();
        loop {
            match self.rows.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(std::sync::TryLockError::WouldBlock) => {
                    if start.elapsed() >= self.lock_timeout {
                        return Err(RocflError::lock_timeout(object_id));
                    }
                    thread::sleep(ROW_LOCK_RETRY_INTERVAL);
                }
                Err(std::sync::TryLockError::Poisoned(_)) => {
                    return Err(RocflError::IllegalState(
                        "object-details store mutex poisoned".to_string(),
                    ));
                }
            }
        }
    }
}

impl Default for MemDetailsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailsStore for MemDetailsStore {
    fn get(&self, object_id: &str) -> Result<Option<ObjectDetailsRecord>> {
        let rows = self.lock(object_id)?;
        Ok(rows.get(object_id).cloned())
    }

    fn add(&self, record: ObjectDetailsRecord) -> Result<()> {
        let mut rows = self.lock(&record.object_id)?;
        if rows.contains_key(&record.object_id) {
            return Err(RocflError::AlreadyExists(record.object_id));
        }
        rows.insert(record.object_id.clone(), record);
        Ok(())
    }

    fn update(&self, record: ObjectDetailsRecord) -> Result<()> {
        let mut rows = self.lock(&record.object_id)?;
        let previous = rows.get(&record.object_id);

        if !record.transitions_from(previous) {
            let expected = previous
                .map(|p| describe(p.version_num, p.revision_num))
                .unwrap_or_else(|| "none".to_string());
            return Err(RocflError::OutOfSync {
                object_id: record.object_id.clone(),
                expected,
                actual: describe(record.version_num, record.revision_num),
            });
        }

        rows.insert(record.object_id.clone(), record);
        Ok(())
    }

    fn remove(&self, object_id: &str) -> Result<()> {
        let mut rows = self.lock(object_id)?;
        rows.remove(object_id);
        Ok(())
    }
}

fn describe(version_num: VersionNum, revision_num: Option<u32>) -> String {
    match revision_num {
        Some(r) => format!("{} revision {}", version_num, r),
        None => version_num.to_string(),
    }
}

/// `rusqlite`-backed details store. Durable across process restarts; suitable for coordinating
/// multiple processes against the same repository when paired with `LockManager::file_backed`.
#[cfg(feature = "details-store")]
pub mod sqlite {
    use std::path::Path;
    use std::sync::Mutex;

    use rusqlite::{params, Connection, OptionalExtension};

    use crate::error::{Result, RocflError};
    use crate::types::VersionNum;

    use super::{DetailsStore, ObjectDetailsRecord};

    pub struct SqliteDetailsStore {
        conn: Mutex<Connection>,
    }

    impl SqliteDetailsStore {
        pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
            let conn = Connection::open(db_path)?;
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS object_details (
                    object_id TEXT PRIMARY KEY,
                    version_id TEXT NOT NULL,
                    revision_id INTEGER,
                    object_root_path TEXT NOT NULL,
                    inventory_digest TEXT NOT NULL,
                    digest_algorithm TEXT NOT NULL,
                    inventory BLOB,
                    update_timestamp TEXT NOT NULL
                )",
            )?;
            Ok(Self {
                conn: Mutex::new(conn),
            })
        }

        pub fn in_memory() -> Result<Self> {
            Self::new(":memory:")
        }
    }

    impl DetailsStore for SqliteDetailsStore {
        fn get(&self, object_id: &str) -> Result<Option<ObjectDetailsRecord>> {
            let conn = self.conn.lock().unwrap();
            let record = conn
                .query_row(
                    "SELECT version_id, revision_id, object_root_path, inventory_digest, \
                     digest_algorithm, inventory, update_timestamp \
                     FROM object_details WHERE object_id = ?1",
                    params![object_id],
                    |row| row_to_record(object_id, row),
                )
                .optional()?;
            Ok(record)
        }

        fn add(&self, record: ObjectDetailsRecord) -> Result<()> {
            let conn = self.conn.lock().unwrap();
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO object_details \
                 (object_id, version_id, revision_id, object_root_path, inventory_digest, \
                  digest_algorithm, inventory, update_timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.object_id,
                    record.version_num.to_string(),
                    record.revision_num,
                    record.object_root_path,
                    record.inventory_digest.to_string(),
                    record.digest_algorithm.to_string(),
                    record.inventory_bytes,
                    record.update_timestamp.to_rfc3339(),
                ],
            )?;

            if inserted == 0 {
                return Err(RocflError::AlreadyExists(record.object_id));
            }
            Ok(())
        }

        fn update(&self, record: ObjectDetailsRecord) -> Result<()> {
            let conn = self.conn.lock().unwrap();

            let (expected_version, expected_revision) = match record.revision_num {
                Some(next_rev) if next_rev > 1 => (
                    record.version_num.to_string(),
                    Some((next_rev - 1) as i64),
                ),
                Some(_) => (record.version_num.to_string(), None),
                None => (
                    record
                        .version_num
                        .previous()
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                    None,
                ),
            };

            let updated = conn.execute(
                "UPDATE object_details SET \
                    version_id = ?1, revision_id = ?2, object_root_path = ?3, \
                    inventory_digest = ?4, digest_algorithm = ?5, inventory = ?6, \
                    update_timestamp = ?7 \
                 WHERE object_id = ?8 AND version_id = ?9 AND revision_id IS ?10",
                params![
                    record.version_num.to_string(),
                    record.revision_num,
                    record.object_root_path,
                    record.inventory_digest.to_string(),
                    record.digest_algorithm.to_string(),
                    record.inventory_bytes,
                    record.update_timestamp.to_rfc3339(),
                    record.object_id,
                    expected_version,
                    expected_revision,
                ],
            )?;

            if updated == 0 {
                // Either there's no row yet and this isn't a v1 commit, or the row has moved
                // on since the caller last observed it.
                let current = self.get(&record.object_id)?;
                let expected = current
                    .map(|c| super_describe(c.version_num, c.revision_num))
                    .unwrap_or_else(|| "none".to_string());
                return Err(RocflError::OutOfSync {
                    object_id: record.object_id.clone(),
                    expected,
                    actual: super_describe(record.version_num, record.revision_num),
                });
            }

            Ok(())
        }

        fn remove(&self, object_id: &str) -> Result<()> {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "DELETE FROM object_details WHERE object_id = ?1",
                params![object_id],
            )?;
            Ok(())
        }
    }

    fn super_describe(version_num: VersionNum, revision_num: Option<u32>) -> String {
        super::describe(version_num, revision_num)
    }

    fn row_to_record(
        object_id: &str,
        row: &rusqlite::Row,
    ) -> rusqlite::Result<ObjectDetailsRecord> {
        use chrono::DateTime;
        use std::convert::TryFrom;

        let version_str: String = row.get(0)?;
        let revision_num: Option<u32> = row.get(1)?;
        let object_root_path: String = row.get(2)?;
        let inventory_digest: String = row.get(3)?;
        let digest_algorithm: String = row.get(4)?;
        let inventory_bytes: Option<Vec<u8>> = row.get(5)?;
        let update_timestamp: String = row.get(6)?;

        Ok(ObjectDetailsRecord {
            object_id: object_id.to_string(),
            version_num: VersionNum::try_from(version_str.as_str())
                .unwrap_or_else(|_| VersionNum::with_width(1, 0)),
            revision_num,
            object_root_path,
            inventory_digest: inventory_digest.into(),
            digest_algorithm: digest_algorithm
                .parse()
                .unwrap_or(crate::digest::DigestAlgorithm::Sha512),
            inventory_bytes,
            update_timestamp: DateTime::parse_from_rfc3339(&update_timestamp)
                .map(|dt| dt.with_timezone(&chrono::Local))
                .unwrap_or_else(|_| chrono::Local::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(object_id: &str, version: u32, revision: Option<u32>) -> ObjectDetailsRecord {
        ObjectDetailsRecord {
            object_id: object_id.to_string(),
            version_num: VersionNum::with_width(version, 0),
            revision_num: revision,
            object_root_path: format!("{}/", object_id),
            inventory_digest: HexDigest::from("deadbeef".to_string()),
            digest_algorithm: DigestAlgorithm::Sha512,
            inventory_bytes: None,
            update_timestamp: Local::now(),
        }
    }

    #[test]
    fn first_commit_must_be_v1() {
        let store = MemDetailsStore::new();
        assert!(store.add(record("o1", 1, None)).is_ok());
    }

    #[test]
    fn sequential_versions_succeed() {
        let store = MemDetailsStore::new();
        store.add(record("o1", 1, None)).unwrap();
        store.update(record("o1", 2, None)).unwrap();
        store.update(record("o1", 3, None)).unwrap();

        let current = store.get("o1").unwrap().unwrap();
        assert_eq!(VersionNum::with_width(3, 0), current.version_num);
    }

    #[test]
    fn stale_base_version_is_rejected() {
        let store = MemDetailsStore::new();
        store.add(record("o1", 1, None)).unwrap();
        store.update(record("o1", 2, None)).unwrap();

        match store.update(record("o1", 2, None)) {
            Err(RocflError::OutOfSync { .. }) => (),
            other => panic!("expected OutOfSync, got {:?}", other),
        }
    }

    #[test]
    fn mutable_head_revisions_increment() {
        let store = MemDetailsStore::new();
        store.add(record("o1", 1, None)).unwrap();
        store.update(record("o1", 2, Some(1))).unwrap();
        store.update(record("o1", 2, Some(2))).unwrap();

        match store.update(record("o1", 2, Some(2))) {
            Err(RocflError::OutOfSync { .. }) => (),
            other => panic!("expected OutOfSync, got {:?}", other),
        }
    }

    #[test]
    fn finalizing_mutable_head_clears_revision() {
        let store = MemDetailsStore::new();
        store.add(record("o1", 1, None)).unwrap();
        store.update(record("o1", 2, Some(1))).unwrap();
        store.update(record("o1", 2, None)).unwrap();

        let current = store.get("o1").unwrap().unwrap();
        assert_eq!(None, current.revision_num);
    }

    #[test]
    fn remove_is_idempotent() {
        let store = MemDetailsStore::new();
        store.add(record("o1", 1, None)).unwrap();
        store.remove("o1").unwrap();
        store.remove("o1").unwrap();
        assert!(store.get("o1").unwrap().is_none());
    }
}
