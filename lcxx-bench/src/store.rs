//! Datapoint store: the persistent result cache.
//!
//! One row per (job kind, key). Values are JSON tagged with their output
//! type. Every operation runs inside an IMMEDIATE transaction on its own
//! connection, so concurrent workers writing different keys never lose
//! updates and writers racing on the same key serialize their merges.

use crate::error::{StoreError, StoreResult};
use crate::job::JobKind;
use crate::key::JobKey;
use crate::output::JobOutput;
use crate::value_registry::{self, StoredValue};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// A decoded row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub job: String,
    pub key: String,
    pub key_json: serde_json::Value,
    pub value: StoredValue,
    pub updated_at: DateTime<Utc>,
}

/// Handle to the store. Cheap to clone; connections are opened per call.
#[derive(Debug, Clone)]
pub struct DatapointStore {
    path: PathBuf,
}

impl DatapointStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let store = Self { path };
        let conn = store.connection()?;
        init_schema(&conn)?;
        debug!(path = %store.path.display(), "Opened datapoint store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connection(&self) -> StoreResult<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(conn)
    }

    fn with_immediate_tx<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StoreResult<T>,
    {
        let mut conn = self.connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Cached output for `key`, or `None`.
    pub fn get<J: JobKind>(&self, key: &J::Key) -> StoreResult<Option<J::Output>> {
        let key_str = key.path_key();
        self.with_immediate_tx(|tx| read_typed::<J>(tx, &key_str))
    }

    /// Cached output for `key`; a miss is an error.
    pub fn require<J: JobKind>(&self, key: &J::Key) -> StoreResult<J::Output> {
        self.get::<J>(key)?.ok_or_else(|| StoreError::Missing {
            job: J::NAME.to_string(),
            key: key.path_key(),
        })
    }

    pub fn contains(&self, job: &str, key: &str) -> StoreResult<bool> {
        self.with_immediate_tx(|tx| {
            let found = tx
                .query_row(
                    "SELECT 1 FROM datapoints WHERE job = ?1 AND key = ?2",
                    params![job, key],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Insert `output`, or overwrite/merge into the existing row depending on
    /// whether the job kind is repeatable. Returns the value now stored.
    pub fn store<J: JobKind>(&self, key: &J::Key, output: J::Output) -> StoreResult<J::Output> {
        let key_str = key.path_key();
        let key_json = serde_json::to_string(key).map_err(|source| StoreError::Serialize {
            what: "job key",
            source,
        })?;

        self.with_immediate_tx(|tx| {
            let value = match read_typed::<J>(tx, &key_str)? {
                Some(mut existing) if J::REPEATABLE => {
                    existing.merge(output);
                    existing
                }
                _ => output,
            };
            let json = serde_json::to_string(&value).map_err(|source| StoreError::Serialize {
                what: J::Output::TYPE_TAG,
                source,
            })?;
            tx.execute(
                "INSERT INTO datapoints (job, key, key_json, value_type, value, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT(job, key) DO UPDATE SET \
                 key_json = excluded.key_json, value_type = excluded.value_type, \
                 value = excluded.value, updated_at = excluded.updated_at",
                params![
                    J::NAME,
                    key_str,
                    key_json,
                    J::Output::TYPE_TAG,
                    json,
                    Utc::now().to_rfc3339()
                ],
            )?;
            debug!(job = J::NAME, key = %key_str, "Stored datapoint");
            Ok(value)
        })
    }

    /// Delete every row of a job kind. Returns the number removed.
    pub fn clear(&self, job: &str) -> StoreResult<usize> {
        self.with_immediate_tx(|tx| {
            let n = tx.execute("DELETE FROM datapoints WHERE job = ?1", params![job])?;
            debug!(job, removed = n, "Cleared datapoints");
            Ok(n)
        })
    }

    /// All rows of a job kind, ordered by key.
    pub fn list(&self, job: &str) -> StoreResult<Vec<Record>> {
        self.with_immediate_tx(|tx| {
            let mut stmt = tx.prepare(
                "SELECT key, key_json, value_type, value, updated_at FROM datapoints \
                 WHERE job = ?1 ORDER BY key ASC",
            )?;
            let rows = stmt
                .query_map(params![job], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(key, key_json, tag, value, updated_at)| {
                    let key_json = serde_json::from_str(&key_json).map_err(|source| {
                        StoreError::Serialize {
                            what: "job key",
                            source,
                        }
                    })?;
                    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
                        .map(|t| t.with_timezone(&Utc))
                        .map_err(|source| StoreError::Timestamp {
                            job: job.to_string(),
                            key: key.clone(),
                            value: updated_at,
                            source,
                        })?;
                    Ok(Record {
                        job: job.to_string(),
                        key,
                        key_json,
                        value: value_registry::decode(&tag, &value)?,
                        updated_at,
                    })
                })
                .collect()
        })
    }

    /// Row counts per job kind.
    pub fn job_counts(&self) -> StoreResult<Vec<(String, usize)>> {
        self.with_immediate_tx(|tx| {
            let mut stmt =
                tx.prepare("SELECT job, COUNT(*) FROM datapoints GROUP BY job ORDER BY job")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows
                .into_iter()
                .map(|(job, n)| (job, usize::try_from(n).unwrap_or(0)))
                .collect())
        })
    }
}

fn init_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS datapoints (
            job TEXT NOT NULL,
            key TEXT NOT NULL,
            key_json TEXT NOT NULL,
            value_type TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (job, key)
        );
        "#,
    )?;
    Ok(())
}

fn read_typed<J: JobKind>(tx: &Transaction<'_>, key: &str) -> StoreResult<Option<J::Output>> {
    let row = tx
        .query_row(
            "SELECT value_type, value FROM datapoints WHERE job = ?1 AND key = ?2",
            params![J::NAME, key],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    let Some((tag, value)) = row else {
        return Ok(None);
    };
    if !value_registry::is_registered(&tag) {
        return Err(StoreError::UnregisteredType(tag));
    }
    if tag != J::Output::TYPE_TAG {
        return Err(StoreError::TypeMismatch {
            job: J::NAME.to_string(),
            key: key.to_string(),
            stored: tag,
            expected: J::Output::TYPE_TAG,
        });
    }
    serde_json::from_str(&value)
        .map(Some)
        .map_err(|source| StoreError::Serialize {
            what: J::Output::TYPE_TAG,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{CompilerMetricsJob, IncludeSizeJob};
    use crate::key::HeaderKey;
    use crate::output::{CompilerMetrics, CompilerMetricsList, IncludeSizeOutput};
    use lcxx_common::{Elapsed, LibcxxVersion, MemoryUsage, Standard, StlHeader};
    use tempfile::TempDir;

    fn key(header: StlHeader) -> HeaderKey {
        HeaderKey {
            libcxx: LibcxxVersion::V16,
            standard: Standard::Cpp17,
            header,
        }
    }

    fn metrics(total: u64) -> CompilerMetricsList {
        CompilerMetricsList::single(CompilerMetrics {
            total_execution_time: Elapsed::from_micros(total),
            user_execution_time: Elapsed::from_micros(total / 2),
            peak_memory_usage: MemoryUsage::from_kilobytes(1_000),
        })
    }

    fn open() -> (TempDir, DatapointStore) {
        let tmp = TempDir::new().unwrap();
        let store = DatapointStore::open(tmp.path().join("db/bench.db")).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_round_trip_and_missing() {
        let (_tmp, store) = open();
        let k = key(StlHeader::Vector);
        assert_eq!(store.get::<IncludeSizeJob>(&k).unwrap(), None);
        assert!(matches!(
            store.require::<IncludeSizeJob>(&k),
            Err(StoreError::Missing { .. })
        ));

        let v = IncludeSizeOutput {
            line_count: 12,
            size_in_bytes: 340,
        };
        store.store::<IncludeSizeJob>(&k, v).unwrap();
        assert_eq!(store.get::<IncludeSizeJob>(&k).unwrap(), Some(v));
        assert!(store.contains(IncludeSizeJob::NAME, &k.path_key()).unwrap());
    }

    #[test]
    fn test_non_repeatable_overwrites() {
        let (_tmp, store) = open();
        let k = key(StlHeader::Map);
        let first = IncludeSizeOutput {
            line_count: 1,
            size_in_bytes: 1,
        };
        let second = IncludeSizeOutput {
            line_count: 2,
            size_in_bytes: 2,
        };
        store.store::<IncludeSizeJob>(&k, first).unwrap();
        store.store::<IncludeSizeJob>(&k, second).unwrap();
        assert_eq!(store.require::<IncludeSizeJob>(&k).unwrap(), second);
        assert_eq!(store.list(IncludeSizeJob::NAME).unwrap().len(), 1);
    }

    #[test]
    fn test_repeatable_merges() {
        let (_tmp, store) = open();
        let k = key(StlHeader::Vector);
        store.store::<CompilerMetricsJob>(&k, metrics(100)).unwrap();
        let merged = store.store::<CompilerMetricsJob>(&k, metrics(300)).unwrap();
        assert_eq!(merged.len(), 2);
        let avg = store
            .require::<CompilerMetricsJob>(&k)
            .unwrap()
            .compute_average()
            .unwrap();
        assert_eq!(avg.total_execution_time.microseconds, 200);
    }

    #[test]
    fn test_jobs_are_isolated_and_cleared_independently() {
        let (_tmp, store) = open();
        let k = key(StlHeader::Vector);
        store
            .store::<IncludeSizeJob>(
                &k,
                IncludeSizeOutput {
                    line_count: 1,
                    size_in_bytes: 1,
                },
            )
            .unwrap();
        store.store::<CompilerMetricsJob>(&k, metrics(5)).unwrap();

        assert_eq!(store.clear(IncludeSizeJob::NAME).unwrap(), 1);
        assert_eq!(store.get::<IncludeSizeJob>(&k).unwrap(), None);
        assert!(store.get::<CompilerMetricsJob>(&k).unwrap().is_some());
        assert_eq!(
            store.job_counts().unwrap(),
            vec![(CompilerMetricsJob::NAME.to_string(), 1)]
        );
    }

    #[test]
    fn test_list_decodes_through_registry() {
        let (_tmp, store) = open();
        store.store::<CompilerMetricsJob>(&key(StlHeader::Vector), metrics(7)).unwrap();
        store.store::<CompilerMetricsJob>(&key(StlHeader::Array), metrics(9)).unwrap();

        let records = store.list(CompilerMetricsJob::NAME).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "16.0.0/c++17/array");
        assert_eq!(records[0].key_json["header"], "array");
        assert!(matches!(records[0].value, StoredValue::CompilerMetrics(_)));
    }

    #[test]
    fn test_unregistered_tag_is_fatal() {
        let (_tmp, store) = open();
        let k = key(StlHeader::Vector);
        let conn = store.connection().unwrap();
        conn.execute(
            "INSERT INTO datapoints VALUES (?1, ?2, '{}', 'GitStats', '{}', ?3)",
            params![IncludeSizeJob::NAME, k.path_key(), Utc::now().to_rfc3339()],
        )
        .unwrap();
        assert!(matches!(
            store.get::<IncludeSizeJob>(&k),
            Err(StoreError::UnregisteredType(_))
        ));
        assert!(store.list(IncludeSizeJob::NAME).is_err());
    }

    #[test]
    fn test_malformed_timestamp_is_reported() {
        let (_tmp, store) = open();
        let k = key(StlHeader::Deque);
        store
            .store::<IncludeSizeJob>(
                &k,
                IncludeSizeOutput {
                    line_count: 1,
                    size_in_bytes: 2,
                },
            )
            .unwrap();
        let conn = store.connection().unwrap();
        conn.execute("UPDATE datapoints SET updated_at = 'last tuesday'", [])
            .unwrap();

        match store.list(IncludeSizeJob::NAME) {
            Err(StoreError::Timestamp { key, value, .. }) => {
                assert_eq!(key, k.path_key());
                assert_eq!(value, "last tuesday");
            }
            other => panic!("expected a timestamp error, got {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_merges_lose_nothing() {
        let (_tmp, store) = open();
        let k = key(StlHeader::Vector);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let k = k.clone();
                std::thread::spawn(move || {
                    store.store::<CompilerMetricsJob>(&k, metrics(i)).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.require::<CompilerMetricsJob>(&k).unwrap().len(), 8);
    }
}
