//! C5: persistent fingerprint index (spec.md §4.5, §6.1).

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};

pub type SongId = i64;

/// A reference recording row (spec.md §3, `Recording`).
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub song_id: SongId,
    pub song_name: String,
    pub file_path: Option<String>,
    pub song_duration_seconds: f64,
}

/// A persistent fingerprint index backed by SQLite (bundled via `rusqlite`,
/// matching the teacher's choice of embedded store and spec.md §6.1's
/// logical schema).
pub struct FingerprintIndex {
    conn: Connection,
}

impl FingerprintIndex {
    /// Opens (creating if necessary) the index file at `path`, ensuring both
    /// relations and the hash index exist. Idempotent (spec.md §4.5).
    pub fn open<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS songs (
                song_id       INTEGER PRIMARY KEY AUTOINCREMENT,
                song_name     TEXT UNIQUE NOT NULL,
                file_path     TEXT,
                song_duration REAL
            );
            CREATE TABLE IF NOT EXISTS fingerprints (
                hash_value INTEGER NOT NULL,
                song_id    INTEGER NOT NULL REFERENCES songs(song_id),
                offset     REAL NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_hash_value ON fingerprints (hash_value);",
        )?;
        Ok(Self { conn })
    }

    /// In-memory index, useful for tests and short-lived query scratch space.
    pub fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "CREATE TABLE songs (
                song_id       INTEGER PRIMARY KEY AUTOINCREMENT,
                song_name     TEXT UNIQUE NOT NULL,
                file_path     TEXT,
                song_duration REAL
            );
            CREATE TABLE fingerprints (
                hash_value INTEGER NOT NULL,
                song_id    INTEGER NOT NULL REFERENCES songs(song_id),
                offset     REAL NOT NULL
            );
            CREATE INDEX idx_hash_value ON fingerprints (hash_value);",
        )?;
        Ok(Self { conn })
    }

    /// Inserts a recording, or returns the existing id on a `song_name`
    /// conflict — an upsert, never an exception (spec.md §9, invariant 2;
    /// re-architected from `original_source/fingerprinting.py`'s
    /// try/except `IntegrityError` pattern).
    pub fn add_recording(
        &self,
        song_name: &str,
        file_path: Option<&str>,
        song_duration_seconds: f64,
    ) -> EngineResult<SongId> {
        self.conn.execute(
            "INSERT INTO songs (song_name, file_path, song_duration) VALUES (?1, ?2, ?3)
             ON CONFLICT(song_name) DO UPDATE SET song_name = excluded.song_name",
            params![song_name, file_path, song_duration_seconds],
        )?;

        let song_id: SongId = self.conn.query_row(
            "SELECT song_id FROM songs WHERE song_name = ?1",
            params![song_name],
            |row| row.get(0),
        )?;

        debug!(song_id, song_name, "recording enrolled");
        Ok(song_id)
    }

    /// Batch-inserts all `(hash, song_id, offset)` rows for one recording in
    /// a single transaction (spec.md §4.5 — "implementations MUST use a
    /// single transaction per recording").
    pub fn add_fingerprints(
        &mut self,
        song_id: SongId,
        fingerprints: &std::collections::HashMap<u64, Vec<f32>>,
    ) -> EngineResult<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO fingerprints (hash_value, song_id, offset) VALUES (?1, ?2, ?3)",
            )?;
            for (&hash, offsets) in fingerprints {
                for &offset in offsets {
                    stmt.execute(params![hash as i64, song_id, offset as f64])?;
                    inserted += 1;
                }
            }
        }
        tx.commit()?;
        info!(song_id, inserted, "committed fingerprints");
        Ok(inserted)
    }

    /// Looks up every `(song_id, anchor_time_seconds)` row for `hash` —
    /// O(log N + k) via `idx_hash_value` (spec.md §4.5).
    pub fn lookup(&self, hash: u64) -> EngineResult<Vec<(SongId, f32)>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT song_id, offset FROM fingerprints WHERE hash_value = ?1")?;
        let rows = stmt
            .query_map(params![hash as i64], |row| {
                Ok((row.get::<_, SongId>(0)?, row.get::<_, f64>(1)? as f32))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Looks up a recording's id by name, for callers that need to test
    /// membership before paying for decode/fingerprinting (spec.md §8,
    /// idempotent-ingest property — the caller-side skip-on-existing-song_id
    /// contract).
    pub fn song_id_by_name(&self, song_name: &str) -> EngineResult<Option<SongId>> {
        self.conn
            .query_row(
                "SELECT song_id FROM songs WHERE song_name = ?1",
                params![song_name],
                |row| row.get(0),
            )
            .optional()
            .map_err(EngineError::from)
    }

    pub fn song_name(&self, song_id: SongId) -> EngineResult<Option<String>> {
        self.conn
            .query_row(
                "SELECT song_name FROM songs WHERE song_id = ?1",
                params![song_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(EngineError::from)
    }

    pub fn hash_count(&self, song_id: SongId) -> EngineResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM fingerprints WHERE song_id = ?1",
            params![song_id],
            |row| row.get(0),
        )?)
    }

    pub fn song_duration(&self, song_id: SongId) -> EngineResult<Option<f64>> {
        self.conn
            .query_row(
                "SELECT song_duration FROM songs WHERE song_id = ?1",
                params![song_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(EngineError::from)
    }

    /// Closes the index. `Connection`'s `Drop` already closes the file
    /// handle; this is an explicit, named close point for callers that want
    /// one (spec.md §4.5).
    pub fn close(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn add_recording_is_idempotent_by_name() {
        let index = FingerprintIndex::open_in_memory().unwrap();
        let id1 = index.add_recording("A.wav", Some("/tmp/a.wav"), 8.0).unwrap();
        let id2 = index.add_recording("A.wav", Some("/tmp/a.wav"), 8.0).unwrap();
        assert_eq!(id1, id2);

        let count: i64 = index
            .conn
            .query_row("SELECT COUNT(*) FROM songs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn song_id_by_name_finds_existing_and_misses_unknown() {
        let index = FingerprintIndex::open_in_memory().unwrap();
        let song_id = index.add_recording("A.wav", None, 8.0).unwrap();
        assert_eq!(index.song_id_by_name("A.wav").unwrap(), Some(song_id));
        assert_eq!(index.song_id_by_name("B.wav").unwrap(), None);
    }

    #[test]
    fn lookup_returns_rows_for_matching_hash() {
        let mut index = FingerprintIndex::open_in_memory().unwrap();
        let song_id = index.add_recording("A.wav", None, 8.0).unwrap();
        let mut fps = HashMap::new();
        fps.insert(42u64, vec![0.0f32, 1.5f32]);
        index.add_fingerprints(song_id, &fps).unwrap();

        let rows = index.lookup(42).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|(id, _)| *id == song_id));
    }

    #[test]
    fn lookup_on_unknown_hash_is_empty() {
        let index = FingerprintIndex::open_in_memory().unwrap();
        assert!(index.lookup(999).unwrap().is_empty());
    }

    #[test]
    fn round_trip_persistence_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.sqlite");

        {
            let mut index = FingerprintIndex::open(&path).unwrap();
            let song_id = index.add_recording("A.wav", None, 8.0).unwrap();
            let mut fps = HashMap::new();
            fps.insert(7u64, vec![1.0f32]);
            index.add_fingerprints(song_id, &fps).unwrap();
        }

        let reopened = FingerprintIndex::open(&path).unwrap();
        assert_eq!(reopened.song_name(1).unwrap().as_deref(), Some("A.wav"));
        assert_eq!(reopened.lookup(7).unwrap().len(), 1);
    }

    #[test]
    fn hash_count_and_duration_are_tracked_per_song() {
        let mut index = FingerprintIndex::open_in_memory().unwrap();
        let song_id = index.add_recording("A.wav", None, 8.0).unwrap();
        let mut fps = HashMap::new();
        fps.insert(1u64, vec![0.0, 0.1]);
        fps.insert(2u64, vec![0.2]);
        index.add_fingerprints(song_id, &fps).unwrap();

        assert_eq!(index.hash_count(song_id).unwrap(), 3);
        assert_eq!(index.song_duration(song_id).unwrap(), Some(8.0));
    }
}
