//! libSQL persistence for document chunks and the corpus fingerprint.

use std::path::Path;

use chrono::Utc;
use explainer_shared::{ExplainerError, Result};
use libsql::{Connection, Database, params};
use tracing::info;

use crate::migrations;

const FINGERPRINT_KEY: &str = "fingerprint";
const BUILT_AT_KEY: &str = "built_at";

fn storage_err(e: libsql::Error) -> ExplainerError {
    ExplainerError::Storage(e.to_string())
}

/// One persisted chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredChunk {
    pub file: String,
    pub text: String,
}

pub(crate) struct ChunkStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl ChunkStore {
    /// Open or create the store at `path`, applying pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ExplainerError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ExplainerError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn schema_version(&self) -> u32 {
        let Ok(mut rows) = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await
        else {
            return 0;
        };
        match rows.next().await {
            Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
            _ => 0,
        }
    }

    pub async fn fingerprint(&self) -> Result<Option<String>> {
        self.meta(FINGERPRINT_KEY).await
    }

    /// RFC 3339 timestamp of the last rebuild.
    pub async fn built_at(&self) -> Result<Option<String>> {
        self.meta(BUILT_AT_KEY).await
    }

    async fn meta(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM index_meta WHERE key = ?1", params![key])
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    /// All chunks in corpus order.
    pub async fn load_chunks(&self) -> Result<Vec<StoredChunk>> {
        let mut rows = self
            .conn
            .query("SELECT file, text FROM chunks ORDER BY id", params![])
            .await
            .map_err(storage_err)?;

        let mut chunks = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            chunks.push(StoredChunk {
                file: row.get::<String>(0).map_err(storage_err)?,
                text: row.get::<String>(1).map_err(storage_err)?,
            });
        }
        Ok(chunks)
    }

    /// Replace every chunk and the fingerprint in one transaction.
    pub async fn replace(&self, fingerprint: &str, chunks: &[StoredChunk]) -> Result<()> {
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        tx.execute("DELETE FROM chunks", params![])
            .await
            .map_err(storage_err)?;

        let mut position_in_file: i64 = 0;
        let mut previous_file: Option<&str> = None;
        for (id, chunk) in chunks.iter().enumerate() {
            if previous_file != Some(chunk.file.as_str()) {
                position_in_file = 0;
                previous_file = Some(chunk.file.as_str());
            }
            tx.execute(
                "INSERT INTO chunks (id, file, position, text) VALUES (?1, ?2, ?3, ?4)",
                params![id as i64, chunk.file.as_str(), position_in_file, chunk.text.as_str()],
            )
            .await
            .map_err(storage_err)?;
            position_in_file += 1;
        }

        let built_at = Utc::now().to_rfc3339();
        for (key, value) in [(FINGERPRINT_KEY, fingerprint), (BUILT_AT_KEY, built_at.as_str())] {
            tx.execute(
                "INSERT INTO index_meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }
}
