//! SQL migrations for the chunk store, applied in order on open.

pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: index_meta, chunks",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Key/value facts about the persisted index (corpus fingerprint, build time)
CREATE TABLE IF NOT EXISTS index_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Document chunks in corpus order
CREATE TABLE IF NOT EXISTS chunks (
    id       INTEGER PRIMARY KEY,
    file     TEXT NOT NULL,
    position INTEGER NOT NULL,
    text     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
