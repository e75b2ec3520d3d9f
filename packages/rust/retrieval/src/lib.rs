//! Local documentation retrieval over a TF-IDF index persisted in libSQL.
//!
//! [`DocIndex`] lazily loads its index on first use. When the stored corpus
//! fingerprint matches the documents on disk, chunks come from the store;
//! otherwise the corpus is re-chunked and the store rewritten. Vectors are
//! always rebuilt in memory.

mod cleanup;
mod documents;
mod migrations;
mod splitter;
mod store;
mod tfidf;

use std::path::PathBuf;

use async_trait::async_trait;
use explainer_shared::{DocHit, DocSearch, ExplainerError, Result, RetrievalConfig};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use documents::SourceDocument;
pub use store::StoredChunk;
use store::ChunkStore;
use tfidf::TfIdfIndex;

/// Summary of a ready index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    /// `true` when the chunks were rebuilt from documents rather than loaded.
    pub rebuilt: bool,
}

struct LoadedIndex {
    chunks: Vec<StoredChunk>,
    tfidf: TfIdfIndex,
    stats: IndexStats,
}

/// Similarity search over the local documentation corpus.
pub struct DocIndex {
    documents_path: PathBuf,
    index_path: PathBuf,
    chunk_size: usize,
    chunk_overlap: usize,
    top_k: usize,
    loaded: OnceCell<LoadedIndex>,
}

impl DocIndex {
    pub fn new(config: &RetrievalConfig) -> Self {
        Self {
            documents_path: config.documents_path.clone(),
            index_path: config.index_path.clone(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            top_k: config.top_k,
            loaded: OnceCell::new(),
        }
    }

    /// Load or build the index. Idempotent; concurrent callers wait for the
    /// same build.
    pub async fn ensure_ready(&self) -> Result<IndexStats> {
        let loaded = self.loaded.get_or_try_init(|| self.load_or_build()).await?;
        Ok(loaded.stats)
    }

    #[instrument(skip_all, fields(documents = %self.documents_path.display()))]
    async fn load_or_build(&self) -> Result<LoadedIndex> {
        let dir = self.documents_path.clone();
        let docs = tokio::task::spawn_blocking(move || documents::load_documents(&dir))
            .await
            .map_err(|e| ExplainerError::Retrieval(format!("document loading panicked: {e}")))??;
        let fingerprint = corpus_fingerprint(&docs, self.chunk_size, self.chunk_overlap);

        let store = ChunkStore::open(&self.index_path).await?;
        let stored = store.fingerprint().await?;

        let (chunks, rebuilt) = if stored.as_deref() == Some(fingerprint.as_str()) {
            let built_at = store.built_at().await?.unwrap_or_default();
            debug!(%built_at, "fingerprint matches, loading stored chunks");
            (store.load_chunks().await?, false)
        } else {
            let (size, overlap) = (self.chunk_size, self.chunk_overlap);
            let docs_for_split = docs.clone();
            let chunks =
                tokio::task::spawn_blocking(move || chunk_documents(&docs_for_split, size, overlap))
                    .await
                    .map_err(|e| ExplainerError::Retrieval(format!("chunking panicked: {e}")))?;
            store.replace(&fingerprint, &chunks).await?;
            (chunks, true)
        };

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let tfidf = tokio::task::spawn_blocking(move || TfIdfIndex::build(&texts))
            .await
            .map_err(|e| ExplainerError::Retrieval(format!("index build panicked: {e}")))?;

        let stats = IndexStats {
            documents: docs.len(),
            chunks: tfidf.len(),
            rebuilt,
        };
        info!(
            documents = stats.documents,
            chunks = stats.chunks,
            rebuilt,
            "documentation index ready"
        );
        Ok(LoadedIndex {
            chunks,
            tfidf,
            stats,
        })
    }
}

#[async_trait]
impl DocSearch for DocIndex {
    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str) -> Result<Vec<DocHit>> {
        self.ensure_ready().await?;
        let Some(loaded) = self.loaded.get() else {
            return Ok(Vec::new());
        };

        let hits: Vec<DocHit> = loaded
            .tfidf
            .search(query, self.top_k)
            .into_iter()
            .enumerate()
            .map(|(rank, (idx, score))| {
                let chunk = &loaded.chunks[idx];
                DocHit {
                    file: Some(chunk.file.clone()),
                    chunk: Some(chunk.text.clone()),
                    relevance: Some(serde_json::json!(f64::from(score).min(1.0))),
                    rank: Some(rank + 1),
                    ..DocHit::default()
                }
            })
            .collect();
        debug!(hits = hits.len(), "documentation searched");
        Ok(hits)
    }

    fn provider(&self) -> &str {
        "tfidf"
    }
}

fn chunk_documents(docs: &[SourceDocument], size: usize, overlap: usize) -> Vec<StoredChunk> {
    docs.iter()
        .flat_map(|doc| {
            splitter::split_text(&doc.text(), size, overlap)
                .into_iter()
                .map(|text| StoredChunk {
                    file: doc.name.clone(),
                    text,
                })
        })
        .collect()
}

/// SHA-256 over file names, raw contents and the chunking parameters.
fn corpus_fingerprint(docs: &[SourceDocument], chunk_size: usize, chunk_overlap: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("chunk_size={chunk_size};chunk_overlap={chunk_overlap}\n"));
    for doc in docs {
        hasher.update(doc.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(doc.raw.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}
