//! Ingestion pipeline orchestration.
//!
//! Coordinates the write path: corpus → chunker → embedder → storage.
//! Each chunk is an independent insert with a fresh v4 UUID; there is no
//! batching and no dedup, so re-running ingestion duplicates records. A
//! failure part-way through leaves prior inserts in place and aborts on
//! the first error; callers needing atomicity checkpoint externally.

use std::path::Path;

use crate::chunker::{self, SemanticSplitter};
use crate::config::Config;
use crate::embedding::{Embedder, OllamaEmbedder};
use crate::error::{RagError, Result};
use crate::models::{Chunk, ChunkRecord};
use crate::store::{ScyllaDbStore, VectorStore};

/// Embed and persist chunks one by one. Returns the number inserted.
pub async fn ingest_chunks(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    chunks: &[Chunk],
    table: &str,
) -> Result<usize> {
    if chunks.is_empty() {
        return Err(RagError::EmptyInput("no chunks to ingest".to_string()));
    }

    let mut inserted = 0;
    for chunk in chunks {
        let embedding = embedder.embed(&chunk.text).await?;
        if embedding.len() != embedder.dims() {
            return Err(RagError::query_msg(format!(
                "embedding dimension mismatch: provider declares {}, got {}",
                embedder.dims(),
                embedding.len()
            )));
        }
        let record = ChunkRecord {
            chunk_id: uuid::Uuid::new_v4(),
            text: chunk.text.clone(),
            embedding,
        };
        store.insert(table, &record).await?;
        inserted += 1;
    }

    Ok(inserted)
}

/// Parse a bulk file: a JSON array of `{chunk_id, text, embedding}` rows.
pub fn load_records(path: &Path) -> Result<Vec<ChunkRecord>> {
    let content = std::fs::read_to_string(path)?;
    let records: Vec<ChunkRecord> = serde_json::from_str(&content)?;
    Ok(records)
}

/// Insert pre-embedded records from a bulk file, up to `limit` rows.
pub async fn insert_records(
    store: &dyn VectorStore,
    records: &[ChunkRecord],
    table: &str,
    limit: usize,
) -> Result<usize> {
    if records.is_empty() {
        return Err(RagError::EmptyInput(
            "bulk file holds no records".to_string(),
        ));
    }

    let mut inserted = 0;
    for record in records.iter().take(limit) {
        store.insert(table, record).await?;
        inserted += 1;
    }

    Ok(inserted)
}

/// `ragmill ingest`: chunk a corpus directory and write it to storage.
pub async fn run_ingest(
    config: &Config,
    dir: &Path,
    table: Option<String>,
    files_limit: Option<usize>,
) -> Result<()> {
    let table = table.unwrap_or_else(|| config.ingest.table.clone());
    let table = config.storage.qualified_table(&table);
    let files_limit = files_limit.unwrap_or(config.ingest.files_limit);

    let documents = chunker::load_corpus(
        dir,
        config.ingest.recursive,
        &config.ingest.extensions,
        files_limit,
    )?;
    if documents.is_empty() {
        return Err(RagError::EmptyInput(format!(
            "no non-empty documents matching {:?} under {}",
            config.ingest.extensions,
            dir.display()
        )));
    }
    println!("loaded {} documents from {}", documents.len(), dir.display());

    let embedder = OllamaEmbedder::new(&config.models);
    embedder.ensure_ready().await?;

    let splitter = SemanticSplitter::new(&config.chunking);
    let chunks = chunker::chunk_corpus(&documents, &splitter, &embedder).await?;
    println!("produced {} chunks", chunks.len());

    let store = ScyllaDbStore::connect(&config.storage).await?;
    let inserted = ingest_chunks(&store, &embedder, &chunks, &table).await?;

    println!("ingest {}", table);
    println!("  documents: {}", documents.len());
    println!("  chunks inserted: {}", inserted);
    println!("ok");
    Ok(())
}

/// `ragmill load`: bulk-insert pre-embedded records from a JSON file.
pub async fn run_load(
    config: &Config,
    file: &Path,
    table: Option<String>,
    limit: usize,
) -> Result<()> {
    let table = table.unwrap_or_else(|| config.ingest.table.clone());
    let table = config.storage.qualified_table(&table);

    let records = load_records(file)?;
    println!(
        "loaded {} records from {} (inserting up to {})",
        records.len(),
        file.display(),
        limit
    );

    let store = ScyllaDbStore::connect(&config.storage).await?;
    let inserted = insert_records(&store, &records, &table, limit).await?;

    println!("load {}", table);
    println!("  records inserted: {}", inserted);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic embedder: vector derived from byte content, with an
    /// optional failure injected at the nth call.
    struct CountingEmbedder {
        calls: AtomicUsize,
        fail_at: Option<usize>,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_at: None,
            }
        }

        fn failing_at(call: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_at: Some(call),
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn dims(&self) -> usize {
            4
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(call) {
                return Err(RagError::backend_msg("injected embedding failure"));
            }
            Ok(texts
                .iter()
                .map(|t| {
                    let sum = t.bytes().map(|b| b as f32).sum::<f32>();
                    vec![sum, t.len() as f32, 1.0, 0.0]
                })
                .collect())
        }
    }

    fn chunks(texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .map(|t| Chunk {
                text: t.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_ingest_assigns_fresh_ids() {
        let store = MemoryStore::new();
        let embedder = CountingEmbedder::new();
        let input = chunks(&["same text", "same text"]);

        let n = ingest_chunks(&store, &embedder, &input, "chunks")
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.row_count("chunks"), 2);

        // Same text twice: two rows, two distinct ids. No dedup by design.
        let results = store
            .ann_query("chunks", &[1.0, 1.0, 1.0, 0.0], 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_ne!(results[0].chunk_id, results[1].chunk_id);
        assert_eq!(results[0].text, results[1].text);
    }

    /// Declares one dimension, returns another.
    struct WrongDimsEmbedder;

    #[async_trait]
    impl Embedder for WrongDimsEmbedder {
        fn dims(&self) -> usize {
            8
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_ingest_rejects_mismatched_embedding_dims() {
        let store = MemoryStore::new();
        let input = chunks(&["some text"]);

        let err = ingest_chunks(&store, &WrongDimsEmbedder, &input, "chunks")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Query { .. }));
        assert_eq!(store.row_count("chunks"), 0);
    }

    #[tokio::test]
    async fn test_ingest_empty_chunks_rejected() {
        let store = MemoryStore::new();
        let embedder = CountingEmbedder::new();
        let err = ingest_chunks(&store, &embedder, &[], "chunks")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::EmptyInput(_)));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ingest_failure_keeps_prefix() {
        let store = MemoryStore::new();
        // First two embed calls succeed, third fails.
        let embedder = CountingEmbedder::failing_at(2);
        let input = chunks(&["one", "two", "three", "four"]);

        let err = ingest_chunks(&store, &embedder, &input, "chunks")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Backend { .. }));

        // Prior inserts remain; nothing after the failure was written.
        assert_eq!(store.row_count("chunks"), 2);
    }

    #[tokio::test]
    async fn test_dimension_consistency_across_ingest() {
        let store = MemoryStore::new();
        let embedder = CountingEmbedder::new();
        let input = chunks(&["alpha", "beta", "gamma"]);

        ingest_chunks(&store, &embedder, &input, "chunks")
            .await
            .unwrap();

        let results = store
            .ann_query("chunks", &[1.0, 0.0, 0.0, 0.0], 3)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_bulk_records_round_trip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("sample_vectors.json");
        std::fs::write(
            &path,
            r#"[
  {"chunk_id": "7f3b1c9e-2a44-4b7e-9f14-0a9d4f6c2e01", "text": "alpha", "embedding": [1.0, 0.0]},
  {"chunk_id": "1d2e3f40-5161-4272-8393-a4b5c6d7e8f9", "text": "beta", "embedding": [0.0, 1.0]}
]"#,
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text, "alpha");

        let store = MemoryStore::new();
        let n = insert_records(&store, &records, "chunks", 1000).await.unwrap();
        assert_eq!(n, 2);

        let limited_store = MemoryStore::new();
        let n = insert_records(&limited_store, &records, "chunks", 1)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(limited_store.row_count("chunks"), 1);
    }

    #[test]
    fn test_load_records_rejects_malformed_json() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_records(&path), Err(RagError::Json(_))));
    }
}
