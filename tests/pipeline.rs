//! End-to-end pipeline tests: corpus on disk → chunks → records →
//! retrieval → grounding context, using an in-memory store and a
//! deterministic embedder so no external service is needed.

use async_trait::async_trait;

use ragmill::chunker::{chunk_corpus, load_corpus, SemanticSplitter};
use ragmill::config::ChunkingConfig;
use ragmill::embedding::Embedder;
use ragmill::error::{RagError, Result};
use ragmill::generate::build_context;
use ragmill::ingest::ingest_chunks;
use ragmill::models::ChunkRecord;
use ragmill::retrieve::retrieve;
use ragmill::store::{MemoryStore, VectorStore};

/// Projects texts onto two topic axes: feline content on the first,
/// canine on the second. Deterministic and offline.
struct TopicEmbedder;

#[async_trait]
impl Embedder for TopicEmbedder {
    fn dims(&self) -> usize {
        2
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let cat = ["cat", "kitten", "purr"]
                    .iter()
                    .filter(|w| lower.contains(*w))
                    .count() as f32;
                let dog = ["dog", "puppy", "bark"]
                    .iter()
                    .filter(|w| lower.contains(*w))
                    .count() as f32;
                if cat + dog == 0.0 {
                    vec![0.5, 0.5]
                } else {
                    vec![cat, dog]
                }
            })
            .collect())
    }
}

fn write_corpus(dir: &std::path::Path) {
    std::fs::write(
        dir.join("cats.md"),
        "Cats purr when they are content. A kitten sleeps most of the day.",
    )
    .unwrap();
    std::fs::write(
        dir.join("dogs.md"),
        "Dogs bark at strangers. A puppy chews everything it finds.",
    )
    .unwrap();
    std::fs::write(dir.join("empty.md"), "   \n\n  ").unwrap();
    std::fs::write(dir.join("notes.txt"), "wrong extension, ignored").unwrap();
}

fn splitter() -> SemanticSplitter {
    SemanticSplitter::new(&ChunkingConfig {
        initial_threshold: 0.4,
        appending_threshold: 0.5,
        merging_threshold: 0.5,
        max_chunk_size: 200,
    })
}

#[tokio::test]
async fn ingest_then_retrieve_grounds_the_right_topic() {
    let tmp = tempfile::TempDir::new().unwrap();
    write_corpus(tmp.path());

    let extensions = vec!["md".to_string()];
    let documents = load_corpus(tmp.path(), true, &extensions, 50).unwrap();
    // empty.md is dropped, notes.txt filtered by extension.
    assert_eq!(documents.len(), 2);

    let embedder = TopicEmbedder;
    let chunks = chunk_corpus(&documents, &splitter(), &embedder).await.unwrap();
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(chunk.text.chars().count() <= 200);
    }

    let store = MemoryStore::new();
    let inserted = ingest_chunks(&store, &embedder, &chunks, "chunks")
        .await
        .unwrap();
    assert_eq!(inserted, chunks.len());

    let results = retrieve(&store, &embedder, "chunks", "why do cats purr?", 1)
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].text.to_lowercase().contains("cat"));

    let texts: Vec<String> = results.iter().map(|r| r.text.clone()).collect();
    let context = build_context(&texts);
    assert!(context.starts_with("\n\n Item 1: "));
    assert!(context.contains("purr"));
}

#[tokio::test]
async fn round_trip_exact_embedding_returns_exact_text() {
    let store = MemoryStore::new();
    let embedding = vec![0.25f32, 0.5, 0.75];
    store
        .insert(
            "chunks",
            &ChunkRecord {
                chunk_id: uuid::Uuid::new_v4(),
                text: "the one true chunk".to_string(),
                embedding: embedding.clone(),
            },
        )
        .await
        .unwrap();

    let results = store.ann_query("chunks", &embedding, 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "the one true chunk");
}

#[tokio::test]
async fn reingesting_a_corpus_duplicates_rows() {
    let tmp = tempfile::TempDir::new().unwrap();
    write_corpus(tmp.path());
    let extensions = vec!["md".to_string()];
    let documents = load_corpus(tmp.path(), true, &extensions, 50).unwrap();

    let embedder = TopicEmbedder;
    let chunks = chunk_corpus(&documents, &splitter(), &embedder).await.unwrap();

    let store = MemoryStore::new();
    ingest_chunks(&store, &embedder, &chunks, "chunks").await.unwrap();
    ingest_chunks(&store, &embedder, &chunks, "chunks").await.unwrap();

    // No dedup: the second run writes the same texts under new ids.
    assert_eq!(store.row_count("chunks"), chunks.len() * 2);

    let results = retrieve(&store, &embedder, "chunks", "kitten", 2).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_ne!(results[0].chunk_id, results[1].chunk_id);
}

#[tokio::test]
async fn retrieval_never_exceeds_requested_k() {
    let tmp = tempfile::TempDir::new().unwrap();
    write_corpus(tmp.path());
    let extensions = vec!["md".to_string()];
    let documents = load_corpus(tmp.path(), true, &extensions, 50).unwrap();

    let embedder = TopicEmbedder;
    let chunks = chunk_corpus(&documents, &splitter(), &embedder).await.unwrap();
    let store = MemoryStore::new();
    ingest_chunks(&store, &embedder, &chunks, "chunks").await.unwrap();

    let total = store.row_count("chunks");
    let results = retrieve(&store, &embedder, "chunks", "animals", total + 10)
        .await
        .unwrap();
    assert_eq!(results.len(), total);

    let results = retrieve(&store, &embedder, "chunks", "animals", 1).await.unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn empty_query_fails_before_touching_the_store() {
    let store = MemoryStore::new();
    let err = retrieve(&store, &TopicEmbedder, "chunks", "", 3)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmptyInput(_)));
}
