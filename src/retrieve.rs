//! Query-time retrieval: embed the query, ask the store for the closest K.

use crate::embedding::Embedder;
use crate::error::{RagError, Result};
use crate::models::RetrievedChunk;
use crate::store::VectorStore;

/// Return the `top_k` chunks of `table` most similar to `query_text`,
/// ascending by distance. Input is rejected before any backend call;
/// fewer than `top_k` rows come back when the table is small. The metric
/// itself belongs to the storage engine's index.
pub async fn retrieve(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    table: &str,
    query_text: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>> {
    if query_text.trim().is_empty() {
        return Err(RagError::EmptyInput(
            "query text must not be empty".to_string(),
        ));
    }
    if top_k == 0 {
        return Err(RagError::query_msg("top_k must be >= 1"));
    }

    let query_embedding = embedder.embed(query_text).await?;
    store.ann_query(table, &query_embedding, top_k).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkRecord;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use uuid::Uuid;

    /// Maps a handful of known queries to fixed vectors.
    struct KeywordEmbedder;

    #[async_trait]
    impl Embedder for KeywordEmbedder {
        fn dims(&self) -> usize {
            2
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("cat") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        let rows = [
            ("cats purr and meow", vec![0.95f32, 0.05]),
            ("dogs bark loudly", vec![0.1, 0.9]),
            ("kittens are small cats", vec![0.9, 0.1]),
        ];
        for (text, embedding) in rows {
            store
                .insert(
                    "chunks",
                    &ChunkRecord {
                        chunk_id: Uuid::new_v4(),
                        text: text.to_string(),
                        embedding,
                    },
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_similarity() {
        let store = seeded_store().await;
        let results = retrieve(&store, &KeywordEmbedder, "chunks", "tell me about cats", 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].text, "cats purr and meow");
        assert_eq!(results[1].text, "kittens are small cats");
    }

    #[tokio::test]
    async fn test_retrieve_caps_at_top_k() {
        let store = seeded_store().await;
        let results = retrieve(&store, &KeywordEmbedder, "chunks", "cat", 2)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);

        let results = retrieve(&store, &KeywordEmbedder, "chunks", "cat", 10)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_retrieve_rejects_empty_query() {
        let store = MemoryStore::new();
        let err = retrieve(&store, &KeywordEmbedder, "chunks", "  \n", 3)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::EmptyInput(_)));
    }

    #[tokio::test]
    async fn test_retrieve_rejects_zero_k() {
        let store = MemoryStore::new();
        let err = retrieve(&store, &KeywordEmbedder, "chunks", "cats", 0)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Query { .. }));
    }
}
