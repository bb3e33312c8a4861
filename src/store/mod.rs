//! Storage gateway for chunk records.
//!
//! [`VectorStore`] is a thin transactional façade over a vector-capable
//! store: one parameterized insert per call and one ANN read shape,
//! "closest-K by vector distance". The distance metric belongs to the
//! engine's index configuration; callers only ask for the closest K.
//!
//! Implementations:
//! - [`ScyllaDbStore`]: the shipped engine (ScyllaDB over CQL).
//! - [`MemoryStore`]: brute-force in-process store for tests.
//!
//! Row shape is validated here at the gateway boundary, so the retriever
//! never sees a malformed record. No operation is retried: a single
//! failure surfaces immediately and the caller decides what to do.

pub mod memory;
pub mod scylladb;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::models::{ChunkRecord, RetrievedChunk};

pub use memory::MemoryStore;
pub use scylladb::ScyllaDbStore;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert one record into `table`. Atomic per call; no partial column
    /// writes, no retry.
    async fn insert(&self, table: &str, record: &ChunkRecord) -> Result<()>;

    /// Return the `top_k` rows of `table` closest to `embedding`, in
    /// ascending distance order. Never more than `top_k`; fewer when the
    /// table holds fewer rows. All rows are materialized, not a cursor.
    async fn ann_query(
        &self,
        table: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>>;
}

/// Reject records that would write a malformed row.
pub(crate) fn validate_record(record: &ChunkRecord) -> Result<()> {
    if record.text.is_empty() {
        return Err(RagError::query_msg("record text must not be empty"));
    }
    if record.embedding.is_empty() {
        return Err(RagError::query_msg("record embedding must not be empty"));
    }
    Ok(())
}

/// Table names are interpolated into CQL (they cannot be bound), so only
/// plain identifiers and `keyspace.table` forms are accepted.
pub(crate) fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !table.starts_with('.')
        && !table.ends_with('.');
    if valid {
        Ok(())
    } else {
        Err(RagError::query_msg(format!("invalid table name: {:?}", table)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_validate_table_name() {
        assert!(validate_table_name("chunks").is_ok());
        assert!(validate_table_name("rag.chunks").is_ok());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("chunks; DROP TABLE x").is_err());
        assert!(validate_table_name(".chunks").is_err());
    }

    #[test]
    fn test_validate_record() {
        let good = ChunkRecord {
            chunk_id: Uuid::new_v4(),
            text: "t".to_string(),
            embedding: vec![0.1],
        };
        assert!(validate_record(&good).is_ok());

        let empty_text = ChunkRecord {
            text: String::new(),
            ..good.clone()
        };
        assert!(matches!(
            validate_record(&empty_text),
            Err(RagError::Query { .. })
        ));

        let empty_vec = ChunkRecord {
            embedding: Vec::new(),
            ..good
        };
        assert!(validate_record(&empty_vec).is_err());
    }
}
