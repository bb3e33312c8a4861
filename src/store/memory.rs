//! In-memory [`VectorStore`] for tests.
//!
//! Brute-force cosine distance over all stored rows. Ties keep insertion
//! order. Unlike the real engine, this store also enforces dimension
//! consistency per table, since there is no schema to do it.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{RagError, Result};
use crate::models::{ChunkRecord, RetrievedChunk};

use super::{validate_record, validate_table_name, VectorStore};

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<ChunkRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently held in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .expect("memory store lock poisoned")
            .get(table)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn insert(&self, table: &str, record: &ChunkRecord) -> Result<()> {
        validate_table_name(table)?;
        validate_record(record)?;

        let mut tables = self.tables.write().expect("memory store lock poisoned");
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(first) = rows.first() {
            if first.embedding.len() != record.embedding.len() {
                return Err(RagError::query_msg(format!(
                    "embedding dimension mismatch: table {} holds {}, record has {}",
                    table,
                    first.embedding.len(),
                    record.embedding.len()
                )));
            }
        }

        rows.push(record.clone());
        Ok(())
    }

    async fn ann_query(
        &self,
        table: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        validate_table_name(table)?;
        if embedding.is_empty() {
            return Err(RagError::query_msg("query embedding must not be empty"));
        }

        let tables = self.tables.read().expect("memory store lock poisoned");
        let rows = match tables.get(table) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };

        if let Some(first) = rows.first() {
            if first.embedding.len() != embedding.len() {
                return Err(RagError::query_msg(format!(
                    "embedding dimension mismatch: table {} holds {}, query has {}",
                    table,
                    first.embedding.len(),
                    embedding.len()
                )));
            }
        }

        // Cosine distance, ascending; stable sort keeps insertion order on ties.
        let mut scored: Vec<(f32, &ChunkRecord)> = rows
            .iter()
            .map(|r| (1.0 - cosine_similarity(&r.embedding, embedding), r))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(_, r)| RetrievedChunk {
                chunk_id: r.chunk_id,
                text: r.text.clone(),
            })
            .collect())
    }
}
