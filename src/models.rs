//! Core data types flowing through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A loaded source file. Documents with empty or whitespace-only text are
/// dropped before chunking.
#[derive(Debug, Clone)]
pub struct Document {
    pub path: PathBuf,
    pub text: String,
}

/// A bounded span of one document's text; the atomic retrieval unit.
/// Transient: consumed by the ingestion pipeline, never persisted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
}

/// The persisted unit: one row in a chunk table.
///
/// `chunk_id` is assigned at ingestion time, not derived from content, so
/// re-ingesting the same text produces a new id and a duplicate row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub chunk_id: Uuid,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// One row of a retrieval result, in ascending-distance order.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: Uuid,
    pub text: String,
}
