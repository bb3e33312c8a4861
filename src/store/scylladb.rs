//! ScyllaDB-backed [`VectorStore`].
//!
//! One session per store instance: established by [`ScyllaDbStore::connect`]
//! with datacenter-aware, token-aware load balancing and plain-text auth,
//! released when the store is dropped. Reads use the CQL ANN ordering
//! clause, so ordering and metric come from the table's vector index.

use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::policies::load_balancing::DefaultPolicy;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{RagError, Result};
use crate::models::{ChunkRecord, RetrievedChunk};

use super::{validate_record, validate_table_name, VectorStore};

pub struct ScyllaDbStore {
    session: Session,
}

impl ScyllaDbStore {
    /// Connect and switch to the configured keyspace.
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        Self::connect_inner(config, true).await
    }

    /// Connect without selecting a keyspace. Used by schema setup, which
    /// must run before the keyspace exists.
    pub async fn connect_without_keyspace(config: &StorageConfig) -> Result<Self> {
        Self::connect_inner(config, false).await
    }

    async fn connect_inner(config: &StorageConfig, use_keyspace: bool) -> Result<Self> {
        let policy = DefaultPolicy::builder()
            .prefer_datacenter(config.datacenter.clone())
            .token_aware(true)
            .build();
        let profile = ExecutionProfile::builder()
            .load_balancing_policy(policy)
            .build();

        let mut builder = SessionBuilder::new()
            .known_node(config.node_address())
            .user(&config.username, &config.password)
            .default_execution_profile_handle(profile.into_handle());

        if use_keyspace {
            builder = builder.use_keyspace(&config.keyspace, false);
        }

        let session = builder.build().await.map_err(|e| {
            RagError::storage(
                format!("failed to connect to {}", config.node_address()),
                e,
            )
        })?;

        Ok(Self { session })
    }

    /// Run a single DDL statement. Schema setup only.
    pub async fn execute_ddl(&self, statement: &str) -> Result<()> {
        self.session
            .query_unpaged(statement, ())
            .await
            .map_err(|e| RagError::storage("DDL statement failed", e))?;
        Ok(())
    }
}

#[async_trait]
impl VectorStore for ScyllaDbStore {
    async fn insert(&self, table: &str, record: &ChunkRecord) -> Result<()> {
        validate_table_name(table)?;
        validate_record(record)?;

        let statement = format!(
            "INSERT INTO {} (chunk_id, text, embedding) VALUES (?, ?, ?)",
            table
        );
        let prepared = self
            .session
            .prepare(statement)
            .await
            .map_err(|e| RagError::query("failed to prepare insert", e))?;

        self.session
            .execute_unpaged(&prepared, (record.chunk_id, &record.text, &record.embedding))
            .await
            .map_err(|e| RagError::storage(format!("insert into {} failed", table), e))?;

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

        let statement = format!(
            "SELECT chunk_id, text FROM {} ORDER BY embedding ANN OF ? LIMIT ?",
            table
        );
        let prepared = self
            .session
            .prepare(statement)
            .await
            .map_err(|e| RagError::query("failed to prepare ANN query", e))?;

        let result = self
            .session
            .execute_unpaged(&prepared, (embedding.to_vec(), top_k as i32))
            .await
            .map_err(|e| RagError::storage(format!("ANN query on {} failed", table), e))?;

        let rows_result = result
            .into_rows_result()
            .map_err(|e| RagError::query("ANN query returned no row set", e))?;

        let mut records = Vec::new();
        for row in rows_result
            .rows::<(Uuid, String)>()
            .map_err(|e| RagError::query("unexpected row shape", e))?
        {
            let (chunk_id, text) =
                row.map_err(|e| RagError::query("row deserialization failed", e))?;
            records.push(RetrievedChunk { chunk_id, text });
        }

        Ok(records)
    }
}
