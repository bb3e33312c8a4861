//! Schema setup for the chunk keyspace.
//!
//! Creates the keyspace, the chunk table, and the ANN index over the
//! embedding column. Idempotent: every statement is `IF NOT EXISTS`.

use crate::config::Config;
use crate::error::Result;
use crate::store::ScyllaDbStore;

pub async fn run_migrations(config: &Config) -> Result<()> {
    // The keyspace does not exist yet on first run, so connect without one.
    let store = ScyllaDbStore::connect_without_keyspace(&config.storage).await?;

    store
        .execute_ddl(&format!(
            "CREATE KEYSPACE IF NOT EXISTS {} WITH replication = \
             {{'class': 'NetworkTopologyStrategy', 'replication_factor': 1}}",
            config.storage.keyspace
        ))
        .await?;

    let table = config.storage.qualified_table(&config.ingest.table);
    store
        .execute_ddl(&format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             chunk_id uuid PRIMARY KEY, \
             text text, \
             embedding vector<float, {}>)",
            table, config.models.dims
        ))
        .await?;

    store
        .execute_ddl(&format!(
            "CREATE CUSTOM INDEX IF NOT EXISTS {}_embedding_idx ON {} (embedding) \
             USING 'vector_index'",
            config.ingest.table, table
        ))
        .await?;

    Ok(())
}
