use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Connection settings for the ScyllaDB cluster.
///
/// Each field can be overridden by a `SCYLLA_*` environment variable
/// (see [`StorageConfig::apply_env_overrides`]).
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub datacenter: String,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
}

fn default_port() -> u16 {
    9042
}
fn default_keyspace() -> String {
    "rag".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelsConfig {
    /// Base URL of the Ollama instance serving both models.
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_language_model")]
    pub language_model: String,
    /// Output dimension of the embedding model. Every record written to a
    /// table must carry a vector of exactly this length.
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            embedding_model: default_embedding_model(),
            language_model: default_language_model(),
            dims: default_dims(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_model() -> String {
    "hf.co/CompendiumLabs/bge-base-en-v1.5-gguf".to_string()
}
fn default_language_model() -> String {
    "hf.co/bartowski/Llama-3.2-1B-Instruct-GGUF".to_string()
}
fn default_dims() -> usize {
    768
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    5
}

/// Thresholds for the semantic double-merging splitter.
#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Minimum similarity for merging adjacent sentences into a chunk.
    #[serde(default = "default_initial_threshold")]
    pub initial_threshold: f32,
    /// Minimum similarity for appending the following sentence to a chunk.
    #[serde(default = "default_appending_threshold")]
    pub appending_threshold: f32,
    /// Minimum similarity for merging two adjacent finished chunks.
    #[serde(default = "default_merging_threshold")]
    pub merging_threshold: f32,
    /// Hard cap on chunk length in characters; overrides every merge.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            initial_threshold: default_initial_threshold(),
            appending_threshold: default_appending_threshold(),
            merging_threshold: default_merging_threshold(),
            max_chunk_size: default_max_chunk_size(),
        }
    }
}

fn default_initial_threshold() -> f32 {
    0.4
}
fn default_appending_threshold() -> f32 {
    0.5
}
fn default_merging_threshold() -> f32 {
    0.5
}
fn default_max_chunk_size() -> usize {
    2048
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// File extension allow-list for corpus loading.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    /// Cap on the number of files processed per ingestion run.
    #[serde(default = "default_files_limit")]
    pub files_limit: usize,
    /// Default target table for chunk records.
    #[serde(default = "default_table")]
    pub table: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            recursive: default_recursive(),
            files_limit: default_files_limit(),
            table: default_table(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string(), "rst".to_string()]
}
fn default_recursive() -> bool {
    true
}
fn default_files_limit() -> usize {
    1
}
fn default_table() -> String {
    "chunks".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    3
}

impl StorageConfig {
    /// Override connection settings from `SCYLLA_*` environment variables.
    ///
    /// Recognized: `SCYLLA_HOST`, `SCYLLA_PORT`, `SCYLLA_USER`,
    /// `SCYLLA_PASSWORD`, `SCYLLA_DATACENTER`, `SCYLLA_KEYSPACE`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("SCYLLA_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("SCYLLA_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(user) = std::env::var("SCYLLA_USER") {
            self.username = user;
        }
        if let Ok(password) = std::env::var("SCYLLA_PASSWORD") {
            self.password = password;
        }
        if let Ok(dc) = std::env::var("SCYLLA_DATACENTER") {
            self.datacenter = dc;
        }
        if let Ok(keyspace) = std::env::var("SCYLLA_KEYSPACE") {
            self.keyspace = keyspace;
        }
    }

    /// Contact point in `host:port` form.
    pub fn node_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Fully qualified table name within the configured keyspace.
    pub fn qualified_table(&self, table: &str) -> String {
        if table.contains('.') {
            table.to_string()
        } else {
            format!("{}.{}", self.keyspace, table)
        }
    }
}

impl Config {
    /// Configuration for a localhost Scylla + Ollama stack, used when no
    /// config file is present.
    pub fn default_local() -> Self {
        Self {
            storage: StorageConfig {
                host: "127.0.0.1".to_string(),
                port: default_port(),
                username: "scylla".to_string(),
                password: "scylla".to_string(),
                datacenter: "datacenter1".to_string(),
                keyspace: default_keyspace(),
            },
            models: ModelsConfig::default(),
            chunking: ChunkingConfig::default(),
            ingest: IngestConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Load and validate configuration, then apply environment overrides.
///
/// Falls back to [`Config::default_local`] when the file does not exist,
/// so `SCYLLA_*` variables alone are enough to point at a cluster.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default_local()
    };

    config.storage.apply_env_overrides();

    if config.storage.host.trim().is_empty() {
        anyhow::bail!("storage.host must not be empty");
    }
    if config.storage.keyspace.trim().is_empty() {
        anyhow::bail!("storage.keyspace must not be empty");
    }
    if config.models.dims == 0 {
        anyhow::bail!("models.dims must be > 0");
    }
    if config.chunking.max_chunk_size == 0 {
        anyhow::bail!("chunking.max_chunk_size must be > 0");
    }
    for threshold in [
        config.chunking.initial_threshold,
        config.chunking.appending_threshold,
        config.chunking.merging_threshold,
    ] {
        if !(-1.0..=1.0).contains(&threshold) {
            anyhow::bail!("chunking thresholds must be in [-1.0, 1.0]");
        }
    }
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_uses_local_defaults() {
        let config = load_config(Path::new("/nonexistent/ragmill.toml")).unwrap();
        assert_eq!(config.storage.port, 9042);
        assert_eq!(config.storage.keyspace, "rag");
        assert_eq!(config.retrieval.top_k, 3);
    }

    #[test]
    fn test_parse_full_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[storage]
host = "node-0.example.scylla.cloud"
port = 9042
username = "scylla"
password = "secret"
datacenter = "AWS_US_EAST_1"
keyspace = "rag"

[models]
dims = 768

[chunking]
max_chunk_size = 2048

[retrieval]
top_k = 5
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.storage.datacenter, "AWS_US_EAST_1");
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.chunking.max_chunk_size, 2048);
    }

    #[test]
    fn test_zero_dims_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[storage]
host = "127.0.0.1"
username = "scylla"
password = "scylla"
datacenter = "dc1"

[models]
dims = 0
"#
        )
        .unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_qualified_table() {
        let config = Config::default_local();
        assert_eq!(config.storage.qualified_table("chunks"), "rag.chunks");
        assert_eq!(config.storage.qualified_table("other.t"), "other.t");
    }
}
