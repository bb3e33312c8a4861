//! # Ragmill
//!
//! A retrieval-augmented generation pipeline over a ScyllaDB vector store.
//!
//! Ragmill turns a directory of documents into embedded chunks, persists
//! them in a vector-indexed table, and at query time retrieves the
//! closest chunks to ground a streamed model answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌───────────┐
//! │  Corpus  │──▶│   Pipeline     │──▶│  ScyllaDB  │
//! │  (files) │   │ Chunk + Embed │   │ ANN index │
//! └──────────┘   └───────────────┘   └─────┬─────┘
//!                                          │
//!                       query ──▶ retrieve ┘
//!                                    │
//!                                    ▼
//!                          ┌──────────────────┐
//!                          │ Ollama (stream)  │
//!                          └──────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ragmill init                  # create keyspace, table, ANN index
//! ragmill ingest ./docs         # chunk, embed, and store a corpus
//! ragmill load vectors.json     # or bulk-load pre-embedded records
//! ragmill ask "what is RAG?"    # one-shot grounded answer
//! ragmill chat                  # interactive loop
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with `SCYLLA_*` env overrides |
//! | [`models`] | Core data types |
//! | [`chunker`] | Corpus loading and semantic double-merging splitter |
//! | [`embedding`] | Embedding provider abstraction (Ollama) |
//! | [`store`] | Vector store gateway (ScyllaDB, in-memory) |
//! | [`ingest`] | Write path: chunks → embeddings → records |
//! | [`retrieve`] | Read path: query → closest-K chunks |
//! | [`generate`] | Context assembly and streamed generation |
//! | [`chat`] | Interactive query loop |
//! | [`migrate`] | Schema setup |
//! | [`error`] | Error taxonomy |

pub mod chat;
pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generate;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod retrieve;
pub mod store;
