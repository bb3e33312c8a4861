//! Interactive query loop and one-shot questions.
//!
//! Both paths share [`answer`]: retrieve the closest chunks, assemble the
//! grounding context, and print the streamed response fragment by
//! fragment. A failed query is reported and the loop keeps accepting
//! questions; no state survives between queries.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::Config;
use crate::embedding::OllamaEmbedder;
use crate::error::{RagError, Result};
use crate::generate::{build_context, OllamaGenerator};
use crate::retrieve::retrieve;
use crate::store::ScyllaDbStore;

struct QuerySession {
    store: ScyllaDbStore,
    embedder: OllamaEmbedder,
    generator: OllamaGenerator,
    table: String,
    top_k: usize,
}

impl QuerySession {
    async fn open(config: &Config, table: Option<String>, top_k: Option<usize>) -> Result<Self> {
        let table = table.unwrap_or_else(|| config.ingest.table.clone());
        let table = config.storage.qualified_table(&table);
        let top_k = top_k.unwrap_or(config.retrieval.top_k);
        if top_k == 0 {
            return Err(RagError::query_msg("top_k must be >= 1"));
        }

        let embedder = OllamaEmbedder::new(&config.models);
        let generator = OllamaGenerator::new(&config.models);
        println!("Preparing models...");
        embedder.ensure_ready().await?;
        generator.ensure_ready().await?;

        let store = ScyllaDbStore::connect(&config.storage).await?;

        Ok(Self {
            store,
            embedder,
            generator,
            table,
            top_k,
        })
    }
}

/// `ragmill ask`: answer a single question and exit.
pub async fn run_ask(
    config: &Config,
    question: &str,
    table: Option<String>,
    top_k: Option<usize>,
) -> Result<()> {
    let session = QuerySession::open(config, table, top_k).await?;
    answer(&session, question).await
}

/// `ragmill chat`: read questions from stdin until EOF or `exit`.
pub async fn run_chat(config: &Config, table: Option<String>, top_k: Option<usize>) -> Result<()> {
    let session = QuerySession::open(config, table, top_k).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("\nEnter your question: ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        // One failed query must not end the session.
        if let Err(e) = answer(&session, question).await {
            report_error(&e);
        }
    }

    Ok(())
}

async fn answer(session: &QuerySession, question: &str) -> Result<()> {
    let results = retrieve(
        &session.store,
        &session.embedder,
        &session.table,
        question,
        session.top_k,
    )
    .await?;

    let ids: Vec<String> = results.iter().map(|r| r.chunk_id.to_string()).collect();
    println!("---\nRetrieved chunk IDs: {:?}", ids);

    let texts: Vec<String> = results.into_iter().map(|r| r.text).collect();
    let context = build_context(&texts);

    let mut stream = session.generator.chat_stream(question, &context).await?;

    println!("Chatbot response:");
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.recv().await {
        let fragment = fragment?;
        print!("{}", fragment);
        stdout.flush()?;
    }
    println!();

    Ok(())
}

fn report_error(error: &RagError) {
    eprintln!("error: {}", error);
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}
