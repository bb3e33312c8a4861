//! Context assembly and streamed answer generation.
//!
//! [`build_context`] turns retrieved chunk texts into the grounding block
//! of the system prompt, each tagged with its 1-based position, closest
//! chunk first. [`OllamaGenerator::chat_stream`] sends the two-message
//! exchange (system = instructions + context, user = raw query) to
//! `POST /api/chat` in streaming mode and hands fragments to the caller
//! over a channel in arrival order: the first token is available before
//! the response completes, and dropping the receiver stops consumption
//! (the backend may keep producing; its output is discarded).

use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::config::ModelsConfig;
use crate::embedding::pull_model;
use crate::error::{RagError, Result};

/// Concatenate chunk texts into a grounding context, input order preserved.
pub fn build_context(chunks: &[String]) -> String {
    let mut context = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        context.push_str(&format!("\n\n Item {}: {}", i + 1, chunk));
    }
    context
}

fn system_prompt(context: &str) -> String {
    format!(
        "You are an AI assistant that answers user questions by combining \
         your reasoning ability with the information provided below: \n{}",
        context
    )
}

/// Generation driver backed by a local Ollama instance.
pub struct OllamaGenerator {
    url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaGenerator {
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            url: config.url.clone(),
            model: config.language_model.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    /// Pull the language model so that it is available before first use.
    pub async fn ensure_ready(&self) -> Result<()> {
        pull_model(&self.url, &self.model, self.timeout_secs).await
    }

    /// Request a streamed completion grounded in `context`.
    ///
    /// Returns a single-pass receiver of text fragments; each received
    /// item is either a fragment or the error that ended the stream.
    pub async fn chat_stream(
        &self,
        user_query: &str,
        context: &str,
    ) -> Result<mpsc::Receiver<Result<String>>> {
        if user_query.trim().is_empty() {
            return Err(RagError::EmptyInput(
                "query text must not be empty".to_string(),
            ));
        }

        // No overall timeout: generation legitimately outlives any fixed
        // request deadline. Only connection establishment is bounded.
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| RagError::backend("failed to build HTTP client", e))?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(context) },
                { "role": "user", "content": user_query },
            ],
            "stream": true,
        });

        let response = client
            .post(format!("{}/api/chat", self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                RagError::backend(
                    format!("Ollama connection error (is Ollama running at {}?)", self.url),
                    e,
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::backend_msg(format!(
                "Ollama chat error {}: {}",
                status, body_text
            )));
        }

        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            pump_chat_stream(response.bytes_stream(), tx).await;
        });

        Ok(rx)
    }
}

/// Drain a byte stream of NDJSON chat lines into the fragment channel.
///
/// Lines may arrive split across byte chunks; a final line without a
/// trailing newline still carries its fragment.
async fn pump_chat_stream<S, B, E>(stream: S, tx: mpsc::Sender<Result<String>>)
where
    S: futures_util::Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    futures_util::pin_mut!(stream);
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(item) = stream.next().await {
        let bytes = match item {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tx
                    .send(Err(RagError::backend("chat stream aborted", e)))
                    .await;
                return;
            }
        };

        buffer.extend_from_slice(bytes.as_ref());

        // The response is NDJSON: one object per line.
        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=pos).collect();
            if !forward_line(&String::from_utf8_lossy(&line), &tx).await {
                return;
            }
        }
    }

    if !buffer.is_empty() {
        forward_line(&String::from_utf8_lossy(&buffer), &tx).await;
    }
}

/// Returns `false` once the stream is finished: done marker, parse error,
/// or the receiver went away (the caller cancelled).
async fn forward_line(line: &str, tx: &mpsc::Sender<Result<String>>) -> bool {
    match parse_chat_line(line.trim()) {
        Ok(None) => true,
        Ok(Some(fragment)) => {
            if !fragment.content.is_empty() && tx.send(Ok(fragment.content)).await.is_err() {
                return false;
            }
            !fragment.done
        }
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

#[derive(Debug)]
struct ChatFragment {
    content: String,
    done: bool,
}

/// Decode one NDJSON line of the chat response. Blank lines yield `None`.
fn parse_chat_line(line: &str) -> Result<Option<ChatFragment>> {
    if line.is_empty() {
        return Ok(None);
    }

    let json: serde_json::Value = serde_json::from_str(line)?;

    if let Some(error) = json.get("error").and_then(|e| e.as_str()) {
        return Err(RagError::backend_msg(format!("Ollama chat error: {}", error)));
    }

    let content = json
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();
    let done = json.get("done").and_then(|d| d.as_bool()).unwrap_or(false);

    Ok(Some(ChatFragment { content, done }))
}
