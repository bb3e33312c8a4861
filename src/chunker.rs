//! Corpus loading and semantic chunking.
//!
//! [`load_corpus`] walks a directory root and loads files matching an
//! extension allow-list into [`Document`]s, dropping empty ones.
//!
//! [`SemanticSplitter`] splits a document into bounded chunks using a
//! double-merging strategy over sentence embeddings:
//!
//! 1. sentence-level segmentation;
//! 2. adjacent sentences merge while their pairwise similarity exceeds
//!    `initial_threshold`;
//! 3. a following sentence is still appended when its similarity to the
//!    chunk as a whole exceeds `appending_threshold`;
//! 4. adjacent finished chunks merge when their mutual similarity exceeds
//!    `merging_threshold`;
//! 5. `max_chunk_size` (in characters) overrides every merge; no chunk
//!    is ever emitted above it.
//!
//! A single sentence longer than `max_chunk_size` is truncated at a
//! character boundary before merging begins.

use std::path::Path;
use walkdir::WalkDir;

use crate::config::ChunkingConfig;
use crate::embedding::{cosine_similarity, Embedder};
use crate::error::{RagError, Result};
use crate::models::{Chunk, Document};

/// Load matching files under `root` as [`Document`]s.
///
/// Traversal order is path-sorted, hidden entries are skipped, and at most
/// `files_limit` matching files are read; a whitespace-only file still
/// consumes a slot. Documents whose text is empty or whitespace-only are
/// excluded, not errors.
pub fn load_corpus(
    root: &Path,
    recursive: bool,
    extensions: &[String],
    files_limit: usize,
) -> Result<Vec<Document>> {
    if !root.is_dir() {
        return Err(RagError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("corpus root is not a directory: {}", root.display()),
        )));
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut documents = Vec::new();
    let mut files_seen = 0usize;

    let walker = WalkDir::new(root)
        .max_depth(max_depth)
        .sort_by_file_name()
        .into_iter()
        // depth 0 is the root itself, which may legitimately be dot-prefixed
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name().to_string_lossy().as_ref()));

    for entry in walker {
        if files_seen >= files_limit {
            break;
        }

        let entry = entry.map_err(|e| RagError::Io(std::io::Error::other(e)))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                extensions
                    .iter()
                    .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false);
        if !matches {
            continue;
        }

        files_seen += 1;
        let text = std::fs::read_to_string(path)?;
        if text.trim().is_empty() {
            continue;
        }

        documents.push(Document {
            path: path.to_path_buf(),
            text,
        });
    }

    Ok(documents)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name.len() > 1
}

/// Sentence-embedding-driven splitter with double-pass merging.
pub struct SemanticSplitter {
    initial_threshold: f32,
    appending_threshold: f32,
    merging_threshold: f32,
    max_chunk_size: usize,
}

impl SemanticSplitter {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            initial_threshold: config.initial_threshold,
            appending_threshold: config.appending_threshold,
            merging_threshold: config.merging_threshold,
            max_chunk_size: config.max_chunk_size,
        }
    }

    /// Split one document's text into chunks.
    ///
    /// Sentence embeddings are fetched in a single batch call. Chunks come
    /// back in text order.
    pub async fn split(&self, text: &str, embedder: &dyn Embedder) -> Result<Vec<Chunk>> {
        let sentences: Vec<String> = split_sentences(text)
            .into_iter()
            .map(|s| truncate_chars(&s, self.max_chunk_size))
            .collect();

        if sentences.is_empty() {
            return Ok(Vec::new());
        }
        if sentences.len() == 1 {
            return Ok(vec![Chunk {
                text: sentences.into_iter().next().unwrap(),
            }]);
        }

        let embeddings = embedder.embed_batch(&sentences).await?;
        if embeddings.len() != sentences.len() {
            return Err(RagError::backend_msg(format!(
                "embedding count mismatch: {} sentences, {} vectors",
                sentences.len(),
                embeddings.len()
            )));
        }

        // First pass: grow a chunk sentence by sentence.
        let mut groups: Vec<SentenceGroup> = Vec::new();
        let mut current = SentenceGroup::new(&sentences[0], &embeddings[0]);

        for (sentence, embedding) in sentences[1..].iter().zip(&embeddings[1..]) {
            let pairwise = cosine_similarity(current.last_embedding(), embedding);
            let to_chunk = cosine_similarity(&current.centroid(), embedding);

            let merge = (pairwise > self.initial_threshold
                || to_chunk > self.appending_threshold)
                && current.fits(sentence, self.max_chunk_size);

            if merge {
                current.push(sentence, embedding);
            } else {
                groups.push(current);
                current = SentenceGroup::new(sentence, embedding);
            }
        }
        groups.push(current);

        // Second pass: merge adjacent chunks that still belong together.
        let mut merged: Vec<SentenceGroup> = Vec::new();
        for group in groups {
            match merged.last_mut() {
                Some(prev)
                    if cosine_similarity(&prev.centroid(), &group.centroid())
                        > self.merging_threshold
                        && prev.fits(&group.text, self.max_chunk_size) =>
                {
                    prev.absorb(group);
                }
                _ => merged.push(group),
            }
        }

        Ok(merged
            .into_iter()
            .map(|g| Chunk { text: g.text })
            .collect())
    }
}

/// Chunk every document in order; one document's chunks are never
/// interleaved with another's.
pub async fn chunk_corpus(
    documents: &[Document],
    splitter: &SemanticSplitter,
    embedder: &dyn Embedder,
) -> Result<Vec<Chunk>> {
    if documents.is_empty() {
        return Err(RagError::EmptyInput(
            "no documents to chunk".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(splitter.split(&document.text, embedder).await?);
    }
    Ok(chunks)
}

/// A chunk under construction: its text, accumulated embeddings, and a
/// char count so size checks stay O(1).
struct SentenceGroup {
    text: String,
    char_len: usize,
    embeddings: Vec<Vec<f32>>,
}

impl SentenceGroup {
    fn new(sentence: &str, embedding: &[f32]) -> Self {
        Self {
            text: sentence.to_string(),
            char_len: sentence.chars().count(),
            embeddings: vec![embedding.to_vec()],
        }
    }

    fn last_embedding(&self) -> &[f32] {
        self.embeddings.last().map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Mean of the member sentence embeddings.
    fn centroid(&self) -> Vec<f32> {
        let dims = self.embeddings.first().map(|v| v.len()).unwrap_or(0);
        let mut mean = vec![0.0f32; dims];
        for embedding in &self.embeddings {
            for (m, v) in mean.iter_mut().zip(embedding) {
                *m += v;
            }
        }
        let n = self.embeddings.len() as f32;
        for m in &mut mean {
            *m /= n;
        }
        mean
    }

    fn fits(&self, addition: &str, max_chunk_size: usize) -> bool {
        // +1 for the joining space
        self.char_len + 1 + addition.chars().count() <= max_chunk_size
    }

    fn push(&mut self, sentence: &str, embedding: &[f32]) {
        self.text.push(' ');
        self.text.push_str(sentence);
        self.char_len += 1 + sentence.chars().count();
        self.embeddings.push(embedding.to_vec());
    }

    fn absorb(&mut self, other: SentenceGroup) {
        self.text.push(' ');
        self.text.push_str(&other.text);
        self.char_len += 1 + other.char_len;
        self.embeddings.extend(other.embeddings);
    }
}

/// Split text into sentences on terminator-plus-whitespace and paragraph
/// boundaries. Good enough for prose corpora; no abbreviation handling.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let boundary = match c {
            '.' | '!' | '?' => chars.peek().map_or(true, |n| n.is_whitespace()),
            '\n' => chars.peek() == Some(&'\n'),
            _ => false,
        };
        if boundary {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }

    sentences
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}
