//! Document chunking strategies.
//!
//! Two implementations of the [`Chunker`] trait:
//!
//! - [`WindowChunker`] — fixed-size character windows with overlap
//! - [`RecursiveChunker`] — prefers paragraph, then sentence, then word
//!   boundaries, falling back to raw character windows
//!
//! Both are exhaustive (every character of the source lands in at least one
//! chunk) and never produce a chunk longer than `chunk_size` characters.
//! All sizes are measured in characters, not bytes, so multibyte text is
//! split safely.

use std::collections::HashMap;

use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
///
/// Produced chunks inherit the parent document's metadata plus a
/// `chunk_index` field; an empty document produces zero chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text into consecutive character windows of at most `chunk_size`,
/// repeating `chunk_overlap` characters between consecutive windows.
#[derive(Debug, Clone)]
pub struct WindowChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl WindowChunker {
    /// Create a new `WindowChunker`. `chunk_overlap` must be less than
    /// `chunk_size` (enforced by [`RagConfig`](crate::RagConfig) when built
    /// from config).
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for WindowChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        window_split(&document.text, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(i, text)| make_chunk(document, i, text))
            .collect()
    }
}

/// Splits text hierarchically: paragraphs, then sentences, then words, then
/// raw character windows.
///
/// Separators stay attached to the preceding segment, so concatenating the
/// produced chunks (overlap aside) reconstructs the source text. Overlap is
/// applied only at the raw character-window fallback; semantic splits rely
/// on their natural boundaries instead.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the given size and overlap.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let separators = ["\n\n", ". ", "! ", "? ", " "];
        split_and_merge(&document.text, self.chunk_size, self.chunk_overlap, &separators)
            .into_iter()
            .enumerate()
            .map(|(i, text)| make_chunk(document, i, text))
            .collect()
    }
}

fn make_chunk(document: &Document, index: usize, text: String) -> Chunk {
    let mut metadata: HashMap<String, String> = document.metadata.clone();
    metadata.insert("chunk_index".to_string(), index.to_string());
    Chunk {
        id: format!("{}_{index}", document.id),
        text,
        metadata,
        document_id: document.id.clone(),
    }
}

/// Split text at a separator, keeping the separator attached to the
/// preceding segment so no characters are lost.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut segments = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        segments.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        segments.push(&text[start..]);
    }

    segments
}

/// Split text by the first separator that applies, merging segments back
/// together while they fit in `chunk_size`. Oversized segments recurse to
/// the next separator level; the final fallback is [`window_split`].
fn split_and_merge(
    text: &str,
    chunk_size: usize,
    chunk_overlap: usize,
    separators: &[&str],
) -> Vec<String> {
    let char_len = |s: &str| s.chars().count();

    if char_len(text) <= chunk_size || separators.is_empty() {
        return window_split(text, chunk_size, chunk_overlap);
    }

    let segments = split_keeping_separator(text, separators[0]);
    let remaining = &separators[1..];

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    let flush = |piece: String, chunks: &mut Vec<String>| {
        if char_len(&piece) > chunk_size {
            chunks.extend(split_and_merge(&piece, chunk_size, chunk_overlap, remaining));
        } else {
            chunks.push(piece);
        }
    };

    for segment in segments {
        if current.is_empty() {
            current = segment.to_string();
        } else if char_len(&current) + char_len(segment) <= chunk_size {
            current.push_str(segment);
        } else {
            flush(std::mem::take(&mut current), &mut chunks);
            current = segment.to_string();
        }
    }
    if !current.is_empty() {
        flush(current, &mut chunks);
    }

    chunks
}

/// Raw character windows of at most `chunk_size` characters, stepping
/// `chunk_size - chunk_overlap` characters between window starts.
fn window_split(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(chunk_overlap).max(1);

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    windows
}
