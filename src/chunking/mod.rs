#[cfg(test)]
mod tests;

mod recursive;
pub mod sentences;

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

use crate::normalize::clean_text;
use crate::preprocess::tokenize;
use crate::{RagError, Result};

pub use recursive::RecursiveSplitter;
pub use sentences::split_sentences;

/// Free-form source metadata attached to a chunk (file name, section, ...)
pub type Metadata = BTreeMap<String, String>;

/// Metadata key naming the strategy that produced a chunk
pub const STRATEGY_KEY: &str = "strategy";
/// Metadata key holding the section header a chunk was filed under
pub const SECTION_KEY: &str = "section";
/// Metadata key holding the position of the source document in a batch
pub const DOCUMENT_KEY: &str = "document";

/// A bounded span of source text, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk in its backing store
    pub id: usize,
    /// Text as it was cut from the source
    pub raw_text: String,
    /// Preprocessed form used for embedding and lexical matching
    pub processed_text: String,
    pub source_metadata: Metadata,
}

/// How a document is cut into chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Windows of `max_words` whitespace-separated words, no overlap
    FixedWords { max_words: usize },
    /// Whole sentences, merged while the chunk stays within `max_length` characters
    Sentences { max_length: usize },
    /// Sentences packed up to a token budget, each chunk seeded with the
    /// trailing `overlap` tokens of the previous chunk's last sentence
    Hybrid {
        max_tokens_per_chunk: usize,
        overlap: usize,
    },
    /// Spans between occurrences of known section headers
    Sections { headers: Vec<String> },
    /// Character-budget splitting on paragraph, line, word and character boundaries
    Recursive {
        chunk_size: usize,
        chunk_overlap: usize,
    },
}

impl Default for ChunkStrategy {
    #[inline]
    fn default() -> Self {
        Self::Recursive {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkStrategy {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::FixedWords { .. } => "fixed_words",
            Self::Sentences { .. } => "sentences",
            Self::Hybrid { .. } => "hybrid",
            Self::Sections { .. } => "sections",
            Self::Recursive { .. } => "recursive",
        }
    }

    /// Reject size parameters that cannot produce chunks
    #[inline]
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::FixedWords { max_words: 0 } => Err(RagError::Configuration(
                "max_words must be greater than 0".to_string(),
            )),
            Self::Sentences { max_length: 0 } => Err(RagError::Configuration(
                "max_length must be greater than 0".to_string(),
            )),
            Self::Hybrid {
                max_tokens_per_chunk: 0,
                ..
            } => Err(RagError::Configuration(
                "max_tokens_per_chunk must be greater than 0".to_string(),
            )),
            Self::Sections { headers } if headers.iter().all(|h| h.trim().is_empty()) => {
                Err(RagError::Configuration(
                    "section header vocabulary cannot be empty".to_string(),
                ))
            }
            Self::Recursive { chunk_size: 0, .. } => Err(RagError::Configuration(
                "chunk_size must be greater than 0".to_string(),
            )),
            Self::Recursive {
                chunk_size,
                chunk_overlap,
            } if chunk_overlap >= chunk_size => Err(RagError::Configuration(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            ))),
            _ => Ok(()),
        }
    }
}

/// Cut one document into chunks with ids starting at 0
#[inline]
pub fn chunk(text: &str, strategy: &ChunkStrategy) -> Result<Vec<Chunk>> {
    strategy.validate()?;

    let pieces: Vec<(String, Metadata)> = match strategy {
        ChunkStrategy::FixedWords { max_words } => split_fixed_words(text, *max_words)
            .into_iter()
            .map(|piece| (piece, Metadata::new()))
            .collect(),
        ChunkStrategy::Sentences { max_length } => split_by_sentences(text, *max_length)
            .into_iter()
            .map(|piece| (piece, Metadata::new()))
            .collect(),
        ChunkStrategy::Hybrid {
            max_tokens_per_chunk,
            overlap,
        } => split_hybrid(text, *max_tokens_per_chunk, *overlap)
            .into_iter()
            .map(|piece| (piece, Metadata::new()))
            .collect(),
        ChunkStrategy::Sections { headers } => split_sections(text, headers)
            .into_iter()
            .map(|(header, body)| {
                let mut metadata = Metadata::new();
                metadata.insert(SECTION_KEY.to_string(), header);
                (body, metadata)
            })
            .collect(),
        ChunkStrategy::Recursive {
            chunk_size,
            chunk_overlap,
        } => RecursiveSplitter::new(*chunk_size, *chunk_overlap)
            .split(text)
            .into_iter()
            .map(|piece| (piece, Metadata::new()))
            .collect(),
    };

    let chunks: Vec<Chunk> = pieces
        .into_iter()
        .filter(|(piece, _)| !piece.trim().is_empty())
        .enumerate()
        .map(|(id, (raw_text, mut source_metadata))| {
            source_metadata.insert(STRATEGY_KEY.to_string(), strategy.name().to_string());
            Chunk {
                id,
                raw_text,
                processed_text: String::new(),
                source_metadata,
            }
        })
        .collect();

    debug!(
        "Chunked {} characters into {} chunks using {} strategy",
        text.len(),
        chunks.len(),
        strategy.name()
    );

    Ok(chunks)
}

/// Chunk every document in order, numbering chunks across the whole batch
#[inline]
pub fn chunk_documents<S: AsRef<str>>(
    documents: &[S],
    strategy: &ChunkStrategy,
) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();

    for (document_index, document) in documents.iter().enumerate() {
        for mut piece in chunk(document.as_ref(), strategy)? {
            piece.id = chunks.len();
            piece
                .source_metadata
                .insert(DOCUMENT_KEY.to_string(), document_index.to_string());
            chunks.push(piece);
        }
    }

    Ok(chunks)
}

/// Number of word and punctuation tokens in `text`
#[inline]
pub fn count_tokens(text: &str) -> usize {
    tokenize(text).len()
}

fn split_fixed_words(text: &str, max_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words.chunks(max_words).map(|window| window.join(" ")).collect()
}

fn split_by_sentences(text: &str, max_length: usize) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let joined_length = if current.is_empty() {
            sentence.chars().count()
        } else {
            current.chars().count() + 1 + sentence.chars().count()
        };

        if joined_length > max_length && !current.is_empty() {
            splits.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
    }

    if !current.is_empty() {
        splits.push(current);
    }

    splits
}

fn split_hybrid(text: &str, max_tokens_per_chunk: usize, overlap: usize) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_tokens = 0;

    for sentence in split_sentences(text) {
        let sentence_tokens = count_tokens(&sentence);

        if current.is_empty() || current_tokens + sentence_tokens <= max_tokens_per_chunk {
            current_tokens += sentence_tokens;
            current.push(sentence);
            continue;
        }

        let seed = current
            .last()
            .map(|last| trailing_words(last, overlap))
            .unwrap_or_default();
        splits.push(current.join(" "));

        current = Vec::with_capacity(2);
        current_tokens = sentence_tokens;
        if !seed.is_empty() {
            current_tokens += seed.split_whitespace().count();
            current.push(seed);
        }
        current.push(sentence);
    }

    if !current.is_empty() {
        splits.push(current.join(" "));
    }

    splits
}

/// Last `count` whitespace-separated words of `text`, or all of them when there are fewer
fn trailing_words(text: &str, count: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let start = words.len().saturating_sub(count);
    words.get(start..).unwrap_or_default().join(" ")
}

/// Split on exact, case-sensitive header occurrences.
///
/// Text before the first header is discarded. Longer headers win when several
/// start at the same position, so "Technical Skills" is not read as "Skills".
fn split_sections(text: &str, headers: &[String]) -> Vec<(String, String)> {
    let mut vocabulary: Vec<&str> = headers
        .iter()
        .map(String::as_str)
        .filter(|header| !header.trim().is_empty())
        .collect();
    vocabulary.sort_by_key(|header| Reverse(header.len()));

    let mut sections = Vec::new();
    let mut open: Option<(&str, usize)> = None;
    let mut position = 0;

    while let Some(rest) = text.get(position..) {
        let Some(next_char) = rest.chars().next() else {
            break;
        };

        if let Some(header) = vocabulary
            .iter()
            .copied()
            .find(|header| rest.starts_with(header))
        {
            if let Some((current, start)) = open {
                push_section(&mut sections, current, text.get(start..position));
            }
            open = Some((header, position + header.len()));
            position += header.len();
        } else {
            position += next_char.len_utf8();
        }
    }

    if let Some((current, start)) = open {
        push_section(&mut sections, current, text.get(start..));
    }

    sections
}

fn push_section(sections: &mut Vec<(String, String)>, header: &str, body: Option<&str>) {
    let body = clean_text(body.unwrap_or_default());
    if !body.is_empty() {
        sections.push((header.to_string(), body));
    }
}
