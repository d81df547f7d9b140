//! Query-time pipeline and ingestion over a shared, snapshot-swapped index.
//!
//! A [`Retriever`] owns the embedder and the loaded index. Searches read an
//! `Arc` snapshot of the index, one per call, and never wait on embedding.
//! Ingestion embeds under a writer lock and appends the new chunks in one
//! step once all of them are embedded; the index is copied only when a reader
//! still holds the previous snapshot.


use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::chunking::{self, Chunk, ChunkStrategy, DOCUMENT_KEY, Metadata};
use crate::config::Config;
use crate::embeddings::Embedder;
use crate::index::{Metric, VectorIndex};
use crate::normalize::clean_text;
use crate::preprocess::Preprocessor;
use crate::ranking::{self, Candidate, SearchResult};
use crate::{RagError, Result};

/// Metadata key naming the source a chunk was ingested from
pub const SOURCE_KEY: &str = "source";
/// Metadata key holding the RFC 3339 ingestion timestamp
pub const INGESTED_AT_KEY: &str = "ingested_at";

/// Produces alternative phrasings of a query
pub trait QueryExpander: Send + Sync {
    fn expand(&self, query: &str) -> Result<Vec<String>>;
}

/// A document handed to [`Retriever::ingest`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}

impl Document {
    #[inline]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    #[inline]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.metadata.insert(SOURCE_KEY.to_string(), source.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    /// Directory holding the persisted index artifacts
    pub directory: PathBuf,
    pub prefix: String,
    /// Metric for a freshly created index; a loaded index keeps its own
    pub metric: Metric,
    pub chunking: ChunkStrategy,
    pub threshold: f32,
    pub lexical_fusion: bool,
    pub expand_queries: bool,
}

impl RetrievalOptions {
    #[inline]
    pub fn new(directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        let defaults = Config::default();
        Self {
            directory: directory.into(),
            prefix: prefix.into(),
            metric: defaults.index.metric,
            chunking: defaults.chunking,
            threshold: defaults.retrieval.threshold,
            lexical_fusion: defaults.retrieval.lexical_fusion,
            expand_queries: defaults.retrieval.expand_queries,
        }
    }

    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            directory: config.index_dir(),
            prefix: config.index.prefix.clone(),
            metric: config.index.metric,
            chunking: config.chunking.clone(),
            threshold: config.retrieval.threshold,
            lexical_fusion: config.retrieval.lexical_fusion,
            expand_queries: config.retrieval.expand_queries,
        }
    }
}

/// What [`Retriever::open`] does when no index has been persisted yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    RequireExisting,
    CreateIfMissing,
}

#[derive(Debug, Default)]
struct WriterState {
    /// Chunks added since the last save
    unsaved: usize,
}

pub struct Retriever<E: Embedder> {
    options: RetrievalOptions,
    embedder: E,
    expander: Option<Box<dyn QueryExpander>>,
    preprocessor: Preprocessor,
    snapshot: RwLock<Arc<VectorIndex>>,
    writer: Mutex<WriterState>,
}

impl<E: Embedder> std::fmt::Debug for Retriever<E> {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("options", &self.options)
            .field("dimension", &self.embedder.dimension())
            .field("expander", &self.expander.is_some())
            .finish_non_exhaustive()
    }
}

impl<E: Embedder> Retriever<E> {
    /// Load the persisted index, or start an empty one when `mode` allows it
    #[inline]
    pub fn open(
        options: RetrievalOptions,
        embedder: E,
        expander: Option<Box<dyn QueryExpander>>,
        mode: OpenMode,
    ) -> Result<Self> {
        let index = match VectorIndex::load(&options.directory, &options.prefix) {
            Ok(index) => index,
            Err(RagError::NotFound { path }) if mode == OpenMode::CreateIfMissing => {
                info!(
                    "No index at {}, starting an empty {} index",
                    path.display(),
                    options.metric
                );
                VectorIndex::new(embedder.dimension(), options.metric)
            }
            Err(e) => return Err(e),
        };

        if index.dimension() != embedder.dimension() {
            return Err(RagError::Configuration(format!(
                "index holds {}-dimensional vectors but the embedder produces {}",
                index.dimension(),
                embedder.dimension()
            )));
        }
        if index.metric() != options.metric {
            warn!(
                "Persisted index uses {} while {} is configured, keeping {}",
                index.metric(),
                options.metric,
                index.metric()
            );
        }

        info!("Retriever ready with {} chunks", index.len());

        Ok(Self {
            options,
            embedder,
            expander,
            preprocessor: Preprocessor::default(),
            snapshot: RwLock::new(Arc::new(index)),
            writer: Mutex::new(WriterState::default()),
        })
    }

    #[inline]
    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    #[inline]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Toggle query expansion for subsequent searches
    #[inline]
    pub fn set_expand_queries(&mut self, enabled: bool) {
        self.options.expand_queries = enabled;
    }

    /// The index as of now. Later ingestions do not affect the returned snapshot.
    #[inline]
    pub fn snapshot(&self) -> Arc<VectorIndex> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Ranked results for `query`, expanded into alternative phrasings when enabled
    #[inline]
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        self.search_in(&self.snapshot(), query, top_k)
    }

    /// The `top_k` best chunks for `query`
    #[inline]
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>> {
        let index = self.snapshot();
        let results = self.search_in(&index, query, top_k)?;

        Ok(results
            .into_iter()
            .map(|result| Chunk {
                id: result.chunk_id,
                processed_text: self.preprocessor.preprocess(&result.text),
                source_metadata: index
                    .metadata(result.chunk_id)
                    .cloned()
                    .unwrap_or_default(),
                raw_text: result.text,
            })
            .collect())
    }

    /// Clean, chunk, embed and append `documents`. Returns the new chunks with
    /// their final ids. The new chunks become visible to searches only once
    /// all of them are embedded.
    #[inline]
    pub fn ingest(&self, documents: &[Document]) -> Result<Vec<Chunk>> {
        self.ingest_with_progress(documents, |_| {})
    }

    /// Like [`Retriever::ingest`], calling `on_document` with each document's
    /// position once its chunks are embedded
    #[inline]
    pub fn ingest_with_progress<F>(
        &self,
        documents: &[Document],
        mut on_document: F,
    ) -> Result<Vec<Chunk>>
    where
        F: FnMut(usize),
    {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let start_id = self.len();
        let ingested_at = chrono::Utc::now().to_rfc3339();

        let mut chunks = Vec::new();
        let mut vectors = Vec::new();
        for (document_index, document) in documents.iter().enumerate() {
            let first_new = chunks.len();
            let cleaned = clean_text(&document.text);
            for mut piece in chunking::chunk(&cleaned, &self.options.chunking)? {
                piece.id = start_id + chunks.len();
                piece.processed_text = self.preprocessor.preprocess(&piece.raw_text);
                piece
                    .source_metadata
                    .insert(DOCUMENT_KEY.to_string(), document_index.to_string());
                piece
                    .source_metadata
                    .insert(INGESTED_AT_KEY.to_string(), ingested_at.clone());
                piece.source_metadata.extend(document.metadata.clone());
                chunks.push(piece);
            }

            let inputs: Vec<String> = chunks[first_new..].iter().map(embedding_input).collect();
            vectors.extend(self.embedder.embed(&inputs)?);
            on_document(document_index);
        }

        if chunks.is_empty() {
            debug!("Nothing to ingest from {} documents", documents.len());
            return Ok(chunks);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.raw_text.clone()).collect();
        let metadata: Vec<Metadata> = chunks.iter().map(|c| c.source_metadata.clone()).collect();

        {
            let mut current = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
            Arc::make_mut(&mut *current).add(&vectors, Some(&texts), Some(&metadata))?;
        }
        writer.unsaved += chunks.len();

        info!(
            "Ingested {} chunks from {} documents ({} unsaved)",
            chunks.len(),
            documents.len(),
            writer.unsaved
        );
        Ok(chunks)
    }

    /// Number of chunks ingested since the last save
    #[inline]
    pub fn unsaved(&self) -> usize {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .unsaved
    }

    /// Persist the current snapshot
    #[inline]
    pub fn save(&self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.snapshot()
            .save(&self.options.directory, &self.options.prefix)?;
        writer.unsaved = 0;
        Ok(())
    }

    /// Persist unsaved ingestions and release the retriever
    #[inline]
    pub fn close(self) -> Result<()> {
        if self.unsaved() > 0 {
            self.save()?;
        }
        debug!("Retriever closed");
        Ok(())
    }

    fn search_in(
        &self,
        index: &VectorIndex,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::EmptyQuery);
        }

        let variants = self.query_variants(query)?;
        debug!("Searching {} query variants", variants.len());

        let mut results = Vec::new();
        for variant in &variants {
            results.extend(self.search_variant(index, variant, top_k)?);
        }

        let mut results = if variants.len() > 1 {
            ranking::dedup_best(results)
        } else {
            results
        };
        ranking::sort_by_combined_score(&mut results);
        results.truncate(top_k);

        debug!("Query returned {} results", results.len());
        Ok(results)
    }

    fn query_variants(&self, query: &str) -> Result<Vec<String>> {
        let mut variants = vec![query.to_string()];

        if self.options.expand_queries {
            match &self.expander {
                Some(expander) => {
                    let mut seen: HashSet<String> = HashSet::from([query.to_lowercase()]);
                    for variant in expander.expand(query)? {
                        let variant = variant.trim();
                        if !variant.is_empty() && seen.insert(variant.to_lowercase()) {
                            variants.push(variant.to_string());
                        }
                    }
                }
                None => warn!("Query expansion requested but no expander is configured"),
            }
        }

        Ok(variants)
    }

    fn search_variant(
        &self,
        index: &VectorIndex,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let processed = self.preprocessor.preprocess(query);
        let embed_input = if processed.is_empty() {
            query
        } else {
            processed.as_str()
        };
        let vector = self.embedder.embed_one(embed_input)?;
        let neighbors = index.search(&vector, top_k)?;

        let metric = index.metric();
        if !self.options.lexical_fusion {
            return Ok(neighbors
                .into_iter()
                .map(|neighbor| {
                    let similarity = metric.similarity(neighbor.distance);
                    SearchResult {
                        chunk_id: neighbor.id,
                        raw_similarity: similarity,
                        lexical_overlap: 0.0,
                        combined_score: similarity,
                        text: neighbor.text.unwrap_or_default(),
                    }
                })
                .filter(|result| result.raw_similarity >= self.options.threshold)
                .collect());
        }

        let query_tokens = self.preprocessor.token_set(query);
        let candidates = neighbors
            .into_iter()
            .map(|neighbor| {
                let text = neighbor.text.unwrap_or_default();
                Candidate {
                    chunk_id: neighbor.id,
                    similarity: metric.similarity(neighbor.distance),
                    doc_tokens: self.preprocessor.token_set(&text),
                    text,
                }
            })
            .collect();

        Ok(ranking::rank(
            &query_tokens,
            candidates,
            self.options.threshold,
        ))
    }
}

/// Processed text, or the raw text when preprocessing leaves nothing
fn embedding_input(chunk: &Chunk) -> String {
    if chunk.processed_text.is_empty() {
        chunk.raw_text.trim().to_string()
    } else {
        chunk.processed_text.clone()
    }
}
