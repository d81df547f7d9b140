use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::{Embedder, OllamaEmbedder};
use crate::index::check_consistency;
use crate::llm::{AnswerGenerator, ChatClient, LlmQueryExpander};
use crate::ranking::SearchResult;
use crate::retrieval::{
    Document, OpenMode, QueryExpander, RetrievalOptions, Retriever, SOURCE_KEY,
};

/// Open the embedding model and the persisted index described by `config`
#[inline]
pub fn open_retriever(
    config: &Config,
    mode: OpenMode,
    expand: bool,
) -> Result<Retriever<OllamaEmbedder>> {
    let embedder = OllamaEmbedder::open(&config.ollama).context("Failed to open embedding model")?;

    let mut options = RetrievalOptions::from_config(config);
    options.expand_queries |= expand;

    let expander: Option<Box<dyn QueryExpander>> = if options.expand_queries {
        let client = ChatClient::new(&config.llm).context("Failed to configure LLM client")?;
        Some(Box::new(LlmQueryExpander::new(
            client,
            config.llm.expansion_count,
        )))
    } else {
        None
    };

    Retriever::open(options, embedder, expander, mode).context("Failed to open index")
}

/// Chunk, embed and index the given files, then persist the index
#[inline]
pub async fn ingest_files(config: Config, files: Vec<PathBuf>, source: Option<String>) -> Result<()> {
    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        let text = fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let source = source
            .clone()
            .unwrap_or_else(|| file.display().to_string());
        documents.push(Document::new(text).with_source(source));
    }

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(documents.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}")
                .expect("style template is valid"),
        )
    } else {
        ProgressBar::hidden()
    };

    let progress = bar.clone();
    let (chunk_count, total) = tokio::task::spawn_blocking(move || -> Result<(usize, usize)> {
        let retriever = open_retriever(&config, OpenMode::CreateIfMissing, false)?;

        if let Some(name) = documents
            .first()
            .and_then(|first| first.metadata.get(SOURCE_KEY))
        {
            progress.set_message(name.clone());
        }
        let chunks = retriever
            .ingest_with_progress(&documents, |position| {
                if let Some(name) = documents
                    .get(position + 1)
                    .and_then(|next| next.metadata.get(SOURCE_KEY))
                {
                    progress.set_message(name.clone());
                }
                progress.inc(1);
            })
            .context("Failed to ingest documents")?;

        let total = retriever.len();
        retriever.close().context("Failed to save index")?;
        Ok((chunks.len(), total))
    })
    .await
    .context("Ingestion task panicked")??;

    bar.finish_and_clear();
    info!("Ingested {} chunks from {} files", chunk_count, files.len());
    println!(
        "✅ Ingested {} chunks from {} files ({} chunks indexed)",
        chunk_count,
        files.len(),
        total
    );

    Ok(())
}

/// Print the ranked chunks for `query`
#[inline]
pub async fn search(config: Config, query: String, top_k: Option<usize>, expand: bool) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let timeout = Duration::from_secs(config.retrieval.timeout_seconds);

    let results = with_timeout(timeout, move || -> Result<Vec<SearchResult>> {
        let retriever = open_retriever(&config, OpenMode::RequireExisting, expand)?;
        Ok(retriever.search(&query, top_k)?)
    })
    .await?;

    if results.is_empty() {
        println!("📭 No chunks matched the query");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. [chunk {}] score {:.4} (similarity {:.4}, overlap {:.4})",
            rank + 1,
            result.chunk_id,
            result.combined_score,
            result.raw_similarity,
            result.lexical_overlap
        );
        println!("   {}", result.text.trim());
        println!();
    }

    Ok(())
}

/// Retrieve context for `query` and print the language model's grounded answer
#[inline]
pub async fn ask(config: Config, query: String, top_k: Option<usize>, expand: bool) -> Result<()> {
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let timeout = Duration::from_secs(config.retrieval.timeout_seconds);
    let llm_config = config.llm.clone();

    let (query, chunks) = with_timeout(timeout, move || {
        let retriever = open_retriever(&config, OpenMode::RequireExisting, expand)?;
        let chunks = retriever.retrieve(&query, top_k)?;
        Ok((query, chunks))
    })
    .await?;

    if chunks.is_empty() {
        warn!("No chunks retrieved, answering without context");
    }

    let sources: Vec<usize> = chunks.iter().map(|chunk| chunk.id).collect();
    let answer = tokio::task::spawn_blocking(move || -> Result<String> {
        let client = ChatClient::new(&llm_config).context("Failed to configure LLM client")?;
        Ok(AnswerGenerator::new(client).answer(&query, &chunks)?)
    })
    .await
    .context("Answer task panicked")??;

    println!("{}", answer.trim());
    if !sources.is_empty() {
        println!();
        println!("📚 Sources: chunks {:?}", sources);
    }

    Ok(())
}

/// Report the embedding backend and the health of the persisted index
#[inline]
pub fn show_status(config: &Config) -> Result<()> {
    println!("📊 RAG Core Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    match OllamaEmbedder::new(&config.ollama) {
        Ok(embedder) => match embedder.health_check() {
            Ok(()) => {
                println!(
                    "   ✅ Ollama: Connected ({}:{})",
                    config.ollama.host, config.ollama.port
                );
                println!("   📋 Model: {}", embedder.model());
                println!("   🔢 Dimension: {}", embedder.dimension());
                println!("   📦 Batch Size: {}", embedder.batch_size());
            }
            Err(e) => {
                println!("   ⚠️  Ollama: Unhealthy - {:#}", e);
            }
        },
        Err(e) => {
            println!("   ❌ Ollama: Invalid configuration - {}", e);
        }
    }

    println!();
    println!("🔍 Index Consistency:");
    let index_dir = config.index_dir();
    println!("   📁 Location: {}", index_dir.display());
    println!("   🏷️  Prefix: {}", config.index.prefix);
    match check_consistency(&index_dir, &config.index.prefix) {
        Ok(report) => {
            let describe = |count: Option<usize>| {
                count.map_or_else(|| "missing".to_string(), |n| n.to_string())
            };
            println!("   📊 Index vectors: {}", describe(report.index_vectors));
            println!(
                "   📊 Side-table documents: {}",
                describe(report.side_table_documents)
            );
            println!("   📊 Sidecar lines: {}", describe(report.sidecar_lines));
            if let Some(dimension) = report.dimension {
                println!("   🔢 Dimension: {}", dimension);
            }
            if let Some(metric) = report.metric {
                println!("   📐 Metric: {}", metric);
            }
            if report.is_consistent {
                println!("   ✅ Index artifacts are consistent");
            } else {
                println!("   ⚠️  Consistency issues found:");
                for issue in &report.issues {
                    println!("      • {}", issue);
                }
            }
        }
        Err(e) => {
            println!("   ❌ Failed to check consistency: {}", e);
        }
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Use 'rag-core ingest <files>' to add documents");
    println!("   • Use 'rag-core search <query>' to inspect ranked chunks");
    println!("   • Use 'rag-core ask <query>' for a grounded answer");

    Ok(())
}

/// Run blocking retrieval work on the blocking pool, giving up after `timeout`
async fn with_timeout<T, F>(timeout: Duration, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::time::timeout(timeout, tokio::task::spawn_blocking(work))
        .await
        .with_context(|| format!("Retrieval timed out after {}s", timeout.as_secs()))?
        .context("Retrieval task panicked")?
}
