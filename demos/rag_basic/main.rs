//! # RAG Basic Example
//!
//! Demonstrates the core pipeline: ingest documents, retrieve, then answer.
//!
//! Uses a deterministic hash embedder and an extractive answerer so it runs
//! with **zero API keys**.
//!
//! Run: `cargo run -p docrag-demos --example rag_basic`

#[path = "../shared/mock.rs"]
mod mock;

use std::sync::Arc;

use docrag::{Document, RagConfig, RagPipeline};
use mock::{ExtractiveAnswerer, HashEmbeddingProvider};
use tracing_subscriber::EnvFilter;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // -- 1. Configure the pipeline ----------------------------------------
    // Small chunks keep the demo output readable; top_k=3 returns the three
    // most relevant passages.
    let config = RagConfig::builder().chunk_size(160).chunk_overlap(30).top_k(3).build()?;

    // -- 2. Build the pipeline --------------------------------------------
    // No chunker is set, so the boundary-aware default is used.
    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashEmbeddingProvider::new(128)))
        .answerer(Arc::new(ExtractiveAnswerer))
        .build()?;

    // -- 3. Ingest sample documents ---------------------------------------
    let documents = vec![
        Document::new(
            "rust",
            "Rust is a systems programming language focused on safety, speed, and concurrency. \
             It achieves memory safety without a garbage collector through its ownership \
             system.\n\n\
             Cargo is the Rust package manager. It downloads dependencies, compiles packages, \
             and runs tests.",
        )
        .with_metadata("topic", "rust")
        .with_source_uri("https://www.rust-lang.org"),
        Document::new(
            "python",
            "Python is a high-level, interpreted programming language known for its readability. \
             It is widely used in data science, web development, and automation.",
        )
        .with_metadata("topic", "python"),
        Document::new(
            "rag",
            "Retrieval-augmented generation combines a retrieval system with a language model. \
             Documents are chunked, embedded, and indexed. At query time the most relevant \
             chunks are retrieved and given to the model as context.",
        )
        .with_metadata("topic", "rag"),
    ];

    let index = pipeline.ingest(&documents).await?;
    println!("Ingested {} documents into {} chunks", documents.len(), index.len());
    for entry in index.entries() {
        println!("  {} [{}..{}]", entry.chunk.id, entry.chunk.start, entry.chunk.end);
    }

    // -- 4. Ask questions -------------------------------------------------
    let queries = [
        "How does Rust achieve memory safety?",
        "Which language is used for data science?",
        "What happens to chunks at query time?",
    ];

    for query in queries {
        let answer = pipeline.ask(query).await?;
        info!(query, hits = answer.retrieval.len(), "answered");

        println!("\nQ: {query}");
        println!("A: {}", answer.text);
        for (i, hit) in answer.retrieval.iter().enumerate() {
            let text = hit.entry.text();
            let preview: String = text.chars().take(60).collect();
            println!("  {}. [score={:.4}] {} | {preview}", i + 1, hit.score, hit.entry.chunk.id);
        }
        println!("  sources: {}", answer.source_documents().join(", "));
    }

    println!("\nDone.");
    Ok(())
}
