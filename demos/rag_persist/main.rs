//! # RAG Persistence Example
//!
//! Loads a directory of text files, builds an index, saves it to disk, then
//! answers questions from a second pipeline that only loads the saved index.
//!
//! Run: `cargo run -p docrag-demos --example rag_persist`

#[path = "../shared/mock.rs"]
mod mock;

use std::sync::Arc;

use docrag::{
    DirectoryLoader, FixedSizeChunker, RagConfig, RagPipeline, SimilarityMetric, VectorIndex,
};
use mock::{ExtractiveAnswerer, HashEmbeddingProvider};
use tracing_subscriber::EnvFilter;

const HANDBOOK: &[(&str, &str)] = &[
    (
        "leave/vacation.md",
        "Employees receive twenty five vacation days per year. Unused vacation days \
         carry over until the end of March.",
    ),
    (
        "leave/sick.txt",
        "Sick leave does not require a doctor's note for the first three days. \
         Longer absences need a certificate.",
    ),
    (
        "office.txt",
        "The office opens at eight and closes at six. Visitors must sign in at reception.",
    ),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // -- 1. Write a small corpus to a temporary directory -----------------
    let workdir = tempfile::tempdir()?;
    let corpus = workdir.path().join("handbook");
    for (path, text) in HANDBOOK {
        let path = corpus.join(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, text)?;
    }

    // -- 2. Build and save the index --------------------------------------
    let config = RagConfig::builder()
        .top_k(2)
        .embed_batch_size(4)
        .embed_concurrency(2)
        .metric(SimilarityMetric::Cosine)
        .build()?;
    let embedder = Arc::new(HashEmbeddingProvider::new(256));

    let builder = RagPipeline::builder()
        .config(config.clone())
        .embedding_provider(embedder.clone())
        .answerer(Arc::new(ExtractiveAnswerer))
        .chunker(Arc::new(FixedSizeChunker::new(120, 20)?))
        .build()?;

    let index = builder.ingest_source(&DirectoryLoader::new(&corpus)).await?;
    let index_path = workdir.path().join("handbook.idx");
    index.save(&index_path)?;
    println!("Saved {} chunks to {}", index.len(), index_path.display());

    // -- 3. Answer from the saved index -----------------------------------
    // The embedder must match the one used at build time.
    let reader = RagPipeline::builder()
        .config(config)
        .embedding_provider(embedder)
        .answerer(Arc::new(ExtractiveAnswerer))
        .build()?;
    reader.install_index(Arc::new(VectorIndex::load(&index_path)?)).await;

    for query in ["How many vacation days do I get?", "When does the office open?"] {
        let answer = reader.ask(query).await?;
        println!("\nQ: {query}");
        println!("A: {}", answer.text);
        println!("  sources: {}", answer.source_documents().join(", "));
    }

    Ok(())
}
