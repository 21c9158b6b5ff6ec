//! Offline collaborators shared by the demos, so they run with zero API keys.

use docrag::{Answerer, EmbeddingProvider, Result};

/// Deterministic bag-of-words embeddings: each lowercase word is hashed into
/// one of `dimensions` buckets, then the vector is L2-normalised.
///
/// Texts that share words point in similar directions, which is enough for
/// retrieval to behave sensibly in a demo.
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash"
    }
}

/// Answers with the first sentence of the best-ranked context passage.
pub struct ExtractiveAnswerer;

#[async_trait::async_trait]
impl Answerer for ExtractiveAnswerer {
    async fn generate(&self, _query: &str, context: &str) -> Result<String> {
        let best = context.split("\n\n").next().unwrap_or_default().trim();
        let sentence = match best.find(". ") {
            Some(end) => &best[..=end],
            None => best,
        };
        if sentence.is_empty() {
            return Ok("I don't know.".to_string());
        }
        Ok(sentence.to_string())
    }

    fn name(&self) -> &str {
        "extractive"
    }
}
