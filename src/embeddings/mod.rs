//! Dense sentence embeddings, L2-normalized for cosine-equivalent search


pub mod ollama;

use tracing::{debug, warn};

use crate::{RagError, Result};

pub use ollama::OllamaEmbedder;

pub const DEFAULT_BATCH_SIZE: usize = 32;
/// Tolerance on the unit-norm invariant
pub const NORM_EPSILON: f32 = 1e-4;

/// A model mapping strings to fixed-dimension vectors.
///
/// Implementors provide the raw model call through [`Embedder::encode`]; callers
/// use [`Embedder::embed`], which batches, checks the model's output and
/// normalizes every vector to unit length.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    #[inline]
    fn batch_size(&self) -> usize {
        DEFAULT_BATCH_SIZE
    }

    /// Raw vectors for one batch, in input order
    fn encode(&self, batch: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let dimension = self.dimension();
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size().max(1)) {
            debug!("Embedding batch of {} texts", batch.len());
            let raw = self.encode(batch)?;

            if raw.len() != batch.len() {
                return Err(RagError::Embedding(format!(
                    "model returned {} vectors for {} inputs",
                    raw.len(),
                    batch.len()
                )));
            }

            for mut vector in raw {
                if vector.len() != dimension {
                    return Err(RagError::Embedding(format!(
                        "expected dimension {dimension}, got {}",
                        vector.len()
                    )));
                }
                if !normalize_l2(&mut vector) {
                    warn!("Embedding has zero or non-finite norm, leaving it unnormalized");
                }
                vectors.push(vector);
            }
        }

        Ok(vectors)
    }

    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .pop()
            .ok_or_else(|| RagError::Embedding("model returned no vector".to_string()))
    }
}

#[inline]
pub fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `vector` to unit length in place. Returns false when the norm is zero
/// or not finite, in which case the vector is left untouched.
#[inline]
pub fn normalize_l2(vector: &mut [f32]) -> bool {
    let norm = l2_norm(vector);
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for x in vector.iter_mut() {
        *x /= norm;
    }
    true
}
