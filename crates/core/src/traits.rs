use crate::error::QaError;
use crate::models::ScoredChunk;

/// Nearest-neighbour lookup over embedded chunks.
pub trait VectorIndex: Send + Sync {
    fn dimensions(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Best `top_k` chunks, most similar first.
    fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, QaError>;
}
