use crate::embeddings::Embedder;
use crate::error::QaError;
use crate::models::{Chunk, ScoredChunk};
use crate::traits::VectorIndex;
use tracing::info;

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: Chunk,
    vector: Vec<f32>,
    norm: f32,
}

/// Exact cosine-similarity index held entirely in memory.
///
/// Ties keep insertion order, i.e. chunk order.
#[derive(Debug, Clone)]
pub struct InMemoryIndex {
    entries: Vec<IndexedChunk>,
    dimensions: usize,
}

impl InMemoryIndex {
    /// Embeds every chunk and builds the index. Nothing is returned unless
    /// every chunk was embedded.
    pub async fn build<E>(chunks: Vec<Chunk>, embedder: &E) -> Result<Self, QaError>
    where
        E: Embedder + ?Sized,
    {
        info!(chunk_count = chunks.len(), "creating embeddings for vector index");
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = embedder.embed_documents(&texts).await?;
        let index = Self::from_embeddings(chunks, embeddings, embedder.dimensions())?;
        info!(entries = index.len(), "vector index created");
        Ok(index)
    }

    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
        dimensions: usize,
    ) -> Result<Self, QaError> {
        if chunks.is_empty() {
            return Err(QaError::IndexBuild("no chunks to index".to_string()));
        }

        if chunks.len() != embeddings.len() {
            return Err(QaError::IndexBuild(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, vector)| {
                if vector.len() != dimensions {
                    return Err(QaError::IndexBuild(format!(
                        "embedding dimension {} != {} for chunk {}",
                        vector.len(),
                        dimensions,
                        chunk.chunk_index
                    )));
                }
                let norm = l2_norm(&vector);
                Ok(IndexedChunk {
                    chunk,
                    vector,
                    norm,
                })
            })
            .collect::<Result<Vec<_>, QaError>>()?;

        Ok(Self {
            entries,
            dimensions,
        })
    }
}

impl VectorIndex for InMemoryIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn search(&self, query_vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>, QaError> {
        if query_vector.len() != self.dimensions {
            return Err(QaError::Embedding(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let query_norm = l2_norm(query_vector);
        let mut scored: Vec<(f32, &IndexedChunk)> = self
            .entries
            .iter()
            .map(|entry| (cosine(query_vector, query_norm, &entry.vector, entry.norm), entry))
            .collect();

        scored.sort_by(|left, right| right.0.total_cmp(&left.0));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, entry)| ScoredChunk {
                chunk: entry.chunk.clone(),
                score,
            })
            .collect())
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|value| value * value).sum::<f32>().sqrt()
}

fn cosine(left: &[f32], left_norm: f32, right: &[f32], right_norm: f32) -> f32 {
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    dot / (left_norm * right_norm)
}
