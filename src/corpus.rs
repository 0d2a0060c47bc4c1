//! The chunk store: an immutable collection of passages plus the cached
//! embedding vectors both retrievers are derived from.

use std::collections::HashMap;

use crate::{
    error::{Error, Result},
    passage::{Passage, PassageId},
};

/// The full indexed passage collection.
///
/// A corpus exclusively owns its passages and the per-passage embedding
/// vectors computed at build time. Retrievers borrow it read-only for the
/// duration of a query; the only way to change it is a full rebuild that
/// produces a new `Corpus`.
///
/// Invariants: every passage has a unique id, and embeddings align
/// one-to-one with passages in insertion order. Vectors are
/// unit-normalized at construction so dot product equals cosine
/// similarity everywhere downstream.
pub struct Corpus {
    passages: Vec<Passage>,
    by_id: HashMap<PassageId, usize>,
    embeddings: Vec<Vec<f32>>,
    dimension: usize,
    embedding_model: String,
}

impl Corpus {
    /// Build a corpus from passages and their raw embedding vectors.
    ///
    /// All-or-nothing: any violation (empty input, duplicate ids, count or
    /// dimension mismatch) fails without producing a partial corpus.
    pub fn build(
        passages: Vec<Passage>,
        embeddings: Vec<Vec<f32>>,
        embedding_model: impl Into<String>,
    ) -> Result<Self> {
        if passages.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if passages.len() != embeddings.len() {
            return Err(Error::InvalidArgument(format!(
                "{} passages but {} embedding vectors",
                passages.len(),
                embeddings.len()
            )));
        }

        let dimension = embeddings[0].len();
        if dimension == 0 {
            return Err(Error::InvalidArgument(
                "embedding vectors must be non-empty".into(),
            ));
        }
        for (i, vector) in embeddings.iter().enumerate() {
            if vector.len() != dimension {
                return Err(Error::InvalidArgument(format!(
                    "embedding for passage {} has dimension {} (expected {dimension})",
                    passages[i].id,
                    vector.len()
                )));
            }
        }

        let mut by_id = HashMap::with_capacity(passages.len());
        for (ordinal, passage) in passages.iter().enumerate() {
            if by_id.insert(passage.id, ordinal).is_some() {
                return Err(Error::InvalidArgument(format!(
                    "duplicate passage id {}",
                    passage.id
                )));
            }
        }

        let embeddings = embeddings.into_iter().map(normalize).collect();

        Ok(Self {
            passages,
            by_id,
            embeddings,
            dimension,
            embedding_model: embedding_model.into(),
        })
    }

    /// All passages in insertion order.
    pub fn all(&self) -> &[Passage] {
        &self.passages
    }

    /// Look up a passage by id.
    pub fn get(&self, id: PassageId) -> Result<&Passage> {
        self.by_id
            .get(&id)
            .map(|&ordinal| &self.passages[ordinal])
            .ok_or_else(|| Error::NotFound {
                kind: "passage",
                name: id.to_string(),
            })
    }

    /// Insertion ordinal of a passage, used for deterministic tie-breaks.
    pub fn ordinal(&self, id: PassageId) -> Option<usize> {
        self.by_id.get(&id).copied()
    }

    /// The unit-normalized embedding for the passage at `ordinal`.
    pub fn embedding(&self, ordinal: usize) -> &[f32] {
        &self.embeddings[ordinal]
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Name of the model the cached embeddings were produced with.
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

impl std::fmt::Debug for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corpus")
            .field("passages", &self.passages.len())
            .field("dimension", &self.dimension)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

/// Normalize a vector to unit length. Zero vectors are returned unchanged.
pub fn normalize(vector: Vec<f32>) -> Vec<f32> {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.into_iter().map(|x| x / norm).collect()
    } else {
        vector
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Build a small corpus from (text, source, page) triples with
    /// orthogonal-ish embeddings, for retriever tests.
    pub fn corpus_from(
        entries: &[(&str, &str, Option<u32>)],
        embeddings: Vec<Vec<f32>>,
    ) -> Corpus {
        let passages = entries
            .iter()
            .enumerate()
            .map(|(i, (text, source, page))| {
                Passage::new(*text, *source, *page, i)
            })
            .collect();
        Corpus::build(passages, embeddings, "test-model").unwrap()
    }
}
