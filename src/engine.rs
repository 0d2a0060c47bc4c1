//! The query engine: lexical and dense retrieval in parallel, rank
//! fusion, and handoff to the answer synthesizer.
//!
//! A query moves through retrieving, fusing, and synthesizing strictly in
//! that order; fusion waits on both retrievers. No state outlives the
//! query except the immutable corpus the engine borrows.

use crate::{
    corpus::Corpus,
    dense,
    embedder::EmbeddingClient,
    error::{Error, Result},
    fusion::{FusedResult, FusionPolicy, WeightedList},
    generation::GenerationClient,
    lexical::LexicalIndex,
    passage::Passage,
    synthesizer::{self, AnswerStream},
};

/// Per-query retrieval settings.
pub struct RetrievalOptions {
    /// Number of fused results to return.
    pub k: usize,
    pub lexical_weight: f32,
    pub dense_weight: f32,
    pub policy: Box<dyn FusionPolicy>,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            k: 5,
            lexical_weight: 0.5,
            dense_weight: 0.5,
            policy: Box::new(crate::fusion::ReciprocalRankFusion::default()),
        }
    }
}

/// The fused ranking for one query, plus any degradation warnings.
#[derive(Debug)]
pub struct Retrieval {
    pub results: Vec<FusedResult>,
    /// Non-fatal problems, e.g. one retriever was unavailable and the
    /// query proceeded on the surviving source alone.
    pub warnings: Vec<String>,
}

/// Read-only query engine over a loaded corpus.
pub struct QueryEngine<'a> {
    corpus: &'a Corpus,
    lexical: LexicalIndex,
    embedder: &'a dyn EmbeddingClient,
}

impl<'a> QueryEngine<'a> {
    /// Build the in-memory lexical index and wire up the embedding client.
    pub fn new(
        corpus: &'a Corpus,
        embedder: &'a dyn EmbeddingClient,
    ) -> Result<Self> {
        if embedder.model() != corpus.embedding_model() {
            tracing::warn!(
                "query embedding model '{}' differs from the corpus model '{}'; \
                 dense scores will be meaningless until reindexing",
                embedder.model(),
                corpus.embedding_model()
            );
        }
        let lexical = LexicalIndex::build(corpus)?;
        Ok(Self {
            corpus,
            lexical,
            embedder,
        })
    }

    /// Run hybrid retrieval for a query.
    ///
    /// Both retrievers run concurrently against the immutable corpus; the
    /// fusion step joins them. If exactly one retriever fails, the query
    /// degrades to the surviving source with its weight renormalized and a
    /// warning recorded; if both fail, the first error propagates.
    pub fn retrieve(
        &self,
        query: &str,
        opts: &RetrievalOptions,
    ) -> Result<Retrieval> {
        if opts.k == 0 {
            return Err(Error::InvalidArgument(
                "result count k must be at least 1".into(),
            ));
        }

        tracing::debug!("retrieving candidates for {query:?}");
        let (lexical_out, dense_out) = rayon::join(
            || self.lexical.search(query, opts.k),
            || {
                let vector = self.embedder.embed(query)?;
                dense::search(self.corpus, &vector, opts.k)
            },
        );

        let mut warnings = Vec::new();
        let (lists, k) = match (lexical_out, dense_out) {
            (Ok(lexical), Ok(dense)) => (
                vec![
                    (lexical, opts.lexical_weight),
                    (dense, opts.dense_weight),
                ],
                opts.k,
            ),
            (Ok(lexical), Err(e)) => {
                self.degrade("dense", &e, opts.lexical_weight)?;
                warnings.push(format!(
                    "dense retrieval unavailable, using lexical results only: {e}"
                ));
                (vec![(lexical, 1.0)], opts.k)
            }
            (Err(e), Ok(dense)) => {
                self.degrade("lexical", &e, opts.dense_weight)?;
                warnings.push(format!(
                    "lexical retrieval failed, using dense results only: {e}"
                ));
                (vec![(dense, 1.0)], opts.k)
            }
            (Err(e), Err(_)) => return Err(e),
        };

        tracing::debug!("fusing {} source lists", lists.len());
        let weighted: Vec<WeightedList<'_>> = lists
            .iter()
            .map(|(results, weight)| WeightedList {
                results: results.as_slice(),
                weight: *weight,
            })
            .collect();
        let results = opts.policy.fuse(&weighted, k)?;

        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        Ok(Retrieval { results, warnings })
    }

    /// Degradation is only possible when the surviving source carries a
    /// positive weight; otherwise the retriever error is fatal.
    fn degrade(
        &self,
        failed: &str,
        error: &Error,
        surviving_weight: f32,
    ) -> Result<()> {
        if surviving_weight > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidConfiguration(format!(
                "{failed} retrieval failed ({error}) and the surviving \
                 source has zero weight"
            )))
        }
    }

    /// Materialize the passages behind a fused ranking, in fused order.
    pub fn passages(&self, results: &[FusedResult]) -> Result<Vec<Passage>> {
        results
            .iter()
            .map(|r| self.corpus.get(r.passage_id).cloned())
            .collect()
    }

    /// Full query lifecycle: retrieve, fuse, synthesize.
    ///
    /// Returns the answer stream together with the retrieval (for source
    /// listings and degradation warnings).
    pub fn ask(
        &self,
        query: &str,
        opts: &RetrievalOptions,
        generator: &dyn GenerationClient,
    ) -> Result<(AnswerStream, Retrieval)> {
        let retrieval = self.retrieve(query, opts)?;
        let passages = self.passages(&retrieval.results)?;

        tracing::debug!(
            "synthesizing answer from {} passages",
            passages.len()
        );
        let stream = synthesizer::synthesize(query, &passages, generator)?;
        Ok((stream, retrieval))
    }
}

impl std::fmt::Debug for QueryEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("corpus", &self.corpus)
            .finish_non_exhaustive()
    }
}
