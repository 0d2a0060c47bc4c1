//! Dense retrieval: similarity search over the corpus's cached embedding
//! vectors.
//!
//! Corpus vectors are unit-normalized at build time and the query vector
//! is normalized here, so the dot product below is cosine similarity and
//! the metric always matches the one the stored vectors were produced
//! under.

use rayon::prelude::*;

use crate::{
    corpus::{Corpus, normalize},
    error::{Error, Result},
    fusion::RankedResult,
};

/// Search the corpus by embedding similarity.
///
/// Returns at most `k` results ordered by descending similarity; ties are
/// broken by passage insertion order for determinism.
pub fn search(
    corpus: &Corpus,
    query_vector: &[f32],
    k: usize,
) -> Result<Vec<RankedResult>> {
    if k == 0 {
        return Err(Error::InvalidArgument(
            "result count k must be at least 1".into(),
        ));
    }
    if query_vector.len() != corpus.dimension() {
        return Err(Error::InvalidArgument(format!(
            "query vector has dimension {} but the corpus was embedded at {}",
            query_vector.len(),
            corpus.dimension()
        )));
    }

    let query = normalize(query_vector.to_vec());

    let mut scored: Vec<(usize, f32)> = (0..corpus.len())
        .into_par_iter()
        .map(|ordinal| (ordinal, dot(&query, corpus.embedding(ordinal))))
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(k);

    Ok(scored
        .into_iter()
        .enumerate()
        .map(|(i, (ordinal, score))| RankedResult {
            passage_id: corpus.all()[ordinal].id,
            score,
            rank: i + 1,
        })
        .collect())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::test_support::corpus_from;

    fn axis_corpus() -> Corpus {
        corpus_from(
            &[
                ("x axis passage", "x.txt", None),
                ("y axis passage", "y.txt", None),
                ("diagonal passage", "d.txt", None),
            ],
            vec![
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![1.0, 1.0],
            ],
        )
    }

    #[test]
    fn ranks_by_similarity() {
        let corpus = axis_corpus();
        let results = search(&corpus, &[1.0, 0.0], 3).unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].passage_id, corpus.all()[0].id);
        assert_eq!(results[1].passage_id, corpus.all()[2].id);
        assert_eq!(results[2].passage_id, corpus.all()[1].id);
        for window in results.windows(2) {
            assert!(window[0].score >= window[1].score);
        }
    }

    #[test]
    fn query_is_normalized_before_scoring() {
        let corpus = axis_corpus();
        let scaled = search(&corpus, &[100.0, 0.0], 1).unwrap();
        let unit = search(&corpus, &[1.0, 0.0], 1).unwrap();
        assert_eq!(scaled[0].passage_id, unit[0].passage_id);
        assert!((scaled[0].score - unit[0].score).abs() < 1e-6);
    }

    #[test]
    fn respects_k_limit() {
        let corpus = axis_corpus();
        let results = search(&corpus, &[1.0, 1.0], 2).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn zero_k_is_invalid() {
        let corpus = axis_corpus();
        assert!(matches!(
            search(&corpus, &[1.0, 0.0], 0).unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[test]
    fn dimension_mismatch_is_invalid() {
        let corpus = axis_corpus();
        assert!(matches!(
            search(&corpus, &[1.0, 0.0, 0.0], 3).unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[test]
    fn equal_similarity_breaks_by_insertion_order() {
        let corpus = corpus_from(
            &[
                ("twin one", "a.txt", None),
                ("twin two", "b.txt", None),
            ],
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
        );
        let results = search(&corpus, &[1.0, 0.0], 2).unwrap();
        assert_eq!(results[0].passage_id, corpus.all()[0].id);
        assert_eq!(results[1].passage_id, corpus.all()[1].id);
    }

    #[test]
    fn ranks_are_one_indexed() {
        let corpus = axis_corpus();
        let results = search(&corpus, &[0.0, 1.0], 3).unwrap();
        for (i, r) in results.iter().enumerate() {
            assert_eq!(r.rank, i + 1);
        }
    }
}
