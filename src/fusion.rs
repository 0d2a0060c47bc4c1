//! Rank fusion: merging ranked lists from multiple retrieval sources into
//! a single ordering.
//!
//! Two strategies are provided behind the [`FusionPolicy`] trait:
//! reciprocal rank fusion (`weight / (smoothing + rank)`), which needs no
//! score calibration across heterogeneous sources, and weighted score
//! fusion over per-list min-max normalized scores. Additional sources fuse
//! without touching either implementation: a passage absent from a list
//! simply contributes zero from it.

use std::collections::HashMap;

use crate::{
    error::{Error, Result},
    passage::PassageId,
};

/// A ranked result from a single retrieval source. Transient per query.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResult {
    pub passage_id: PassageId,
    pub score: f32,
    /// 1-indexed position within the source list.
    pub rank: usize,
}

/// A fused result after combining sources.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub passage_id: PassageId,
    pub fused_score: f32,
}

/// One source list with its fusion weight.
#[derive(Debug, Clone, Copy)]
pub struct WeightedList<'a> {
    pub results: &'a [RankedResult],
    pub weight: f32,
}

/// A pluggable strategy for merging weighted ranked lists.
///
/// The first list is treated as the primary source: when fused scores tie,
/// the passage with the better rank in the first list wins, and remaining
/// ties resolve by passage id. Output length never exceeds `k` and only
/// contains ids present in at least one input list.
pub trait FusionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn fuse(
        &self,
        lists: &[WeightedList<'_>],
        k: usize,
    ) -> Result<Vec<FusedResult>>;
}

/// Reciprocal rank fusion: contribution = `weight / (smoothing + rank)`.
///
/// The smoothing constant dampens the influence of top ranks from any
/// single source; 60 is the conventional value.
#[derive(Debug, Clone, Copy)]
pub struct ReciprocalRankFusion {
    pub smoothing: f32,
}

impl Default for ReciprocalRankFusion {
    fn default() -> Self {
        Self { smoothing: 60.0 }
    }
}

impl FusionPolicy for ReciprocalRankFusion {
    fn name(&self) -> &'static str {
        "rrf"
    }

    fn fuse(
        &self,
        lists: &[WeightedList<'_>],
        k: usize,
    ) -> Result<Vec<FusedResult>> {
        validate(lists, k)?;

        let mut contributions: HashMap<PassageId, f32> = HashMap::new();
        for list in lists {
            for result in list.results {
                *contributions.entry(result.passage_id).or_default() +=
                    list.weight / (self.smoothing + result.rank as f32);
            }
        }

        Ok(finalize(contributions, lists, k))
    }
}

/// Weighted score fusion: contribution = `weight * normalized_score`,
/// where scores are min-max normalized within each list.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedScoreFusion;

impl FusionPolicy for WeightedScoreFusion {
    fn name(&self) -> &'static str {
        "score"
    }

    fn fuse(
        &self,
        lists: &[WeightedList<'_>],
        k: usize,
    ) -> Result<Vec<FusedResult>> {
        validate(lists, k)?;

        let mut contributions: HashMap<PassageId, f32> = HashMap::new();
        for list in lists {
            let max = list
                .results
                .iter()
                .map(|r| r.score)
                .fold(f32::MIN, f32::max);
            let min = list
                .results
                .iter()
                .map(|r| r.score)
                .fold(f32::MAX, f32::min);
            let range = max - min;

            for result in list.results {
                let normalized = if range > 0.0 {
                    (result.score - min) / range
                } else {
                    1.0
                };
                *contributions.entry(result.passage_id).or_default() +=
                    list.weight * normalized;
            }
        }

        Ok(finalize(contributions, lists, k))
    }
}

/// Look up a fusion policy by its configuration name.
pub fn policy_by_name(name: &str) -> Result<Box<dyn FusionPolicy>> {
    match name {
        "rrf" => Ok(Box::new(ReciprocalRankFusion::default())),
        "score" => Ok(Box::new(WeightedScoreFusion)),
        other => Err(Error::InvalidConfiguration(format!(
            "unknown fusion strategy '{other}' (expected 'rrf' or 'score')"
        ))),
    }
}

fn validate(lists: &[WeightedList<'_>], k: usize) -> Result<()> {
    if k == 0 {
        return Err(Error::InvalidArgument(
            "result count k must be at least 1".into(),
        ));
    }
    let mut sum = 0.0f32;
    for list in lists {
        if !list.weight.is_finite() || list.weight < 0.0 {
            return Err(Error::InvalidConfiguration(format!(
                "fusion weight {} is not a non-negative number",
                list.weight
            )));
        }
        sum += list.weight;
    }
    if sum <= 0.0 {
        return Err(Error::InvalidConfiguration(
            "fusion weights must sum to a positive value".into(),
        ));
    }
    Ok(())
}

/// Sort contributions into the final ordering: descending fused score,
/// ties by rank in the primary (first) list, then by passage id.
fn finalize(
    contributions: HashMap<PassageId, f32>,
    lists: &[WeightedList<'_>],
    k: usize,
) -> Vec<FusedResult> {
    let primary_rank: HashMap<PassageId, usize> = lists
        .first()
        .map(|list| {
            list.results
                .iter()
                .map(|r| (r.passage_id, r.rank))
                .collect()
        })
        .unwrap_or_default();

    let mut fused: Vec<FusedResult> = contributions
        .into_iter()
        .map(|(passage_id, fused_score)| FusedResult {
            passage_id,
            fused_score,
        })
        .collect();

    fused.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ra = primary_rank
                    .get(&a.passage_id)
                    .copied()
                    .unwrap_or(usize::MAX);
                let rb = primary_rank
                    .get(&b.passage_id)
                    .copied()
                    .unwrap_or(usize::MAX);
                ra.cmp(&rb)
            })
            .then_with(|| a.passage_id.cmp(&b.passage_id))
    });

    fused.truncate(k);
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(ids: &[u64]) -> Vec<RankedResult> {
        ids.iter()
            .enumerate()
            .map(|(i, &id)| RankedResult {
                passage_id: PassageId(id),
                score: 10.0 - i as f32,
                rank: i + 1,
            })
            .collect()
    }

    fn ids(results: &[FusedResult]) -> Vec<u64> {
        results.iter().map(|r| r.passage_id.0).collect()
    }

    #[test]
    fn single_source_fusion_preserves_order() {
        let list = ranked(&[3, 1, 2]);
        for policy in [
            Box::new(ReciprocalRankFusion::default()) as Box<dyn FusionPolicy>,
            Box::new(WeightedScoreFusion),
        ] {
            for weights in [[1.0, 0.0], [0.0, 1.0]] {
                let fused = policy
                    .fuse(
                        &[
                            WeightedList {
                                results: &list,
                                weight: weights[0],
                            },
                            WeightedList {
                                results: &list,
                                weight: weights[1],
                            },
                        ],
                        10,
                    )
                    .unwrap();
                assert_eq!(
                    ids(&fused),
                    vec![3, 1, 2],
                    "{} with weights {weights:?}",
                    policy.name()
                );
            }
        }
    }

    #[test]
    fn agreement_across_sources_wins() {
        // Both sources rank 1 and 2 highly; 4 appears only in one list.
        let lexical = ranked(&[1, 2, 4]);
        let dense = ranked(&[2, 1, 3]);
        let fused = ReciprocalRankFusion::default()
            .fuse(
                &[
                    WeightedList {
                        results: &lexical,
                        weight: 0.5,
                    },
                    WeightedList {
                        results: &dense,
                        weight: 0.5,
                    },
                ],
                10,
            )
            .unwrap();

        let top2: Vec<u64> = ids(&fused)[..2].to_vec();
        assert!(top2.contains(&1));
        assert!(top2.contains(&2));
    }

    #[test]
    fn output_never_exceeds_k() {
        let a = ranked(&[1, 2, 3]);
        let b = ranked(&[4, 5, 6]);
        let fused = ReciprocalRankFusion::default()
            .fuse(
                &[
                    WeightedList {
                        results: &a,
                        weight: 0.5,
                    },
                    WeightedList {
                        results: &b,
                        weight: 0.5,
                    },
                ],
                2,
            )
            .unwrap();
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn output_only_contains_input_ids() {
        let a = ranked(&[1, 2]);
        let b = ranked(&[2, 3]);
        let fused = WeightedScoreFusion
            .fuse(
                &[
                    WeightedList {
                        results: &a,
                        weight: 0.5,
                    },
                    WeightedList {
                        results: &b,
                        weight: 0.5,
                    },
                ],
                10,
            )
            .unwrap();
        for r in &fused {
            assert!([1, 2, 3].contains(&r.passage_id.0));
        }
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn absence_is_not_a_penalty() {
        // id 1 leads the only list it appears in; a second empty source
        // must not drag it below id 2, which appears in both.
        let a = ranked(&[1]);
        let b: Vec<RankedResult> = vec![];
        let fused = ReciprocalRankFusion::default()
            .fuse(
                &[
                    WeightedList {
                        results: &a,
                        weight: 0.5,
                    },
                    WeightedList {
                        results: &b,
                        weight: 0.5,
                    },
                ],
                10,
            )
            .unwrap();
        assert_eq!(ids(&fused), vec![1]);
    }

    #[test]
    fn zero_k_is_invalid() {
        let a = ranked(&[1]);
        let err = ReciprocalRankFusion::default()
            .fuse(
                &[WeightedList {
                    results: &a,
                    weight: 1.0,
                }],
                0,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn all_zero_weights_is_invalid_configuration() {
        let a = ranked(&[1]);
        let b = ranked(&[2]);
        let err = ReciprocalRankFusion::default()
            .fuse(
                &[
                    WeightedList {
                        results: &a,
                        weight: 0.0,
                    },
                    WeightedList {
                        results: &b,
                        weight: 0.0,
                    },
                ],
                10,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn negative_weight_is_invalid_configuration() {
        let a = ranked(&[1]);
        let err = WeightedScoreFusion
            .fuse(
                &[WeightedList {
                    results: &a,
                    weight: -0.5,
                }],
                10,
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration(_)));
    }

    #[test]
    fn zero_weight_disables_a_source() {
        let a = ranked(&[1, 2]);
        let b = ranked(&[9, 8]);
        let fused = ReciprocalRankFusion::default()
            .fuse(
                &[
                    WeightedList {
                        results: &a,
                        weight: 1.0,
                    },
                    WeightedList {
                        results: &b,
                        weight: 0.0,
                    },
                ],
                10,
            )
            .unwrap();
        // Disabled source still has its ids listed, but with zero score
        // they sort after every contributing passage.
        assert_eq!(ids(&fused)[..2], [1, 2]);
    }

    #[test]
    fn ties_break_by_primary_rank_then_id() {
        // Two passages with identical contributions from a single list of
        // equal scores: primary rank decides.
        let equal: Vec<RankedResult> = vec![
            RankedResult {
                passage_id: PassageId(7),
                score: 1.0,
                rank: 1,
            },
            RankedResult {
                passage_id: PassageId(3),
                score: 1.0,
                rank: 1,
            },
        ];
        let fused = WeightedScoreFusion
            .fuse(
                &[WeightedList {
                    results: &equal,
                    weight: 1.0,
                }],
                10,
            )
            .unwrap();
        // Same score, same rank: the id is the last resort.
        assert_eq!(ids(&fused), vec![3, 7]);
    }

    #[test]
    fn policy_lookup() {
        assert_eq!(policy_by_name("rrf").unwrap().name(), "rrf");
        assert_eq!(policy_by_name("score").unwrap().name(), "score");
        assert!(matches!(
            policy_by_name("bogus"),
            Err(Error::InvalidConfiguration(_))
        ));
    }
}
