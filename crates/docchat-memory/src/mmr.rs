//! Maximal marginal relevance re-ranking.
//!
//! `score = λ·sim(query, d) − (1−λ)·max(sim(d, s) for s in selected)`; λ = 1 is
//! pure relevance, λ = 0 pure diversity.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MmrConfig {
    /// Results returned.
    pub k: usize,
    /// Candidates fetched by plain similarity before re-ranking.
    pub fetch_k: usize,
    pub lambda: f32,
}

impl Default for MmrConfig {
    fn default() -> Self {
        Self {
            k: 4,
            fetch_k: 20,
            lambda: 0.5,
        }
    }
}

/// A similarity hit; `vector` must be L2-normalized.
#[derive(Debug, Clone, Copy)]
pub struct MmrCandidate<'a> {
    pub score: f32,
    pub vector: &'a [f32],
}

pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Greedily pick up to `k` candidates, returning their positions in selection order.
///
/// Candidates are expected in descending relevance order; on equal MMR scores
/// the earlier (more relevant) candidate wins.
#[must_use]
pub fn mmr_rerank(candidates: &[MmrCandidate<'_>], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (slot, &idx) in remaining.iter().enumerate() {
            let cand = candidates[idx];
            let redundancy = selected
                .iter()
                .map(|&s| dot(cand.vector, candidates[s].vector))
                .fold(None, |acc: Option<f32>, x| Some(acc.map_or(x, |a| a.max(x))))
                .unwrap_or(0.0);
            let score = lambda * cand.score - (1.0 - lambda) * redundancy;
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((slot, score));
            }
        }
        let Some((slot, _)) = best else {
            break;
        };
        selected.push(remaining.remove(slot));
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(v: &[f32]) -> Vec<f32> {
        let n = dot(v, v).sqrt();
        v.iter().map(|x| x / n).collect()
    }

    #[test]
    fn defaults() {
        let cfg = MmrConfig::default();
        assert_eq!(cfg.k, 4);
        assert_eq!(cfg.fetch_k, 20);
        assert!((cfg.lambda - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_and_zero_k() {
        assert!(mmr_rerank(&[], 4, 0.5).is_empty());
        let v = unit(&[1.0, 0.0]);
        let c = [MmrCandidate {
            score: 1.0,
            vector: &v,
        }];
        assert!(mmr_rerank(&c, 0, 0.5).is_empty());
    }

    #[test]
    fn first_pick_is_most_relevant() {
        let a = unit(&[1.0, 0.0]);
        let b = unit(&[0.0, 1.0]);
        let c = [
            MmrCandidate {
                score: 0.9,
                vector: &a,
            },
            MmrCandidate {
                score: 0.2,
                vector: &b,
            },
        ];
        assert_eq!(mmr_rerank(&c, 1, 0.5), vec![0]);
    }

    #[test]
    fn near_duplicate_is_demoted() {
        let q_like = unit(&[1.0, 0.0, 0.0]);
        let dup = unit(&[0.99, 0.01, 0.0]);
        let other = unit(&[0.6, 0.0, 0.8]);
        let c = [
            MmrCandidate {
                score: 1.0,
                vector: &q_like,
            },
            MmrCandidate {
                score: 0.99,
                vector: &dup,
            },
            MmrCandidate {
                score: 0.6,
                vector: &other,
            },
        ];
        assert_eq!(mmr_rerank(&c, 2, 0.5), vec![0, 2]);
        assert_eq!(mmr_rerank(&c, 2, 1.0), vec![0, 1]);
    }

    #[test]
    fn ties_keep_earlier_candidate() {
        let v = unit(&[1.0, 1.0]);
        let c = [
            MmrCandidate {
                score: 0.5,
                vector: &v,
            },
            MmrCandidate {
                score: 0.5,
                vector: &v,
            },
        ];
        assert_eq!(mmr_rerank(&c, 2, 0.5), vec![0, 1]);
    }

    #[test]
    fn k_larger_than_candidates() {
        let v = unit(&[1.0]);
        let c = [MmrCandidate {
            score: 1.0,
            vector: &v,
        }];
        assert_eq!(mmr_rerank(&c, 10, 0.5), vec![0]);
    }
}
