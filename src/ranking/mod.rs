// src/ranking/mod.rs

//! Ranking engine.
//!
//! Everything here is a pure function of a finished record set: class and
//! subject rankings, topper-gap analysis, SGPA trends across semesters and
//! class summary statistics. Nothing is updated incrementally; callers
//! recompute from the records whenever they change.

mod engine;
mod summary;
mod trend;

pub use engine::{
    RankEntry, RankingTable, ScoreScale, SubjectGap, SubjectRankEntry, SubjectRanking, TopperGap,
};
pub use summary::{BandCount, ClassSummary, PerformanceBand, SemesterAverage};
pub use trend::{Trend, TrendPoint, TrendSeries};

use std::cmp::Ordering;

/// Round to `places` decimal places.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Standard competition ranks for `(registration_no, score)` pairs.
///
/// Sorts in place by score descending, then registration number ascending,
/// and returns the rank of each position. Equal scores share a rank and the
/// next distinct score resumes at its 1-based position.
pub(crate) fn competition_rank(scored: &mut [(u64, f64)]) -> Vec<usize> {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut ranks = Vec::with_capacity(scored.len());
    for (i, (_, score)) in scored.iter().enumerate() {
        let rank = match i.checked_sub(1) {
            Some(prev) if scored[prev].1.total_cmp(score) == Ordering::Equal => ranks[prev],
            _ => i + 1,
        };
        ranks.push(rank);
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_competition_rank_shares_ties() {
        let mut scored = vec![(1, 8.5), (2, 7.2), (3, 9.1), (4, 8.5), (5, 6.0)];
        let ranks = competition_rank(&mut scored);
        let order: Vec<_> = scored.iter().map(|(reg, _)| *reg).collect();
        assert_eq!(order, vec![3, 1, 4, 2, 5]);
        assert_eq!(ranks, vec![1, 2, 2, 4, 5]);
    }

    #[test]
    fn test_competition_rank_empty() {
        assert!(competition_rank(&mut []).is_empty());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(66.666, 1), 66.7);
        assert_eq!(round_to(7.125, 2), 7.13);
    }
}
