//! Reproducibility helpers for split search
//!
//! Candidate thresholds and tie-breaking depend only on the data, never on
//! iteration order of hash maps or on a random state.

/// Orders equal-gain splits by (feature, threshold, node)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: i64,
    pub node_id: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: i64, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            node_id,
        }
    }
}

/// At most `max_bins` split thresholds from sorted distinct `values`.
///
/// The largest value is never a threshold (nothing would go right). When
/// there are more candidates than bins, evenly spaced ranks are kept.
pub fn candidate_thresholds(sorted_distinct: &[i64], max_bins: usize) -> Vec<i64> {
    let usable = match sorted_distinct.split_last() {
        Some((_, rest)) => rest,
        None => return Vec::new(),
    };
    if max_bins == 0 || usable.is_empty() {
        return Vec::new();
    }
    if usable.len() <= max_bins {
        return usable.to_vec();
    }
    let mut picked: Vec<i64> = (1..=max_bins)
        .map(|k| usable[(k * usable.len()) / max_bins - 1])
        .collect();
    picked.dedup();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tie_breaker_ordering() {
        let a = SplitTieBreaker::new(0, 100, 0);
        let b = SplitTieBreaker::new(0, 100, 1);
        let c = SplitTieBreaker::new(1, 50, 0);
        assert!(a < b);
        assert!(a < c);
        assert!(SplitTieBreaker::new(0, 99, 5) < a);
    }

    #[test]
    fn test_thresholds_exclude_max() {
        assert_eq!(candidate_thresholds(&[1, 2, 3], 10), vec![1, 2]);
        assert!(candidate_thresholds(&[7], 10).is_empty());
        assert!(candidate_thresholds(&[], 10).is_empty());
    }

    #[test]
    fn test_thresholds_capped_by_bins() {
        let values: Vec<i64> = (0..101).collect();
        let picked = candidate_thresholds(&values, 4);
        assert_eq!(picked, vec![24, 49, 74, 99]);
        assert_eq!(candidate_thresholds(&values, 4), picked);
    }
}
