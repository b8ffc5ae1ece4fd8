//! CART regression tree builder
//!
//! Exact-greedy search over at most `max_bins` thresholds per feature using
//! second-order gain `G_L²/H_L + G_R²/H_R - G²/H`. Splits compare on the
//! fixed-point feature values the model is scored with, so a training row
//! always takes the same path at inference.

use roas_model::{Node, Tree};

use crate::deterministic::{candidate_thresholds, SplitTieBreaker};
use crate::errors::{Result, TrainerError};

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub max_bins: usize,
    /// A split must improve the gain by more than this
    pub min_gain: f64,
}

/// Deepest tree the builder accepts
pub const MAX_TREE_DEPTH: usize = 32;

impl TreeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth > MAX_TREE_DEPTH {
            return Err(TrainerError::InvalidConfig(format!(
                "max_depth must be at most {MAX_TREE_DEPTH}, got {}",
                self.max_depth
            )));
        }
        if self.max_bins == 0 {
            return Err(TrainerError::InvalidConfig("max_bins must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 8,
            min_samples_leaf: 1,
            max_bins: 64,
            min_gain: 1e-12,
        }
    }
}

#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: i64,
    gain: f64,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

pub struct CartBuilder<'a> {
    config: &'a TreeConfig,
    features: &'a [Vec<i64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    feature_count: usize,
}

impl<'a> CartBuilder<'a> {
    pub fn new(
        features: &'a [Vec<i64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: &'a TreeConfig,
    ) -> Result<Self> {
        config.validate()?;
        if features.len() != gradients.len() || features.len() != hessians.len() {
            return Err(TrainerError::Dataset(format!(
                "{} rows but {} gradients and {} hessians",
                features.len(),
                gradients.len(),
                hessians.len()
            )));
        }
        Ok(Self {
            config,
            features,
            gradients,
            hessians,
            feature_count: features.first().map_or(0, Vec::len),
        })
    }

    /// Grow a tree over `rows`; `leaf_value` maps the rows of each leaf to
    /// its fixed-point output.
    pub fn build<F>(&self, rows: &[usize], mut leaf_value: F) -> Tree
    where
        F: FnMut(&[usize]) -> i64,
    {
        let mut nodes = Vec::new();
        self.build_node(rows, 0, &mut nodes, &mut leaf_value);
        Tree::new(nodes)
    }

    fn build_node<F>(
        &self,
        rows: &[usize],
        depth: usize,
        nodes: &mut Vec<Node>,
        leaf_value: &mut F,
    ) -> i32
    where
        F: FnMut(&[usize]) -> i64,
    {
        let current = nodes.len() as i32;

        let split = if depth >= self.config.max_depth
            || rows.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            None
        } else {
            self.find_best_split(rows, current as usize)
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current, leaf_value(rows)));
            return current;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|&&r| self.features[r][split.feature_idx] <= split.threshold);

        nodes.push(Node::internal(current, split.feature_idx as i32, split.threshold, -1, -1));
        let left = self.build_node(&left_rows, depth + 1, nodes, leaf_value);
        let right = self.build_node(&right_rows, depth + 1, nodes, leaf_value);

        let node = &mut nodes[current as usize];
        node.left = left;
        node.right = right;
        current
    }

    fn find_best_split(&self, rows: &[usize], node_id: usize) -> Option<SplitCandidate> {
        let (g_total, h_total) = self.sums(rows);
        let parent = score(g_total, h_total);
        let min_leaf = self.config.min_samples_leaf.max(1);

        let mut best: Option<SplitCandidate> = None;
        let mut order: Vec<usize> = rows.to_vec();

        for feature_idx in 0..self.feature_count {
            order.sort_by_key(|&r| (self.features[r][feature_idx], r));

            let mut distinct: Vec<i64> = order.iter().map(|&r| self.features[r][feature_idx]).collect();
            distinct.dedup();

            let mut cursor = 0usize;
            let (mut g_left, mut h_left) = (0.0, 0.0);
            for threshold in candidate_thresholds(&distinct, self.config.max_bins) {
                while cursor < order.len() && self.features[order[cursor]][feature_idx] <= threshold {
                    g_left += self.gradients[order[cursor]];
                    h_left += self.hessians[order[cursor]];
                    cursor += 1;
                }

                let n_right = order.len() - cursor;
                if cursor < min_leaf || n_right < min_leaf {
                    continue;
                }
                let h_right = h_total - h_left;
                if h_left <= 0.0 || h_right <= 0.0 {
                    continue;
                }

                let gain = score(g_left, h_left) + score(g_total - g_left, h_right) - parent;
                if !(gain > self.config.min_gain) {
                    continue;
                }

                let candidate = SplitCandidate {
                    feature_idx,
                    threshold,
                    gain,
                    tie_breaker: SplitTieBreaker::new(feature_idx, threshold, node_id),
                };
                if best.as_ref().map_or(true, |b| candidate.beats(b)) {
                    best = Some(candidate);
                }
            }
        }

        best
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &r| {
            (g + self.gradients[r], h + self.hessians[r])
        })
    }
}

fn score(g: f64, h: f64) -> f64 {
    if h > 0.0 {
        g * g / h
    } else {
        0.0
    }
}
