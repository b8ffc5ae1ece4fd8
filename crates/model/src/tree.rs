//! Integer regression trees
//!
//! Thresholds and leaf values are fixed-point integers at the ensemble
//! scale. Traversal compares with `<=`, so ties always go left.

use serde::{Deserialize, Serialize};

/// Sentinel for "no child" / "no feature" on leaf nodes
pub const NO_INDEX: i32 = -1;

/// One tree node, stored flat; node 0 is the root
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: i32,
    pub left: i32,
    pub right: i32,
    /// Column position in the encoded row, `-1` on leaves
    pub feature_idx: i32,
    pub threshold: i64,
    pub leaf: Option<i64>,
}

impl Node {
    pub fn internal(id: i32, feature_idx: i32, threshold: i64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
        }
    }

    pub fn leaf(id: i32, value: i64) -> Self {
        Self {
            id,
            left: NO_INDEX,
            right: NO_INDEX,
            feature_idx: NO_INDEX,
            threshold: 0,
            leaf: Some(value),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Leaf value reached by `features`.
    ///
    /// Assumes a tree that passed [`Tree::validate`]; a malformed path
    /// evaluates to 0.
    pub fn evaluate(&self, features: &[i64]) -> i64 {
        let mut idx = 0usize;
        // a valid tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.nodes.len() {
            let Some(node) = self.nodes.get(idx) else {
                return 0;
            };
            if let Some(value) = node.leaf {
                return value;
            }
            let Some(&value) = features.get(node.feature_idx as usize) else {
                return 0;
            };
            let next = if value <= node.threshold {
                node.left
            } else {
                node.right
            };
            if next < 0 {
                return 0;
            }
            idx = next as usize;
        }
        0
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, budget: usize) -> usize {
            match nodes.get(idx) {
                Some(node) if !node.is_leaf() && budget > 0 => {
                    1 + walk(nodes, node.left as usize, budget - 1)
                        .max(walk(nodes, node.right as usize, budget - 1))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0, self.nodes.len())
    }

    /// Structural checks against a row width of `num_features`
    pub fn validate(&self, num_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let len = self.nodes.len() as i32;
        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                continue;
            }
            // children are always appended after their parent
            for child in [node.left, node.right] {
                if child <= i as i32 || child >= len {
                    return Err(format!("node {i} has invalid child {child}"));
                }
            }
            if node.feature_idx < 0 || node.feature_idx as usize >= num_features {
                return Err(format!(
                    "node {i} splits on feature {} outside 0..{num_features}",
                    node.feature_idx
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(vec![
            Node::internal(0, 0, 50, 1, 2),
            Node::leaf(1, 100),
            Node::leaf(2, 200),
        ])
    }

    #[test]
    fn test_node_kinds() {
        assert!(!Node::internal(0, 3, 12, 1, 2).is_leaf());
        let leaf = Node::leaf(1, -234);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.feature_idx, NO_INDEX);
    }

    #[test]
    fn test_ties_go_left() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[30]), 100);
        assert_eq!(tree.evaluate(&[50]), 100);
        assert_eq!(tree.evaluate(&[51]), 200);
    }

    #[test]
    fn test_validation() {
        assert!(stump().validate(1).is_ok());
        assert!(stump().validate(0).is_err());

        let dangling = Tree::new(vec![
            Node::internal(0, 0, 50, 5, 2),
            Node::leaf(1, 100),
            Node::leaf(2, 200),
        ]);
        assert!(dangling.validate(1).is_err());

        let cycle = Tree::new(vec![Node::internal(0, 0, 50, 0, 0)]);
        assert!(cycle.validate(1).is_err());
        assert_eq!(cycle.evaluate(&[1]), 0);
    }

    #[test]
    fn test_depth() {
        assert_eq!(Tree::new(vec![Node::leaf(0, 1)]).depth(), 0);
        assert_eq!(stump().depth(), 1);
        let two = Tree::new(vec![
            Node::internal(0, 0, 5, 1, 2),
            Node::internal(1, 0, 2, 3, 4),
            Node::leaf(2, 3),
            Node::leaf(3, 1),
            Node::leaf(4, 2),
        ]);
        assert_eq!(two.depth(), 2);
        assert_eq!(two.evaluate(&[1]), 1);
        assert_eq!(two.evaluate(&[4]), 2);
        assert_eq!(two.evaluate(&[9]), 3);
    }
}
