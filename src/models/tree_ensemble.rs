//! Gradient-boosted regression trees.
//!
//! Each tree is a flat node array rooted at index 0. A split sends a row to
//! `left` when `row[feature] < threshold`, otherwise to `right`. The
//! prediction is `base_score` plus the sum of the reached leaf values.

use crate::models::InferenceError;
use crate::models::model::OccupancyModel;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        leaf: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TreeEnsembleParams {
    #[serde(default)]
    pub base_score: f64,
    pub trees: Vec<Tree>,
}

#[derive(Debug)]
pub struct TreeEnsembleModel {
    params: TreeEnsembleParams,
}

impl TreeEnsembleModel {
    pub fn new(params: TreeEnsembleParams) -> Result<Self, InferenceError> {
        for (tree_index, tree) in params.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(malformed(tree_index, "tree has no nodes"));
            }
            for node in &tree.nodes {
                if let TreeNode::Split { left, right, .. } = node
                    && (*left >= tree.nodes.len() || *right >= tree.nodes.len())
                {
                    return Err(malformed(tree_index, "child index out of range"));
                }
            }
        }
        Ok(Self { params })
    }

    pub fn tree_count(&self) -> usize {
        self.params.trees.len()
    }
}

impl OccupancyModel for TreeEnsembleModel {
    fn predict(&self, row: &[f64]) -> Result<f64, InferenceError> {
        let mut total = self.params.base_score;
        for (tree_index, tree) in self.params.trees.iter().enumerate() {
            total += evaluate_tree(tree_index, tree, row)?;
        }
        Ok(total)
    }

    fn name(&self) -> &'static str {
        "tree_ensemble"
    }
}

fn evaluate_tree(tree_index: usize, tree: &Tree, row: &[f64]) -> Result<f64, InferenceError> {
    let mut cursor = 0usize;
    // A well-formed tree reaches a leaf in fewer hops than it has nodes.
    for _ in 0..tree.nodes.len() {
        match &tree.nodes[cursor] {
            TreeNode::Leaf { leaf } => return Ok(*leaf),
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let value = row.get(*feature).ok_or(InferenceError::DimensionMismatch {
                    expected: feature + 1,
                    got: row.len(),
                })?;
                cursor = if *value < *threshold { *left } else { *right };
            }
        }
    }
    Err(malformed(tree_index, "cycle detected"))
}

fn malformed(tree: usize, reason: &str) -> InferenceError {
    InferenceError::MalformedTree {
        tree,
        reason: reason.to_string(),
    }
}
