//! Random forest classifier
//!
//! Bagged CART trees with weighted Gini impurity, scored by averaging the
//! positive-class fraction of the leaf each tree routes a sample to.
//!
//! # Algorithm
//! 1. Compute class weights (`n / (n_classes * count)` when balanced)
//! 2. For each tree:
//!    - Draw a bootstrap sample; sample weight = draw count * class weight
//!    - Grow the tree depth-first, trying `max_features` random features per node
//! 3. Predict by averaging per-tree leaf probabilities

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Random forest configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Features tried per split; `None` means sqrt(n_features)
    pub max_features: Option<usize>,
    /// Resample the training set for each tree
    pub bootstrap: bool,
    /// Weight classes inversely to their frequency
    pub balanced_class_weight: bool,
    /// Random seed
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 2,
            max_features: None,
            bootstrap: true,
            balanced_class_weight: true,
            seed: 42,
        }
    }
}

/// Errors raised while fitting or querying the forest
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForestError {
    #[error("cannot fit on an empty training set")]
    EmptyTrainingSet,

    #[error("{features} feature rows but {labels} labels")]
    LabelCountMismatch { features: usize, labels: usize },

    #[error("expected {expected} features, got {found}")]
    FeatureCountMismatch { expected: usize, found: usize },

    #[error("forest has not been fitted")]
    NotFitted,
}

/// A node in a flattened decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Weighted fraction of positive samples that reached this leaf
        probability: f64,
    },
}

/// A single decision tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn predict(&self, sample: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = sample.get(*feature).copied().unwrap_or(0.0);
                    idx = if value <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { probability }) => return *probability,
                None => return 0.5,
            }
        }
    }

    fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(TreeNode::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

/// Best split found for a node
struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grows one tree over a weighted view of the training data
struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [u8],
    weights: &'a [f64],
    n_features: usize,
    max_features: usize,
    max_depth: usize,
    min_samples_split: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: Vec<usize>, rng: &mut StdRng) -> DecisionTree {
        let mut nodes = Vec::new();
        self.build_node(indices, 0, rng, &mut nodes);
        DecisionTree { nodes }
    }

    fn build_node(
        &self,
        indices: Vec<usize>,
        depth: usize,
        rng: &mut StdRng,
        nodes: &mut Vec<TreeNode>,
    ) -> usize {
        let (total, positive) = self.class_totals(&indices);
        let probability = if total > 0.0 { positive / total } else { 0.0 };

        let node_idx = nodes.len();
        nodes.push(TreeNode::Leaf { probability });

        // Pure nodes and depth/size limits stay leaves
        if depth >= self.max_depth
            || indices.len() < self.min_samples_split
            || positive <= 0.0
            || positive >= total
        {
            return node_idx;
        }

        let Some(split) = self.best_split(&indices, total, positive, rng) else {
            return node_idx;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.features[i][split.feature] <= split.threshold);

        let left = self.build_node(left, depth + 1, rng, nodes);
        let right = self.build_node(right, depth + 1, rng, nodes);

        nodes[node_idx] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn class_totals(&self, indices: &[usize]) -> (f64, f64) {
        indices.iter().fold((0.0, 0.0), |(total, positive), &i| {
            let w = self.weights[i];
            (total + w, positive + if self.labels[i] == 1 { w } else { 0.0 })
        })
    }

    /// Search a random subset of features for the largest Gini decrease.
    ///
    /// Constant features do not count towards `max_features`.
    fn best_split(
        &self,
        indices: &[usize],
        total: f64,
        positive: f64,
        rng: &mut StdRng,
    ) -> Option<Split> {
        let mut candidates: Vec<usize> = (0..self.n_features).collect();
        candidates.shuffle(rng);

        let parent_impurity = gini(positive, total);
        let mut best: Option<Split> = None;
        let mut visited = 0;

        for feature in candidates {
            if visited >= self.max_features {
                break;
            }

            let mut column: Vec<(f64, u8, f64)> = indices
                .iter()
                .map(|&i| (self.features[i][feature], self.labels[i], self.weights[i]))
                .collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            if column.first().map(|c| c.0) == column.last().map(|c| c.0) {
                continue;
            }
            visited += 1;

            let mut left_total = 0.0;
            let mut left_positive = 0.0;
            for pair in column.windows(2) {
                let (value, label, weight) = pair[0];
                let next_value = pair[1].0;
                left_total += weight;
                if label == 1 {
                    left_positive += weight;
                }

                if value == next_value {
                    continue;
                }

                let right_total = total - left_total;
                let right_positive = positive - left_positive;
                let children = (left_total / total) * gini(left_positive, left_total)
                    + (right_total / total) * gini(right_positive, right_total);
                let gain = parent_impurity - children;

                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = (value + next_value) / 2.0;
                    if threshold >= next_value {
                        threshold = value;
                    }
                    best = Some(Split {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Gini impurity of a binary node given its positive and total weight
fn gini(positive: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let p = positive / total;
    2.0 * p * (1.0 - p)
}

/// Ensemble of decision trees for binary classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    config: ForestConfig,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForestClassifier {
    /// Create an unfitted forest
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    /// Fit on a feature matrix and 0/1 labels
    pub fn fit(&mut self, features: &[Vec<f64>], labels: &[u8]) -> Result<(), ForestError> {
        let n_samples = features.len();
        if n_samples == 0 {
            return Err(ForestError::EmptyTrainingSet);
        }
        if labels.len() != n_samples {
            return Err(ForestError::LabelCountMismatch {
                features: n_samples,
                labels: labels.len(),
            });
        }

        let n_features = features[0].len();
        if let Some(row) = features.iter().find(|row| row.len() != n_features) {
            return Err(ForestError::FeatureCountMismatch {
                expected: n_features,
                found: row.len(),
            });
        }

        let class_weights = self.class_weights(labels);
        let max_features = self
            .config
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt() as usize)
            .clamp(1, n_features.max(1));

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            let mut tree_rng = StdRng::seed_from_u64(rng.gen());

            let mut draws = vec![0u32; n_samples];
            if self.config.bootstrap {
                for _ in 0..n_samples {
                    draws[tree_rng.gen_range(0..n_samples)] += 1;
                }
            } else {
                draws.fill(1);
            }

            let weights: Vec<f64> = draws
                .iter()
                .zip(labels)
                .map(|(&count, &label)| count as f64 * class_weights[usize::from(label == 1)])
                .collect();
            let indices: Vec<usize> = (0..n_samples).filter(|&i| draws[i] > 0).collect();

            let builder = TreeBuilder {
                features,
                labels,
                weights: &weights,
                n_features,
                max_features,
                max_depth: self.config.max_depth,
                min_samples_split: self.config.min_samples_split,
            };
            trees.push(builder.build(indices, &mut tree_rng));
        }

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    /// `[negative, positive]` class weights
    fn class_weights(&self, labels: &[u8]) -> [f64; 2] {
        if !self.config.balanced_class_weight {
            return [1.0, 1.0];
        }

        let positives = labels.iter().filter(|&&l| l == 1).count();
        let negatives = labels.len() - positives;
        let n_classes = usize::from(positives > 0) + usize::from(negatives > 0);
        let n = labels.len() as f64;

        let weight = |count: usize| {
            if count == 0 {
                0.0
            } else {
                n / (n_classes as f64 * count as f64)
            }
        };
        [weight(negatives), weight(positives)]
    }

    /// Probability of the positive (fraud) class
    pub fn predict_proba(&self, sample: &[f64]) -> Result<f64, ForestError> {
        if self.trees.is_empty() {
            return Err(ForestError::NotFitted);
        }
        if sample.len() != self.n_features {
            return Err(ForestError::FeatureCountMismatch {
                expected: self.n_features,
                found: sample.len(),
            });
        }

        let sum: f64 = self.trees.iter().map(|tree| tree.predict(sample)).sum();
        Ok((sum / self.trees.len() as f64).clamp(0.0, 1.0))
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Deepest tree in the ensemble
    pub fn max_tree_depth(&self) -> usize {
        self.trees.iter().map(DecisionTree::depth).max().unwrap_or(0)
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Positive when the first feature exceeds 5, second feature is noise
    fn separable_data() -> (Vec<Vec<f64>>, Vec<u8>) {
        let features: Vec<Vec<f64>> = (0..100)
            .map(|i| vec![(i % 10) as f64, ((i * 7) % 13) as f64])
            .collect();
        let labels = features.iter().map(|f| u8::from(f[0] > 5.0)).collect();
        (features, labels)
    }

    fn small_config() -> ForestConfig {
        ForestConfig {
            n_estimators: 20,
            max_features: Some(2),
            ..ForestConfig::default()
        }
    }

    #[test]
    fn test_learns_separable_rule() {
        let (features, labels) = separable_data();
        let mut forest = RandomForestClassifier::new(small_config());
        forest.fit(&features, &labels).unwrap();

        assert!(forest.is_fitted());
        assert_eq!(forest.n_trees(), 20);
        assert!(forest.predict_proba(&[9.0, 3.0]).unwrap() > 0.9);
        assert!(forest.predict_proba(&[1.0, 3.0]).unwrap() < 0.1);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (features, labels) = separable_data();

        let mut first = RandomForestClassifier::new(small_config());
        first.fit(&features, &labels).unwrap();
        let mut second = RandomForestClassifier::new(small_config());
        second.fit(&features, &labels).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_depth_is_bounded() {
        let features: Vec<Vec<f64>> = (0..200).map(|i| vec![i as f64]).collect();
        let labels: Vec<u8> = (0..200).map(|i| (i % 2) as u8).collect();

        let mut forest = RandomForestClassifier::new(ForestConfig {
            n_estimators: 3,
            max_depth: 4,
            ..ForestConfig::default()
        });
        forest.fit(&features, &labels).unwrap();

        assert!(forest.max_tree_depth() <= 4);
    }

    #[test]
    fn test_balanced_class_weights() {
        let forest = RandomForestClassifier::new(ForestConfig::default());
        let labels = [0, 0, 0, 1];

        let weights = forest.class_weights(&labels);
        assert!((weights[0] - 4.0 / 6.0).abs() < 1e-12);
        assert!((weights[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_errors() {
        let mut forest = RandomForestClassifier::new(small_config());

        assert_eq!(forest.fit(&[], &[]), Err(ForestError::EmptyTrainingSet));
        assert_eq!(
            forest.fit(&[vec![1.0]], &[0, 1]),
            Err(ForestError::LabelCountMismatch { features: 1, labels: 2 })
        );
        assert_eq!(forest.predict_proba(&[1.0]), Err(ForestError::NotFitted));
    }

    #[test]
    fn test_predict_checks_width() {
        let (features, labels) = separable_data();
        let mut forest = RandomForestClassifier::new(small_config());
        forest.fit(&features, &labels).unwrap();

        assert_eq!(
            forest.predict_proba(&[1.0]),
            Err(ForestError::FeatureCountMismatch { expected: 2, found: 1 })
        );
    }
}
