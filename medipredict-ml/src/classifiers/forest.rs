//! CART decision trees and bootstrap-aggregated random forests.
//!
//! Trees are stored as a flat arena of [`TreeNode`]s so a fitted forest
//! serializes to plain JSON and prediction is a loop rather than recursion.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Classifier, check_training_set, check_width};
use crate::error::MlError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Unbounded when `None`.
    pub max_depth: Option<usize>,
    /// Nodes with fewer samples become leaves.
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Class frequencies of the training rows that reached this leaf.
    Leaf { distribution: Vec<f64> },
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single CART tree using Gini impurity. Node 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
    n_classes: usize,
    n_features: usize,
}

struct GrowSettings {
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: usize,
}

impl DecisionTree {
    /// Fit on every row, considering every feature at each split.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        max_depth: Option<usize>,
        seed: u64,
    ) -> Result<Self, MlError> {
        let d = check_training_set(x, y, n_classes)?;
        let mut rows: Vec<usize> = (0..x.len()).collect();
        let settings = GrowSettings {
            max_depth,
            min_samples_split: 2,
            max_features: d,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        Ok(Self::grow(x, y, n_classes, d, &mut rows, &settings, &mut rng))
    }

    fn grow<R: RngCore>(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        n_features: usize,
        rows: &mut [usize],
        settings: &GrowSettings,
        rng: &mut R,
    ) -> Self {
        let mut builder = TreeBuilder {
            x,
            y,
            n_classes,
            n_features,
            settings,
            rng,
            nodes: Vec::new(),
        };
        builder.build(rows, 0);
        Self {
            nodes: builder.nodes,
            n_classes,
            n_features,
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], id: usize) -> usize {
            match nodes.get(id) {
                Some(TreeNode::Split { left, right, .. }) if *left > id && *right > id => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }

    /// Check the arena a deserialized tree carries: every split names an
    /// existing feature and points strictly forward to existing nodes, and
    /// every leaf has one probability per class.
    pub fn validate(&self) -> Result<(), MlError> {
        if self.nodes.is_empty() {
            return Err(MlError::model("tree has no nodes"));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Leaf { distribution } => {
                    if distribution.len() != self.n_classes {
                        return Err(MlError::model(format!(
                            "leaf {id} has {} classes, tree has {}",
                            distribution.len(),
                            self.n_classes
                        )));
                    }
                }
                TreeNode::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= self.n_features {
                        return Err(MlError::model(format!(
                            "split {id} uses feature {feature}, tree has {}",
                            self.n_features
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= id || child >= self.nodes.len() {
                            return Err(MlError::model(format!(
                                "split {id} points to node {child}"
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn leaf(&self, x: &[f64]) -> Result<&[f64], MlError> {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(TreeNode::Leaf { distribution }) => return Ok(distribution),
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = x.get(*feature).ok_or_else(|| {
                        MlError::model(format!("split {id} uses missing feature {feature}"))
                    })?;
                    let next = if *value <= *threshold { *left } else { *right };
                    if next <= id {
                        return Err(MlError::model(format!("split {id} points back to {next}")));
                    }
                    id = next;
                }
                None => return Err(MlError::model(format!("tree node {id} does not exist"))),
            }
        }
    }
}

impl Classifier for DecisionTree {
    fn name(&self) -> &str {
        "decision_tree"
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, MlError> {
        check_width(self.name(), self.n_features, x)?;
        Ok(self.leaf(x)?.to_vec())
    }
}

struct TreeBuilder<'a, R> {
    x: &'a [Vec<f64>],
    y: &'a [usize],
    n_classes: usize,
    n_features: usize,
    settings: &'a GrowSettings,
    rng: &'a mut R,
    nodes: Vec<TreeNode>,
}

impl<R: RngCore> TreeBuilder<'_, R> {
    fn build(&mut self, rows: &mut [usize], depth: usize) -> usize {
        let counts = self.class_counts(rows);
        let id = self.nodes.len();

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let too_deep = self.settings.max_depth.is_some_and(|m| depth >= m);
        if pure || too_deep || rows.len() < self.settings.min_samples_split {
            self.nodes.push(leaf_node(&counts, rows.len()));
            return id;
        }

        let Some((feature, threshold)) = self.best_split(rows, &counts) else {
            self.nodes.push(leaf_node(&counts, rows.len()));
            return id;
        };

        // Placeholder until both children exist.
        self.nodes.push(TreeNode::Leaf {
            distribution: Vec::new(),
        });
        let x = self.x;
        let mid = partition(rows, |i| x[i][feature] <= threshold);
        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.build(left_rows, depth + 1);
        let right = self.build(right_rows, depth + 1);
        self.nodes[id] = TreeNode::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn class_counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in rows {
            counts[self.y[i]] += 1;
        }
        counts
    }

    /// Lowest weighted Gini split over a random feature subset.
    ///
    /// Keeps drawing features past `max_features` while no feature has
    /// produced a valid split (e.g. all sampled features are constant).
    fn best_split(&mut self, rows: &[usize], parent: &[usize]) -> Option<(usize, f64)> {
        let mut features: Vec<usize> = (0..self.n_features).collect();
        features.shuffle(&mut *self.rng);

        let n = rows.len();
        let mut sorted = rows.to_vec();
        let mut best: Option<(usize, f64, f64)> = None;

        for (visited, &f) in features.iter().enumerate() {
            if visited >= self.settings.max_features && best.is_some() {
                break;
            }
            let x = self.x;
            sorted.sort_by(|&a, &b| x[a][f].total_cmp(&x[b][f]));

            let mut left = vec![0usize; self.n_classes];
            let mut right = parent.to_vec();
            for k in 0..n - 1 {
                let c = self.y[sorted[k]];
                left[c] += 1;
                right[c] -= 1;

                let v = x[sorted[k]][f];
                let next = x[sorted[k + 1]][f];
                if v == next {
                    continue;
                }
                let n_left = k + 1;
                let n_right = n - n_left;
                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini(&right, n_right))
                    / n as f64;
                if best.is_none_or(|(_, _, b)| impurity < b) {
                    let mut threshold = v / 2.0 + next / 2.0;
                    if threshold >= next {
                        threshold = v;
                    }
                    best = Some((f, threshold, impurity));
                }
            }
        }
        best.map(|(f, t, _)| (f, t))
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

fn leaf_node(counts: &[usize], n: usize) -> TreeNode {
    let n = n.max(1) as f64;
    TreeNode::Leaf {
        distribution: counts.iter().map(|&c| c as f64 / n).collect(),
    }
}

/// Move rows satisfying `goes_left` to the front; returns how many there are.
fn partition(rows: &mut [usize], goes_left: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for k in 0..rows.len() {
        if goes_left(rows[k]) {
            rows.swap(k, mid);
            mid += 1;
        }
    }
    mid
}

/// Bootstrap-aggregated CART trees with `sqrt(d)` candidate features per split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        params: &ForestParams,
    ) -> Result<Self, MlError> {
        let d = check_training_set(x, y, n_classes)?;
        if params.n_estimators == 0 {
            return Err(MlError::training("random forest needs at least one tree"));
        }
        let settings = GrowSettings {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            max_features: ((d as f64).sqrt() as usize).max(1),
        };

        let n = x.len();
        let mut seeder = StdRng::seed_from_u64(params.seed);
        let trees: Vec<DecisionTree> = (0..params.n_estimators)
            .map(|_| {
                let mut rng = StdRng::seed_from_u64(seeder.r#gen());
                let mut sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::grow(x, y, n_classes, d, &mut sample, &settings, &mut rng)
            })
            .collect();

        debug!(
            trees = trees.len(),
            rows = n,
            features = d,
            max_features = settings.max_features,
            "Fitted random forest"
        );
        Ok(Self {
            trees,
            n_classes,
            n_features: d,
        })
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Check a deserialized forest before it serves predictions.
    pub fn validate(&self) -> Result<(), MlError> {
        if self.trees.is_empty() {
            return Err(MlError::model("random forest has no trees"));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            if tree.n_classes != self.n_classes || tree.n_features != self.n_features {
                return Err(MlError::model(format!(
                    "tree {i} has shape {}x{}, forest has {}x{}",
                    tree.n_features, tree.n_classes, self.n_features, self.n_classes
                )));
            }
            tree.validate()
                .map_err(|e| MlError::model(format!("tree {i}: {e}")))?;
        }
        Ok(())
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: &[f64]) -> Result<Vec<f64>, MlError> {
        check_width(self.name(), self.n_features, x)?;
        if self.trees.is_empty() {
            return Err(MlError::model("random forest has no trees"));
        }
        let mut proba = vec![0.0; self.n_classes];
        for tree in &self.trees {
            let leaf = tree.leaf(x)?;
            if leaf.len() != self.n_classes {
                return Err(MlError::model(format!(
                    "leaf has {} classes, forest has {}",
                    leaf.len(),
                    self.n_classes
                )));
            }
            for (p, v) in proba.iter_mut().zip(leaf) {
                *p += v;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Label is `a AND b`; `c` is noise.
    fn and_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for a in 0..2 {
            for b in 0..2 {
                for c in 0..2 {
                    for _ in 0..3 {
                        x.push(vec![a as f64, b as f64, c as f64]);
                        y.push(usize::from(a == 1 && b == 1));
                    }
                }
            }
        }
        (x, y)
    }

    #[test]
    fn test_tree_fits_training_data_exactly() {
        let (x, y) = and_data();
        let tree = DecisionTree::fit(&x, &y, 2, None, 7).unwrap();
        for (row, &target) in x.iter().zip(&y) {
            assert_eq!(tree.predict(row).unwrap(), target);
        }
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_tree_max_depth_zero_is_single_leaf() {
        let (x, y) = and_data();
        let tree = DecisionTree::fit(&x, &y, 2, Some(0), 7).unwrap();
        assert_eq!(tree.node_count(), 1);
        let p = tree.predict_proba(&[1.0, 1.0, 0.0]).unwrap();
        assert_eq!(p, vec![0.75, 0.25]);
    }

    #[test]
    fn test_pure_node_is_leaf() {
        let x = vec![vec![0.0], vec![1.0]];
        let tree = DecisionTree::fit(&x, &[1, 1], 2, None, 0).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict(&[5.0]).unwrap(), 1);
    }

    #[test]
    fn test_forest_learns_and() {
        let (x, y) = and_data();
        let forest = RandomForest::fit(&x, &y, 2, &ForestParams::default()).unwrap();
        assert_eq!(forest.trees().len(), 100);
        assert_eq!(forest.predict(&[1.0, 1.0, 0.0]).unwrap(), 1);
        assert_eq!(forest.predict(&[0.0, 0.0, 1.0]).unwrap(), 0);

        let p = forest.predict_proba(&[0.0, 1.0, 1.0]).unwrap();
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_forest_is_deterministic_for_seed() {
        let (x, y) = and_data();
        let params = ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        };
        let a = RandomForest::fit(&x, &y, 2, &params).unwrap();
        let b = RandomForest::fit(&x, &y, 2, &params).unwrap();
        for row in &x {
            assert_eq!(a.predict_proba(row).unwrap(), b.predict_proba(row).unwrap());
        }
    }

    #[test]
    fn test_forest_keeps_unseen_classes_in_distribution() {
        let (x, y) = and_data();
        let forest = RandomForest::fit(
            &x,
            &y,
            4,
            &ForestParams {
                n_estimators: 5,
                ..ForestParams::default()
            },
        )
        .unwrap();
        let p = forest.predict_proba(&x[0]).unwrap();
        assert_eq!(p.len(), 4);
        assert_eq!(p[3], 0.0);
    }

    #[test]
    fn test_forest_rejects_zero_trees() {
        let (x, y) = and_data();
        let params = ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        };
        assert!(RandomForest::fit(&x, &y, 2, &params).is_err());
    }

    fn forest_json(nodes: serde_json::Value) -> String {
        serde_json::json!({
            "trees": [{ "nodes": nodes, "n_classes": 2, "n_features": 3 }],
            "n_classes": 2,
            "n_features": 3,
        })
        .to_string()
    }

    #[test]
    fn test_fitted_forest_validates() {
        let (x, y) = and_data();
        let params = ForestParams {
            n_estimators: 5,
            ..ForestParams::default()
        };
        assert!(RandomForest::fit(&x, &y, 2, &params).unwrap().validate().is_ok());
    }

    #[test]
    fn test_edited_forest_is_rejected() {
        let leaf = serde_json::json!({ "kind": "leaf", "distribution": [0.5, 0.5] });
        let split = |feature: usize, left: usize, right: usize| {
            serde_json::json!({
                "kind": "split", "feature": feature, "threshold": 0.5,
                "left": left, "right": right,
            })
        };
        let cases = [
            ("feature 9", serde_json::json!([split(9, 1, 2), leaf, leaf])),
            ("self loop", serde_json::json!([split(0, 0, 1), leaf])),
            ("backward", serde_json::json!([leaf, split(0, 0, 2), leaf])),
            ("missing node", serde_json::json!([split(0, 1, 5), leaf])),
            ("short leaf", serde_json::json!([{ "kind": "leaf", "distribution": [1.0] }])),
            ("empty", serde_json::json!([])),
        ];
        for (name, nodes) in cases {
            let forest: RandomForest = serde_json::from_str(&forest_json(nodes)).unwrap();
            assert!(forest.validate().is_err(), "{name} should be rejected");
        }
    }

    #[test]
    fn test_unvalidated_cycle_errors_instead_of_looping() {
        let nodes = serde_json::json!([
            { "kind": "split", "feature": 0, "threshold": 0.5, "left": 0, "right": 0 },
        ]);
        let forest: RandomForest = serde_json::from_str(&forest_json(nodes)).unwrap();
        assert!(forest.predict_proba(&[0.0, 0.0, 0.0]).is_err());
        assert_eq!(forest.trees()[0].depth(), 0);
    }

    #[test]
    fn test_forest_serde_roundtrip() {
        let (x, y) = and_data();
        let params = ForestParams {
            n_estimators: 3,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&x, &y, 2, &params).unwrap();
        let json = serde_json::to_string(&forest).unwrap();
        assert!(json.contains(r#""kind":"split""#));
        let restored: RandomForest = serde_json::from_str(&json).unwrap();
        for row in &x {
            assert_eq!(forest.predict(row).unwrap(), restored.predict(row).unwrap());
        }
    }
}
