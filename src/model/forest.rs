//! Random forest of gini decision trees with bootstrap sampling.

use super::{Classifier, ForestParams, ModelError};
use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Tree nodes live in a flat arena; children are indices into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        /// Fraction of positive samples reaching this leaf
        prob: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct TreeSettings {
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    n_features: usize,
}

impl DecisionTree {
    fn grow(x: &Array2<f64>, y: &Array1<f64>, indices: Vec<usize>, settings: &TreeSettings, rng: &mut ChaCha8Rng) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            n_features: x.ncols(),
        };
        tree.build(x, y, indices, 0, settings, rng);
        tree
    }

    /// Push the subtree for `indices` and return its root index.
    fn build(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        depth: usize,
        settings: &TreeSettings,
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let n = indices.len();
        let positives: f64 = indices.iter().map(|&i| y[i]).sum();
        let prob = if n == 0 { 0.0 } else { positives / n as f64 };

        let depth_reached = settings.max_depth.map(|d| depth >= d).unwrap_or(false);
        let pure = positives == 0.0 || positives == n as f64;
        if depth_reached || pure || n < settings.min_samples_split {
            return self.push(Node::Leaf { prob });
        }

        let split = match best_split(x, y, &indices, settings, rng) {
            Some(s) => s,
            None => return self.push(Node::Leaf { prob }),
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| x[[i, split.feature]] <= split.threshold);

        let slot = self.push(Node::Leaf { prob });
        let left = self.build(x, y, left_idx, depth + 1, settings, rng);
        let right = self.build(x, y, right_idx, depth + 1, settings, rng);
        self.nodes[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        slot
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { prob } => return *prob,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match &nodes[at] {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }
}

struct Split {
    feature: usize,
    threshold: f64,
}

fn gini(pos: f64, n: f64) -> f64 {
    if n == 0.0 {
        return 0.0;
    }
    let p = pos / n;
    2.0 * p * (1.0 - p)
}

/// Best gini split over a random feature subset, or `None` if nothing improves purity.
fn best_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    settings: &TreeSettings,
    rng: &mut ChaCha8Rng,
) -> Option<Split> {
    let n = indices.len() as f64;
    let total_pos: f64 = indices.iter().map(|&i| y[i]).sum();
    let parent = gini(total_pos, n);
    let min_leaf = settings.min_samples_leaf.max(1);

    let mut best: Option<(f64, Split)> = None;
    let features = sample(rng, x.ncols(), settings.max_features.min(x.ncols()));
    let mut column: Vec<(f64, f64)> = Vec::with_capacity(indices.len());

    for feature in features.iter() {
        column.clear();
        column.extend(indices.iter().map(|&i| (x[[i, feature]], y[i])));
        column.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_pos = 0.0;
        for k in 0..column.len() - 1 {
            left_pos += column[k].1;
            let left_n = (k + 1) as f64;
            if column[k].0 == column[k + 1].0 || k + 1 < min_leaf || column.len() - (k + 1) < min_leaf {
                continue;
            }
            let right_n = n - left_n;
            let impurity = (left_n * gini(left_pos, left_n) + right_n * gini(total_pos - left_pos, right_n)) / n;
            if impurity + 1e-12 < parent && best.as_ref().map(|(b, _)| impurity < *b).unwrap_or(true) {
                let threshold = (column[k].0 + column[k + 1].0) / 2.0;
                best = Some((impurity, Split { feature, threshold }));
            }
        }
    }
    best.map(|(_, s)| s)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<(), ModelError> {
        let (n, d) = x.dim();
        if n == 0 || d == 0 {
            return Err(ModelError::InvalidParameter("empty training set".to_string()));
        }
        if y.len() != n {
            return Err(ModelError::DimensionMismatch { expected: n, got: y.len() });
        }
        if self.params.n_estimators == 0 {
            return Err(ModelError::InvalidParameter("n_estimators must be positive".to_string()));
        }
        if self.params.min_samples_split < 2 {
            return Err(ModelError::InvalidParameter("min_samples_split must be at least 2".to_string()));
        }
        let positives = y.iter().filter(|&&v| v > 0.5).count();
        if positives == 0 || positives == n {
            return Err(ModelError::SingleClass);
        }

        let settings = TreeSettings {
            max_depth: self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            min_samples_leaf: self.params.min_samples_leaf,
            max_features: ((d as f64).sqrt().ceil() as usize).max(1),
        };

        self.trees = (0..self.params.n_estimators)
            .map(|t| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed.wrapping_add(t as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::grow(x, y, bootstrap, &settings, &mut rng)
            })
            .collect();
        tracing::debug!(trees = self.trees.len(), "random forest fitted");
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>, ModelError> {
        let first = self.trees.first().ok_or(ModelError::NotFitted)?;
        if x.ncols() != first.n_features {
            return Err(ModelError::DimensionMismatch {
                expected: first.n_features,
                got: x.ncols(),
            });
        }
        let k = self.trees.len() as f64;
        Ok(x
            .rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / k)
            .collect())
    }
}
