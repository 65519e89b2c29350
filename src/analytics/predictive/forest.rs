//! CART decision trees and bagged random forests.
//!
//! Classification trees split on Gini impurity over 0/1 labels and their leaves
//! hold the positive-class fraction, so a forest's prediction is a probability.
//! Regression trees split on variance and their leaves hold the mean target.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use statrs::statistics::Statistics;

use crate::analytics::error::{AnalyticsError, AnalyticsResult};

const MIN_IMPURITY_DECREASE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Gini,
    Variance,
}

impl Criterion {
    fn impurity(&self, sum: f64, sum_sq: f64, count: f64) -> f64 {
        if count <= 0.0 {
            return 0.0;
        }
        let m = sum / count;
        match self {
            Self::Gini => 2.0 * m * (1.0 - m),
            Self::Variance => (sum_sq / count - m * m).max(0.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub criterion: Criterion,
    pub seed: u64,
}

impl ForestParams {
    pub fn classifier(n_trees: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split: 2,
            criterion: Criterion::Gini,
            seed,
        }
    }

    pub fn regressor(n_trees: usize, max_depth: usize, seed: u64) -> Self {
        Self {
            criterion: Criterion::Variance,
            ..Self::classifier(n_trees, max_depth, seed)
        }
    }

    fn max_features(&self, n_features: usize) -> usize {
        let k = match self.criterion {
            Criterion::Gini => (n_features as f64).sqrt().ceil() as usize,
            Criterion::Variance => n_features / 3,
        };
        k.clamp(1, n_features)
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Node,
    importances: Vec<f64>,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    criterion: Criterion,
    max_depth: usize,
    min_samples_split: usize,
    max_features: usize,
    importances: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

impl<'a> TreeBuilder<'a> {
    fn node_stats(&self, rows: &[usize]) -> (f64, f64, f64) {
        rows.iter().fold((0.0, 0.0, 0.0), |(s, sq, c), &i| {
            (s + self.y[i], sq + self.y[i] * self.y[i], c + 1.0)
        })
    }

    fn build(&mut self, rows: Vec<usize>, depth: usize, rng: &mut StdRng) -> Node {
        let (sum, sum_sq, count) = self.node_stats(&rows);
        let value = sum / count;
        let impurity = self.criterion.impurity(sum, sum_sq, count);

        if depth >= self.max_depth || rows.len() < self.min_samples_split || impurity <= 0.0 {
            return Node::Leaf { value };
        }

        let Some(best) = self.best_split(&rows, impurity, rng) else {
            return Node::Leaf { value };
        };

        self.importances[best.feature] += best.decrease;

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(left, depth + 1, rng)),
            right: Box::new(self.build(right, depth + 1, rng)),
        }
    }

    fn best_split(
        &self,
        rows: &[usize],
        parent_impurity: f64,
        rng: &mut StdRng,
    ) -> Option<BestSplit> {
        let n_features = self.x[0].len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(rng);

        let (total_sum, total_sq, total_count) = self.node_stats(rows);
        let mut best: Option<BestSplit> = None;
        let mut sorted = rows.to_vec();

        // keep drawing past max_features while no usable split has been seen
        for (checked, &feature) in features.iter().enumerate() {
            if checked >= self.max_features && best.is_some() {
                break;
            }
            sorted.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..sorted.len() - 1 {
                let i = sorted[pos];
                left_sum += self.y[i];
                left_sq += self.y[i] * self.y[i];

                let current = self.x[i][feature];
                let next = self.x[sorted[pos + 1]][feature];
                if next <= current {
                    continue;
                }

                let left_count = (pos + 1) as f64;
                let right_count = total_count - left_count;
                let weighted = left_count * self.criterion.impurity(left_sum, left_sq, left_count)
                    + right_count
                        * self.criterion.impurity(
                            total_sum - left_sum,
                            total_sq - left_sq,
                            right_count,
                        );
                let decrease = total_count * parent_impurity - weighted;

                if decrease > MIN_IMPURITY_DECREASE
                    && best.as_ref().map_or(true, |b| decrease > b.decrease)
                {
                    best = Some(BestSplit {
                        feature,
                        threshold: (current + next) / 2.0,
                        decrease,
                    });
                }
            }
        }

        best
    }
}

impl DecisionTree {
    fn fit(
        x: &[Vec<f64>],
        y: &[f64],
        rows: Vec<usize>,
        params: &ForestParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x[0].len();
        let mut builder = TreeBuilder {
            x,
            y,
            criterion: params.criterion,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split.max(2),
            max_features: params.max_features(n_features),
            importances: vec![0.0; n_features],
        };
        let root = builder.build(rows, 0, rng);
        Self {
            root,
            importances: builder.importances,
        }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &ForestParams) -> AnalyticsResult<Self> {
        validate_matrix(x, y)?;
        if params.n_trees == 0 {
            return Err(AnalyticsError::InvalidInput(
                "A forest needs at least one tree".to_string(),
            ));
        }

        let n = x.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_trees)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, sample, params, &mut rng)
            })
            .collect();

        Ok(Self {
            trees,
            n_features: x[0].len(),
        })
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(row)).mean()
    }

    /// Mean impurity decrease per feature, normalized to sum to 1.
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            let tree_total: f64 = tree.importances.iter().sum();
            if tree_total <= 0.0 {
                continue;
            }
            for (acc, imp) in totals.iter_mut().zip(&tree.importances) {
                *acc += imp / tree_total;
            }
        }
        normalize(totals)
    }
}

pub(crate) fn normalize(mut values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
    values
}

pub(crate) fn validate_matrix(x: &[Vec<f64>], y: &[f64]) -> AnalyticsResult<()> {
    if x.is_empty() {
        return Err(AnalyticsError::InsufficientData(
            "Cannot train a model without samples".to_string(),
        ));
    }
    if x.len() != y.len() {
        return Err(AnalyticsError::InvalidInput(format!(
            "Feature rows ({}) and targets ({}) differ in length",
            x.len(),
            y.len()
        )));
    }
    let width = x[0].len();
    if width == 0 || x.iter().any(|row| row.len() != width) {
        return Err(AnalyticsError::InvalidInput(
            "Feature rows must share a non-zero width".to_string(),
        ));
    }
    Ok(())
}
