use crate::error::{Result, TriageError};
use crate::ml::models::{EnsembleConfig, ModelType, TrainingDataset};
use crate::models::SeverityLabel;
use linfa::traits::Fit;
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use tracing::debug;

/// Trait for probabilistic binary classifiers over the feature matrix
pub trait Classifier: Send + Sync {
    /// Train the classifier
    fn train(&mut self, dataset: &TrainingDataset) -> Result<()>;

    /// Predict class probabilities (n_samples × 2, columns in class-index order)
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class indices (ties go to the lower index)
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(features)?;
        Ok(proba
            .axis_iter(Axis(0))
            .map(|row| argmax(&row.to_vec()))
            .collect())
    }

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// Index of the largest value; the first index wins ties
pub fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
            if v > best_v {
                (i, v)
            } else {
                (best, best_v)
            }
        })
        .0
}

fn select_columns(arr: &Array2<f64>, columns: &[usize]) -> DenseMatrix<f64> {
    let data: Vec<f64> = arr
        .axis_iter(Axis(0))
        .flat_map(|row| columns.iter().map(move |&c| row[c]))
        .collect();
    DenseMatrix::new(arr.nrows(), columns.len(), data, false)
}

fn check_width(features: &Array2<f64>, expected: usize) -> Result<()> {
    if features.ncols() != expected {
        return Err(TriageError::Internal(format!(
            "model expects {} features, got {}",
            expected,
            features.ncols()
        )));
    }
    Ok(())
}

/// One bagged tree: the columns it saw and the fitted CART model.
///
/// A CART leaf with tied class counts always outputs the lower class index.
/// Half of the trees are fit on swapped labels and swap their vote back, so
/// ties split between the classes instead of all favouring GRAVE.
#[derive(Debug, Serialize, Deserialize)]
struct BaggedTree {
    columns: Vec<usize>,
    swapped: bool,
    tree: DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>,
}

fn swap_class(class: usize, swapped: bool) -> usize {
    if swapped {
        SeverityLabel::COUNT - 1 - class
    } else {
        class
    }
}

impl BaggedTree {
    fn decode(&self, vote: i32) -> Option<usize> {
        let class = usize::try_from(vote).ok().filter(|&c| c < SeverityLabel::COUNT)?;
        Some(swap_class(class, self.swapped))
    }
}

/// Random forest built from smartcore CART trees.
///
/// Every tree is fit on a stratified bootstrap sample restricted to a random
/// subset of √n columns. Probabilities are the fraction of tree votes.
#[derive(Debug, Serialize, Deserialize)]
pub struct RandomForest {
    n_trees: usize,
    max_depth: u16,
    min_samples_split: usize,
    min_samples_leaf: usize,
    seed: u64,
    n_features: usize,
    trees: Vec<BaggedTree>,
}

impl RandomForest {
    pub fn new(config: &EnsembleConfig, seed: u64) -> Self {
        Self {
            n_trees: config.n_trees,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            seed,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    /// Number of columns each tree samples
    fn columns_per_tree(n_features: usize) -> usize {
        ((n_features as f64).sqrt().round() as usize).clamp(1, n_features.max(1))
    }

    /// Per-class resampling with replacement, so every tree sees both classes
    fn stratified_bootstrap(labels: &[usize], rng: &mut StdRng) -> Vec<usize> {
        let mut sample = Vec::with_capacity(labels.len());
        for class in 0..SeverityLabel::COUNT {
            let members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| l == class)
                .map(|(i, _)| i)
                .collect();
            for _ in 0..members.len() {
                sample.push(members[rng.gen_range(0..members.len())]);
            }
        }
        sample
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn train(&mut self, dataset: &TrainingDataset) -> Result<()> {
        if dataset.n_samples == 0 || dataset.n_features == 0 {
            return Err(TriageError::Data(
                "random forest needs at least one sample and one feature".to_string(),
            ));
        }

        let n_features = dataset.n_features;
        let per_tree = Self::columns_per_tree(n_features);

        // Draw every random choice up front so parallel fitting stays deterministic
        let mut rng = StdRng::seed_from_u64(self.seed);
        let plans: Vec<(Vec<usize>, Vec<usize>, bool)> = (0..self.n_trees)
            .map(|_| {
                let rows = Self::stratified_bootstrap(&dataset.labels, &mut rng);
                let mut columns = index::sample(&mut rng, n_features, per_tree).into_vec();
                columns.sort_unstable();
                (rows, columns, rng.gen_bool(0.5))
            })
            .collect();

        let params = DecisionTreeClassifierParameters::default()
            .with_criterion(SplitCriterion::Gini)
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf);

        let trees = plans
            .into_par_iter()
            .map(|(rows, columns, swapped)| -> Result<BaggedTree> {
                let bootstrap = dataset.features.select(Axis(0), &rows);
                let x = select_columns(&bootstrap, &columns);
                let y: Vec<i32> = rows
                    .iter()
                    .map(|&r| swap_class(dataset.labels[r], swapped) as i32)
                    .collect();

                let tree = DecisionTreeClassifier::fit(&x, &y, params.clone()).map_err(|e| {
                    TriageError::Internal(format!("Failed to train decision tree: {}", e))
                })?;
                Ok(BaggedTree {
                    columns,
                    swapped,
                    tree,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            n_trees = trees.len(),
            columns_per_tree = per_tree,
            "Random forest trained"
        );

        self.trees = trees;
        self.n_features = n_features;
        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_trained() {
            return Err(TriageError::NotTrained("Random forest not trained".to_string()));
        }
        check_width(features, self.n_features)?;

        let votes = self
            .trees
            .par_iter()
            .map(|bagged| {
                let x = select_columns(features, &bagged.columns);
                let raw = bagged
                    .tree
                    .predict(&x)
                    .map_err(|e| TriageError::Internal(format!("Prediction failed: {}", e)))?;
                Ok(raw.into_iter().map(|v| bagged.decode(v)).collect())
            })
            .collect::<Result<Vec<Vec<Option<usize>>>>>()?;

        let mut proba = Array2::zeros((features.nrows(), SeverityLabel::COUNT));
        for tree_votes in &votes {
            for (i, class) in tree_votes.iter().enumerate() {
                if let Some(class) = class {
                    proba[[i, *class]] += 1.0;
                }
            }
        }
        proba /= self.trees.len() as f64;

        Ok(proba)
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }

    fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }
}

/// L2-regularised logistic regression (linfa)
#[derive(Debug, Serialize, Deserialize)]
pub struct LogisticModel {
    alpha: f64,
    max_iterations: u64,
    n_features: usize,
    model: Option<FittedLogisticRegression<f64, usize>>,
}

impl LogisticModel {
    pub fn new(config: &EnsembleConfig) -> Self {
        Self {
            alpha: config.logistic_alpha,
            max_iterations: config.logistic_max_iterations,
            n_features: 0,
            model: None,
        }
    }
}

impl Classifier for LogisticModel {
    fn train(&mut self, dataset: &TrainingDataset) -> Result<()> {
        let targets: Array1<usize> = dataset.labels.iter().copied().collect();
        let data = Dataset::new(dataset.features.clone(), targets);

        let model = LogisticRegression::default()
            .alpha(self.alpha)
            .max_iterations(self.max_iterations)
            .fit(&data)
            .map_err(|e| {
                TriageError::Internal(format!("Failed to train logistic regression: {}", e))
            })?;

        self.model = Some(model);
        self.n_features = dataset.n_features;
        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TriageError::NotTrained("Logistic model not trained".to_string()))?;
        check_width(features, self.n_features)?;

        let positive = model.labels().pos.class;
        let p_positive = model.predict_probabilities(features);

        let mut proba = Array2::zeros((features.nrows(), SeverityLabel::COUNT));
        for (i, &p) in p_positive.iter().enumerate() {
            let p = p.clamp(0.0, 1.0);
            proba[[i, positive]] = p;
            proba[[i, 1 - positive]] = 1.0 - p;
        }

        Ok(proba)
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

/// Weighted soft vote of the forest and the logistic model
#[derive(Debug, Serialize, Deserialize)]
pub struct SoftVotingEnsemble {
    forest: RandomForest,
    logistic: LogisticModel,
    forest_weight: f64,
}

impl SoftVotingEnsemble {
    pub fn new(config: &EnsembleConfig, seed: u64) -> Self {
        Self {
            forest: RandomForest::new(config, seed),
            logistic: LogisticModel::new(config),
            forest_weight: config.forest_weight,
        }
    }

    /// Feature width the fitted members expect
    pub fn n_features(&self) -> usize {
        self.forest.n_features
    }

    /// Whether both members agree on the feature width
    pub fn is_consistent(&self) -> bool {
        self.forest.n_features == self.logistic.n_features
    }
}

impl Classifier for SoftVotingEnsemble {
    fn train(&mut self, dataset: &TrainingDataset) -> Result<()> {
        let counts = dataset.class_counts();
        if counts.iter().any(|&c| c == 0) {
            return Err(TriageError::Data(format!(
                "training needs both classes, got counts {:?}",
                counts
            )));
        }

        self.forest.train(dataset)?;
        self.logistic.train(dataset)?;
        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        let forest = self.forest.predict_proba(features)?;
        let logistic = self.logistic.predict_proba(features)?;

        Ok(forest * self.forest_weight + logistic * (1.0 - self.forest_weight))
    }

    fn model_type(&self) -> ModelType {
        ModelType::Ensemble
    }

    fn is_trained(&self) -> bool {
        self.forest.is_trained() && self.logistic.is_trained()
    }
}
