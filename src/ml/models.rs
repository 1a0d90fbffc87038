use crate::models::SeverityLabel;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Seed for every stochastic step (split, folds, bootstrap, column sampling)
    pub seed: u64,

    /// Held-out fraction for the stratified train/test split
    #[validate(range(min = 0.0, max = 0.9))]
    pub test_size: f64,

    /// Stratified k-fold cross-validation folds (0 disables cross-validation)
    #[validate(range(max = 20))]
    pub cv_folds: usize,

    /// Which engineered features feed the models
    pub feature_set: FeatureSet,

    /// Predictions below this confidence are logged at debug level
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_confidence: f64,

    /// Text vectorizer configuration
    #[validate(nested)]
    pub feature_config: FeatureConfig,

    /// Ensemble configuration
    #[validate(nested)]
    pub ensemble: EnsembleConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            cv_folds: 5,
            feature_set: FeatureSet::Full,
            min_confidence: 0.7,
            feature_config: FeatureConfig::default(),
            ensemble: EnsembleConfig::default(),
        }
    }
}

/// Feature richness of the pipeline
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// TF-IDF over the comment only
    TextOnly,

    /// TF-IDF plus text statistics, demographic, geographic and access features
    #[default]
    Full,
}

/// Text vectorizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct FeatureConfig {
    /// Maximum vocabulary size for text features
    #[validate(range(min = 1))]
    pub max_vocab_size: usize,

    /// Minimum document frequency for terms
    #[validate(range(min = 1))]
    pub min_doc_freq: usize,

    /// Terms present in a larger share of documents than this are dropped
    #[validate(range(min = 0.0, max = 1.0))]
    pub max_doc_ratio: f64,

    /// Replace raw term counts with 1 + ln(tf)
    pub sublinear_tf: bool,

    /// N-gram range (min, max)
    pub ngram_range: (usize, usize),
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_vocab_size: 2000,
            min_doc_freq: 1,
            max_doc_ratio: 0.95,
            sublinear_tf: true,
            ngram_range: (1, 3),
        }
    }
}

/// Ensemble configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Number of trees in the forest
    #[validate(range(min = 1, max = 1000))]
    pub n_trees: usize,

    /// Maximum tree depth
    #[validate(range(min = 1, max = 64))]
    pub max_depth: u16,

    /// Minimum samples required to split a node
    #[validate(range(min = 2))]
    pub min_samples_split: usize,

    /// Minimum samples in a leaf
    #[validate(range(min = 1))]
    pub min_samples_leaf: usize,

    /// L2 penalty of the logistic model
    #[validate(range(min = 0.0))]
    pub logistic_alpha: f64,

    /// Iteration cap of the logistic solver
    #[validate(range(min = 1))]
    pub logistic_max_iterations: u64,

    /// Soft-vote weight of the forest; the logistic model gets 1 - weight
    #[validate(range(min = 0.0, max = 1.0))]
    pub forest_weight: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            n_trees: 150,
            max_depth: 12,
            min_samples_split: 2,
            min_samples_leaf: 1,
            logistic_alpha: 1.25,
            logistic_max_iterations: 200,
            forest_weight: 0.5,
        }
    }
}

/// Prediction result with confidence score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    /// Predicted severity
    pub label: SeverityLabel,

    /// Confidence score: the largest class probability
    pub confidence: f64,

    /// All class probabilities, keyed by label name
    pub probabilities: HashMap<String, f64>,

    /// Engineered features worth surfacing to an operator
    pub detected_features: DetectedFeatures,

    /// Categorical values never seen during training
    pub unseen_categories: Vec<UnseenCategory>,
}

impl Prediction {
    /// Probability for one label (0.0 when absent)
    pub fn probability(&self, label: SeverityLabel) -> f64 {
        self.probabilities
            .get(&label.to_string())
            .copied()
            .unwrap_or(0.0)
    }
}

/// Subset of the feature vector reported with each prediction
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectedFeatures {
    pub text_length: usize,
    pub urgent_keywords: usize,
    pub mentions_medical: bool,
    pub large_city: bool,
    pub elderly: bool,
    pub rural: bool,
}

/// An inference-time categorical value that fell back to the sentinel code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnseenCategory {
    /// Encoded column ("city", "category", "gender")
    pub column: String,
    pub value: String,
}

/// Training matrix with class-index labels
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Class indices (see `SeverityLabel::index`)
    pub labels: Vec<usize>,

    /// Number of samples
    pub n_samples: usize,

    /// Number of features
    pub n_features: usize,
}

impl TrainingDataset {
    pub fn new(features: Array2<f64>, labels: Vec<usize>) -> Self {
        let n_samples = features.nrows();
        let n_features = features.ncols();
        Self {
            features,
            labels,
            n_samples,
            n_features,
        }
    }

    /// Count of samples per class index
    pub fn class_counts(&self) -> [usize; SeverityLabel::COUNT] {
        let mut counts = [0; SeverityLabel::COUNT];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Support-weighted F1 score
    pub f1_weighted: f64,

    /// Confusion matrix (rows = actual, columns = predicted)
    pub confusion_matrix: Option<Array2<usize>>,

    /// Per-class metrics keyed by label name
    pub per_class_metrics: HashMap<String, ClassMetrics>,

    /// Number of samples the metrics were computed on
    pub n_samples: usize,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            f1_weighted: 0.0,
            confusion_matrix: None,
            per_class_metrics: HashMap::new(),
            n_samples: 0,
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Cross-validation scores
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrossValidationScores {
    pub folds: usize,
    pub accuracy_scores: Vec<f64>,
    pub f1_scores: Vec<f64>,
    pub accuracy_mean: f64,
    pub accuracy_std: f64,
    pub f1_mean: f64,
    pub f1_std: f64,
}

/// Everything the classifier learned about its own quality during training
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingReport {
    /// Metrics on the held-out split (`None` when the split left no test rows)
    pub test_metrics: Option<ModelMetrics>,

    /// Stratified k-fold scores (`None` when classes are too small to fold)
    pub cross_validation: Option<CrossValidationScores>,

    /// Training rows per label name
    pub class_distribution: HashMap<String, usize>,

    pub n_train: usize,
    pub n_test: usize,
}

impl TrainingReport {
    /// Held-out accuracy, if a held-out split existed
    pub fn accuracy(&self) -> Option<f64> {
        self.test_metrics.as_ref().map(|m| m.accuracy)
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Feature set used
    pub feature_set: FeatureSet,

    /// Hyperparameters
    pub hyperparameters: HashMap<String, String>,
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Logistic regression
    LogisticRegression,

    /// Random forest
    RandomForest,

    /// Soft-voting ensemble
    Ensemble,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::LogisticRegression => write!(f, "Logistic Regression"),
            ModelType::RandomForest => write!(f, "Random Forest"),
            ModelType::Ensemble => write!(f, "Ensemble"),
        }
    }
}
