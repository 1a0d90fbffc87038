/// Machine learning pipeline for complaint severity triage
///
/// This module provides:
/// - Spanish text normalisation and keyword detection
/// - TF-IDF vectorisation and engineered demographic/geographic features
/// - A soft-voting ensemble of a bagged decision-tree forest and logistic regression
/// - Stratified evaluation (hold-out split and k-fold cross-validation)
/// - Model persistence as a single artifact

pub mod classifier;
pub mod encoding;
pub mod ensemble;
pub mod evaluation;
pub mod features;
pub mod models;
pub mod persistence;
pub mod service;
pub mod text;
pub mod vectorizer;

pub use classifier::{SeverityClassifier, TrainedModel};
pub use encoding::{CategoricalEncoders, LabelEncoder, StandardScaler};
pub use ensemble::{Classifier, LogisticModel, RandomForest, SoftVotingEnsemble};
pub use features::{city_population, FeatureExtractor, FeatureVector};
pub use models::{
    ClassMetrics, ClassifierConfig, CrossValidationScores, DetectedFeatures, EnsembleConfig,
    FeatureConfig, FeatureSet, ModelMetadata, ModelMetrics, ModelType, Prediction,
    TrainingDataset, TrainingReport, UnseenCategory,
};
pub use service::{TriageService, TriageServiceStats};
pub use text::{TextPreprocessor, Topic};
pub use vectorizer::TfidfVectorizer;
