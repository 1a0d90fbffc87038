use crate::dataset;
use crate::error::{Result, TriageError};
use crate::ml::encoding::CategoricalEncoders;
use crate::ml::ensemble::{argmax, Classifier, SoftVotingEnsemble};
use crate::ml::evaluation::{calculate_metrics, cross_validate, effective_folds, stratified_split};
use crate::ml::features::{FeatureExtractor, FeatureVector};
use crate::ml::models::{
    ClassifierConfig, ModelMetadata, ModelType, Prediction, TrainingDataset, TrainingReport,
    UnseenCategory,
};
use crate::ml::persistence;
use crate::models::{ComplaintInput, ComplaintRecord, SeverityLabel};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};
use validator::Validate;

/// Fitted preprocessing and ensemble pipeline, plus the encoders fit alongside it
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainedModel {
    extractor: FeatureExtractor,
    encoders: CategoricalEncoders,
    ensemble: SoftVotingEnsemble,
}

impl TrainedModel {
    /// Fit the whole pipeline on labelled records
    pub fn fit(records: &[ComplaintRecord], config: &ClassifierConfig) -> Result<Self> {
        let labels = label_indices(records)?;

        let mut extractor = FeatureExtractor::new(config.feature_set, config.feature_config.clone());
        let (features, encoders) = extractor.fit_transform(records)?;
        let dataset = TrainingDataset::new(features, labels);

        let mut ensemble = SoftVotingEnsemble::new(&config.ensemble, config.seed);
        ensemble.train(&dataset)?;

        Ok(Self {
            extractor,
            encoders,
            ensemble,
        })
    }

    /// Class probabilities for each record, with the detected features and
    /// unseen categorical values of each row
    fn score(
        &self,
        records: &[ComplaintRecord],
    ) -> Result<(Array2<f64>, Vec<(FeatureVector, Vec<UnseenCategory>)>)> {
        let width = self.extractor.n_features();
        let mut flat = Vec::with_capacity(records.len() * width);
        let mut details = Vec::with_capacity(records.len());

        for record in records {
            let mut unseen = Vec::new();
            let (row, vector) = self
                .extractor
                .transform_record(record, &self.encoders, &mut unseen)?;
            flat.extend(row);
            details.push((vector, unseen));
        }

        let matrix = Array2::from_shape_vec((records.len(), width), flat)
            .map_err(|e| TriageError::Internal(format!("Failed to create feature array: {}", e)))?;
        let proba = self.ensemble.predict_proba(&matrix)?;

        Ok((proba, details))
    }

    /// Predicted class index per record
    fn predict_indices(&self, records: &[ComplaintRecord]) -> Result<Vec<usize>> {
        let (proba, _) = self.score(records)?;
        Ok(proba
            .outer_iter()
            .map(|row| argmax(&row.to_vec()))
            .collect())
    }

    /// Check internal consistency of a deserialized pipeline
    pub fn validate(&self) -> Result<()> {
        if !self.extractor.is_fitted() || !self.ensemble.is_trained() {
            return Err(TriageError::ModelFormat(
                "artifact holds an unfitted pipeline".to_string(),
            ));
        }
        if !self.ensemble.is_consistent() || self.extractor.n_features() != self.ensemble.n_features()
        {
            return Err(TriageError::ModelFormat(format!(
                "feature width mismatch: extractor produces {}, ensemble expects {}",
                self.extractor.n_features(),
                self.ensemble.n_features()
            )));
        }
        Ok(())
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }
}

fn label_indices(records: &[ComplaintRecord]) -> Result<Vec<usize>> {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            r.severity.map(|s| s.index()).ok_or_else(|| {
                TriageError::Data(format!("training record {} has no severity label", i))
            })
        })
        .collect()
}

fn subset(records: &[ComplaintRecord], indices: &[usize]) -> Vec<ComplaintRecord> {
    indices.iter().map(|&i| records[i].clone()).collect()
}

/// Everything a trained classifier holds
#[derive(Debug)]
struct TrainedState {
    model: TrainedModel,
    report: TrainingReport,
    metadata: ModelMetadata,
}

/// Severity classifier for citizen complaints.
///
/// Starts untrained; [`train`](Self::train) or [`load`](Self::load) move it to
/// the trained state. A failed train or load leaves the previous state as it was.
#[derive(Debug)]
pub struct SeverityClassifier {
    config: ClassifierConfig,
    state: Option<TrainedState>,
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl SeverityClassifier {
    /// Create an untrained classifier
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create a classifier from a saved model artifact
    pub fn from_file(path: &Path, config: ClassifierConfig) -> Result<Self> {
        let mut classifier = Self::new(config);
        classifier.load(path)?;
        Ok(classifier)
    }

    /// Train from a labelled CSV file
    pub fn train(&mut self, path: &Path) -> Result<TrainingReport> {
        let records = dataset::load_records(path, self.config.feature_set)?;
        self.train_on_records(&records)
    }

    /// Train from labelled records already in memory
    pub fn train_on_records(&mut self, records: &[ComplaintRecord]) -> Result<TrainingReport> {
        self.config.validate()?;
        dataset::validate_records(records)?;

        let config = &self.config;
        let labels = label_indices(records)?;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let (train_idx, test_idx) = stratified_split(&labels, config.test_size, &mut rng);
        let train_records = subset(records, &train_idx);

        info!(
            n_train = train_idx.len(),
            n_test = test_idx.len(),
            feature_set = ?config.feature_set,
            "Training severity classifier"
        );

        let model = TrainedModel::fit(&train_records, config)?;

        let test_metrics = if test_idx.is_empty() {
            debug!("Held-out split is empty, skipping test metrics");
            None
        } else {
            let test_records = subset(records, &test_idx);
            let predictions = model.predict_indices(&test_records)?;
            let y_true: Vec<usize> = test_idx.iter().map(|&i| labels[i]).collect();
            Some(calculate_metrics(&y_true, &predictions))
        };

        let cross_validation = match effective_folds(&labels, config.cv_folds) {
            Some(k) => Some(cross_validate(&labels, k, &mut rng, |train, test| {
                let fold_model = TrainedModel::fit(&subset(records, train), config)?;
                fold_model.predict_indices(&subset(records, test))
            })?),
            None => {
                debug!(
                    requested = config.cv_folds,
                    "Too few rows per class for cross-validation, skipping"
                );
                None
            }
        };

        let mut class_distribution = HashMap::new();
        for &i in &train_idx {
            if let Some(label) = SeverityLabel::from_index(labels[i]) {
                *class_distribution.entry(label.to_string()).or_insert(0) += 1;
            }
        }

        let report = TrainingReport {
            test_metrics,
            cross_validation,
            class_distribution,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
        };

        let metadata = ModelMetadata {
            name: "complaint-severity".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model_type: ModelType::Ensemble,
            trained_at: chrono::Utc::now(),
            n_training_samples: train_idx.len(),
            n_features: model.extractor.n_features(),
            feature_set: model.extractor.feature_set(),
            hyperparameters: self.hyperparameters(&model),
        };

        match &report.test_metrics {
            Some(m) => info!(
                accuracy = m.accuracy,
                f1_macro = m.f1_score,
                f1_weighted = m.f1_weighted,
                n_features = metadata.n_features,
                "Severity classifier trained"
            ),
            None => info!(
                n_features = metadata.n_features,
                "Severity classifier trained without a held-out split"
            ),
        }
        if let Some(cv) = &report.cross_validation {
            info!(
                folds = cv.folds,
                accuracy_mean = cv.accuracy_mean,
                accuracy_std = cv.accuracy_std,
                f1_mean = cv.f1_mean,
                f1_std = cv.f1_std,
                "Cross-validation complete"
            );
        }

        self.state = Some(TrainedState {
            model,
            report: report.clone(),
            metadata,
        });

        Ok(report)
    }

    fn hyperparameters(&self, model: &TrainedModel) -> HashMap<String, String> {
        let c = &self.config;
        [
            ("seed", c.seed.to_string()),
            ("test_size", c.test_size.to_string()),
            ("cv_folds", c.cv_folds.to_string()),
            ("max_vocab_size", c.feature_config.max_vocab_size.to_string()),
            ("ngram_range", format!("{:?}", c.feature_config.ngram_range)),
            ("n_trees", c.ensemble.n_trees.to_string()),
            ("max_depth", c.ensemble.max_depth.to_string()),
            ("logistic_alpha", c.ensemble.logistic_alpha.to_string()),
            ("forest_weight", c.ensemble.forest_weight.to_string()),
            ("age_median", model.extractor.age_median().to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn state(&self) -> Result<&TrainedState> {
        self.state.as_ref().ok_or_else(|| {
            TriageError::NotTrained("train or load a model before using it".to_string())
        })
    }

    /// Predict the severity of one complaint
    pub fn predict(&self, input: &ComplaintInput) -> Result<Prediction> {
        let mut predictions = self.predict_batch(std::slice::from_ref(input))?;
        predictions
            .pop()
            .ok_or_else(|| TriageError::Internal("empty prediction batch".to_string()))
    }

    /// Predict the severity of several complaints, preserving order
    pub fn predict_batch(&self, inputs: &[ComplaintInput]) -> Result<Vec<Prediction>> {
        let state = self.state()?;
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<ComplaintRecord> = inputs.iter().map(ComplaintInput::to_record).collect();
        let (proba, details) = state.model.score(&records)?;

        proba
            .outer_iter()
            .zip(details)
            .map(|(row, (vector, unseen))| {
                for category in &unseen {
                    warn!(
                        column = %category.column,
                        value = %category.value,
                        "Unseen category, using sentinel code"
                    );
                }

                let mut probs = row.to_vec();
                let total: f64 = probs.iter().sum();
                if total > 0.0 {
                    probs.iter_mut().for_each(|p| *p /= total);
                }

                let index = argmax(&probs);
                let label = SeverityLabel::from_index(index).ok_or_else(|| {
                    TriageError::Internal(format!("class index {} out of range", index))
                })?;

                let probabilities = SeverityLabel::ALL
                    .iter()
                    .map(|l| (l.to_string(), probs[l.index()]))
                    .collect();

                Ok(Prediction {
                    label,
                    confidence: probs[index],
                    probabilities,
                    detected_features: vector.detected(),
                    unseen_categories: unseen,
                })
            })
            .collect()
    }

    /// Metrics stored by the last successful train or load
    pub fn metrics(&self) -> Result<&TrainingReport> {
        Ok(&self.state()?.report)
    }

    /// Save the trained pipeline, encoders and metrics as one artifact
    pub fn save(&self, path: &Path) -> Result<()> {
        let state = self.state.as_ref().ok_or_else(|| {
            TriageError::NotTrained("cannot save an untrained classifier".to_string())
        })?;
        persistence::save(path, &state.model, &state.report, &state.metadata)
    }

    /// Replace the current model with one loaded from disk
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let artifact = persistence::load(path)?;

        info!(
            path = %path.display(),
            n_features = artifact.metadata.n_features,
            trained_at = %artifact.metadata.trained_at,
            "Model loaded"
        );

        self.state = Some(TrainedState {
            model: artifact.model,
            report: artifact.report,
            metadata: artifact.metadata,
        });
        Ok(())
    }

    /// Check if model is trained
    pub fn is_trained(&self) -> bool {
        self.state.is_some()
    }

    /// Get model metadata
    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.state.as_ref().map(|s| &s.metadata)
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.state.as_ref().map(|s| &s.model)
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}
