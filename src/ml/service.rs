use crate::error::Result;
use crate::ml::classifier::SeverityClassifier;
use crate::ml::models::{ClassifierConfig, Prediction, TrainingReport};
use crate::models::ComplaintInput;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared severity classifier.
///
/// Predictions take a read lock and run concurrently. Training builds a fresh
/// classifier outside the lock and swaps it in, so readers never see a
/// half-trained model.
#[derive(Clone)]
pub struct TriageService {
    config: ClassifierConfig,
    classifier: Arc<RwLock<SeverityClassifier>>,
    predictions_served: Arc<AtomicU64>,
    low_confidence: Arc<AtomicU64>,
}

impl TriageService {
    /// Create a service around an untrained classifier
    pub fn new(config: ClassifierConfig) -> Self {
        let classifier = SeverityClassifier::new(config.clone());
        Self::with_classifier(config, classifier)
    }

    /// Create a service around an existing classifier
    pub fn with_classifier(config: ClassifierConfig, classifier: SeverityClassifier) -> Self {
        Self {
            config,
            classifier: Arc::new(RwLock::new(classifier)),
            predictions_served: Arc::new(AtomicU64::new(0)),
            low_confidence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Train a new model from a CSV file and swap it in on success
    pub fn train_from_path(&self, path: &Path) -> Result<TrainingReport> {
        let mut fresh = SeverityClassifier::new(self.config.clone());
        let report = fresh.train(path)?;

        *self.classifier.write() = fresh;
        info!(path = %path.display(), "Severity model replaced");

        Ok(report)
    }

    /// Load a saved model and swap it in on success
    pub fn load_model(&self, path: &Path) -> Result<()> {
        let fresh = SeverityClassifier::from_file(path, self.config.clone())?;
        *self.classifier.write() = fresh;
        Ok(())
    }

    /// Save the current model
    pub fn save_model(&self, path: &Path) -> Result<()> {
        self.classifier.read().save(path)
    }

    /// Predict the severity of a complaint
    pub fn predict(&self, input: &ComplaintInput) -> Result<Prediction> {
        let prediction = self.classifier.read().predict(input)?;
        self.record(&prediction);
        Ok(prediction)
    }

    /// Predict a batch of complaints under a single read lock
    pub fn predict_batch(&self, inputs: &[ComplaintInput]) -> Result<Vec<Prediction>> {
        let predictions = self.classifier.read().predict_batch(inputs)?;
        predictions.iter().for_each(|p| self.record(p));
        Ok(predictions)
    }

    fn record(&self, prediction: &Prediction) {
        self.predictions_served.fetch_add(1, Ordering::Relaxed);

        if prediction.confidence < self.config.min_confidence {
            self.low_confidence.fetch_add(1, Ordering::Relaxed);
            debug!(
                label = %prediction.label,
                confidence = prediction.confidence,
                threshold = self.config.min_confidence,
                "Prediction confidence below threshold"
            );
        }
    }

    /// Metrics of the current model
    pub fn report(&self) -> Result<TrainingReport> {
        self.classifier.read().metrics().cloned()
    }

    /// Get service statistics
    pub fn stats(&self) -> TriageServiceStats {
        let classifier = self.classifier.read();
        let model = classifier.model();

        TriageServiceStats {
            trained: classifier.is_trained(),
            n_features: model.map(|m| m.extractor().n_features()).unwrap_or(0),
            vocab_size: model.map(|m| m.extractor().vocab_size()).unwrap_or(0),
            last_accuracy: classifier.metrics().ok().and_then(|r| r.accuracy()),
            predictions_served: self.predictions_served.load(Ordering::Relaxed),
            low_confidence_predictions: self.low_confidence.load(Ordering::Relaxed),
        }
    }
}

/// Triage service statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageServiceStats {
    pub trained: bool,
    pub n_features: usize,
    pub vocab_size: usize,
    pub last_accuracy: Option<f64>,
    pub predictions_served: u64,
    pub low_confidence_predictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TriageError;

    #[test]
    fn test_untrained_service() {
        let service = TriageService::new(ClassifierConfig::default());
        let stats = service.stats();

        assert!(!stats.trained);
        assert_eq!(stats.n_features, 0);
        assert_eq!(stats.last_accuracy, None);
        assert!(matches!(
            service.predict(&ComplaintInput::new("falta agua")),
            Err(TriageError::NotTrained(_))
        ));
        assert_eq!(service.stats().predictions_served, 0);
    }

    #[test]
    fn test_failed_load_keeps_model() {
        let service = TriageService::new(ClassifierConfig::default());
        assert!(service.load_model(Path::new("/no/such/model.bin")).is_err());
        assert!(!service.stats().trained);
    }
}
