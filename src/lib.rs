//! Severity triage for Spanish-language citizen health complaints.
//!
//! A [`SeverityClassifier`] is trained from a labelled CSV and labels new
//! complaints `GRAVE` or `MODERADO`, with a confidence score and the full class
//! distribution.

pub mod config;
pub mod dataset;
pub mod error;
pub mod ml;
pub mod models;

pub use config::Config;
pub use dataset::{load_records, DatasetSummary};
pub use error::{Result, TriageError};
pub use ml::{
    ClassifierConfig, FeatureSet, Prediction, SeverityClassifier, TrainingReport, TriageService,
};
pub use models::{ComplaintInput, ComplaintRecord, SeverityLabel};
