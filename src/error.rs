use thiserror::Error;

/// Classifier error types
#[derive(Error, Debug)]
pub enum TriageError {
    /// Training data is missing, unreadable or malformed
    #[error("Data error: {0}")]
    Data(String),

    /// Severity label outside the expected label set
    #[error("Label error: {0}")]
    Label(String),

    /// Prediction or persistence attempted before training/loading
    #[error("Classifier not trained: {0}")]
    NotTrained(String),

    /// Persisted model artifact is corrupt or incompatible
    #[error("Model format error: {0}")]
    ModelFormat(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors (numerical backends, invariants)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TriageError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            TriageError::Data(_) => "DATA_ERROR",
            TriageError::Label(_) => "LABEL_ERROR",
            TriageError::NotTrained(_) => "NOT_TRAINED",
            TriageError::ModelFormat(_) => "MODEL_FORMAT_ERROR",
            TriageError::Io(_) => "IO_ERROR",
            TriageError::Configuration(_) => "CONFIGURATION_ERROR",
            TriageError::Validation(_) => "VALIDATION_ERROR",
            TriageError::Serialization(_) => "SERIALIZATION_ERROR",
            TriageError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the failure happened while reading training data
    pub fn is_data_failure(&self) -> bool {
        matches!(self, TriageError::Data(_) | TriageError::Label(_))
    }
}

/// Conversion from csv::Error
impl From<csv::Error> for TriageError {
    fn from(err: csv::Error) -> Self {
        TriageError::Data(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for TriageError {
    fn from(err: bincode::Error) -> Self {
        TriageError::ModelFormat(err.to_string())
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for TriageError {
    fn from(err: serde_json::Error) -> Self {
        TriageError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for TriageError {
    fn from(err: validator::ValidationErrors) -> Self {
        TriageError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for TriageError {
    fn from(err: config::ConfigError) -> Self {
        TriageError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(TriageError::Data("test".to_string()).error_code(), "DATA_ERROR");
        assert_eq!(TriageError::Label("test".to_string()).error_code(), "LABEL_ERROR");
        assert_eq!(
            TriageError::NotTrained("test".to_string()).error_code(),
            "NOT_TRAINED"
        );
        assert_eq!(
            TriageError::ModelFormat("test".to_string()).error_code(),
            "MODEL_FORMAT_ERROR"
        );
    }

    #[test]
    fn test_data_failures() {
        assert!(TriageError::Data("missing column".to_string()).is_data_failure());
        assert!(TriageError::Label("LOW".to_string()).is_data_failure());
        assert!(!TriageError::NotTrained("predict".to_string()).is_data_failure());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err: TriageError = io.into();
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}
