//! Model artifact: the trained pipeline, its encoders and its report, saved as one unit

use crate::error::{Result, TriageError};
use crate::ml::classifier::TrainedModel;
use crate::ml::models::{ModelMetadata, TrainingReport};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Tag written at the start of every artifact
pub const FORMAT_TAG: &str = "complaint-triage-model";

/// Artifact layout version; bumped whenever the serialized shape changes
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct ArtifactRef<'a> {
    format: &'a str,
    version: u32,
    model: &'a TrainedModel,
    report: &'a TrainingReport,
    metadata: &'a ModelMetadata,
}

/// A decoded and validated model artifact
#[derive(Debug, Deserialize)]
pub struct ModelArtifact {
    format: String,
    version: u32,
    pub model: TrainedModel,
    pub report: TrainingReport,
    pub metadata: ModelMetadata,
}

/// Serialize a trained model to `path`, creating parent directories
pub fn save(
    path: &Path,
    model: &TrainedModel,
    report: &TrainingReport,
    metadata: &ModelMetadata,
) -> Result<()> {
    let bytes = bincode::serialize(&ArtifactRef {
        format: FORMAT_TAG,
        version: FORMAT_VERSION,
        model,
        report,
        metadata,
    })
    .map_err(|e| TriageError::Serialization(format!("failed to encode model: {}", e)))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &bytes)?;

    info!(path = %path.display(), bytes = bytes.len(), "Model saved");
    Ok(())
}

/// Read and validate an artifact from `path`
pub fn load(path: &Path) -> Result<ModelArtifact> {
    let bytes = fs::read(path)?;
    let artifact = decode(&bytes)?;

    debug!(
        path = %path.display(),
        version = artifact.version,
        n_features = artifact.metadata.n_features,
        "Model artifact decoded"
    );
    Ok(artifact)
}

/// Decode and validate artifact bytes
pub fn decode(bytes: &[u8]) -> Result<ModelArtifact> {
    let artifact: ModelArtifact = bincode::deserialize(bytes)?;

    if artifact.format != FORMAT_TAG {
        return Err(TriageError::ModelFormat(format!(
            "unexpected artifact tag '{}'",
            artifact.format
        )));
    }
    if artifact.version != FORMAT_VERSION {
        return Err(TriageError::ModelFormat(format!(
            "unsupported artifact version {} (expected {})",
            artifact.version, FORMAT_VERSION
        )));
    }
    artifact.model.validate()?;

    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_is_a_format_error() {
        let err = decode(b"definitely not a model").unwrap_err();
        assert!(matches!(err, TriageError::ModelFormat(_)));
    }

    #[test]
    fn test_empty_is_a_format_error() {
        let err = decode(&[]).unwrap_err();
        assert!(matches!(err, TriageError::ModelFormat(_)));
    }

    #[test]
    fn test_truncated_artifact_is_a_format_error() {
        #[derive(Serialize)]
        struct Header<'a> {
            format: &'a str,
            version: u32,
        }
        let bytes = bincode::serialize(&Header {
            format: FORMAT_TAG,
            version: FORMAT_VERSION,
        })
        .unwrap();

        let err = decode(&bytes).unwrap_err();
        assert!(matches!(err, TriageError::ModelFormat(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load(Path::new("/nonexistent/dir/model.bin")).unwrap_err();
        assert!(matches!(err, TriageError::Io(_)));
    }
}
