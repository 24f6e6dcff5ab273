use std::path::PathBuf;

use thiserror::Error;

/// Dataset or snapshot-publishing failures raised by `indexer::ingest`.
#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("dataset not found: {0}")]
    DatasetMissing(PathBuf),

    #[error("malformed dataset {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("column '{column}' not found in dataset (available: {available})")]
    MissingColumn { column: String, available: String },

    #[error("dataset {0} contains no rows")]
    EmptyDataset(PathBuf),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("failed to write index snapshot to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model failed: {0}")]
    Model(String),

    #[error("embedding model returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("embedding model returned an empty vector")]
    EmptyVector,
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("no index snapshot at {0}; run fashion-ingest first")]
    SnapshotMissing(PathBuf),

    #[error("index snapshot {path} is unreadable: {reason}")]
    SnapshotUnreadable { path: PathBuf, reason: String },

    #[error("index snapshot format v{found} is not supported (expected v{expected})")]
    UnsupportedFormat { found: u32, expected: u32 },

    #[error("index was built with embedding model '{snapshot}' but '{active}' is active")]
    EmbeddingMismatch { snapshot: String, active: String },

    #[error("prompt template is invalid: {0}")]
    InvalidTemplate(String),

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("request to {provider} timed out")]
    Timeout { provider: &'static str },

    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned {status}: {body}")]
    Status {
        provider: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{provider} returned a malformed response: {reason}")]
    Malformed {
        provider: &'static str,
        reason: String,
    },

    #[error("embedding task aborted: {0}")]
    Join(String),
}

impl ProviderError {
    /// The request URL is stripped: it may carry credentials.
    pub(crate) fn from_reqwest(provider: &'static str, err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_timeout() {
            Self::Timeout { provider }
        } else if err.is_decode() {
            Self::Malformed {
                provider,
                reason: err.to_string(),
            }
        } else {
            Self::Http {
                provider,
                source: err,
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter a question or query.")]
    EmptyQuery,

    #[error("Please select at least one fashion style.")]
    NoStyle,

    #[error("Please select at most {max} fashion styles ({selected} selected).")]
    TooManyStyles { selected: usize, max: usize },

    #[error("'{value}' is not a valid {field}.")]
    UnknownOption { field: &'static str, value: String },

    #[error("{field} must be between {min} and {max} (got {value}).")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub const PROVIDER_UNAVAILABLE: &str =
    "Error: the fashion assistant could not generate a reply right now. Please try again.";

/// Everything that can go wrong during one user interaction.
#[derive(Debug, Error)]
pub enum InteractionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl InteractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Pipeline(PipelineError::Configuration(_)) => "configuration",
            Self::Pipeline(PipelineError::Provider(_)) => "provider",
        }
    }

    /// Message shown to the end user. Configuration and provider details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Pipeline(PipelineError::Configuration(_)) => {
                "The recommendation service is not ready yet. Please try again later.".to_string()
            }
            Self::Pipeline(PipelineError::Provider(_)) => PROVIDER_UNAVAILABLE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages_are_user_facing() {
        let err = InteractionError::from(ValidationError::TooManyStyles {
            selected: 4,
            max: 3,
        });
        assert_eq!(err.kind(), "validation");
        assert_eq!(
            err.user_message(),
            "Please select at most 3 fashion styles (4 selected)."
        );
    }

    #[test]
    fn test_configuration_details_are_hidden() {
        let err = InteractionError::from(PipelineError::from(
            ConfigurationError::SnapshotMissing(PathBuf::from("/secret/path")),
        ));
        assert_eq!(err.kind(), "configuration");
        assert!(!err.user_message().contains("/secret/path"));
    }

    #[test]
    fn test_provider_details_are_hidden() {
        let err = InteractionError::from(PipelineError::from(ProviderError::Status {
            provider: "gemini",
            status: reqwest::StatusCode::FORBIDDEN,
            body: "API key AIza-upstream-detail not valid".to_string(),
        }));
        assert_eq!(err.kind(), "provider");
        assert_eq!(err.user_message(), PROVIDER_UNAVAILABLE);
    }
}
