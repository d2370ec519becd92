use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur while tagging text.
///
/// The `Display` form of the request-stage variants is what `/tagger` returns
/// in its `error` field.
#[derive(Debug, Clone, PartialEq)]
pub enum TaggerError {
    /// The request payload is missing `source` or it is not a string
    MalformedInput(String),
    /// Tokenization of the source text failed
    PreprocessError(String),
    /// The inference engine failed or returned logits of an unexpected shape
    InferenceError(String),
    /// The canary input did not produce the expected tags
    HealthCheckError(String),
    /// Error occurred while loading the tokenizer, model or building the pipeline
    BuildError(String),
}

impl fmt::Display for TaggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInput(msg) => write!(f, "Malformed input: {}", msg),
            Self::PreprocessError(msg) => write!(f, "Failed to preprocess: {}", msg),
            Self::InferenceError(msg) => write!(f, "Failed to predict: {}", msg),
            Self::HealthCheckError(msg) => write!(f, "Health check failed: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
        }
    }
}

impl std::error::Error for TaggerError {}

impl From<OrtError> for TaggerError {
    fn from(err: OrtError) -> Self {
        TaggerError::BuildError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_prefixes() {
        assert_eq!(
            TaggerError::MalformedInput("missing field `source`".into()).to_string(),
            "Malformed input: missing field `source`"
        );
        assert_eq!(
            TaggerError::PreprocessError("bad".into()).to_string(),
            "Failed to preprocess: bad"
        );
        assert_eq!(
            TaggerError::InferenceError("bad".into()).to_string(),
            "Failed to predict: bad"
        );
    }
}
