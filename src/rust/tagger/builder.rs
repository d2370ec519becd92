use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use log::info;

use super::encoding::{PretrainedTokenizer, TextTokenizer, MAX_SEQUENCE_LENGTH};
use super::engine::{InferenceEngine, OnnxEngine};
use super::error::TaggerError;
use super::pipeline::{TaggingPipeline, DEFAULT_THRESHOLD};
use crate::runtime::RuntimeConfig;

/// A builder for constructing a [`TaggingPipeline`] with a fluent interface.
///
/// The tokenizer and engine either come from model files on disk or are
/// injected directly, which is how tests swap in stub implementations.
pub struct TaggerBuilder {
    tokenizer: Option<Arc<dyn TextTokenizer>>,
    engine: Option<Arc<dyn InferenceEngine>>,
    threshold: f32,
    max_length: usize,
    runtime_config: RuntimeConfig,
}

impl Default for TaggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TaggerBuilder {
    /// Creates a builder with the default threshold (0.25) and a 512 token limit
    pub fn new() -> Self {
        Self {
            tokenizer: None,
            engine: None,
            threshold: DEFAULT_THRESHOLD,
            max_length: MAX_SEQUENCE_LENGTH,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Sets the runtime configuration used when loading the model from disk.
    ///
    /// Must be called before [`with_model_files`](Self::with_model_files) to take effect.
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Minimum positive-class probability a token must exceed to become a tag
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Maximum number of tokens fed to the model, special tokens included.
    ///
    /// Set this before loading model files so the tokenizer truncates at the same length.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn TextTokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn InferenceEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Loads the ONNX model and `tokenizer.json` from local files.
    ///
    /// # Returns
    /// * `Result<Self, TaggerError>` - The builder instance if successful, or an error if:
    ///   - The paths are empty or the files don't exist
    ///   - A tokenizer or engine has already been set
    ///   - The tokenizer failed to load
    ///   - No execution backend could load the model
    ///   - The model does not declare the expected inputs and `logits` output
    pub fn with_model_files(
        mut self,
        model_path: impl AsRef<Path>,
        tokenizer_path: impl AsRef<Path>,
    ) -> Result<Self, TaggerError> {
        let model_path = model_path.as_ref();
        let tokenizer_path = tokenizer_path.as_ref();

        if model_path.as_os_str().is_empty() || tokenizer_path.as_os_str().is_empty() {
            return Err(TaggerError::BuildError("Model and tokenizer paths cannot be empty".to_string()));
        }
        if self.tokenizer.is_some() || self.engine.is_some() {
            return Err(TaggerError::BuildError("Model and tokenizer already set".to_string()));
        }
        if !model_path.exists() {
            return Err(TaggerError::BuildError(format!("Model file not found: {}", model_path.display())));
        }
        if !tokenizer_path.exists() {
            return Err(TaggerError::BuildError(format!("Tokenizer file not found: {}", tokenizer_path.display())));
        }

        let start = Instant::now();
        info!("Loading model from {}...", model_path.display());
        let engine = OnnxEngine::from_file(model_path, &self.runtime_config)?;
        info!("Model structure validated successfully (backend: {})", engine.backend());

        info!("Loading tokenizer from {}...", tokenizer_path.display());
        let tokenizer = PretrainedTokenizer::from_file(tokenizer_path, self.max_length)?;
        info!("Model and tokenizer loaded in {:.2?}", start.elapsed());

        self.engine = Some(Arc::new(engine));
        self.tokenizer = Some(Arc::new(tokenizer));
        Ok(self)
    }

    /// Builds and returns the final pipeline
    ///
    /// # Returns
    /// * `Result<TaggingPipeline, TaggerError>` - The pipeline if successful, or an error if:
    ///   - No tokenizer or engine is set
    ///   - The threshold is not a probability in `[0, 1]`
    ///   - The max length is zero
    pub fn build(self) -> Result<TaggingPipeline, TaggerError> {
        let tokenizer = self.tokenizer
            .ok_or_else(|| TaggerError::BuildError("No tokenizer loaded".into()))?;
        let engine = self.engine
            .ok_or_else(|| TaggerError::BuildError("No inference engine loaded".into()))?;

        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(TaggerError::BuildError(format!(
                "Threshold must be within [0, 1], got {}", self.threshold
            )));
        }
        if self.max_length == 0 {
            return Err(TaggerError::BuildError("Max length must be greater than zero".into()));
        }

        Ok(TaggingPipeline::from_parts(tokenizer, engine, self.threshold, self.max_length))
    }
}
