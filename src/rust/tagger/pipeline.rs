use std::sync::Arc;
use ndarray::{ArrayView3, Axis};
use log::{debug, info, warn};

use super::encoding::{EncodedInput, TextTokenizer};
use super::engine::InferenceEngine;
use super::error::TaggerError;
use super::scoring::{argmax_classes, class_probabilities, is_keyword, positions_above, POSITIVE_CLASS};

/// Tagging threshold tuned for news-article keywords.
pub const DEFAULT_THRESHOLD: f32 = 0.25;

/// Known input used for warm-up and health checks.
pub const CANARY_TEXT: &str = "Hello World";

/// Tags a healthy model produces for [`CANARY_TEXT`].
pub const CANARY_TAGS: [&str; 2] = ["Hello", "World"];

/// A stateless text-to-keywords pipeline over a shared tokenizer and model.
///
/// # Thread Safety
///
/// The tokenizer and engine are held behind `Arc` and never mutated after
/// construction, so one pipeline can serve every request thread:
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use keytag::TaggingPipeline;
/// use std::sync::Arc;
/// use std::thread;
///
/// let pipeline = Arc::new(TaggingPipeline::builder()
///     .with_model_files("onnx_model/model.onnx", "tokenizer/tokenizer.json")?
///     .build()?);
///
/// let worker = Arc::clone(&pipeline);
/// thread::spawn(move || {
///     let tags = worker.tag("Cats are popular pets.").unwrap();
///     println!("{}", tags.join(";"));
/// });
/// # Ok(())
/// # }
/// ```
pub struct TaggingPipeline {
    tokenizer: Arc<dyn TextTokenizer>,
    engine: Arc<dyn InferenceEngine>,
    threshold: f32,
    max_length: usize,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<TaggingPipeline>();
    }
};

impl std::fmt::Debug for TaggingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaggingPipeline")
            .field("threshold", &self.threshold)
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

impl TaggingPipeline {
    /// Creates a TaggerBuilder for fluent construction
    pub fn builder() -> super::builder::TaggerBuilder {
        super::builder::TaggerBuilder::new()
    }

    pub(crate) fn from_parts(
        tokenizer: Arc<dyn TextTokenizer>,
        engine: Arc<dyn InferenceEngine>,
        threshold: f32,
        max_length: usize,
    ) -> Self {
        Self { tokenizer, engine, threshold, max_length }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Tokenizes `text` into model input of at most `max_length` tokens.
    ///
    /// `text` is expected to be normalized already (newlines replaced, trimmed).
    pub fn preprocess(&self, text: &str) -> Result<EncodedInput, TaggerError> {
        let mut encoded = self.tokenizer.encode(text)?;
        if encoded.len() > self.max_length {
            debug!("Truncating {} tokens to {}", encoded.len(), self.max_length);
            encoded.truncate(self.max_length);
        }
        debug!("Encoded input into {} tokens", encoded.len());
        Ok(encoded)
    }

    /// Runs the model on `input` and returns the keyword tags in token order.
    pub fn infer(&self, input: &EncodedInput) -> Result<Vec<String>, TaggerError> {
        let logits = self.engine.run(input)?;
        self.select_tags(input, logits.view())
    }

    /// Thresholds the positive-class probability of every token and decodes the survivors.
    ///
    /// Duplicates are kept and order follows the token sequence. Only strings
    /// longer than one character made of alphabetic characters are returned.
    ///
    /// # Errors
    /// - `InferenceError` if `logits` is not `[1, input.len(), >=2]`
    /// - `InferenceError` if a selected token cannot be decoded
    pub fn select_tags(&self, input: &EncodedInput, logits: ArrayView3<f32>) -> Result<Vec<String>, TaggerError> {
        let (batch_size, sequence_length, num_classes) = logits.dim();
        if batch_size != 1 {
            return Err(TaggerError::InferenceError(format!(
                "Expected a batch of 1 sequence, model returned {}", batch_size
            )));
        }
        if num_classes <= POSITIVE_CLASS {
            return Err(TaggerError::InferenceError(format!(
                "Expected at least {} classes per token, model returned {}", POSITIVE_CLASS + 1, num_classes
            )));
        }
        if sequence_length != input.len() {
            return Err(TaggerError::InferenceError(format!(
                "Logits cover {} tokens but input has {}", sequence_length, input.len()
            )));
        }

        let logits = logits.index_axis(Axis(0), 0);
        let predicted = argmax_classes(logits).into_iter().filter(|&c| c == POSITIVE_CLASS).count();
        let probabilities = class_probabilities(logits, POSITIVE_CLASS);
        let selected = positions_above(&probabilities, self.threshold);
        debug!(
            "{} of {} tokens above threshold {} ({} by argmax)",
            selected.len(), sequence_length, self.threshold, predicted
        );

        let token_ids: Vec<i64> = input.token_ids().collect();
        let mut tags = Vec::with_capacity(selected.len());
        for position in selected {
            let decoded = self.tokenizer.decode(token_ids[position])?;
            if is_keyword(&decoded) {
                tags.push(decoded);
            }
        }
        Ok(tags)
    }

    /// Preprocesses and tags `text` in one call.
    pub fn tag(&self, text: &str) -> Result<Vec<String>, TaggerError> {
        let encoded = self.preprocess(text)?;
        self.infer(&encoded)
    }

    /// Runs the canary once so lazily initialized runtime state is loaded
    /// before the first request. Failures are logged and otherwise ignored.
    pub fn warm_up(&self) {
        info!("Warming up...");
        match self.tag(CANARY_TEXT) {
            Ok(tags) => debug!("Warm-up produced tags {:?}", tags),
            Err(e) => warn!("Warm-up inference failed, continuing: {}", e),
        }
        info!("Warm up done.");
    }

    /// Checks that the canary text still yields exactly [`CANARY_TAGS`].
    pub fn health_check(&self) -> Result<(), TaggerError> {
        let tags = self.tag(CANARY_TEXT)?;
        if tags == CANARY_TAGS {
            Ok(())
        } else {
            Err(TaggerError::HealthCheckError(format!(
                "expected {:?}, got {:?}", CANARY_TAGS, tags
            )))
        }
    }
}
