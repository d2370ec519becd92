use std::collections::HashMap;
use std::path::Path;
use ndarray::{Array3, Ix3};
use ort::session::Session;
use ort::value::Tensor;
use log::debug;

use super::encoding::EncodedInput;
use super::error::TaggerError;
use crate::runtime::{load_session, ExecutionBackend, RuntimeConfig};

/// Input names the exported token-classification model declares.
pub const INPUT_NAMES: [&str; 3] = ["input_ids", "attention_mask", "token_type_ids"];

/// Name of the model output holding per-token class logits.
pub const LOGITS_OUTPUT: &str = "logits";

/// Runs the token classifier on one encoded sequence.
///
/// Implementations must be reentrant: a single engine is shared by every
/// request thread without locking.
pub trait InferenceEngine: Send + Sync {
    /// Returns logits shaped `[batch_size=1, sequence_length, num_classes]`.
    fn run(&self, input: &EncodedInput) -> Result<Array3<f32>, TaggerError>;
}

/// An [`InferenceEngine`] backed by an ONNX Runtime session.
#[derive(Debug)]
pub struct OnnxEngine {
    session: Session,
    backend: ExecutionBackend,
}

impl OnnxEngine {
    /// Loads the model, binding it to the first configured backend that initializes.
    ///
    /// # Errors
    /// - `BuildError` if no backend can load the model
    /// - `BuildError` if the model lacks the expected inputs or the `logits` output
    pub fn from_file(model_path: &Path, config: &RuntimeConfig) -> Result<Self, TaggerError> {
        let (session, backend) = load_session(model_path, config)?;
        Self::validate_model(&session)?;
        Ok(Self { session, backend })
    }

    /// The execution backend the session ended up on
    pub fn backend(&self) -> ExecutionBackend {
        self.backend
    }

    fn validate_model(session: &Session) -> Result<(), TaggerError> {
        for name in INPUT_NAMES {
            if !session.inputs.iter().any(|input| input.name == name) {
                return Err(TaggerError::BuildError(format!(
                    "Model is missing required input '{}' (found: {:?})",
                    name,
                    session.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>()
                )));
            }
        }

        if !session.outputs.iter().any(|output| output.name == LOGITS_OUTPUT) {
            return Err(TaggerError::BuildError(format!(
                "Model must have a '{}' output",
                LOGITS_OUTPUT
            )));
        }

        Ok(())
    }
}

impl InferenceEngine for OnnxEngine {
    fn run(&self, input: &EncodedInput) -> Result<Array3<f32>, TaggerError> {
        let tensor = |array: &ndarray::Array2<i64>, name: &str| {
            Tensor::from_array(array.clone())
                .map_err(|e| TaggerError::InferenceError(format!("Failed to create {} tensor: {}", name, e)))
        };

        let mut input_tensors = HashMap::new();
        input_tensors.insert(INPUT_NAMES[0], tensor(&input.input_ids, INPUT_NAMES[0])?);
        input_tensors.insert(INPUT_NAMES[1], tensor(&input.attention_mask, INPUT_NAMES[1])?);
        input_tensors.insert(INPUT_NAMES[2], tensor(&input.token_type_ids, INPUT_NAMES[2])?);

        let outputs = self.session.run(input_tensors)
            .map_err(|e| TaggerError::InferenceError(format!("Failed to run model: {}", e)))?;
        let logits = outputs[LOGITS_OUTPUT].try_extract_tensor::<f32>()
            .map_err(|e| TaggerError::InferenceError(format!("Failed to extract logits: {}", e)))?;
        debug!("Model returned logits of shape {:?}", logits.shape());

        let logits = logits.into_dimensionality::<Ix3>()
            .map_err(|e| TaggerError::InferenceError(format!("Unexpected logits rank: {}", e)))?;
        Ok(logits.to_owned())
    }
}
