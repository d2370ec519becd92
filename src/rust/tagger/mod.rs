//! Keyword tagging: tokenizer adapter, inference engine and the pipeline that joins them.

mod builder;
mod encoding;
mod engine;
mod error;
mod pipeline;
pub mod scoring;

pub use builder::TaggerBuilder;
pub use encoding::{EncodedInput, PretrainedTokenizer, TextTokenizer, MAX_SEQUENCE_LENGTH};
pub use engine::{InferenceEngine, OnnxEngine, INPUT_NAMES, LOGITS_OUTPUT};
pub use error::TaggerError;
pub use pipeline::{TaggingPipeline, CANARY_TAGS, CANARY_TEXT, DEFAULT_THRESHOLD};
