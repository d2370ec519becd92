//! A keyword tagging service: an ONNX token classifier that flags keyword
//! tokens in a document, served over HTTP.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use keytag::TaggingPipeline;
//!
//! let pipeline = TaggingPipeline::builder()
//!     .with_threshold(0.25)
//!     .with_model_files("onnx_model/model.onnx", "tokenizer/tokenizer.json")?
//!     .build()?;
//!
//! let tags = pipeline.tag("Cats are popular pets. Dogs are too.")?;
//! println!("Tags: {}", tags.join(";"));
//! # Ok(())
//! # }
//! ```
//!
//! # Custom Engines
//!
//! The pipeline only talks to the model through [`InferenceEngine`] and to the
//! vocabulary through [`TextTokenizer`], so either can be replaced:
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use ndarray::Array3;
//! use keytag::{EncodedInput, InferenceEngine, TaggerError, TaggingPipeline, TextTokenizer};
//!
//! struct Words(Vec<&'static str>);
//!
//! impl TextTokenizer for Words {
//!     fn encode(&self, text: &str) -> Result<EncodedInput, TaggerError> {
//!         let ids: Vec<u32> = text.split_whitespace()
//!             .map(|w| self.0.iter().position(|v| *v == w).unwrap_or(0) as u32)
//!             .collect();
//!         EncodedInput::from_parts(&ids, &vec![1; ids.len()], &vec![0; ids.len()])
//!     }
//!
//!     fn decode(&self, token_id: i64) -> Result<String, TaggerError> {
//!         Ok(self.0[token_id as usize].to_string())
//!     }
//! }
//!
//! struct AlwaysTag;
//!
//! impl InferenceEngine for AlwaysTag {
//!     fn run(&self, input: &EncodedInput) -> Result<Array3<f32>, TaggerError> {
//!         let mut logits = Array3::zeros((1, input.len(), 2));
//!         logits.slice_mut(ndarray::s![0, .., 1]).fill(5.0);
//!         Ok(logits)
//!     }
//! }
//!
//! let pipeline = TaggingPipeline::builder()
//!     .with_tokenizer(Arc::new(Words(vec!["[UNK]", "Hello", "World"])))
//!     .with_engine(Arc::new(AlwaysTag))
//!     .build()?;
//!
//! assert_eq!(pipeline.tag("Hello World")?, vec!["Hello", "World"]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod model_manager;
mod runtime;
pub mod service;
pub mod tagger;

pub use config::ServerConfig;
pub use model_manager::{ArtifactSource, ModelArtifacts, ModelError, ModelManager, ResolvedArtifacts};
pub use runtime::{create_session_builder, load_session, ExecutionBackend, RuntimeConfig};
pub use service::TaggerServer;
pub use tagger::{
    EncodedInput, InferenceEngine, OnnxEngine, PretrainedTokenizer, TaggerBuilder, TaggerError,
    TaggingPipeline, TextTokenizer,
};

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();
}
