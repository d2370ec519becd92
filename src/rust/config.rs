use std::path::PathBuf;
use clap::Parser;
use ort::session::builder::GraphOptimizationLevel;

use crate::model_manager::{ArtifactSource, ModelArtifacts};
use crate::runtime::{ExecutionBackend, RuntimeConfig};
use crate::tagger::{DEFAULT_THRESHOLD, MAX_SEQUENCE_LENGTH};

/// Startup configuration for the tagging server.
///
/// Every flag can also be set through the environment variable named next to it.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ServerConfig {
    /// Address to bind the HTTP server
    #[arg(long, env = "KEYTAG_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP port
    #[arg(long, env = "KEYTAG_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Number of request worker threads
    #[arg(long, env = "KEYTAG_THREADS", default_value_t = 8, value_parser = clap::value_parser!(u16).range(1..))]
    pub threads: u16,

    /// Serialized ONNX token-classification model
    #[arg(long, env = "KEYTAG_MODEL_PATH", default_value = "onnx_model/model.onnx")]
    pub model_path: PathBuf,

    /// Tokenizer vocabulary (`tokenizer.json`)
    #[arg(long, env = "KEYTAG_TOKENIZER_PATH", default_value = "tokenizer/tokenizer.json")]
    pub tokenizer_path: PathBuf,

    /// URL the model is downloaded from when missing locally
    #[arg(long, env = "KEYTAG_MODEL_URL")]
    pub model_url: Option<String>,

    /// URL the tokenizer is downloaded from when missing locally
    #[arg(long, env = "KEYTAG_TOKENIZER_URL")]
    pub tokenizer_url: Option<String>,

    /// Expected SHA-256 of the model file
    #[arg(long, env = "KEYTAG_MODEL_SHA256")]
    pub model_sha256: Option<String>,

    /// Expected SHA-256 of the tokenizer file
    #[arg(long, env = "KEYTAG_TOKENIZER_SHA256")]
    pub tokenizer_sha256: Option<String>,

    /// Directory relative artifact paths are resolved in and downloads are stored to
    #[arg(long, env = "KEYTAG_CACHE")]
    pub cache_dir: Option<PathBuf>,

    /// Never fetch artifacts over the network
    #[arg(long, env = "KEYTAG_OFFLINE", value_parser = clap::builder::FalseyValueParser::new())]
    pub offline: bool,

    /// Force a fresh download of artifacts that have a URL
    #[arg(short, long)]
    pub fresh: bool,

    /// Execution backends in priority order; the first that initializes is used
    #[arg(long, env = "KEYTAG_BACKENDS", value_delimiter = ',', default_values_t = ExecutionBackend::DEFAULT_PRIORITY)]
    pub backends: Vec<ExecutionBackend>,

    /// Minimum positive-class probability for a token to become a tag
    #[arg(long, env = "KEYTAG_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f32,

    /// Maximum number of tokens passed to the model
    #[arg(long, env = "KEYTAG_MAX_LENGTH", default_value_t = MAX_SEQUENCE_LENGTH)]
    pub max_length: usize,

    /// ONNX Runtime intra-op threads (0 lets the runtime decide)
    #[arg(long, env = "KEYTAG_INTRA_THREADS", default_value_t = 0)]
    pub intra_threads: usize,

    /// ONNX Runtime inter-op threads (0 lets the runtime decide)
    #[arg(long, env = "KEYTAG_INTER_THREADS", default_value_t = 0)]
    pub inter_threads: usize,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn artifacts(&self) -> ModelArtifacts {
        ModelArtifacts {
            model: ArtifactSource::new(&self.model_path)
                .with_url(self.model_url.clone())
                .with_sha256(self.model_sha256.clone()),
            tokenizer: ArtifactSource::new(&self.tokenizer_path)
                .with_url(self.tokenizer_url.clone())
                .with_sha256(self.tokenizer_sha256.clone()),
        }
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            inter_threads: self.inter_threads,
            intra_threads: self.intra_threads,
            optimization_level: GraphOptimizationLevel::Level3,
            backends: self.backends.clone(),
        }
    }
}
