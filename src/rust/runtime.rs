use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
    TensorRTExecutionProvider,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::Result as OrtResult;
use log::{info, warn};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::tagger::TaggerError;

static INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// An ONNX Runtime execution provider the session may be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionBackend {
    TensorRT,
    Cuda,
    Cpu,
}

impl ExecutionBackend {
    /// Fastest first, generic fallback last.
    pub const DEFAULT_PRIORITY: [ExecutionBackend; 3] =
        [ExecutionBackend::TensorRT, ExecutionBackend::Cuda, ExecutionBackend::Cpu];

    pub fn name(&self) -> &'static str {
        match self {
            Self::TensorRT => "tensorrt",
            Self::Cuda => "cuda",
            Self::Cpu => "cpu",
        }
    }

    fn is_available(&self) -> OrtResult<bool> {
        match self {
            Self::TensorRT => TensorRTExecutionProvider::default().is_available(),
            Self::Cuda => CUDAExecutionProvider::default().is_available(),
            Self::Cpu => CPUExecutionProvider::default().is_available(),
        }
    }

    fn dispatch(&self) -> ExecutionProviderDispatch {
        let dispatch = match self {
            Self::TensorRT => TensorRTExecutionProvider::default().build(),
            Self::Cuda => CUDAExecutionProvider::default().build(),
            Self::Cpu => CPUExecutionProvider::default().build(),
        };
        // Surface registration failures instead of silently running on CPU.
        dispatch.error_on_failure()
    }
}

impl fmt::Display for ExecutionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tensorrt" | "trt" => Ok(Self::TensorRT),
            "cuda" => Ok(Self::Cuda),
            "cpu" => Ok(Self::Cpu),
            other => Err(format!(
                "unknown execution backend '{}' (expected one of: tensorrt, cuda, cpu)",
                other
            )),
        }
    }
}

#[derive(Debug)]
pub struct RuntimeConfig {
    pub inter_threads: usize,
    pub intra_threads: usize,
    pub optimization_level: GraphOptimizationLevel,
    /// Tried in order; the first backend whose session commits wins.
    pub backends: Vec<ExecutionBackend>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            inter_threads: 0, // Let ONNX Runtime decide
            intra_threads: 0, // Let ONNX Runtime decide
            optimization_level: GraphOptimizationLevel::Level3,
            backends: ExecutionBackend::DEFAULT_PRIORITY.to_vec(),
        }
    }
}

impl Clone for RuntimeConfig {
    fn clone(&self) -> Self {
        Self {
            inter_threads: self.inter_threads,
            intra_threads: self.intra_threads,
            optimization_level: copy_level(&self.optimization_level),
            backends: self.backends.clone(),
        }
    }
}

fn copy_level(level: &GraphOptimizationLevel) -> GraphOptimizationLevel {
    match level {
        GraphOptimizationLevel::Level1 => GraphOptimizationLevel::Level1,
        GraphOptimizationLevel::Level2 => GraphOptimizationLevel::Level2,
        GraphOptimizationLevel::Level3 => GraphOptimizationLevel::Level3,
        GraphOptimizationLevel::Disable => GraphOptimizationLevel::Disable,
    }
}

fn init_onnx_environment() -> OrtResult<()> {
    ort::init()
        .with_name("keytag")
        .commit()?;
    Ok(())
}

/// Initialises the process-wide ONNX Runtime environment exactly once.
pub fn ensure_initialized() -> Result<(), TaggerError> {
    INIT.get_or_init(|| init_onnx_environment().map_err(|e| e.to_string()))
        .clone()
        .map_err(|e| TaggerError::BuildError(format!("Failed to initialize ONNX Runtime: {}", e)))
}

pub fn create_session_builder(config: &RuntimeConfig) -> Result<SessionBuilder, TaggerError> {
    ensure_initialized()?;
    let mut builder = Session::builder()?;

    // Configure threading
    if config.inter_threads > 0 {
        builder = builder.with_inter_threads(config.inter_threads)?;
    }
    if config.intra_threads > 0 {
        builder = builder.with_intra_threads(config.intra_threads)?;
    }

    builder = builder.with_optimization_level(copy_level(&config.optimization_level))?;

    Ok(builder)
}

/// Loads a session from `model_path`, trying each configured backend in order.
///
/// Each attempt starts from a fresh builder, since a failed registration consumes it.
/// Returns the session together with the backend it was bound to.
pub fn load_session(
    model_path: &Path,
    config: &RuntimeConfig,
) -> Result<(Session, ExecutionBackend), TaggerError> {
    if config.backends.is_empty() {
        return Err(TaggerError::BuildError("No execution backends configured".into()));
    }

    let mut failures = Vec::with_capacity(config.backends.len());
    for backend in &config.backends {
        match try_backend(model_path, config, *backend) {
            Ok(session) => {
                info!("Model session initialized on '{}' backend", backend);
                return Ok((session, *backend));
            }
            Err(e) => {
                warn!("Execution backend '{}' unavailable: {}", backend, e);
                failures.push(format!("{}: {}", backend, e));
            }
        }
    }

    Err(TaggerError::BuildError(format!(
        "No execution backend could load {}: [{}]",
        model_path.display(),
        failures.join("; ")
    )))
}

fn try_backend(
    model_path: &Path,
    config: &RuntimeConfig,
    backend: ExecutionBackend,
) -> Result<Session, TaggerError> {
    if !backend.is_available()? {
        return Err(TaggerError::BuildError("not available in this ONNX Runtime build".into()));
    }
    let session = create_session_builder(config)?
        .with_execution_providers([backend.dispatch()])?
        .commit_from_file(model_path)?;
    Ok(session)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("tensorrt".parse::<ExecutionBackend>(), Ok(ExecutionBackend::TensorRT));
        assert_eq!("TRT".parse::<ExecutionBackend>(), Ok(ExecutionBackend::TensorRT));
        assert_eq!(" CUDA ".parse::<ExecutionBackend>(), Ok(ExecutionBackend::Cuda));
        assert_eq!("cpu".parse::<ExecutionBackend>(), Ok(ExecutionBackend::Cpu));
        assert!("rocm".parse::<ExecutionBackend>().is_err());
    }

    #[test]
    fn test_backend_display_round_trips_through_parse() {
        for backend in ExecutionBackend::DEFAULT_PRIORITY {
            assert_eq!(backend.to_string().parse::<ExecutionBackend>(), Ok(backend));
        }
    }

    #[test]
    fn test_default_priority_ends_with_cpu() {
        let config = RuntimeConfig::default();
        assert_eq!(config.backends.first(), Some(&ExecutionBackend::TensorRT));
        assert_eq!(config.backends.last(), Some(&ExecutionBackend::Cpu));
        assert_eq!(config.clone().backends, config.backends);
    }

    #[test]
    fn test_every_backend_is_tried_in_order() {
        let dir = std::env::temp_dir().join("keytag-runtime-test");
        std::fs::create_dir_all(&dir).unwrap();
        let model_path = dir.join("model.onnx");
        std::fs::write(&model_path, b"not an onnx graph").unwrap();

        let config = RuntimeConfig {
            backends: vec![ExecutionBackend::Cuda, ExecutionBackend::Cpu],
            ..RuntimeConfig::default()
        };
        let message = match load_session(&model_path, &config) {
            Err(TaggerError::BuildError(message)) => message,
            other => panic!("expected a build error, got {:?}", other.map(|(_, backend)| backend)),
        };

        let cuda = message.find("cuda:").expect("cuda failure recorded");
        let cpu = message.find("cpu:").expect("cpu failure recorded");
        assert!(cuda < cpu, "failures out of order: {}", message);
        assert!(message.contains(&model_path.display().to_string()));
    }

    #[test]
    fn test_empty_backend_list_is_rejected() {
        let config = RuntimeConfig { backends: Vec::new(), ..RuntimeConfig::default() };
        let result = load_session(Path::new("missing.onnx"), &config);
        assert!(matches!(result, Err(TaggerError::BuildError(_))));
    }
}
