use std::path::{Path, PathBuf};
use std::fs;
use std::io;
use std::sync::Arc;
use std::env;
use std::ffi::OsString;
use tokio::sync::Mutex;
use reqwest;
use sha2::{Sha256, Digest};
use dirs;
use log;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("{file_type} file not found at {path} and offline mode forbids downloading it")]
    NotAvailableOffline {
        file_type: String,
        path: String,
    },
    #[error("{file_type} file not found at {path} and no download URL is configured")]
    MissingSource {
        file_type: String,
        path: String,
    },
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Verification of downloaded {0} file failed")]
    VerificationFailed(String),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

/// Where a single artifact lives locally and, optionally, where to fetch it from.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSource {
    /// Absolute path, path relative to the working directory, or path relative to the cache
    pub path: PathBuf,
    pub url: Option<String>,
    /// Expected lowercase hex SHA-256 digest
    pub sha256: Option<String>,
}

impl ArtifactSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            url: None,
            sha256: None,
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256.map(|h| h.to_ascii_lowercase());
        self
    }
}

/// The serialized network and the tokenizer vocabulary it was trained with.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub model: ArtifactSource,
    pub tokenizer: ArtifactSource,
}

/// Local files ready to be loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArtifacts {
    pub model_path: PathBuf,
    pub tokenizer_path: PathBuf,
}

/// Resolves model artifacts to local files, downloading them into the cache
/// directory unless running offline.
#[derive(Clone)]
pub struct ModelManager {
    cache_dir: PathBuf,
    offline: bool,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default cache directory
    pub fn new_default(offline: bool) -> Self {
        Self::new(Self::get_default_cache_dir(), offline)
    }

    /// Returns the default cache directory path
    pub fn get_default_cache_dir() -> PathBuf {
        Self::cache_dir_from(env::var_os("KEYTAG_CACHE"))
    }

    fn cache_dir_from(override_dir: Option<OsString>) -> PathBuf {
        // 1. Explicit override (KEYTAG_CACHE)
        if let Some(path) = override_dir.filter(|p| !p.is_empty()) {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("keytag");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("keytag");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("keytag")
    }

    /// The cache directory is only created once something is downloaded into it.
    pub fn new<P: AsRef<Path>>(cache_dir: P, offline: bool) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            offline,
            download_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Local path an artifact is read from.
    ///
    /// Absolute paths and relative paths that exist from the working directory
    /// are used as given; anything else lives inside the cache directory.
    pub fn local_path(&self, source: &ArtifactSource) -> PathBuf {
        if source.path.is_absolute() || source.path.exists() {
            source.path.clone()
        } else {
            self.cache_dir.join(&source.path)
        }
    }

    pub fn is_downloaded(&self, artifacts: &ModelArtifacts) -> bool {
        let model_path = self.local_path(&artifacts.model);
        let tokenizer_path = self.local_path(&artifacts.tokenizer);
        log::info!("Checking for local artifacts:");
        log::info!("  Model path: {:?} (exists: {})", model_path, model_path.exists());
        log::info!("  Tokenizer path: {:?} (exists: {})", tokenizer_path, tokenizer_path.exists());
        model_path.exists() && tokenizer_path.exists()
    }

    /// Ensures both artifacts exist locally and returns their paths.
    ///
    /// Offline, a missing or corrupted file is an error. Online, it is
    /// (re)downloaded from its URL when one is configured.
    pub async fn resolve(&self, artifacts: &ModelArtifacts) -> Result<ResolvedArtifacts, ModelError> {
        let model_path = self.ensure_artifact(&artifacts.model, "model").await?;
        let tokenizer_path = self.ensure_artifact(&artifacts.tokenizer, "tokenizer").await?;
        log::info!("Model and tokenizer ready to use");
        Ok(ResolvedArtifacts { model_path, tokenizer_path })
    }

    async fn ensure_artifact(&self, source: &ArtifactSource, file_type: &str) -> Result<PathBuf, ModelError> {
        let path = self.local_path(source);

        if path.exists() {
            let Some(expected) = source.sha256.as_deref() else {
                log::info!("Using {} file at {:?}", file_type, path);
                return Ok(path);
            };
            let actual = self.file_hash(&path)?;
            if actual == expected {
                log::info!("Existing {} file verified successfully", file_type);
                return Ok(path);
            }
            if self.offline || source.url.is_none() {
                return Err(ModelError::HashMismatch {
                    file_type: file_type.to_string(),
                    expected: expected.to_string(),
                    actual,
                });
            }
            log::warn!("{} file verification failed, redownloading", file_type);
        } else if self.offline {
            return Err(ModelError::NotAvailableOffline {
                file_type: file_type.to_string(),
                path: path.display().to_string(),
            });
        }

        let url = source.url.as_deref().ok_or_else(|| ModelError::MissingSource {
            file_type: file_type.to_string(),
            path: path.display().to_string(),
        })?;
        self.download_and_verify_file(url, &path, source.sha256.as_deref(), file_type).await?;
        Ok(path)
    }

    fn file_hash(&self, path: &Path) -> Result<String, ModelError> {
        log::info!("Verifying file: {:?}", path);
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    pub fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
        let hash = self.file_hash(path)?;
        log::debug!("Calculated hash: {}", hash);
        log::debug!("Expected hash:   {}", expected_hash);
        Ok(hash == expected_hash.to_ascii_lowercase())
    }

    async fn download_and_verify_file(
        &self,
        url: &str,
        path: &Path,
        expected_hash: Option<&str>,
        file_type: &str,
    ) -> Result<(), ModelError> {
        let _lock = self.download_lock.lock().await;

        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = reqwest::get(url).await?.error_for_status()?;
        log::info!("Download response status: {}", response.status());
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(expected) = expected_hash {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            let hash = format!("{:x}", hasher.finalize());
            if hash != expected {
                log::error!("{} hash mismatch: expected {}, got {}", file_type, expected, hash);
                return Err(ModelError::HashMismatch {
                    file_type: file_type.to_string(),
                    expected: expected.to_string(),
                    actual: hash,
                });
            }
        }

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Written beside the target, renamed into place once complete
        let partial = partial_path(path);
        log::info!("Writing {} bytes to {:?}", bytes.len(), partial);
        fs::write(&partial, &bytes)?;

        if let Some(expected) = expected_hash {
            if !self.verify_file(&partial, expected)? {
                let _ = fs::remove_file(&partial);
                return Err(ModelError::VerificationFailed(file_type.to_string()));
            }
        }
        fs::rename(&partial, path)?;

        log::info!("{} file downloaded successfully", file_type);
        Ok(())
    }

    /// Deletes cached copies of artifacts that can be downloaded again.
    ///
    /// Artifacts without a URL are left alone since they cannot be restored.
    pub fn remove_downloads(&self, artifacts: &ModelArtifacts) -> Result<(), ModelError> {
        for source in [&artifacts.model, &artifacts.tokenizer] {
            if source.url.is_none() {
                continue;
            }
            let path = self.local_path(source);
            if path.exists() {
                log::info!("Removing cached file {:?}", path);
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}
