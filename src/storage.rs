use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boundary to the blob-storage collaborator. The production service
/// issues signed upload/download URLs; the pipeline only ever reads
/// objects back by key and never mutates them.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Allocate a storage key for a new upload.
    fn generate_key(&self, filename: &str) -> String;

    /// URL the client PUTs the raw bytes to.
    async fn presign_upload(&self, key: &str) -> Result<String, StorageError>;

    /// URL the owner can fetch the original bytes from.
    async fn presign_download(&self, key: &str) -> Result<String, StorageError>;

    /// Fetch object bytes for processing.
    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Filesystem-rooted implementation used for local deployments and
/// tests. Keys are laid out as documents/<uuid>.<ext> under the upload
/// root.
#[derive(Clone)]
pub struct LocalStorage {
    upload_path: String,
}

impl LocalStorage {
    pub fn new(upload_path: String) -> Self {
        Self { upload_path }
    }

    /// Initialize the upload directory structure
    pub async fn initialize_directory_structure(&self) -> Result<(), StorageError> {
        let base_path = Path::new(&self.upload_path);

        for dir in ["documents", "temp"] {
            let dir_path = base_path.join(dir);
            if let Err(e) = fs::create_dir_all(&dir_path).await {
                error!("Failed to create directory {:?}: {}", dir_path, e);
                return Err(StorageError::Io(e));
            }
            info!("Ensured directory exists: {:?}", dir_path);
        }

        Ok(())
    }

    fn resolve(&self, key: &str) -> PathBuf {
        Path::new(&self.upload_path).join(key)
    }
}

#[async_trait]
impl StorageService for LocalStorage {
    fn generate_key(&self, filename: &str) -> String {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("bin");
        format!("documents/{}.{}", Uuid::new_v4(), extension)
    }

    async fn presign_upload(&self, key: &str) -> Result<String, StorageError> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(format!("file://{}", path.display()))
    }

    async fn presign_download(&self, key: &str) -> Result<String, StorageError> {
        let path = self.resolve(key);
        if !path.exists() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(format!("file://{}", path.display()))
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
