use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
    sync::{Arc, Mutex},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("refusing storage path `{0}`")]
    InvalidPath(String),
    #[error("storage io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

// 1. StorageService Contract
/// StorageService
///
/// Abstract contract over the file store that holds uploaded media. Paths are always
/// relative (`uploads/<dir>/<name>`), the same string that is persisted on the owning
/// record and appended to the base URL. Lets the handlers run against the local disk in
/// production and against an in-memory mock in tests.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Writes `data` at `relative_path`, creating parent directories as needed.
    async fn write(&self, relative_path: &str, data: Bytes) -> Result<(), StorageError>;

    /// Removes the file. Returns `Ok(false)` when nothing was there, which callers
    /// treat as success.
    async fn remove(&self, relative_path: &str) -> Result<bool, StorageError>;

    async fn exists(&self, relative_path: &str) -> bool;
}

/// StorageState
///
/// The concrete type used to share the storage service across the application state.
pub type StorageState = Arc<dyn StorageService>;

// 2. The Real Implementation (local disk)
/// LocalDiskStorage
///
/// Stores files below `root`. The same directory is mounted read-only under
/// `/uploads` by the router, so `root` must be the parent of `uploads/`.
#[derive(Clone, Debug)]
pub struct LocalDiskStorage {
    root: PathBuf,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `relative_path` onto the root after `validate_relative_path`.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, StorageError> {
        validate_relative_path(relative_path)?;
        Ok(self.root.join(relative_path))
    }
}

#[async_trait]
impl StorageService for LocalDiskStorage {
    async fn write(&self, relative_path: &str, data: Bytes) -> Result<(), StorageError> {
        let target = self.resolve(relative_path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;
        Ok(())
    }

    async fn remove(&self, relative_path: &str) -> Result<bool, StorageError> {
        let target = self.resolve(relative_path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, relative_path: &str) -> bool {
        match self.resolve(relative_path) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// validate_relative_path
///
/// Path traversal guard. Only plain, forward-slash separated, relative segments are
/// accepted: no `..`, no `.`, no root, no drive prefix, no backslash.
pub fn validate_relative_path(relative_path: &str) -> Result<(), StorageError> {
    let refuse = || StorageError::InvalidPath(relative_path.to_string());

    if relative_path.is_empty() || relative_path.contains('\\') {
        return Err(refuse());
    }

    for component in Path::new(relative_path).components() {
        if !matches!(component, Component::Normal(_)) {
            return Err(refuse());
        }
    }

    Ok(())
}

// 3. The Mock Implementation (For Unit Tests)
/// MockStorageService
///
/// In-memory store used by the test-suite. Keeps the written bytes so assertions can
/// check that files were created and cleaned up.
#[derive(Clone, Default)]
pub struct MockStorageService {
    /// When true, all operations return a simulated failure.
    pub should_fail: bool,
    files: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Seeds a file without going through an upload.
    pub fn insert(&self, relative_path: &str, data: impl Into<Bytes>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(relative_path.to_string(), data.into());
        }
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.files
            .lock()
            .map(|files| files.contains_key(relative_path))
            .unwrap_or(false)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().map(|files| files.len()).unwrap_or(0)
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .files
            .lock()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    fn failure(&self) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Unavailable(
                "Mock Storage Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn write(&self, relative_path: &str, data: Bytes) -> Result<(), StorageError> {
        self.failure()?;
        validate_relative_path(relative_path)?;
        self.insert(relative_path, data);
        Ok(())
    }

    async fn remove(&self, relative_path: &str) -> Result<bool, StorageError> {
        self.failure()?;
        validate_relative_path(relative_path)?;
        let mut files = self
            .files
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(files.remove(relative_path).is_some())
    }

    async fn exists(&self, relative_path: &str) -> bool {
        !self.should_fail && self.contains(relative_path)
    }
}
