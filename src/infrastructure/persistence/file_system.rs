use crate::domain::errors::DomainError;
use crate::infrastructure::logging::logger;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::{self as tokio_fs, create_dir_all, read_to_string};

/// Represents the data directory of the background manager
pub struct DataDirectory {
    root: PathBuf,
    binlog: PathBuf,
    backgrounds_cache: PathBuf,
    config: PathBuf,
}

impl DataDirectory {
    /// Create a new DataDirectory instance
    pub fn new(root: PathBuf) -> Self {
        let binlog = root.join("binlog.json");
        let backgrounds_cache = root.join("backgrounds_cache.json");
        let config = root.join("config.json");

        Self {
            root,
            binlog,
            backgrounds_cache,
            config,
        }
    }

    /// Initialize the data directory structure
    pub async fn initialize(&self) -> Result<(), DomainError> {
        tracing::info!("Initializing data directory at: {:?}", self.root);

        if !self.root.exists() {
            tracing::info!("Creating directory: {:?}", self.root);
            create_dir_all(&self.root).await.map_err(|e| {
                tracing::error!("Failed to create directory {:?}: {}", self.root, e);
                DomainError::InternalError(format!("Failed to create directory: {}", e))
            })?;
        }

        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Durable store of the id mark and the selected backgrounds
    pub fn binlog(&self) -> &Path {
        &self.binlog
    }

    /// Cache of server background records keyed by slug
    pub fn backgrounds_cache(&self) -> &Path {
        &self.backgrounds_cache
    }

    pub fn config(&self) -> &Path {
        &self.config
    }
}

/// Read a JSON file and deserialize it
///
/// A missing file is reported as `DomainError::NotFound`.
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T, DomainError> {
    logger::debug(&format!("Reading JSON file: {:?}", path));

    let contents = read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            DomainError::NotFound(format!("File not found: {}", path.display()))
        } else {
            logger::error(&format!("Failed to read file {:?}: {}", path, e));
            DomainError::InternalError(format!("Failed to read file: {}", e))
        }
    })?;

    serde_json::from_str(&contents).map_err(|e| {
        logger::error(&format!("Failed to parse JSON from file {:?}: {}", path, e));
        DomainError::InvalidData(format!("Invalid JSON: {}", e))
    })
}

/// Write a JSON file
///
/// The data is written to a sibling temporary file first and then renamed over
/// the target, so readers never observe a half-written file.
pub async fn write_json_file<T: Serialize>(path: &Path, data: &T) -> Result<(), DomainError> {
    logger::debug(&format!("Writing JSON file: {:?}", path));

    // Ensure the parent directory exists
    if let Some(parent) = path.parent() {
        create_dir_all(parent).await.map_err(|e| {
            logger::error(&format!(
                "Failed to create parent directory for {:?}: {}",
                path, e
            ));
            DomainError::InternalError(format!("Failed to create directory: {}", e))
        })?;
    }

    let json = serde_json::to_string_pretty(data).map_err(|e| {
        logger::error(&format!(
            "Failed to serialize to JSON for file {:?}: {}",
            path, e
        ));
        DomainError::InvalidData(format!("Failed to serialize to JSON: {}", e))
    })?;

    let temporary_path = path.with_extension("json.tmp");
    tokio_fs::write(&temporary_path, json).await.map_err(|e| {
        logger::error(&format!("Failed to write to file {:?}: {}", temporary_path, e));
        DomainError::InternalError(format!("Failed to write to file: {}", e))
    })?;

    tokio_fs::rename(&temporary_path, path).await.map_err(|e| {
        logger::error(&format!("Failed to replace file {:?}: {}", path, e));
        DomainError::InternalError(format!("Failed to replace file: {}", e))
    })?;

    Ok(())
}

/// Delete a file
pub async fn delete_file(path: &Path) -> Result<(), DomainError> {
    logger::debug(&format!("Deleting file: {:?}", path));

    if !path.exists() {
        return Ok(());
    }

    tokio_fs::remove_file(path).await.map_err(|e| {
        logger::error(&format!("Failed to delete file {:?}: {}", path, e));
        DomainError::InternalError(format!("Failed to delete file: {}", e))
    })?;

    Ok(())
}
