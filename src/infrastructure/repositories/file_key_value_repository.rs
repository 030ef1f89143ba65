use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::errors::DomainError;
use crate::domain::repositories::key_value_repository::KeyValueRepository;
use crate::infrastructure::logging::logger;
use crate::infrastructure::persistence::file_system::{
    delete_file, read_json_file, write_json_file,
};

/// Key-value store persisted as one JSON object file
///
/// The file is read on first access and rewritten after every change.
pub struct FileKeyValueRepository {
    file: PathBuf,
    cache: Arc<Mutex<Option<BTreeMap<String, String>>>>,
}

impl FileKeyValueRepository {
    pub fn new(file: PathBuf) -> Self {
        tracing::info!("Key-value repository initialized with file: {:?}", file);

        Self {
            file,
            cache: Arc::new(Mutex::new(None)),
        }
    }

    async fn load(&self) -> Result<BTreeMap<String, String>, DomainError> {
        match read_json_file::<BTreeMap<String, String>>(&self.file).await {
            Ok(values) => Ok(values),
            Err(DomainError::NotFound(_)) => Ok(BTreeMap::new()),
            Err(error) => Err(error),
        }
    }

    async fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), DomainError> {
        if values.is_empty() {
            delete_file(&self.file).await
        } else {
            write_json_file(&self.file, values).await
        }
    }
}

#[async_trait]
impl KeyValueRepository for FileKeyValueRepository {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        let mut cache = self.cache.lock().await;
        if cache.is_none() {
            *cache = Some(self.load().await?);
        }

        Ok(cache.as_ref().and_then(|values| values.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), DomainError> {
        let mut cache = self.cache.lock().await;
        let mut values = match cache.take() {
            Some(values) => values,
            None => self.load().await?,
        };

        if values.get(key) == Some(&value) {
            *cache = Some(values);
            return Ok(());
        }

        values.insert(key.to_string(), value);
        if let Err(error) = self.persist(&values).await {
            logger::error(&format!("Failed to store key {}: {}", key, error));
            // Reload from disk on the next access
            return Err(error);
        }
        *cache = Some(values);
        Ok(())
    }

    async fn erase(&self, key: &str) -> Result<(), DomainError> {
        let mut cache = self.cache.lock().await;
        let mut values = match cache.take() {
            Some(values) => values,
            None => self.load().await?,
        };

        if values.remove(key).is_none() {
            *cache = Some(values);
            return Ok(());
        }

        if let Err(error) = self.persist(&values).await {
            logger::error(&format!("Failed to erase key {}: {}", key, error));
            return Err(error);
        }
        *cache = Some(values);
        Ok(())
    }
}
