use async_trait::async_trait;

use crate::domain::errors::DomainError;

/// String key-value persistence
#[async_trait]
pub trait KeyValueRepository: Send + Sync {
    /// Get a value, `None` when the key is absent
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError>;

    async fn set(&self, key: &str, value: String) -> Result<(), DomainError>;

    async fn erase(&self, key: &str) -> Result<(), DomainError>;
}
