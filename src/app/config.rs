use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::infrastructure::persistence::file_system::read_json_file;

const DEFAULT_T_ME_URL: &str = "https://t.me/";
const DEFAULT_LOG_DIR: &str = "logs";

/// Settings read from `config.json` in the data root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Keep server background records in the on-disk cache
    pub use_file_db: bool,
    /// Prefix of shareable background links
    pub t_me_url: String,
    /// Relative paths are resolved against the data root
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            use_file_db: true,
            t_me_url: DEFAULT_T_ME_URL.to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl AppConfig {
    pub async fn load(path: &Path) -> Result<Self, DomainError> {
        match read_json_file::<AppConfig>(path).await {
            Ok(config) => Ok(config.normalized()),
            Err(DomainError::NotFound(_)) => {
                tracing::info!("No config at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(error) => Err(error),
        }
    }

    pub fn log_dir(&self, data_root: &Path) -> PathBuf {
        if self.log_dir.is_absolute() {
            self.log_dir.clone()
        } else {
            data_root.join(&self.log_dir)
        }
    }

    fn normalized(mut self) -> Self {
        if self.t_me_url.trim().is_empty() {
            self.t_me_url = DEFAULT_T_ME_URL.to_string();
        }
        if !self.t_me_url.ends_with('/') {
            self.t_me_url.push('/');
        }
        self
    }
}
