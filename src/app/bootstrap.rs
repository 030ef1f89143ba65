use std::path::Path;
use std::sync::Arc;

use crate::application::services::background_service::{
    BackgroundService, BackgroundServiceDependencies,
};
use crate::domain::errors::DomainError;
use crate::domain::repositories::background_remote_repository::BackgroundRemoteRepository;
use crate::domain::repositories::file_repository::FileRepository;
use crate::domain::repositories::key_value_repository::KeyValueRepository;
use crate::infrastructure::broadcast_update_sink::BroadcastUpdateSink;
use crate::infrastructure::persistence::file_system::DataDirectory;
use crate::infrastructure::repositories::file_key_value_repository::FileKeyValueRepository;

use super::config::AppConfig;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

pub(super) struct AppServices {
    pub background_service: Arc<BackgroundService>,
    pub update_sink: Arc<BroadcastUpdateSink>,
}

struct AppRepositories {
    binlog: Arc<dyn KeyValueRepository>,
    cache: Option<Arc<dyn KeyValueRepository>>,
}

pub(super) async fn initialize_data_directory(
    data_root: &Path,
) -> Result<DataDirectory, DomainError> {
    let data_directory = DataDirectory::new(data_root.to_path_buf());
    data_directory.initialize().await?;
    Ok(data_directory)
}

pub(super) fn build_services(
    config: &AppConfig,
    data_directory: &DataDirectory,
    remote: Arc<dyn BackgroundRemoteRepository>,
    files: Arc<dyn FileRepository>,
) -> AppServices {
    let repositories = build_repositories(config, data_directory);
    let update_sink = Arc::new(BroadcastUpdateSink::new(UPDATE_CHANNEL_CAPACITY));

    let background_service = Arc::new(BackgroundService::start(BackgroundServiceDependencies {
        remote,
        files,
        binlog: repositories.binlog,
        cache: repositories.cache,
        update_sink: update_sink.clone(),
        t_me_url: config.t_me_url.clone(),
    }));

    AppServices {
        background_service,
        update_sink,
    }
}

fn build_repositories(config: &AppConfig, data_directory: &DataDirectory) -> AppRepositories {
    let binlog: Arc<dyn KeyValueRepository> = Arc::new(FileKeyValueRepository::new(
        data_directory.binlog().to_path_buf(),
    ));

    let cache = if config.use_file_db {
        let cache: Arc<dyn KeyValueRepository> = Arc::new(FileKeyValueRepository::new(
            data_directory.backgrounds_cache().to_path_buf(),
        ));
        Some(cache)
    } else {
        tracing::info!("Background cache is disabled");
        None
    };

    AppRepositories { binlog, cache }
}
