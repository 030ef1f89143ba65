use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::application::dto::background_dto::SelectedBackgroundUpdate;
use crate::application::services::background_service::BackgroundService;
use crate::domain::errors::DomainError;
use crate::domain::repositories::background_remote_repository::BackgroundRemoteRepository;
use crate::domain::repositories::file_repository::FileRepository;
use crate::infrastructure::broadcast_update_sink::BroadcastUpdateSink;
use crate::infrastructure::logging::logger;
use crate::infrastructure::persistence::file_system::DataDirectory;

mod bootstrap;
pub mod config;

use config::AppConfig;

pub struct AppState {
    pub data_directory: DataDirectory,
    pub config: AppConfig,
    pub background_service: Arc<BackgroundService>,
    update_sink: Arc<BroadcastUpdateSink>,
}

impl AppState {
    /// Build the background manager over the data root. Must be called inside
    /// a tokio runtime.
    pub async fn new(
        data_root: &Path,
        remote: Arc<dyn BackgroundRemoteRepository>,
        files: Arc<dyn FileRepository>,
    ) -> Result<Self, DomainError> {
        let data_directory = bootstrap::initialize_data_directory(data_root).await?;
        let config = AppConfig::load(data_directory.config()).await?;

        let log_dir = config.log_dir(data_directory.root());
        if let Err(error) = logger::init_logger(&log_dir) {
            eprintln!("Failed to initialize logger: {}", error);
        }

        tracing::info!("Data root directory: {:?}", data_directory.root());

        let services = bootstrap::build_services(&config, &data_directory, remote, files);

        Ok(Self {
            data_directory,
            config,
            background_service: services.background_service,
            update_sink: services.update_sink,
        })
    }

    /// Receive every change of a theme's selected background
    pub fn subscribe_updates(&self) -> broadcast::Receiver<SelectedBackgroundUpdate> {
        self.update_sink.subscribe()
    }
}
