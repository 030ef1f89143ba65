mod command;
mod id_allocator;
mod manager;
mod pending_queries;
mod registry;
mod selection;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::application::dto::background_dto::{
    BackgroundDto, BackgroundsDto, FoundBackground, InputBackground, SelectedBackgroundUpdate,
};
use crate::application::errors::ApplicationError;
use crate::domain::models::background::{BackgroundId, FileSourceId, Theme};
use crate::domain::models::background_type::BackgroundType;
use crate::domain::repositories::background_remote_repository::BackgroundRemoteRepository;
use crate::domain::repositories::file_repository::FileRepository;
use crate::domain::repositories::key_value_repository::KeyValueRepository;
use crate::infrastructure::logging::logger;

use self::command::{BackgroundCommand, SearchOutcome};
use self::manager::BackgroundManager;

/// A search waits for at most this many cache or server fetches
const MAX_SEARCH_ROUNDS: usize = 3;

/// Receives the selected background of a theme every time it changes
pub trait BackgroundUpdateSink: Send + Sync {
    fn send_update(&self, update: SelectedBackgroundUpdate);
}

/// Collaborators of the background manager
pub struct BackgroundServiceDependencies {
    pub remote: Arc<dyn BackgroundRemoteRepository>,
    pub files: Arc<dyn FileRepository>,
    /// Durable store for the id mark and the theme selections
    pub binlog: Arc<dyn KeyValueRepository>,
    /// Record cache keyed by slug, `None` disables it
    pub cache: Option<Arc<dyn KeyValueRepository>>,
    pub update_sink: Arc<dyn BackgroundUpdateSink>,
    pub t_me_url: String,
}

/// Service handle for background selection and synchronization
///
/// Every call is forwarded to a single manager task that owns the state.
#[derive(Clone)]
pub struct BackgroundService {
    commands: mpsc::UnboundedSender<BackgroundCommand>,
    t_me_url: Arc<str>,
}

impl BackgroundService {
    /// Spawn the manager task. Must be called inside a tokio runtime.
    pub fn start(dependencies: BackgroundServiceDependencies) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let t_me_url: Arc<str> = Arc::from(dependencies.t_me_url.as_str());
        let manager = BackgroundManager::new(dependencies, commands.downgrade());
        tokio::spawn(manager.run(receiver));

        Self { commands, t_me_url }
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> BackgroundCommand,
    ) -> Result<T, ApplicationError> {
        let (responder, receiver) = oneshot::channel();
        self.commands.send(command(responder)).map_err(|_| {
            ApplicationError::Cancelled("Background manager is not running".to_string())
        })?;

        receiver.await.map_err(|_| {
            ApplicationError::Cancelled("Background manager dropped the request".to_string())
        })
    }

    /// Installed backgrounds as ordered for the theme, refreshed from the server
    pub async fn get_backgrounds(&self, theme: Theme) -> Result<BackgroundsDto, ApplicationError> {
        logger::debug("BackgroundService: Getting installed backgrounds");
        self.request(|responder| BackgroundCommand::GetBackgrounds { responder })
            .await??;
        self.request(|responder| BackgroundCommand::GetBackgroundsObject { theme, responder })
            .await
    }

    pub async fn get_background(
        &self,
        id: BackgroundId,
        theme: Theme,
    ) -> Result<Option<BackgroundDto>, ApplicationError> {
        self.request(|responder| BackgroundCommand::GetBackground {
            id,
            theme,
            responder,
        })
        .await
    }

    /// Shareable link of a background
    pub fn get_background_url(&self, name: &str, background_type: &BackgroundType) -> String {
        let mut url = format!("{}bg/", self.t_me_url);
        let link = background_type.link();
        if background_type.has_file() {
            url.push_str(name);
            if !link.is_empty() {
                url.push('?');
                url.push_str(&link);
            }
        } else {
            url.push_str(&link);
        }
        url
    }

    pub async fn reload_background(
        &self,
        background_id: i64,
        access_hash: i64,
    ) -> Result<(), ApplicationError> {
        let id = parse_background_id(background_id)?;
        self.request(|responder| BackgroundCommand::ReloadBackground {
            id,
            access_hash,
            responder,
        })
        .await?
    }

    /// Resolve a background name, fetching it from the cache or server if needed
    pub async fn search_background(&self, name: &str) -> Result<FoundBackground, ApplicationError> {
        logger::debug(&format!("BackgroundService: Searching background {}", name));

        for _ in 0..MAX_SEARCH_ROUNDS {
            let outcome = self
                .request(|responder| BackgroundCommand::SearchBackground {
                    name: name.to_string(),
                    responder,
                })
                .await??;

            match outcome {
                SearchOutcome::Found(found) => return Ok(found),
                SearchOutcome::Pending(receiver) => receiver.await.map_err(|_| {
                    ApplicationError::Cancelled("Background search was dropped".to_string())
                })??,
            }
        }

        Err(ApplicationError::NotFound(format!("Background {} not found", name)))
    }

    /// Select a background for a theme. `None` input with `None` type clears it.
    pub async fn set_background(
        &self,
        input: Option<InputBackground>,
        background_type: Option<BackgroundType>,
        theme: Theme,
    ) -> Result<Option<BackgroundDto>, ApplicationError> {
        logger::debug(&format!(
            "BackgroundService: Setting {} background from {:?}",
            theme, input
        ));

        let Some(id) = self
            .request(|responder| BackgroundCommand::SetBackground {
                input,
                background_type,
                theme,
                responder,
            })
            .await??
        else {
            return Ok(None);
        };

        self.get_background(id, theme).await
    }

    pub async fn remove_background(&self, background_id: i64) -> Result<(), ApplicationError> {
        let id = parse_background_id(background_id)?;
        self.request(|responder| BackgroundCommand::RemoveBackground { id, responder })
            .await?
    }

    pub async fn reset_backgrounds(&self) -> Result<(), ApplicationError> {
        self.request(|responder| BackgroundCommand::ResetBackgrounds { responder })
            .await?
    }

    /// Revalidation source for the file of a background
    pub async fn get_background_file_source_id(
        &self,
        background_id: i64,
        access_hash: i64,
    ) -> Result<Option<FileSourceId>, ApplicationError> {
        let id = parse_background_id(background_id)?;
        self.request(|responder| BackgroundCommand::GetFileSourceId {
            id,
            access_hash,
            responder,
        })
        .await
    }

    /// Selected background of both themes
    pub async fn get_current_state(&self) -> Result<Vec<SelectedBackgroundUpdate>, ApplicationError> {
        self.request(|responder| BackgroundCommand::GetCurrentState { responder })
            .await
    }

    /// Stop surfacing late failures. Outstanding work still completes.
    pub async fn shutdown(&self) -> Result<(), ApplicationError> {
        self.request(|responder| BackgroundCommand::Shutdown { responder })
            .await
    }
}

fn parse_background_id(background_id: i64) -> Result<BackgroundId, ApplicationError> {
    BackgroundId::from_raw(background_id).ok_or_else(|| {
        ApplicationError::ValidationError(format!(
            "Invalid background identifier {}",
            background_id
        ))
    })
}
