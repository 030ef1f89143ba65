mod search;
mod startup;
mod upload;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, WeakUnboundedSender};

use super::command::{BackgroundCommand, UploadTarget};
use super::id_allocator::IdAllocator;
use super::pending_queries::{PendingQueries, Responder};
use super::registry::BackgroundRegistry;
use super::selection::{SelectedBackground, SelectionState};
use super::{BackgroundServiceDependencies, BackgroundUpdateSink};
use crate::application::dto::background_dto::{BackgroundsDto, InputBackground};
use crate::application::errors::ApplicationError;
use crate::domain::errors::DomainError;
use crate::domain::models::background::{
    is_background_name_local, Background, BackgroundId, FileId, Theme,
};
use crate::domain::models::background_type::{BackgroundFill, BackgroundType};
use crate::domain::repositories::background_remote_repository::{
    BackgroundRemoteRepository, InputWallpaper, RemoteWallpaper, RemoteWallpapers,
    WallpaperSettings,
};
use crate::domain::repositories::file_repository::{FileRepository, UploadCallback};
use crate::domain::repositories::key_value_repository::KeyValueRepository;
use crate::infrastructure::logging::logger;

use self::upload::UploadBackgroundFileCallback;

/// Cache key of a remote background record
pub(crate) fn background_name_key(name: &str) -> String {
    format!("bgn{}", name)
}

/// Owns all background state. Runs on a single task and only changes state
/// while handling a command, so handlers never interleave.
pub(crate) struct BackgroundManager {
    remote: Arc<dyn BackgroundRemoteRepository>,
    files: Arc<dyn FileRepository>,
    binlog: Arc<dyn KeyValueRepository>,
    cache: Option<Arc<dyn KeyValueRepository>>,
    update_sink: Arc<dyn BackgroundUpdateSink>,
    commands: WeakUnboundedSender<BackgroundCommand>,
    upload_callback: Arc<dyn UploadCallback>,

    allocator: IdAllocator,
    registry: BackgroundRegistry,
    selection: SelectionState,

    pending_backgrounds: PendingQueries<(), ()>,
    pending_database_loads: PendingQueries<String, ()>,
    pending_server_loads: PendingQueries<String, ()>,
    pending_uploads: PendingQueries<FileId, Option<BackgroundId>>,
    /// Theme and type of every caller waiting on an upload, in arrival order
    upload_targets: HashMap<FileId, Vec<UploadTarget>>,

    close_flag: bool,
}

impl BackgroundManager {
    pub(crate) fn new(
        dependencies: BackgroundServiceDependencies,
        commands: WeakUnboundedSender<BackgroundCommand>,
    ) -> Self {
        let upload_callback: Arc<dyn UploadCallback> =
            Arc::new(UploadBackgroundFileCallback::new(commands.clone()));

        Self {
            remote: dependencies.remote,
            files: dependencies.files,
            binlog: dependencies.binlog,
            cache: dependencies.cache,
            update_sink: dependencies.update_sink,
            commands,
            upload_callback,
            allocator: IdAllocator::unloaded(),
            registry: BackgroundRegistry::default(),
            selection: SelectionState::default(),
            pending_backgrounds: PendingQueries::new(),
            pending_database_loads: PendingQueries::new(),
            pending_server_loads: PendingQueries::new(),
            pending_uploads: PendingQueries::new(),
            upload_targets: HashMap::new(),
            close_flag: false,
        }
    }

    /// Restore persisted state, then serve commands until every sender is gone.
    pub(crate) async fn run(mut self, mut receiver: UnboundedReceiver<BackgroundCommand>) {
        self.start_up().await;

        while let Some(command) = receiver.recv().await {
            self.handle_command(command).await;
        }

        logger::debug("BackgroundManager: command queue closed");
    }

    async fn handle_command(&mut self, command: BackgroundCommand) {
        match command {
            BackgroundCommand::GetBackgrounds { responder } => self.get_backgrounds(responder),
            BackgroundCommand::GetBackgroundsObject { theme, responder } => {
                let _ = responder.send(self.backgrounds_object(theme));
            }
            BackgroundCommand::GetBackground {
                id,
                theme,
                responder,
            } => {
                let _ = responder.send(self.selection.background_object(id, theme, &self.registry));
            }
            BackgroundCommand::ReloadBackground {
                id,
                access_hash,
                responder,
            } => self.reload_background(id, access_hash, responder),
            BackgroundCommand::SearchBackground { name, responder } => {
                let result = self.search_background(&name).await;
                let _ = responder.send(result);
            }
            BackgroundCommand::SetBackground {
                input,
                background_type,
                theme,
                responder,
            } => {
                self.set_background(input, background_type, theme, responder)
                    .await
            }
            BackgroundCommand::RemoveBackground { id, responder } => {
                self.remove_background(id, responder).await
            }
            BackgroundCommand::ResetBackgrounds { responder } => self.reset_backgrounds(responder),
            BackgroundCommand::GetFileSourceId {
                id,
                access_hash,
                responder,
            } => {
                let file_source_id =
                    self.registry
                        .file_source_id(id, access_hash, self.files.as_ref());
                let _ = responder.send(file_source_id);
            }
            BackgroundCommand::GetCurrentState { responder } => {
                let updates = Theme::ALL
                    .into_iter()
                    .map(|theme| self.selection.update_object(theme, &self.registry))
                    .collect();
                let _ = responder.send(updates);
            }
            BackgroundCommand::Shutdown { responder } => {
                logger::info("BackgroundManager: closing");
                self.close_flag = true;
                let _ = responder.send(());
            }

            BackgroundCommand::BackgroundsReceived { result } => {
                self.on_get_backgrounds(result).await
            }
            BackgroundCommand::BackgroundReceived {
                expected_id,
                result,
                responder,
            } => {
                self.on_reload_background(expected_id, result, responder)
                    .await
            }
            BackgroundCommand::ServerBackgroundLoaded { slug, result } => {
                self.on_load_background_from_server(slug, result).await
            }
            BackgroundCommand::DatabaseBackgroundLoaded { slug, value } => {
                self.on_load_background_from_database(slug, value)
            }
            BackgroundCommand::BackgroundInstalled {
                id,
                background_type,
                theme,
                result,
                responder,
            } => {
                self.on_installed_background(id, background_type, theme, result, responder)
                    .await
            }
            BackgroundCommand::BackgroundRemoved {
                id,
                result,
                responder,
            } => self.on_removed_background(id, result, responder).await,
            BackgroundCommand::BackgroundsReset { result, responder } => {
                self.on_reset_backgrounds(result, responder).await
            }
            BackgroundCommand::UploadSucceeded {
                file_id,
                remote_file,
            } => self.on_upload_background_file(file_id, remote_file).await,
            BackgroundCommand::UploadFailed { file_id, error } => {
                self.on_upload_background_file_error(file_id, error)
            }
            BackgroundCommand::UploadRegistered { file_id, result } => {
                self.on_uploaded_background_file(file_id, result).await
            }
            BackgroundCommand::UploadFinished { file_id, result } => {
                self.on_upload_finished(file_id, result).await
            }
        }
    }

    /// Run `query` on its own task and feed its output back as a command.
    fn spawn_query<F, C>(&self, query: F, on_complete: C)
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
        C: FnOnce(F::Output) -> BackgroundCommand + Send + 'static,
    {
        let Some(commands) = self.commands.upgrade() else {
            logger::warn("BackgroundManager: command queue is closed, dropping query");
            return;
        };

        tokio::spawn(async move {
            let output = query.await;
            if commands.send(on_complete(output)).is_err() {
                logger::debug("BackgroundManager: manager is gone, dropping completion");
            }
        });
    }

    async fn select(&mut self, theme: Theme, selected: Option<SelectedBackground>) {
        self.selection
            .set(
                theme,
                selected,
                &self.registry,
                self.binlog.as_ref(),
                self.update_sink.as_ref(),
            )
            .await;
    }

    fn get_backgrounds(&mut self, responder: Responder<()>) {
        if !self.pending_backgrounds.enqueue((), responder) {
            return;
        }

        let remote = Arc::clone(&self.remote);
        self.spawn_query(async move { remote.get_wallpapers().await }, |result| {
            BackgroundCommand::BackgroundsReceived { result }
        });
    }

    async fn on_get_backgrounds(&mut self, result: Result<RemoteWallpapers, DomainError>) {
        let result = match result {
            Ok(RemoteWallpapers::NotModified) => {
                logger::info("Installed backgrounds are not modified");
                Ok(())
            }
            Ok(RemoteWallpapers::Wallpapers(wallpapers)) => {
                logger::info(&format!("Receive {} installed backgrounds", wallpapers.len()));
                let mut installed_ids = Vec::with_capacity(wallpapers.len());
                for wallpaper in wallpapers {
                    if let Some(id) = self.on_get_background(None, "", wallpaper).await {
                        installed_ids.push(id);
                    }
                }
                self.registry.replace_installed(installed_ids);
                Ok(())
            }
            Err(error) => {
                logger::warn(&format!("Failed to get installed backgrounds: {}", error));
                Err(error.into())
            }
        };

        self.pending_backgrounds.resolve(&(), result);
    }

    /// Selected background first, then the ones matching the theme darkness.
    fn backgrounds_object(&self, theme: Theme) -> BackgroundsDto {
        let selected_id = self.selection.selected_id(theme);
        let mut ids = self.registry.installed_ids().to_vec();
        if let Some(selected_id) = selected_id {
            if !ids.contains(&selected_id) {
                ids.push(selected_id);
            }
        }

        let mut backgrounds = ids
            .into_iter()
            .filter_map(|id| self.selection.background_object(id, theme, &self.registry))
            .collect::<Vec<_>>();
        backgrounds.sort_by_key(|background| {
            if selected_id.is_some_and(|id| id.get() == background.id) {
                0
            } else if background.is_dark == theme.is_dark() {
                1
            } else {
                2
            }
        });

        BackgroundsDto { backgrounds }
    }

    /// Validate a server record and merge it. Returns the id it was stored under.
    async fn on_get_background(
        &mut self,
        expected_id: Option<BackgroundId>,
        expected_name: &str,
        wallpaper: RemoteWallpaper,
    ) -> Option<BackgroundId> {
        match wallpaper {
            RemoteWallpaper::NoFile {
                id,
                is_default,
                is_dark,
                settings,
            } => {
                let Some(settings) = settings else {
                    logger::error(&format!("Receive wallpaper {} without file and settings", id));
                    return None;
                };
                if !is_default {
                    logger::error(&format!("Receive non-default wallpaper {} without file", id));
                    return None;
                }
                let Some(background_id) = BackgroundId::remote(id) else {
                    logger::error(&format!("Receive wallpaper with invalid identifier {}", id));
                    return None;
                };

                let background_type = BackgroundType::from_remote(true, false, Some(&settings));
                let background = Background {
                    is_default: true,
                    is_dark,
                    name: background_type.link(),
                    ..Background::new(background_id, background_type)
                };
                self.registry.merge(&background, self.files.as_ref());
                Some(background_id)
            }
            RemoteWallpaper::Document {
                id,
                access_hash,
                slug,
                is_creator,
                is_default,
                is_dark,
                is_pattern,
                file_id,
                settings,
            } => {
                let Some(background_id) = BackgroundId::remote(id) else {
                    logger::error(&format!("Receive wallpaper with invalid identifier {}", id));
                    return None;
                };
                if is_background_name_local(&slug) {
                    logger::error(&format!("Receive {} with local name {}", background_id, slug));
                    return None;
                }
                if let Some(expected_id) = expected_id {
                    if expected_id != background_id {
                        logger::error(&format!(
                            "Expected {}, but receive {}",
                            expected_id, background_id
                        ));
                    }
                }
                let Some(file_id) = file_id else {
                    logger::error(&format!("Receive {} without document", background_id));
                    return None;
                };

                let background = Background {
                    access_hash,
                    is_creator,
                    is_default,
                    is_dark,
                    name: slug,
                    file_id: Some(file_id),
                    ..Background::new(
                        background_id,
                        BackgroundType::from_remote(false, is_pattern, settings.as_ref()),
                    )
                };
                self.registry.merge(&background, self.files.as_ref());

                if !expected_name.is_empty() && background.name != expected_name {
                    logger::error(&format!(
                        "Expected background {}, but receive {}",
                        expected_name, background.name
                    ));
                    self.registry.bind_name(expected_name, background_id);
                }

                if let Some(cache) = &self.cache {
                    self.save_background_to_database(cache.as_ref(), &background)
                        .await;
                }

                Some(background_id)
            }
        }
    }

    async fn save_background_to_database(
        &self,
        cache: &dyn KeyValueRepository,
        background: &Background,
    ) {
        let result = match serde_json::to_string(background) {
            Ok(value) => cache.set(&background_name_key(&background.name), value).await,
            Err(error) => Err(DomainError::InternalError(error.to_string())),
        };

        if let Err(error) = result {
            logger::warn(&format!(
                "Failed to cache background {}: {}",
                background.name, error
            ));
        }
    }

    fn reload_background(&mut self, id: BackgroundId, access_hash: i64, responder: Responder<()>) {
        if self.close_flag {
            let _ = responder.send(Err(ApplicationError::remote(500, "Request aborted")));
            return;
        }
        if id.is_local() {
            let _ = responder.send(Err(ApplicationError::ValidationError(
                "Local backgrounds can't be reloaded".to_string(),
            )));
            return;
        }

        let remote = Arc::clone(&self.remote);
        let input = InputWallpaper::Id {
            id: id.get(),
            access_hash,
        };
        self.spawn_query(
            async move { remote.get_wallpaper(input).await },
            move |result| BackgroundCommand::BackgroundReceived {
                expected_id: id,
                result,
                responder,
            },
        );
    }

    async fn on_reload_background(
        &mut self,
        expected_id: BackgroundId,
        result: Result<RemoteWallpaper, DomainError>,
        responder: Responder<()>,
    ) {
        let result = match result {
            Ok(wallpaper) => {
                self.on_get_background(Some(expected_id), "", wallpaper)
                    .await;
                Ok(())
            }
            Err(error) => {
                logger::info(&format!("Failed to reload {}: {}", expected_id, error));
                Err(error.into())
            }
        };
        let _ = responder.send(result);
    }

    async fn add_fill_background(
        &mut self,
        fill: BackgroundFill,
        is_default: bool,
        is_dark: bool,
    ) -> Result<BackgroundId, ApplicationError> {
        let id = self.allocator.next_local_id(self.binlog.as_ref()).await?;
        let background = Background::local_fill(id, fill, is_default, is_dark);
        logger::info(&format!("Add {} named {}", id, background.name));
        self.registry.merge(&background, self.files.as_ref());
        Ok(id)
    }

    async fn set_background(
        &mut self,
        input: Option<InputBackground>,
        background_type: Option<BackgroundType>,
        theme: Theme,
        responder: Responder<Option<BackgroundId>>,
    ) {
        match input {
            None => {
                let Some(background_type) = background_type else {
                    self.select(theme, None).await;
                    let _ = responder.send(Ok(None));
                    return;
                };
                let BackgroundType::Fill { fill } = &background_type else {
                    let _ = responder.send(Err(ApplicationError::ValidationError(
                        "Input background must be non-empty for the background type".to_string(),
                    )));
                    return;
                };

                let fill = *fill;
                let result = match self.add_fill_background(fill, false, fill.is_dark()).await {
                    Ok(id) => {
                        self.select(theme, Some(SelectedBackground::new(id, background_type)))
                            .await;
                        Ok(Some(id))
                    }
                    Err(error) => Err(error),
                };
                let _ = responder.send(result);
            }
            Some(InputBackground::Local(input_file)) => {
                let Some(background_type) = background_type.filter(BackgroundType::has_file) else {
                    let _ = responder.send(Err(ApplicationError::ValidationError(
                        "Can't specify local file for the background type".to_string(),
                    )));
                    return;
                };

                let file_id = match self.files.prepare_upload_file(&input_file) {
                    Ok(file_id) => file_id,
                    Err(error) => {
                        let _ = responder.send(Err(ApplicationError::ValidationError(
                            error.to_string(),
                        )));
                        return;
                    }
                };
                logger::info(&format!("Receive {} for input background", file_id));

                match self.registry.find_by_file(file_id) {
                    Some(id) => {
                        self.set_background_by_id(id, Some(background_type), theme, responder)
                            .await
                    }
                    None => self.upload_background_file(file_id, background_type, theme, responder),
                }
            }
            Some(InputBackground::Remote(raw_id)) => match BackgroundId::from_raw(raw_id) {
                Some(id) => {
                    self.set_background_by_id(id, background_type, theme, responder)
                        .await
                }
                None => {
                    let _ = responder.send(Err(ApplicationError::ValidationError(
                        "Background to set not found".to_string(),
                    )));
                }
            },
        }
    }

    async fn set_background_by_id(
        &mut self,
        id: BackgroundId,
        background_type: Option<BackgroundType>,
        theme: Theme,
        responder: Responder<Option<BackgroundId>>,
    ) {
        logger::info(&format!("Set {} with {:?} for {} theme", id, background_type, theme));

        let Some(background) = self.registry.get(id) else {
            let _ = responder.send(Err(ApplicationError::ValidationError(
                "Background to set not found".to_string(),
            )));
            return;
        };
        let access_hash = background.access_hash;

        let background_type = match background_type {
            Some(background_type) if background_type.has_file() => {
                if !background.background_type.has_equal_type(&background_type) {
                    let _ = responder.send(Err(ApplicationError::ValidationError(
                        "Background type mismatch".to_string(),
                    )));
                    return;
                }
                background_type
            }
            _ => background.background_type.clone(),
        };

        if self.selection.is_selected(theme, id, &background_type) {
            let _ = responder.send(Ok(Some(id)));
            return;
        }

        if !background_type.has_file() {
            self.select(theme, Some(SelectedBackground::new(id, background_type)))
                .await;
            let _ = responder.send(Ok(Some(id)));
            return;
        }

        logger::info(&format!("Install {} with {:?}", id, background_type));
        let remote = Arc::clone(&self.remote);
        let input = InputWallpaper::Id {
            id: id.get(),
            access_hash,
        };
        let settings = background_type.to_remote_settings();
        self.spawn_query(
            async move { remote.install_wallpaper(input, settings).await },
            move |result| BackgroundCommand::BackgroundInstalled {
                id,
                background_type,
                theme,
                result,
                responder,
            },
        );
    }

    async fn on_installed_background(
        &mut self,
        id: BackgroundId,
        background_type: BackgroundType,
        theme: Theme,
        result: Result<(), DomainError>,
        responder: Responder<Option<BackgroundId>>,
    ) {
        if let Err(error) = result {
            let _ = responder.send(Err(error.into()));
            return;
        }

        self.registry.install_front(id);
        self.select(theme, Some(SelectedBackground::new(id, background_type)))
            .await;
        let _ = responder.send(Ok(Some(id)));
    }

    async fn remove_background(&mut self, id: BackgroundId, responder: Responder<()>) {
        let Some(background) = self.registry.get(id) else {
            let _ = responder.send(Err(ApplicationError::ValidationError(
                "Background not found".to_string(),
            )));
            return;
        };

        let input = if background.background_type.has_file() {
            InputWallpaper::Id {
                id: id.get(),
                access_hash: background.access_hash,
            }
        } else if id.is_local() {
            self.on_removed_background(id, Ok(()), responder).await;
            return;
        } else {
            InputWallpaper::NoFile { id: id.get() }
        };

        let remote = Arc::clone(&self.remote);
        self.spawn_query(
            async move {
                remote
                    .save_wallpaper(input, true, WallpaperSettings::default())
                    .await
            },
            move |result| BackgroundCommand::BackgroundRemoved {
                id,
                result,
                responder,
            },
        );
    }

    async fn on_removed_background(
        &mut self,
        id: BackgroundId,
        result: Result<(), DomainError>,
        responder: Responder<()>,
    ) {
        if let Err(error) = result {
            let _ = responder.send(Err(error.into()));
            return;
        }

        self.registry.uninstall(id);
        for theme in Theme::ALL {
            if self.selection.selected_id(theme) == Some(id) {
                self.select(theme, None).await;
            }
        }
        let _ = responder.send(Ok(()));
    }

    fn reset_backgrounds(&mut self, responder: Responder<()>) {
        let remote = Arc::clone(&self.remote);
        self.spawn_query(async move { remote.reset_wallpapers().await }, move |result| {
            BackgroundCommand::BackgroundsReset { result, responder }
        });
    }

    async fn on_reset_backgrounds(&mut self, result: Result<(), DomainError>, responder: Responder<()>) {
        if let Err(error) = result {
            let _ = responder.send(Err(error.into()));
            return;
        }

        self.registry.clear_installed();
        for theme in Theme::ALL {
            self.select(theme, None).await;
        }
        let _ = responder.send(Ok(()));
    }
}
