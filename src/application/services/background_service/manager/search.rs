use std::sync::Arc;

use tokio::sync::oneshot;

use super::{background_name_key, BackgroundManager};
use crate::application::dto::background_dto::FoundBackground;
use crate::application::errors::ApplicationError;
use crate::application::services::background_service::command::{
    BackgroundCommand, SearchOutcome,
};
use crate::application::services::background_service::pending_queries::Responder;
use crate::domain::errors::DomainError;
use crate::domain::models::background::{is_background_name_local, Background};
use crate::domain::models::background_type::{BackgroundFill, BackgroundType};
use crate::domain::repositories::background_remote_repository::{InputWallpaper, RemoteWallpaper};
use crate::infrastructure::logging::logger;

impl BackgroundManager {
    /// One round of name resolution: answer from memory, synthesize a local
    /// fill, or start a cache or server fetch the caller has to wait for.
    pub(super) async fn search_background(
        &mut self,
        name: &str,
    ) -> Result<SearchOutcome, ApplicationError> {
        let slug = name.split_once('?').map_or(name, |(slug, _)| slug);

        if let Some(id) = self.registry.find_by_name(slug) {
            let background = self.registry.get(id).ok_or_else(|| {
                ApplicationError::InternalError(format!("{} is indexed but not stored", id))
            })?;
            let mut background_type = background.background_type.clone();
            background_type.apply_parameters_from_link(name);
            return Ok(SearchOutcome::Found(FoundBackground {
                id,
                background_type,
            }));
        }

        if slug.is_empty() {
            return Err(ApplicationError::ValidationError(
                "Background name must be non-empty".to_string(),
            ));
        }

        if is_background_name_local(slug) {
            let fill = BackgroundFill::from_link(name)?;
            let id = self.add_fill_background(fill, false, fill.is_dark()).await?;
            return Ok(SearchOutcome::Found(FoundBackground {
                id,
                background_type: BackgroundType::fill(fill),
            }));
        }

        let (responder, receiver) = oneshot::channel();
        if self.cache.is_some() && !self.registry.is_loaded_from_database(slug) {
            self.load_background_from_database(slug.to_string(), responder);
        } else {
            self.load_background_from_server(slug.to_string(), responder);
        }
        Ok(SearchOutcome::Pending(receiver))
    }

    fn load_background_from_database(&mut self, slug: String, responder: Responder<()>) {
        let Some(cache) = self.cache.clone() else {
            let _ = responder.send(Ok(()));
            return;
        };
        if !self.pending_database_loads.enqueue(slug.clone(), responder) {
            return;
        }

        logger::info(&format!("Trying to load background {} from database", slug));
        let key = background_name_key(&slug);
        self.spawn_query(async move { cache.get(&key).await }, move |value| {
            BackgroundCommand::DatabaseBackgroundLoaded { slug, value }
        });
    }

    pub(super) fn on_load_background_from_database(
        &mut self,
        slug: String,
        value: Result<Option<String>, DomainError>,
    ) {
        if self.close_flag {
            self.pending_database_loads.discard(&slug);
            return;
        }

        self.registry.mark_loaded_from_database(&slug);

        match value {
            Ok(Some(value)) if self.registry.find_by_name(&slug).is_none() => {
                match serde_json::from_str::<Background>(&value) {
                    Ok(background)
                        if !background.id.is_local()
                            && background.background_type.has_file()
                            && background.file_id.is_some() =>
                    {
                        if background.name != slug {
                            logger::error(&format!(
                                "Expected background {}, but load {} from database",
                                slug, background.name
                            ));
                            self.registry.bind_name(&slug, background.id);
                        }
                        self.registry.merge(&background, self.files.as_ref());
                    }
                    Ok(background) => logger::error(&format!(
                        "Ignore invalid {} loaded from database for {}",
                        background.id, slug
                    )),
                    Err(error) => logger::error(&format!(
                        "Can't load background {} from database: {}",
                        slug, error
                    )),
                }
            }
            Ok(_) => {}
            Err(error) => logger::warn(&format!(
                "Failed to read background {} from database: {}",
                slug, error
            )),
        }

        self.pending_database_loads.resolve(&slug, Ok(()));
    }

    fn load_background_from_server(&mut self, slug: String, responder: Responder<()>) {
        if self.close_flag {
            let _ = responder.send(Err(ApplicationError::remote(500, "Request aborted")));
            return;
        }
        if !self.pending_server_loads.enqueue(slug.clone(), responder) {
            return;
        }

        let remote = Arc::clone(&self.remote);
        let input = InputWallpaper::Slug(slug.clone());
        self.spawn_query(async move { remote.get_wallpaper(input).await }, move |result| {
            BackgroundCommand::ServerBackgroundLoaded { slug, result }
        });
    }

    pub(super) async fn on_load_background_from_server(
        &mut self,
        slug: String,
        result: Result<RemoteWallpaper, DomainError>,
    ) {
        let result = match result {
            Ok(wallpaper) => {
                self.on_get_background(None, &slug, wallpaper).await;
                Ok(())
            }
            Err(error) => {
                logger::info(&format!("Failed to load background {}: {}", slug, error));
                Err(error.into())
            }
        };

        self.pending_server_loads.resolve(&slug, result);
    }
}
