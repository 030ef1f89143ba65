use std::sync::Arc;

use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::sync::oneshot;

use super::BackgroundManager;
use crate::application::errors::ApplicationError;
use crate::application::services::background_service::command::{
    BackgroundCommand, UploadTarget,
};
use crate::application::services::background_service::pending_queries::Responder;
use crate::application::services::background_service::selection::SelectedBackground;
use crate::domain::errors::DomainError;
use crate::domain::models::background::{BackgroundId, FileId, Theme};
use crate::domain::models::background_type::BackgroundType;
use crate::domain::repositories::background_remote_repository::{
    RemoteFileHandle, RemoteWallpaper,
};
use crate::domain::repositories::file_repository::UploadCallback;
use crate::infrastructure::logging::logger;

/// Forwards upload completions from the file subsystem into the command queue.
pub(super) struct UploadBackgroundFileCallback {
    commands: WeakUnboundedSender<BackgroundCommand>,
}

impl UploadBackgroundFileCallback {
    pub(super) fn new(commands: WeakUnboundedSender<BackgroundCommand>) -> Self {
        Self { commands }
    }

    fn send(&self, command: BackgroundCommand) {
        let delivered = self
            .commands
            .upgrade()
            .is_some_and(|commands| commands.send(command).is_ok());
        if !delivered {
            logger::debug("BackgroundManager: upload completion arrived after shutdown");
        }
    }
}

impl UploadCallback for UploadBackgroundFileCallback {
    fn on_upload_ok(&self, file_id: FileId, remote_file: Option<RemoteFileHandle>) {
        self.send(BackgroundCommand::UploadSucceeded {
            file_id,
            remote_file,
        });
    }

    fn on_upload_error(&self, file_id: FileId, error: DomainError) {
        self.send(BackgroundCommand::UploadFailed { file_id, error });
    }
}

fn is_missing_file_part_error(message: &str) -> bool {
    message.starts_with("FILE_PART_") && message.ends_with("_MISSING")
}

impl BackgroundManager {
    /// Attach the caller to the upload of `file_id`, starting it if needed.
    pub(super) fn upload_background_file(
        &mut self,
        file_id: FileId,
        background_type: BackgroundType,
        theme: Theme,
        responder: Responder<Option<BackgroundId>>,
    ) {
        let is_first = self.pending_uploads.enqueue(file_id, responder);
        self.upload_targets
            .entry(file_id)
            .or_default()
            .push(UploadTarget {
                background_type,
                theme,
            });
        if !is_first {
            logger::info(&format!("Join the upload of background {}", file_id));
            return;
        }

        logger::info(&format!("Ask to upload background {}", file_id));
        self.files
            .upload(file_id, Arc::clone(&self.upload_callback));
    }

    pub(super) async fn on_upload_background_file(
        &mut self,
        file_id: FileId,
        remote_file: Option<RemoteFileHandle>,
    ) {
        logger::info(&format!("Background {} has been uploaded", file_id));

        let Some(target) = self
            .upload_targets
            .get(&file_id)
            .and_then(|targets| targets.first())
            .cloned()
        else {
            logger::warn(&format!("Ignore upload of unknown background {}", file_id));
            return;
        };

        let Some(remote_file) = remote_file else {
            let canonical_file_id = self.files.canonical_file_id(file_id);
            match self.registry.find_by_file(canonical_file_id) {
                Some(id) => self.set_uploaded_background(file_id, id, target).await,
                None => self.finish_upload(
                    file_id,
                    Err(ApplicationError::remote(500, "Failed to reupload background")),
                ),
            }
            return;
        };

        let remote = Arc::clone(&self.remote);
        let mime_type = target.background_type.mime_type();
        let settings = target.background_type.to_remote_settings();
        self.spawn_query(
            async move {
                remote
                    .upload_wallpaper(remote_file, mime_type, settings)
                    .await
            },
            move |result| BackgroundCommand::UploadRegistered { file_id, result },
        );
    }

    pub(super) fn on_upload_background_file_error(&mut self, file_id: FileId, error: DomainError) {
        if self.close_flag {
            logger::debug(&format!(
                "Discard upload error of background {} while closing: {}",
                file_id, error
            ));
            self.upload_targets.remove(&file_id);
            self.pending_uploads.discard(&file_id);
            return;
        }

        logger::warn(&format!(
            "Background {} has upload error {}",
            file_id, error
        ));
        let error = match error {
            DomainError::Remote { code, message } if code > 0 => {
                ApplicationError::remote(code, message)
            }
            DomainError::Remote { message, .. } => ApplicationError::remote(500, message),
            other => ApplicationError::remote(500, other.to_string()),
        };
        self.finish_upload(file_id, Err(error));
    }

    /// Registration of the uploaded file as a wallpaper has completed.
    pub(super) async fn on_uploaded_background_file(
        &mut self,
        file_id: FileId,
        result: Result<RemoteWallpaper, DomainError>,
    ) {
        let wallpaper = match result {
            Ok(wallpaper) => wallpaper,
            Err(error) => {
                self.on_upload_query_error(file_id, error);
                return;
            }
        };

        let Some(id) = self.on_get_background(None, "", wallpaper).await else {
            self.files.cancel_upload(file_id);
            self.finish_upload(
                file_id,
                Err(ApplicationError::remote(500, "Receive wrong uploaded background")),
            );
            return;
        };

        let Some(background_file_id) = self.registry.get(id).and_then(|background| background.file_id)
        else {
            self.files.cancel_upload(file_id);
            self.finish_upload(
                file_id,
                Err(ApplicationError::remote(
                    500,
                    "Receive wrong uploaded background without file",
                )),
            );
            return;
        };

        if let Err(error) = self.files.merge(background_file_id, file_id) {
            logger::warn(&format!(
                "Failed to merge {} with {}: {}",
                background_file_id, file_id, error
            ));
        }

        self.apply_upload(file_id, id).await;
    }

    fn on_upload_query_error(&mut self, file_id: FileId, error: DomainError) {
        let (code, message) = match &error {
            DomainError::Remote { code, message } => (*code, message.as_str()),
            _ => (500, ""),
        };

        if !is_missing_file_part_error(message) && code != 429 && code < 500 && !self.close_flag {
            self.files.delete_partial_remote_location(file_id);
        }
        self.files.cancel_upload(file_id);

        self.finish_upload(file_id, Err(error.into()));
    }

    /// The file was already on the server: the first caller's choice is set
    /// like a set by id, then every caller's choice is applied.
    async fn set_uploaded_background(&mut self, file_id: FileId, id: BackgroundId, target: UploadTarget) {
        let (responder, receiver) = oneshot::channel();
        self.set_background_by_id(id, Some(target.background_type), target.theme, responder)
            .await;

        self.spawn_query(
            async move {
                receiver.await.unwrap_or_else(|_| {
                    Err(ApplicationError::Cancelled(
                        "Background selection was dropped".to_string(),
                    ))
                })
            },
            move |result| BackgroundCommand::UploadFinished { file_id, result },
        );
    }

    pub(super) async fn on_upload_finished(
        &mut self,
        file_id: FileId,
        result: Result<Option<BackgroundId>, ApplicationError>,
    ) {
        match result {
            Ok(Some(id)) => self.apply_upload(file_id, id).await,
            Ok(None) => self.finish_upload(
                file_id,
                Err(ApplicationError::remote(500, "Failed to reupload background")),
            ),
            Err(error) => self.finish_upload(file_id, Err(error)),
        }
    }

    /// Select the uploaded background for every waiting caller, then answer them.
    ///
    /// A caller whose type is of another kind than the uploaded background gets
    /// the uploaded type.
    async fn apply_upload(&mut self, file_id: FileId, id: BackgroundId) {
        let Some(uploaded_type) = self
            .registry
            .get(id)
            .map(|background| background.background_type.clone())
        else {
            self.finish_upload(
                file_id,
                Err(ApplicationError::remote(500, "Uploaded background is unknown")),
            );
            return;
        };

        let targets = self.upload_targets.remove(&file_id).unwrap_or_default();
        for target in targets {
            let background_type = if uploaded_type.has_equal_type(&target.background_type) {
                target.background_type
            } else {
                uploaded_type.clone()
            };
            self.select(target.theme, Some(SelectedBackground::new(id, background_type)))
                .await;
        }
        self.finish_upload(file_id, Ok(Some(id)));
    }

    pub(super) fn finish_upload(
        &mut self,
        file_id: FileId,
        result: Result<Option<BackgroundId>, ApplicationError>,
    ) {
        self.upload_targets.remove(&file_id);
        let waiters = self.pending_uploads.resolve(&file_id, result);
        logger::debug(&format!(
            "Finished upload of background {} for {} waiters",
            file_id, waiters
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_part_errors_are_recognized() {
        assert!(is_missing_file_part_error("FILE_PART_3_MISSING"));
        assert!(!is_missing_file_part_error("FILE_PARTS_INVALID"));
        assert!(!is_missing_file_part_error("PHOTO_INVALID_DIMENSIONS"));
    }
}
