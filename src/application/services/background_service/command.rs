use tokio::sync::oneshot;

use super::pending_queries::Responder;
use crate::application::dto::background_dto::{
    BackgroundDto, BackgroundsDto, FoundBackground, InputBackground, SelectedBackgroundUpdate,
};
use crate::application::errors::ApplicationError;
use crate::domain::errors::DomainError;
use crate::domain::models::background::{BackgroundId, FileId, FileSourceId, Theme};
use crate::domain::models::background_type::BackgroundType;
use crate::domain::repositories::background_remote_repository::{
    RemoteFileHandle, RemoteWallpaper, RemoteWallpapers,
};

/// Result of one search round
#[derive(Debug)]
pub(crate) enum SearchOutcome {
    Found(FoundBackground),
    /// The name is being fetched; search again once the receiver resolves
    Pending(oneshot::Receiver<Result<(), ApplicationError>>),
}

/// Where an uploaded file gets applied
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UploadTarget {
    pub background_type: BackgroundType,
    pub theme: Theme,
}

/// Messages drained by the manager task. Caller requests come from
/// `BackgroundService`, completions from tasks the manager spawned.
pub(crate) enum BackgroundCommand {
    GetBackgrounds {
        responder: Responder<()>,
    },
    GetBackgroundsObject {
        theme: Theme,
        responder: oneshot::Sender<BackgroundsDto>,
    },
    GetBackground {
        id: BackgroundId,
        theme: Theme,
        responder: oneshot::Sender<Option<BackgroundDto>>,
    },
    ReloadBackground {
        id: BackgroundId,
        access_hash: i64,
        responder: Responder<()>,
    },
    SearchBackground {
        name: String,
        responder: Responder<SearchOutcome>,
    },
    SetBackground {
        input: Option<InputBackground>,
        background_type: Option<BackgroundType>,
        theme: Theme,
        responder: Responder<Option<BackgroundId>>,
    },
    RemoveBackground {
        id: BackgroundId,
        responder: Responder<()>,
    },
    ResetBackgrounds {
        responder: Responder<()>,
    },
    GetFileSourceId {
        id: BackgroundId,
        access_hash: i64,
        responder: oneshot::Sender<Option<FileSourceId>>,
    },
    GetCurrentState {
        responder: oneshot::Sender<Vec<SelectedBackgroundUpdate>>,
    },
    Shutdown {
        responder: oneshot::Sender<()>,
    },

    BackgroundsReceived {
        result: Result<RemoteWallpapers, DomainError>,
    },
    BackgroundReceived {
        expected_id: BackgroundId,
        result: Result<RemoteWallpaper, DomainError>,
        responder: Responder<()>,
    },
    ServerBackgroundLoaded {
        slug: String,
        result: Result<RemoteWallpaper, DomainError>,
    },
    DatabaseBackgroundLoaded {
        slug: String,
        value: Result<Option<String>, DomainError>,
    },
    BackgroundInstalled {
        id: BackgroundId,
        background_type: BackgroundType,
        theme: Theme,
        result: Result<(), DomainError>,
        responder: Responder<Option<BackgroundId>>,
    },
    BackgroundRemoved {
        id: BackgroundId,
        result: Result<(), DomainError>,
        responder: Responder<()>,
    },
    BackgroundsReset {
        result: Result<(), DomainError>,
        responder: Responder<()>,
    },
    UploadSucceeded {
        file_id: FileId,
        remote_file: Option<RemoteFileHandle>,
    },
    UploadFailed {
        file_id: FileId,
        error: DomainError,
    },
    UploadRegistered {
        file_id: FileId,
        result: Result<RemoteWallpaper, DomainError>,
    },
    UploadFinished {
        file_id: FileId,
        result: Result<Option<BackgroundId>, ApplicationError>,
    },
}
