use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::models::background::{BackgroundId, FileId, FileSourceId};
use crate::domain::repositories::background_remote_repository::RemoteFileHandle;

/// File given by the caller for a new background.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFile {
    /// Already known to the file subsystem
    Id(FileId),
    /// Local file path
    Local(PathBuf),
}

/// Receives upload completions. Implementations must not block.
pub trait UploadCallback: Send + Sync {
    /// `remote_file` is `None` when the file is already stored on the server
    fn on_upload_ok(&self, file_id: FileId, remote_file: Option<RemoteFileHandle>);

    fn on_upload_error(&self, file_id: FileId, error: DomainError);
}

/// File transfer and file reference subsystem
pub trait FileRepository: Send + Sync {
    /// Resolve a caller-provided file that can be uploaded as a background
    fn prepare_upload_file(&self, input: &InputFile) -> Result<FileId, DomainError>;

    fn upload(&self, file_id: FileId, callback: Arc<dyn UploadCallback>);

    fn cancel_upload(&self, file_id: FileId);

    fn delete_partial_remote_location(&self, file_id: FileId);

    /// Declare two file ids as the same content
    fn merge(&self, target: FileId, source: FileId) -> Result<FileId, DomainError>;

    /// The identifier every alias of the file resolves to
    fn canonical_file_id(&self, file_id: FileId) -> FileId;

    fn create_background_file_source(
        &self,
        background_id: BackgroundId,
        access_hash: i64,
    ) -> FileSourceId;

    fn add_file_source(&self, file_id: FileId, file_source_id: FileSourceId);

    /// Every file id referenced by the document, thumbnails included
    fn document_file_ids(&self, file_id: FileId) -> Vec<FileId>;
}
