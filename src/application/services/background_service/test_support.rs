use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::BackgroundUpdateSink;
use crate::application::dto::background_dto::SelectedBackgroundUpdate;
use crate::domain::errors::DomainError;
use crate::domain::models::background::{BackgroundId, FileId, FileSourceId};
use crate::domain::repositories::background_remote_repository::{
    BackgroundRemoteRepository, InputWallpaper, RemoteFileHandle, RemoteWallpaper,
    RemoteWallpapers, WallpaperSettings,
};
use crate::domain::repositories::file_repository::{FileRepository, InputFile, UploadCallback};
use crate::domain::repositories::key_value_repository::KeyValueRepository;

/// Blocks a fake call until the test releases it
#[derive(Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn closed() -> Self {
        Self(Arc::new(Semaphore::new(0)))
    }

    pub fn open(&self, calls: usize) {
        self.0.add_permits(calls);
    }

    async fn pass(&self) {
        self.0
            .acquire()
            .await
            .expect("gate semaphore closed")
            .forget();
    }
}

#[derive(Default)]
struct MemoryKeyValueState {
    values: HashMap<String, String>,
    writes: Vec<(String, Option<String>)>,
    reads: Vec<String>,
    fail_writes: bool,
    failing_reads: usize,
}

/// In-memory key-value store that records every write
#[derive(Clone, Default)]
pub struct MemoryKeyValueStore {
    state: Arc<Mutex<MemoryKeyValueState>>,
    read_gate: Option<Gate>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_values<const N: usize>(values: [(&str, &str); N]) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().unwrap();
            for (key, value) in values {
                state.values.insert(key.to_string(), value.to_string());
            }
        }
        store
    }

    pub fn with_read_gate(mut self, gate: Gate) -> Self {
        self.read_gate = Some(gate);
        self
    }

    pub fn insert(&self, key: &str, value: String) {
        self.state
            .lock()
            .unwrap()
            .values
            .insert(key.to_string(), value);
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().values.get(key).cloned()
    }

    pub fn writes(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn writes_to(&self, key: &str) -> usize {
        self.writes()
            .iter()
            .filter(|(written_key, _)| written_key == key)
            .count()
    }

    pub fn reads_of(&self, key: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .reads
            .iter()
            .filter(|read_key| *read_key == key)
            .count()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// The next `count` reads fail, whatever the key
    pub fn fail_next_reads(&self, count: usize) {
        self.state.lock().unwrap().failing_reads = count;
    }
}

#[async_trait]
impl KeyValueRepository for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DomainError> {
        {
            let mut state = self.state.lock().unwrap();
            state.reads.push(key.to_string());
            if state.failing_reads > 0 {
                state.failing_reads -= 1;
                return Err(DomainError::InternalError("disk is unreadable".to_string()));
            }
        }
        if let Some(gate) = &self.read_gate {
            gate.pass().await;
        }
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(DomainError::InternalError("disk is full".to_string()));
        }
        state.writes.push((key.to_string(), Some(value.clone())));
        state.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn erase(&self, key: &str) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(DomainError::InternalError("disk is full".to_string()));
        }
        state.writes.push((key.to_string(), None));
        state.values.remove(key);
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedRemoteState {
    by_slug: HashMap<String, RemoteWallpaper>,
    by_id: HashMap<i64, RemoteWallpaper>,
    wallpapers: VecDeque<Result<RemoteWallpapers, DomainError>>,
    uploaded: VecDeque<Result<RemoteWallpaper, DomainError>>,
    get_wallpaper_calls: Vec<InputWallpaper>,
    get_wallpapers_calls: usize,
    install_calls: Vec<(InputWallpaper, WallpaperSettings)>,
    upload_calls: Vec<(RemoteFileHandle, String)>,
    save_calls: Vec<(InputWallpaper, bool)>,
    reset_calls: usize,
}

/// Remote repository answering from canned responses
#[derive(Clone, Default)]
pub struct ScriptedRemote {
    state: Arc<Mutex<ScriptedRemoteState>>,
    gate: Option<Gate>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls to `get_wallpaper` wait for the gate
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn add_wallpaper(&self, wallpaper: RemoteWallpaper) {
        let (id, slug) = match &wallpaper {
            RemoteWallpaper::Document { id, slug, .. } => (*id, Some(slug.clone())),
            RemoteWallpaper::NoFile { id, .. } => (*id, None),
        };
        let mut state = self.state.lock().unwrap();
        if let Some(slug) = slug {
            state.by_slug.insert(slug, wallpaper.clone());
        }
        state.by_id.insert(id, wallpaper);
    }

    pub fn push_wallpapers(&self, response: Result<RemoteWallpapers, DomainError>) {
        self.state.lock().unwrap().wallpapers.push_back(response);
    }

    pub fn push_uploaded(&self, response: Result<RemoteWallpaper, DomainError>) {
        self.state.lock().unwrap().uploaded.push_back(response);
    }

    pub fn get_wallpaper_calls(&self) -> Vec<InputWallpaper> {
        self.state.lock().unwrap().get_wallpaper_calls.clone()
    }

    pub fn get_wallpapers_calls(&self) -> usize {
        self.state.lock().unwrap().get_wallpapers_calls
    }

    pub fn install_calls(&self) -> Vec<(InputWallpaper, WallpaperSettings)> {
        self.state.lock().unwrap().install_calls.clone()
    }

    pub fn upload_calls(&self) -> Vec<(RemoteFileHandle, String)> {
        self.state.lock().unwrap().upload_calls.clone()
    }

    pub fn save_calls(&self) -> Vec<(InputWallpaper, bool)> {
        self.state.lock().unwrap().save_calls.clone()
    }

    pub fn reset_calls(&self) -> usize {
        self.state.lock().unwrap().reset_calls
    }
}

#[async_trait]
impl BackgroundRemoteRepository for ScriptedRemote {
    async fn get_wallpaper(&self, input: InputWallpaper) -> Result<RemoteWallpaper, DomainError> {
        self.state
            .lock()
            .unwrap()
            .get_wallpaper_calls
            .push(input.clone());
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }

        let state = self.state.lock().unwrap();
        let found = match &input {
            InputWallpaper::Slug(slug) => state.by_slug.get(slug),
            InputWallpaper::Id { id, .. } | InputWallpaper::NoFile { id } => state.by_id.get(id),
        };
        found
            .cloned()
            .ok_or_else(|| DomainError::remote(400, "WALLPAPER_INVALID"))
    }

    async fn get_wallpapers(&self) -> Result<RemoteWallpapers, DomainError> {
        let mut state = self.state.lock().unwrap();
        state.get_wallpapers_calls += 1;
        state
            .wallpapers
            .pop_front()
            .unwrap_or(Ok(RemoteWallpapers::NotModified))
    }

    async fn install_wallpaper(
        &self,
        input: InputWallpaper,
        settings: WallpaperSettings,
    ) -> Result<(), DomainError> {
        self.state
            .lock()
            .unwrap()
            .install_calls
            .push((input, settings));
        Ok(())
    }

    async fn upload_wallpaper(
        &self,
        file: RemoteFileHandle,
        mime_type: &str,
        _settings: WallpaperSettings,
    ) -> Result<RemoteWallpaper, DomainError> {
        let mut state = self.state.lock().unwrap();
        state.upload_calls.push((file, mime_type.to_string()));
        state
            .uploaded
            .pop_front()
            .unwrap_or_else(|| Err(DomainError::remote(500, "UPLOAD_NOT_SCRIPTED")))
    }

    async fn save_wallpaper(
        &self,
        input: InputWallpaper,
        unsave: bool,
        _settings: WallpaperSettings,
    ) -> Result<(), DomainError> {
        self.state.lock().unwrap().save_calls.push((input, unsave));
        Ok(())
    }

    async fn reset_wallpapers(&self) -> Result<(), DomainError> {
        self.state.lock().unwrap().reset_calls += 1;
        Ok(())
    }
}

#[derive(Default)]
struct FakeFileState {
    local_files: HashMap<PathBuf, FileId>,
    canonical: HashMap<FileId, FileId>,
    document_file_ids: HashMap<FileId, Vec<FileId>>,
    callbacks: HashMap<FileId, Arc<dyn UploadCallback>>,
    uploads: Vec<FileId>,
    cancelled: Vec<FileId>,
    deleted_partial: Vec<FileId>,
    merges: Vec<(FileId, FileId)>,
    created_file_sources: i64,
    added_file_sources: Vec<(FileId, FileSourceId)>,
}

/// File subsystem double; uploads complete when the test says so
#[derive(Clone, Default)]
pub struct FakeFileRepository {
    state: Arc<Mutex<FakeFileState>>,
}

impl FakeFileRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_local_file(&self, path: &str, file_id: FileId) {
        self.state
            .lock()
            .unwrap()
            .local_files
            .insert(PathBuf::from(path), file_id);
    }

    pub fn set_canonical(&self, alias: FileId, canonical: FileId) {
        self.state.lock().unwrap().canonical.insert(alias, canonical);
    }

    pub fn set_document_file_ids(&self, file_id: FileId, file_ids: Vec<FileId>) {
        self.state
            .lock()
            .unwrap()
            .document_file_ids
            .insert(file_id, file_ids);
    }

    pub fn uploads(&self) -> Vec<FileId> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn cancelled(&self) -> Vec<FileId> {
        self.state.lock().unwrap().cancelled.clone()
    }

    pub fn deleted_partial(&self) -> Vec<FileId> {
        self.state.lock().unwrap().deleted_partial.clone()
    }

    pub fn merges(&self) -> Vec<(FileId, FileId)> {
        self.state.lock().unwrap().merges.clone()
    }

    pub fn created_file_sources(&self) -> i64 {
        self.state.lock().unwrap().created_file_sources
    }

    pub fn added_file_sources(&self) -> Vec<(FileId, FileSourceId)> {
        self.state.lock().unwrap().added_file_sources.clone()
    }

    fn callback(&self, file_id: FileId) -> Arc<dyn UploadCallback> {
        self.state
            .lock()
            .unwrap()
            .callbacks
            .remove(&file_id)
            .expect("upload was not started")
    }

    pub fn complete_upload(&self, file_id: FileId, remote_file: Option<RemoteFileHandle>) {
        self.callback(file_id).on_upload_ok(file_id, remote_file);
    }

    pub fn fail_upload(&self, file_id: FileId, error: DomainError) {
        self.callback(file_id).on_upload_error(file_id, error);
    }

    /// Wait until the manager asked for the upload of `file_id`
    pub async fn wait_for_upload(&self, file_id: FileId) {
        for _ in 0..1000 {
            if self.state.lock().unwrap().callbacks.contains_key(&file_id) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        panic!("upload of {} was never started", file_id);
    }
}

impl FileRepository for FakeFileRepository {
    fn prepare_upload_file(&self, input: &InputFile) -> Result<FileId, DomainError> {
        match input {
            InputFile::Id(file_id) => Ok(*file_id),
            InputFile::Local(path) => self
                .state
                .lock()
                .unwrap()
                .local_files
                .get(path)
                .copied()
                .ok_or_else(|| DomainError::InvalidData(format!("File {:?} not found", path))),
        }
    }

    fn upload(&self, file_id: FileId, callback: Arc<dyn UploadCallback>) {
        let mut state = self.state.lock().unwrap();
        state.uploads.push(file_id);
        state.callbacks.insert(file_id, callback);
    }

    fn cancel_upload(&self, file_id: FileId) {
        self.state.lock().unwrap().cancelled.push(file_id);
    }

    fn delete_partial_remote_location(&self, file_id: FileId) {
        self.state.lock().unwrap().deleted_partial.push(file_id);
    }

    fn merge(&self, target: FileId, source: FileId) -> Result<FileId, DomainError> {
        let mut state = self.state.lock().unwrap();
        state.merges.push((target, source));
        state.canonical.insert(source, target);
        Ok(target)
    }

    fn canonical_file_id(&self, file_id: FileId) -> FileId {
        self.state
            .lock()
            .unwrap()
            .canonical
            .get(&file_id)
            .copied()
            .unwrap_or(file_id)
    }

    fn create_background_file_source(
        &self,
        _background_id: BackgroundId,
        _access_hash: i64,
    ) -> FileSourceId {
        let mut state = self.state.lock().unwrap();
        state.created_file_sources += 1;
        FileSourceId(state.created_file_sources)
    }

    fn add_file_source(&self, file_id: FileId, file_source_id: FileSourceId) {
        self.state
            .lock()
            .unwrap()
            .added_file_sources
            .push((file_id, file_source_id));
    }

    fn document_file_ids(&self, file_id: FileId) -> Vec<FileId> {
        self.state
            .lock()
            .unwrap()
            .document_file_ids
            .get(&file_id)
            .cloned()
            .unwrap_or_else(|| vec![file_id])
    }
}

/// Sink keeping every update in order
#[derive(Clone, Default)]
pub struct RecordingUpdateSink {
    updates: Arc<Mutex<Vec<SelectedBackgroundUpdate>>>,
}

impl RecordingUpdateSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<SelectedBackgroundUpdate> {
        self.updates.lock().unwrap().clone()
    }
}

impl BackgroundUpdateSink for RecordingUpdateSink {
    fn send_update(&self, update: SelectedBackgroundUpdate) {
        self.updates.lock().unwrap().push(update);
    }
}
