use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::models::background::FileId;

/// Wallpaper settings as exchanged with the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallpaperSettings {
    #[serde(default)]
    pub is_blurred: bool,
    #[serde(default)]
    pub is_motion: bool,
    #[serde(default)]
    pub background_color: Option<u32>,
    #[serde(default)]
    pub second_background_color: Option<u32>,
    #[serde(default)]
    pub intensity: Option<i32>,
    #[serde(default)]
    pub rotation: Option<i32>,
}

/// Server reference to a wallpaper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputWallpaper {
    Id { id: i64, access_hash: i64 },
    Slug(String),
    NoFile { id: i64 },
}

/// Wallpaper record decoded from a server response. Documents have already been
/// registered with the file subsystem, so only their file id is carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWallpaper {
    NoFile {
        id: i64,
        is_default: bool,
        is_dark: bool,
        settings: Option<WallpaperSettings>,
    },
    Document {
        id: i64,
        access_hash: i64,
        slug: String,
        is_creator: bool,
        is_default: bool,
        is_dark: bool,
        is_pattern: bool,
        file_id: Option<FileId>,
        settings: Option<WallpaperSettings>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWallpapers {
    NotModified,
    Wallpapers(Vec<RemoteWallpaper>),
}

/// Handle of a file whose parts were uploaded to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFileHandle {
    pub id: i64,
    pub parts: i32,
    pub name: String,
}

/// Remote protocol operations for wallpapers
#[async_trait]
pub trait BackgroundRemoteRepository: Send + Sync {
    async fn get_wallpaper(&self, input: InputWallpaper) -> Result<RemoteWallpaper, DomainError>;

    async fn get_wallpapers(&self) -> Result<RemoteWallpapers, DomainError>;

    async fn install_wallpaper(
        &self,
        input: InputWallpaper,
        settings: WallpaperSettings,
    ) -> Result<(), DomainError>;

    /// Register an uploaded file as a wallpaper
    async fn upload_wallpaper(
        &self,
        file: RemoteFileHandle,
        mime_type: &str,
        settings: WallpaperSettings,
    ) -> Result<RemoteWallpaper, DomainError>;

    async fn save_wallpaper(
        &self,
        input: InputWallpaper,
        unsave: bool,
        settings: WallpaperSettings,
    ) -> Result<(), DomainError>;

    async fn reset_wallpapers(&self) -> Result<(), DomainError>;
}
