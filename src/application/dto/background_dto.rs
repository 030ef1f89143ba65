use serde::{Deserialize, Serialize};

use crate::domain::models::background::{Background, BackgroundId, FileId, Theme};
use crate::domain::models::background_type::BackgroundType;
use crate::domain::repositories::file_repository::InputFile;

/// DTO for a background as shown to the owning process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundDto {
    pub id: i64,

    pub is_default: bool,

    pub is_dark: bool,

    pub name: String,

    /// Document file, absent for fills
    pub file_id: Option<FileId>,

    /// Type as selected for the theme, or the stored type
    #[serde(rename = "type")]
    pub background_type: BackgroundType,
}

impl BackgroundDto {
    pub fn new(background: &Background, background_type: &BackgroundType) -> Self {
        Self {
            id: background.id.get(),
            is_default: background.is_default,
            is_dark: background.is_dark,
            name: background.name.clone(),
            file_id: background.file_id,
            background_type: background_type.clone(),
        }
    }
}

impl From<&Background> for BackgroundDto {
    fn from(background: &Background) -> Self {
        Self::new(background, &background.background_type)
    }
}

/// DTO for the list of installed backgrounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundsDto {
    pub backgrounds: Vec<BackgroundDto>,
}

/// Emitted whenever the selected background of a theme changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedBackgroundUpdate {
    pub for_dark_theme: bool,

    /// `None` when nothing is selected
    pub background: Option<BackgroundDto>,
}

impl SelectedBackgroundUpdate {
    pub fn theme(&self) -> Theme {
        Theme::for_dark(self.for_dark_theme)
    }
}

/// Result of resolving a background name
#[derive(Debug, Clone, PartialEq)]
pub struct FoundBackground {
    pub id: BackgroundId,
    pub background_type: BackgroundType,
}

/// Background to select
#[derive(Debug, Clone, PartialEq)]
pub enum InputBackground {
    /// Upload a new file
    Local(InputFile),
    /// Existing background by raw id
    Remote(i64),
}
