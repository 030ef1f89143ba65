use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::models::background_type::{BackgroundFill, BackgroundType};

/// Identifier of a background.
///
/// Local ids are synthesized by the client for backgrounds that have no server
/// representation, remote ids are assigned by the server. The two domains never
/// compare equal, even for the same raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundId {
    Local(i64),
    Remote(i64),
}

impl BackgroundId {
    pub const MAX_LOCAL: i64 = i32::MAX as i64;

    /// Panics when the value is outside the local range.
    pub fn local(value: i64) -> Self {
        assert!(
            Self::is_local_value(value),
            "{} is not a valid local background identifier",
            value
        );
        Self::Local(value)
    }

    /// Returns `None` for values the server must never assign.
    pub fn remote(value: i64) -> Option<Self> {
        if value == 0 || Self::is_local_value(value) {
            return None;
        }
        Some(Self::Remote(value))
    }

    /// Classify a raw identifier received from a caller.
    pub fn from_raw(value: i64) -> Option<Self> {
        if value == 0 {
            None
        } else if Self::is_local_value(value) {
            Some(Self::Local(value))
        } else {
            Some(Self::Remote(value))
        }
    }

    pub fn get(self) -> i64 {
        match self {
            Self::Local(value) | Self::Remote(value) => value,
        }
    }

    pub fn is_local(self) -> bool {
        matches!(self, Self::Local(_))
    }

    fn is_local_value(value: i64) -> bool {
        0 < value && value <= Self::MAX_LOCAL
    }
}

impl fmt::Display for BackgroundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(value) => write!(f, "local background {}", value),
            Self::Remote(value) => write!(f, "background {}", value),
        }
    }
}

/// File identifier owned by the file subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(pub i64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {}", self.0)
    }
}

/// Revalidation token the file subsystem uses to refresh a stale file reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileSourceId(pub i64);

/// Represents a background in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Background {
    pub id: BackgroundId,

    /// Server credential, meaningless for local ids
    #[serde(default)]
    pub access_hash: i64,

    #[serde(default)]
    pub is_creator: bool,

    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    pub is_dark: bool,

    /// Set once the id has been issued by the current local id allocator
    #[serde(default)]
    pub has_new_local_id: bool,

    /// Slug for remote backgrounds, the type link for local fills
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub file_id: Option<FileId>,

    #[serde(rename = "type")]
    pub background_type: BackgroundType,

    #[serde(skip)]
    pub file_source_id: Option<FileSourceId>,
}

impl Background {
    /// Create a background without a file or server credential
    pub fn new(id: BackgroundId, background_type: BackgroundType) -> Self {
        Self {
            id,
            access_hash: 0,
            is_creator: false,
            is_default: false,
            is_dark: false,
            has_new_local_id: true,
            name: String::new(),
            file_id: None,
            background_type,
            file_source_id: None,
        }
    }

    /// Create a client-side fill background named after its link
    pub fn local_fill(id: BackgroundId, fill: BackgroundFill, is_default: bool, is_dark: bool) -> Self {
        let background_type = BackgroundType::fill(fill);
        Self {
            is_creator: true,
            is_default,
            is_dark,
            name: background_type.link(),
            ..Self::new(id, background_type)
        }
    }

    /// The file reference must be present exactly when the type needs a file
    pub fn is_consistent(&self) -> bool {
        self.file_id.is_some() == self.background_type.has_file()
    }
}

/// Whether a background name is a client-side slug that the server never assigns.
pub fn is_background_name_local(name: &str) -> bool {
    const MAX_LOCAL_NAME_LENGTH: usize = 13;

    let slug = match name.find('?') {
        Some(position) if position <= MAX_LOCAL_NAME_LENGTH => return true,
        Some(position) => &name[..position],
        None => name,
    };

    name.len() <= MAX_LOCAL_NAME_LENGTH || !slug.chars().all(is_base64url_character)
}

fn is_base64url_character(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub const ALL: [Theme; 2] = [Theme::Light, Theme::Dark];

    pub fn for_dark(is_dark: bool) -> Self {
        if is_dark { Self::Dark } else { Self::Light }
    }

    pub fn is_dark(self) -> bool {
        self == Self::Dark
    }

    pub fn other(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => f.write_str("light"),
            Self::Dark => f.write_str("dark"),
        }
    }
}

/// One value per theme.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThemeSlots<T> {
    pub light: T,
    pub dark: T,
}

impl<T> ThemeSlots<T> {
    pub fn get(&self, theme: Theme) -> &T {
        match theme {
            Theme::Light => &self.light,
            Theme::Dark => &self.dark,
        }
    }

    pub fn get_mut(&mut self, theme: Theme) -> &mut T {
        match theme {
            Theme::Light => &mut self.light,
            Theme::Dark => &mut self.dark,
        }
    }
}
