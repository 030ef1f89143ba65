use serde::{Deserialize, Serialize};

use super::registry::BackgroundRegistry;
use super::BackgroundUpdateSink;
use crate::application::dto::background_dto::{BackgroundDto, SelectedBackgroundUpdate};
use crate::domain::errors::DomainError;
use crate::domain::models::background::{Background, BackgroundId, Theme, ThemeSlots};
use crate::domain::models::background_type::BackgroundType;
use crate::domain::repositories::key_value_repository::KeyValueRepository;
use crate::infrastructure::logging::logger;

/// Durable key of the selected background of a theme
pub(crate) fn selection_key(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "bg",
        Theme::Dark => "bgd",
    }
}

/// Persisted form of a theme selection: the full record and the applied type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct BackgroundLogEvent {
    pub background: Background,
    pub set_type: BackgroundType,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectedBackground {
    pub id: BackgroundId,
    pub background_type: BackgroundType,
}

impl SelectedBackground {
    pub(crate) fn new(id: BackgroundId, background_type: BackgroundType) -> Self {
        Self {
            id,
            background_type,
        }
    }
}

/// Selected background per theme
#[derive(Debug, Default)]
pub(crate) struct SelectionState {
    slots: ThemeSlots<Option<SelectedBackground>>,
}

impl SelectionState {
    pub(crate) fn get(&self, theme: Theme) -> Option<&SelectedBackground> {
        self.slots.get(theme).as_ref()
    }

    pub(crate) fn selected_id(&self, theme: Theme) -> Option<BackgroundId> {
        self.get(theme).map(|selected| selected.id)
    }

    pub(crate) fn is_selected(
        &self,
        theme: Theme,
        id: BackgroundId,
        background_type: &BackgroundType,
    ) -> bool {
        self.get(theme)
            .is_some_and(|selected| selected.id == id && selected.background_type == *background_type)
    }

    /// Restore a slot without persisting or notifying
    pub(crate) fn install(&mut self, theme: Theme, selected: Option<SelectedBackground>) {
        *self.slots.get_mut(theme) = selected;
    }

    /// Change a slot. Persists and notifies only when the value differs.
    pub(crate) async fn set(
        &mut self,
        theme: Theme,
        selected: Option<SelectedBackground>,
        registry: &BackgroundRegistry,
        store: &dyn KeyValueRepository,
        sink: &dyn BackgroundUpdateSink,
    ) -> bool {
        if *self.slots.get(theme) == selected {
            return false;
        }

        *self.slots.get_mut(theme) = selected;
        self.save(theme, registry, store).await;
        sink.send_update(self.update_object(theme, registry));
        true
    }

    /// Write the slot to the store, or erase the key when the slot is empty
    pub(crate) async fn save(
        &self,
        theme: Theme,
        registry: &BackgroundRegistry,
        store: &dyn KeyValueRepository,
    ) {
        let key = selection_key(theme);
        let result = match self.get(theme) {
            Some(selected) => match registry.get(selected.id) {
                Some(background) => {
                    let log_event = BackgroundLogEvent {
                        background: background.clone(),
                        set_type: selected.background_type.clone(),
                    };
                    match serde_json::to_string(&log_event) {
                        Ok(value) => store.set(key, value).await,
                        Err(error) => Err(DomainError::InternalError(format!(
                            "Failed to serialize selected background: {}",
                            error
                        ))),
                    }
                }
                None => Err(DomainError::NotFound(format!(
                    "Selected {} is missing from the registry",
                    selected.id
                ))),
            },
            None => store.erase(key).await,
        };

        if let Err(error) = result {
            logger::error(&format!(
                "Failed to save selected {} background: {}",
                theme, error
            ));
        }
    }

    /// Background as seen from a theme: a selected type overrides the stored one,
    /// the theme's own selection taking precedence over the other theme's.
    pub(crate) fn background_object(
        &self,
        id: BackgroundId,
        theme: Theme,
        registry: &BackgroundRegistry,
    ) -> Option<BackgroundDto> {
        let background = registry.get(id)?;
        let background_type = [theme, theme.other()]
            .into_iter()
            .filter_map(|slot_theme| self.get(slot_theme))
            .find(|selected| selected.id == id)
            .map_or(&background.background_type, |selected| {
                &selected.background_type
            });

        Some(BackgroundDto::new(background, background_type))
    }

    pub(crate) fn update_object(
        &self,
        theme: Theme,
        registry: &BackgroundRegistry,
    ) -> SelectedBackgroundUpdate {
        SelectedBackgroundUpdate {
            for_dark_theme: theme.is_dark(),
            background: self
                .selected_id(theme)
                .and_then(|id| self.background_object(id, theme, registry)),
        }
    }
}
