use super::BackgroundManager;
use crate::application::services::background_service::id_allocator::IdAllocator;
use crate::application::services::background_service::selection::{
    selection_key, BackgroundLogEvent, SelectedBackground,
};
use crate::domain::models::background::{Theme, ThemeSlots};
use crate::infrastructure::logging::logger;

impl BackgroundManager {
    /// Restore the id mark and both theme selections, repairing stale records.
    ///
    /// Local fills written before ids were tracked may collide with later ids,
    /// so they get a fresh id and are written back once.
    pub(super) async fn start_up(&mut self) {
        self.allocator = match IdAllocator::load(self.binlog.as_ref()).await {
            Ok(allocator) => allocator,
            Err(error) => {
                logger::error(&format!(
                    "Failed to load local background id mark, retrying on first use: {}",
                    error
                ));
                IdAllocator::unloaded()
            }
        };

        let mut log_events = ThemeSlots::<Option<BackgroundLogEvent>>::default();
        for theme in Theme::ALL {
            let Some(log_event) = self.read_log_event(theme).await else {
                continue;
            };

            let background = &log_event.background;
            if background.id.is_local() && !background.background_type.has_file() {
                if let Err(error) = self
                    .allocator
                    .record_external_local_id(background.id, self.binlog.as_ref())
                    .await
                {
                    logger::error(&format!(
                        "Failed to raise local background id mark to {}: {}",
                        background.id.get(),
                        error
                    ));
                }
            }
            *log_events.get_mut(theme) = Some(log_event);
        }

        for theme in Theme::ALL {
            if let Some(log_event) = log_events.get_mut(theme).take() {
                self.restore_selection(theme, log_event).await;
            }
            self.update_sink
                .send_update(self.selection.update_object(theme, &self.registry));
        }

        if self.allocator.is_loaded() {
            logger::info(&format!(
                "BackgroundManager started, local background id mark is {}",
                self.allocator.max_local_id()
            ));
        } else {
            logger::warn("BackgroundManager started without a local background id mark");
        }
    }

    async fn read_log_event(&self, theme: Theme) -> Option<BackgroundLogEvent> {
        let key = selection_key(theme);
        let value = match self.binlog.get(key).await {
            Ok(value) => value?,
            Err(error) => {
                logger::error(&format!(
                    "Failed to read selected {} background: {}",
                    theme, error
                ));
                return None;
            }
        };

        match serde_json::from_str(&value) {
            Ok(log_event) => Some(log_event),
            Err(error) => {
                logger::error(&format!(
                    "Failed to decode selected {} background: {}",
                    theme, error
                ));
                if let Err(error) = self.binlog.erase(key).await {
                    logger::warn(&format!("Failed to erase {}: {}", key, error));
                }
                None
            }
        }
    }

    async fn restore_selection(&mut self, theme: Theme, mut log_event: BackgroundLogEvent) {
        let mut need_resave = false;
        let background = &mut log_event.background;

        if !background.has_new_local_id && !background.background_type.has_file() {
            match self.allocator.next_local_id(self.binlog.as_ref()).await {
                Ok(id) => {
                    logger::info(&format!(
                        "Reassign {} of {} theme to {}",
                        background.id, theme, id
                    ));
                    background.id = id;
                    background.has_new_local_id = true;
                }
                Err(error) => {
                    logger::error(&format!(
                        "Drop {} of {} theme, no local id is available: {}",
                        background.id, theme, error
                    ));
                    self.selection
                        .save(theme, &self.registry, self.binlog.as_ref())
                        .await;
                    return;
                }
            }
            need_resave = true;
        }

        if background.is_consistent() {
            self.registry.merge(background, self.files.as_ref());
            self.selection.install(
                theme,
                Some(SelectedBackground::new(background.id, log_event.set_type)),
            );
        } else {
            logger::error(&format!(
                "Drop inconsistent {} of {} theme",
                background.id, theme
            ));
            need_resave = true;
        }

        if need_resave {
            self.selection
                .save(theme, &self.registry, self.binlog.as_ref())
                .await;
        }
    }
}
