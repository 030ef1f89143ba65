use std::collections::{HashMap, HashSet};

use crate::domain::models::background::{
    is_background_name_local, Background, BackgroundId, FileId, FileSourceId,
};
use crate::domain::repositories::file_repository::FileRepository;
use crate::infrastructure::logging::logger;

/// Every background the manager has seen, with its name and file indexes.
///
/// Records are never removed. A name, once bound, keeps pointing at the same id.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct BackgroundRegistry {
    backgrounds: HashMap<BackgroundId, Background>,
    name_to_id: HashMap<String, BackgroundId>,
    file_to_id: HashMap<FileId, BackgroundId>,
    reserved_file_sources: HashMap<BackgroundId, (i64, FileSourceId)>,
    loaded_from_database: HashSet<String>,
    installed_ids: Vec<BackgroundId>,
}

impl BackgroundRegistry {
    pub(crate) fn get(&self, id: BackgroundId) -> Option<&Background> {
        self.backgrounds.get(&id)
    }

    pub(crate) fn find_by_name(&self, name: &str) -> Option<BackgroundId> {
        self.name_to_id.get(name).copied()
    }

    pub(crate) fn find_by_file(&self, file_id: FileId) -> Option<BackgroundId> {
        self.file_to_id.get(&file_id).copied()
    }

    /// Bind an extra name to an id. An existing binding is kept.
    pub(crate) fn bind_name(&mut self, name: &str, id: BackgroundId) {
        let bound = *self.name_to_id.entry(name.to_string()).or_insert(id);
        if bound != id {
            logger::warn(&format!(
                "Background name {} stays bound to {} instead of {}",
                name, bound, id
            ));
        }
    }

    /// Merge a candidate record into the registry.
    ///
    /// Merging the same candidate twice leaves the registry unchanged.
    pub(crate) fn merge(&mut self, candidate: &Background, files: &dyn FileRepository) {
        let id = candidate.id;
        let reserved_file_source = self
            .reserved_file_sources
            .remove(&id)
            .map(|(_, file_source_id)| file_source_id);

        let record = self
            .backgrounds
            .entry(id)
            .or_insert_with(|| Background::new(id, candidate.background_type.clone()));
        debug_assert!(reserved_file_source.is_none() || record.file_source_id.is_none());

        record.access_hash = candidate.access_hash;
        record.is_creator = candidate.is_creator;
        record.is_default = candidate.is_default;
        record.is_dark = candidate.is_dark;
        record.has_new_local_id = candidate.has_new_local_id;
        record.background_type = candidate.background_type.clone();

        if record.name != candidate.name {
            if !record.name.is_empty() {
                logger::error(&format!(
                    "Name of {} has changed from {} to {}",
                    id, record.name, candidate.name
                ));
            }
            record.name = candidate.name.clone();

            if !is_background_name_local(&record.name) {
                self.name_to_id.entry(record.name.clone()).or_insert(id);
                self.loaded_from_database.remove(&record.name);
            }
        }

        if record.file_id == candidate.file_id {
            return;
        }

        if let Some(old_file_id) = record.file_id {
            let old_canonical = files.canonical_file_id(old_file_id);
            let new_canonical = candidate.file_id.map(|file_id| files.canonical_file_id(file_id));
            if Some(old_canonical) != new_canonical {
                logger::error(&format!(
                    "File of {} has changed from {} to {:?}",
                    id, old_file_id, candidate.file_id
                ));
                self.file_to_id.remove(&old_file_id);
                record.file_source_id = None;
            }
        }

        if reserved_file_source.is_some() {
            record.file_source_id = reserved_file_source;
        }
        record.file_id = candidate.file_id;

        if let Some(file_id) = record.file_id {
            let access_hash = record.access_hash;
            let file_source_id = *record
                .file_source_id
                .get_or_insert_with(|| files.create_background_file_source(id, access_hash));
            for document_file_id in files.document_file_ids(file_id) {
                files.add_file_source(document_file_id, file_source_id);
            }
            self.file_to_id.entry(file_id).or_insert(id);
        }
    }

    /// Revalidation source of a background, reserved ahead of the record when
    /// it is not known yet. Returns `None` for local ids and known records
    /// without a file.
    pub(crate) fn file_source_id(
        &mut self,
        id: BackgroundId,
        access_hash: i64,
        files: &dyn FileRepository,
    ) -> Option<FileSourceId> {
        if id.is_local() {
            return None;
        }

        if let Some(background) = self.backgrounds.get_mut(&id) {
            if background.file_id.is_none() {
                return None;
            }
            let background_access_hash = background.access_hash;
            return Some(*background.file_source_id.get_or_insert_with(|| {
                files.create_background_file_source(id, background_access_hash)
            }));
        }

        let (reserved_access_hash, file_source_id) = self
            .reserved_file_sources
            .entry(id)
            .or_insert_with(|| (access_hash, files.create_background_file_source(id, access_hash)));
        if *reserved_access_hash != access_hash {
            logger::warn(&format!(
                "Reserved file source of {} was created for another access hash",
                id
            ));
        }
        Some(*file_source_id)
    }

    pub(crate) fn mark_loaded_from_database(&mut self, name: &str) {
        self.loaded_from_database.insert(name.to_string());
    }

    pub(crate) fn is_loaded_from_database(&self, name: &str) -> bool {
        self.loaded_from_database.contains(name)
    }

    pub(crate) fn installed_ids(&self) -> &[BackgroundId] {
        &self.installed_ids
    }

    pub(crate) fn replace_installed(&mut self, ids: Vec<BackgroundId>) {
        self.installed_ids = ids;
    }

    /// Move a freshly installed background to the front of the list.
    pub(crate) fn install_front(&mut self, id: BackgroundId) {
        if !self.installed_ids.contains(&id) {
            self.installed_ids.insert(0, id);
        }
    }

    pub(crate) fn uninstall(&mut self, id: BackgroundId) {
        self.installed_ids.retain(|installed_id| *installed_id != id);
    }

    pub(crate) fn clear_installed(&mut self) {
        self.installed_ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::background_service::test_support::FakeFileRepository;
    use crate::domain::models::background_type::{BackgroundFill, BackgroundType};

    fn wallpaper(id: i64, name: &str, file_id: i64) -> Background {
        Background {
            access_hash: 77,
            name: name.to_string(),
            file_id: Some(FileId(file_id)),
            ..Background::new(
                BackgroundId::remote(id).unwrap(),
                BackgroundType::wallpaper(false, false),
            )
        }
    }

    #[test]
    fn merging_the_same_record_twice_is_a_no_op() {
        let files = FakeFileRepository::new();
        let mut registry = BackgroundRegistry::default();
        let background = wallpaper(5_000_000_001, "AbCdEfGhIjKlMnOp", 10);

        registry.merge(&background, &files);
        let snapshot = registry.clone();
        let sources_created = files.created_file_sources();
        registry.merge(&background, &files);

        assert_eq!(registry, snapshot);
        assert_eq!(files.created_file_sources(), sources_created);
        assert_eq!(
            registry.find_by_name("AbCdEfGhIjKlMnOp"),
            Some(background.id)
        );
        assert_eq!(registry.find_by_file(FileId(10)), Some(background.id));
    }

    #[test]
    fn file_source_is_attached_to_every_document_file() {
        let files = FakeFileRepository::new();
        files.set_document_file_ids(FileId(10), vec![FileId(10), FileId(11)]);
        let mut registry = BackgroundRegistry::default();
        let background = wallpaper(5_000_000_001, "AbCdEfGhIjKlMnOp", 10);

        registry.merge(&background, &files);

        let source = registry.get(background.id).unwrap().file_source_id.unwrap();
        assert_eq!(
            files.added_file_sources(),
            vec![(FileId(10), source), (FileId(11), source)]
        );
    }

    #[test]
    fn changed_file_drops_the_old_file_source() {
        let files = FakeFileRepository::new();
        let mut registry = BackgroundRegistry::default();
        let first = wallpaper(5_000_000_001, "AbCdEfGhIjKlMnOp", 10);
        let second = Background {
            file_id: Some(FileId(20)),
            ..first.clone()
        };

        registry.merge(&first, &files);
        let first_source = registry.get(first.id).unwrap().file_source_id;
        registry.merge(&second, &files);

        let record = registry.get(first.id).unwrap();
        assert_eq!(record.file_id, Some(FileId(20)));
        assert_ne!(record.file_source_id, first_source);
        assert_eq!(registry.find_by_file(FileId(10)), None);
        assert_eq!(registry.find_by_file(FileId(20)), Some(first.id));
    }

    #[test]
    fn aliased_file_keeps_the_file_source() {
        let files = FakeFileRepository::new();
        files.set_canonical(FileId(20), FileId(10));
        let mut registry = BackgroundRegistry::default();
        let first = wallpaper(5_000_000_001, "AbCdEfGhIjKlMnOp", 10);
        let second = Background {
            file_id: Some(FileId(20)),
            ..first.clone()
        };

        registry.merge(&first, &files);
        let first_source = registry.get(first.id).unwrap().file_source_id;
        registry.merge(&second, &files);

        assert_eq!(registry.get(first.id).unwrap().file_source_id, first_source);
        assert_eq!(registry.find_by_file(FileId(10)), Some(first.id));
    }

    #[test]
    fn reserved_file_source_is_adopted_by_the_record() {
        let files = FakeFileRepository::new();
        let mut registry = BackgroundRegistry::default();
        let background = wallpaper(5_000_000_001, "AbCdEfGhIjKlMnOp", 10);

        let reserved = registry
            .file_source_id(background.id, background.access_hash, &files)
            .unwrap();
        assert_eq!(
            registry.file_source_id(background.id, background.access_hash, &files),
            Some(reserved)
        );
        registry.merge(&background, &files);

        assert_eq!(
            registry.get(background.id).unwrap().file_source_id,
            Some(reserved)
        );
        assert_eq!(files.created_file_sources(), 1);
    }

    #[test]
    fn names_are_never_rebound() {
        let files = FakeFileRepository::new();
        let mut registry = BackgroundRegistry::default();
        let first = wallpaper(5_000_000_001, "AbCdEfGhIjKlMnOp", 10);
        let second = wallpaper(5_000_000_002, "AbCdEfGhIjKlMnOp", 20);

        registry.merge(&first, &files);
        registry.merge(&second, &files);
        registry.bind_name("AbCdEfGhIjKlMnOp", second.id);

        assert_eq!(registry.find_by_name("AbCdEfGhIjKlMnOp"), Some(first.id));
    }

    #[test]
    fn local_fill_names_are_not_indexed() {
        let files = FakeFileRepository::new();
        let mut registry = BackgroundRegistry::default();
        let fill = Background::local_fill(
            BackgroundId::local(1),
            BackgroundFill::solid(0xffffff),
            false,
            false,
        );

        registry.merge(&fill, &files);

        assert_eq!(registry.find_by_name("ffffff"), None);
        assert!(registry.get(fill.id).unwrap().file_source_id.is_none());
        assert_eq!(
            registry.file_source_id(fill.id, 0, &files),
            None
        );
    }

    #[test]
    fn indexing_a_name_clears_its_database_marker() {
        let files = FakeFileRepository::new();
        let mut registry = BackgroundRegistry::default();
        registry.mark_loaded_from_database("AbCdEfGhIjKlMnOp");

        registry.merge(&wallpaper(5_000_000_001, "AbCdEfGhIjKlMnOp", 10), &files);

        assert!(!registry.is_loaded_from_database("AbCdEfGhIjKlMnOp"));
    }

    #[test]
    fn installed_list_keeps_each_id_once() {
        let mut registry = BackgroundRegistry::default();
        let first = BackgroundId::Remote(5_000_000_001);
        let second = BackgroundId::Remote(5_000_000_002);

        registry.replace_installed(vec![first]);
        registry.install_front(second);
        registry.install_front(first);
        assert_eq!(registry.installed_ids(), &[second, first]);

        registry.uninstall(second);
        assert_eq!(registry.installed_ids(), &[first]);
        registry.clear_installed();
        assert!(registry.installed_ids().is_empty());
    }
}
