use crate::error::Result;
use crate::events::Group;
use crate::services::group_manager::default_groups;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct GroupDocument {
    groups: Vec<Group>,
}

/// Хранение групп в JSON-файле.
///
/// Порядок групп и процессов сохраняется как есть, поэтому после загрузки
/// классификация (включая правило первого совпадения) не меняется.
#[derive(Debug, Clone)]
pub struct GroupStore {
    path: PathBuf,
}

impl GroupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Отсутствующий файл - не ошибка: возвращаются группы по умолчанию
    pub fn load(&self) -> Result<Vec<Group>> {
        if !self.path.exists() {
            info!("Файл групп {:?} не найден, используются группы по умолчанию", self.path);
            return Ok(default_groups());
        }

        let content = fs::read_to_string(&self.path)?;
        let document: GroupDocument = serde_json::from_str(&content)?;
        info!("Загружено {} групп из {:?}", document.groups.len(), self.path);
        Ok(document.groups)
    }

    /// Запись через временный файл и rename, чтобы не оставить обрезанный JSON
    pub fn save(&self, groups: &[Group]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let document = GroupDocument {
            groups: groups.to_vec(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            warn!("Не удалось заменить {:?}: {}", self.path, e);
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        info!("Сохранено {} групп в {:?}", groups.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::GroupColor;
    use crate::services::group_manager::GroupManager;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_round_trip_preserves_classification() {
        let dir = tempfile::tempdir().unwrap();
        let store = GroupStore::new(dir.path().join("groups.json"));

        let mut original = GroupManager::default();
        original.add_group(Group::new("Overlap", ["chrome", "Zoom"], GroupColor::rgb(1, 2, 3)));
        store.save(original.groups()).unwrap();

        let reloaded = GroupManager::new(store.load().unwrap());
        assert_eq!(reloaded.groups(), original.groups());

        let all_processes: Vec<String> = original
            .groups()
            .iter()
            .flat_map(|g| g.process_names().to_vec())
            .collect();
        for process in &all_processes {
            assert_eq!(
                reloaded.find_group_for_process(process).map(|g| &g.name),
                original.find_group_for_process(process).map(|g| &g.name),
                "процесс {}",
                process
            );
        }
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = GroupStore::new(dir.path().join("absent.json"));
        assert_eq!(store.load().unwrap(), default_groups());
    }

    #[test]
    fn test_hand_written_file_is_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.json");
        fs::write(
            &path,
            r##"{ "groups": [ { "name": "Games", "process_names": ["Steam.exe", "steam", "EpicGamesLauncher"], "color": "#FF0000" } ] }"##,
        )
        .unwrap();

        let groups = GroupStore::new(&path).load().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].process_names(), &["steam".to_string(), "epicgameslauncher".to_string()]);
        assert_eq!(groups[0].color, GroupColor::rgb(0xFF, 0, 0));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groups.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(GroupStore::new(&path).load().is_err());
    }
}
