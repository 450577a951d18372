use crate::events::{Group, GroupColor, WindowRecord};
use std::sync::Arc;
use tracing::info;

/// Окно вместе с группой, к которой оно отнесено
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedWindow {
    pub window: WindowRecord,
    pub group: Group,
}

/// Упорядоченный список пользовательских групп.
///
/// Порядок значим: окно относится к ПЕРВОЙ группе, содержащей имя его процесса.
/// Окна без группы отбрасываются, корзины "без группы" нет.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupManager {
    groups: Vec<Group>,
}

impl Default for GroupManager {
    fn default() -> Self {
        Self::new(default_groups())
    }
}

impl GroupManager {
    pub fn new(groups: Vec<Group>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Стабильная копия списка на время одного прохода классификации
    pub fn snapshot_groups(&self) -> Arc<[Group]> {
        Arc::from(self.groups.as_slice())
    }

    pub fn add_group(&mut self, group: Group) {
        info!("Добавлена группа: {}", group);
        self.groups.push(group);
    }

    /// Удаляет ВСЕ группы с указанным именем, возвращает количество удалённых
    pub fn remove_group(&mut self, name: &str) -> usize {
        let before = self.groups.len();
        self.groups.retain(|g| g.name != name);
        let removed = before - self.groups.len();
        if removed > 0 {
            info!("Удалено групп с именем '{}': {}", name, removed);
        }
        removed
    }

    pub fn find_group_for_process(&self, process_name: &str) -> Option<&Group> {
        find_group_for_process(&self.groups, process_name)
    }

    pub fn group_windows(&self, windows: &[WindowRecord]) -> Vec<GroupedWindow> {
        group_windows(&self.groups, windows)
    }

    pub fn windows_by_group(&self, windows: &[WindowRecord]) -> Vec<(Group, Vec<WindowRecord>)> {
        windows_by_group(&self.groups, windows)
    }
}

/// Первая по порядку группа, содержащая процесс
pub fn find_group_for_process<'a>(groups: &'a [Group], process_name: &str) -> Option<&'a Group> {
    groups.iter().find(|g| g.contains_process(process_name))
}

fn find_group_index(groups: &[Group], process_name: &str) -> Option<usize> {
    groups.iter().position(|g| g.contains_process(process_name))
}

/// Классификация в порядке входа; окна без группы отбрасываются
pub fn group_windows(groups: &[Group], windows: &[WindowRecord]) -> Vec<GroupedWindow> {
    windows
        .iter()
        .filter_map(|window| {
            find_group_for_process(groups, &window.process_name).map(|group| GroupedWindow {
                window: window.clone(),
                group: group.clone(),
            })
        })
        .collect()
}

/// Окна, собранные по группам.
///
/// Корзины идут в порядке хранения групп, пустые группы опускаются;
/// внутри корзины сохраняется порядок окон из входа.
/// Группы с одинаковым именем остаются разными корзинами.
pub fn windows_by_group(groups: &[Group], windows: &[WindowRecord]) -> Vec<(Group, Vec<WindowRecord>)> {
    let mut buckets: Vec<Vec<WindowRecord>> = vec![Vec::new(); groups.len()];
    for window in windows {
        if let Some(index) = find_group_index(groups, &window.process_name) {
            buckets[index].push(window.clone());
        }
    }

    groups
        .iter()
        .zip(buckets)
        .filter(|(_, windows)| !windows.is_empty())
        .map(|(group, windows)| (group.clone(), windows))
        .collect()
}

/// Группы, которые создаются при первом запуске
pub fn default_groups() -> Vec<Group> {
    vec![
        Group::new(
            "Browsers",
            ["chrome", "firefox", "msedge", "opera", "brave"],
            GroupColor::DODGER_BLUE,
        ),
        Group::new(
            "Development",
            ["devenv", "Code", "rider", "webstorm", "idea64", "notepad++"],
            GroupColor::GREEN,
        ),
        Group::new(
            "Media",
            ["vlc", "wmplayer", "spotify", "itunes", "foobar2000"],
            GroupColor::PURPLE,
        ),
        Group::new(
            "Office",
            ["winword", "excel", "powerpnt", "outlook", "teams"],
            GroupColor::ORANGE,
        ),
        Group::new(
            "Communication",
            ["discord", "slack", "telegram", "whatsapp", "skype"],
            GroupColor::TEAL,
        ),
    ]
}
