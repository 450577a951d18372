use crate::error::{GrouperError, Result};
use crate::events::{Group, WindowRecord};
use crate::grouper_error;
use crate::services::group_manager::{windows_by_group, GroupManager};
use crate::services::snapshot::SnapshotProvider;
use crate::debug_if_enabled;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupBucket {
    pub group: Group,
    pub windows: Vec<WindowRecord>,
}

/// Результат одного обновления: окна по группам и, возможно, предупреждение для пользователя
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupedView {
    pub buckets: Vec<GroupBucket>,
    pub total_windows: usize,
    pub warning: Option<String>,
}

impl GroupedView {
    /// Пустой вид показывается с индикатором "окна не найдены"
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn grouped_windows(&self) -> usize {
        self.buckets.iter().map(|b| b.windows.len()).sum()
    }

    fn failed(error: &GrouperError) -> Self {
        Self {
            warning: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Снимок окон + классификация по текущему списку групп
#[derive(Clone)]
pub struct GroupingEngine {
    provider: SnapshotProvider,
    groups: Arc<Mutex<GroupManager>>,
}

impl GroupingEngine {
    pub fn new(provider: SnapshotProvider, groups: Arc<Mutex<GroupManager>>) -> Self {
        Self { provider, groups }
    }

    pub fn provider(&self) -> &SnapshotProvider {
        &self.provider
    }

    pub fn groups(&self) -> &Arc<Mutex<GroupManager>> {
        &self.groups
    }

    /// Классификация по стабильной копии групп: правка групп во время прохода не видна
    pub fn classify(&self, records: &[WindowRecord]) -> GroupedView {
        let groups = self.groups.lock().snapshot_groups();
        let buckets: Vec<GroupBucket> = windows_by_group(&groups, records)
            .into_iter()
            .map(|(group, windows)| GroupBucket { group, windows })
            .collect();

        let view = GroupedView {
            total_windows: records.len(),
            buckets,
            warning: None,
        };
        debug_if_enabled!(
            "Классификация: {} из {} окон в {} группах",
            view.grouped_windows(),
            view.total_windows,
            view.buckets.len()
        );
        view
    }

    /// Синхронное обновление для CLI-команд
    pub fn refresh_blocking(&self) -> GroupedView {
        match self.provider.try_snapshot() {
            Ok(records) => self.classify(&records),
            Err(e) => {
                warn!("Обновление не удалось: {}", e);
                GroupedView::failed(&e)
            }
        }
    }

    /// Перечисление окон уходит в blocking-пул с таймаутом,
    /// классификация выполняется уже на вызывающей задаче.
    /// Полный отказ даёт пустой вид с предупреждением, а не ошибку.
    pub async fn refresh(&self, timeout: Duration) -> GroupedView {
        match self.snapshot_with_timeout(timeout).await {
            Ok(records) => self.classify(&records),
            Err(e) => {
                warn!("Обновление не удалось: {}", e);
                GroupedView::failed(&e)
            }
        }
    }

    async fn snapshot_with_timeout(&self, timeout: Duration) -> Result<Vec<WindowRecord>> {
        let provider = self.provider.clone();
        let task = tokio::task::spawn_blocking(move || provider.try_snapshot());

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(grouper_error!(internal, "задача снимка завершилась аварийно: {}", join_error)),
            Err(_) => Err(grouper_error!(timeout, "перечисление окон дольше {:?}", timeout)),
        }
    }
}
