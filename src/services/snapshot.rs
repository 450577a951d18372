use crate::config::Config;
use crate::error::Result;
use crate::events::{IconImage, IconSize, WindowHandle, WindowRecord};
use crate::services::window_system::{ScopedIcon, WindowStyle, WindowSystem};
use crate::utils::{cmp_ignore_case, normalize_process_name};
use crate::{debug_if_enabled, trace_if_enabled};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Процессы оболочки и ядра, чьи окна никогда не показываются пользователю
static SYSTEM_PROCESSES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "dwm",
        "winlogon",
        "csrss",
        "smss",
        "wininit",
        "services",
        "lsass",
        "explorer",
        "svchost",
        "conhost",
        "dllhost",
        "sihost",
        "shellexperiencehost",
        "startmenuexperiencehost",
    ]
    .into_iter()
    .collect()
});

const ICON_CHAIN: [IconSize; 3] = [IconSize::Large, IconSize::Small, IconSize::Small2];

/// Снимок окон верхнего уровня, отфильтрованный до "настоящих" пользовательских окон.
///
/// Порядок фильтров: видимость, стиль tool window, пустой заголовок, системный процесс.
/// Результат отсортирован по заголовку без учёта регистра.
#[derive(Clone)]
pub struct SnapshotProvider {
    system: Arc<dyn WindowSystem>,
    extra_system_processes: Arc<HashSet<String>>,
    resolve_icons: bool,
    // Только сконвертированные изображения, никаких дескрипторов ОС
    exe_icon_cache: Arc<DashMap<PathBuf, Arc<IconImage>>>,
}

impl SnapshotProvider {
    pub fn new(system: Arc<dyn WindowSystem>, config: &Config) -> Self {
        Self {
            system,
            extra_system_processes: Arc::new(config.extra_system_processes().clone()),
            resolve_icons: config.snapshot.resolve_icons,
            exe_icon_cache: Arc::new(DashMap::new()),
        }
    }

    pub fn system(&self) -> &Arc<dyn WindowSystem> {
        &self.system
    }

    /// Снимок, в котором полный отказ перечисления превращается в пустой список
    pub fn snapshot(&self) -> Vec<WindowRecord> {
        match self.try_snapshot() {
            Ok(records) => records,
            Err(e) => {
                warn!("Не удалось получить список окон: {}", e);
                Vec::new()
            }
        }
    }

    /// Ошибка возвращается только если не удалось само перечисление
    pub fn try_snapshot(&self) -> Result<Vec<WindowRecord>> {
        let handles = self.system.enumerate_top_level_windows()?;
        let enumerated = handles.len();

        let mut records: Vec<WindowRecord> = handles
            .into_iter()
            .filter_map(|handle| match self.inspect(handle) {
                Ok(record) => record,
                Err(e) if e.is_per_window() => {
                    trace_if_enabled!("Окно {} пропущено: {}", handle, e);
                    None
                }
                Err(e) => {
                    warn!("Окно {} пропущено: {}", handle, e);
                    None
                }
            })
            .collect();

        sort_by_title(&mut records);

        debug_if_enabled!(
            "Снимок {}: {} окон из {} перечисленных",
            self.system.name(),
            records.len(),
            enumerated
        );
        Ok(records)
    }

    pub fn is_system_process(&self, process_name: &str) -> bool {
        let normalized = normalize_process_name(process_name);
        SYSTEM_PROCESSES.contains(normalized.as_str())
            || self.extra_system_processes.contains(&normalized)
    }

    fn inspect(&self, handle: WindowHandle) -> Result<Option<WindowRecord>> {
        if !self.system.is_visible(handle) {
            return Ok(None);
        }

        if self
            .system
            .window_style_flags(handle)?
            .contains(WindowStyle::TOOL_WINDOW)
        {
            return Ok(None);
        }

        let title = self.system.window_title(handle)?;
        if title.trim().is_empty() {
            return Ok(None);
        }

        let process_id = self.system.owning_process(handle)?;
        let process_name = process_stem(&self.system.process_name(process_id)?);
        if self.is_system_process(&process_name) {
            return Ok(None);
        }

        let icon = if self.resolve_icons {
            self.resolve_icon(handle, process_id)
        } else {
            None
        };

        Ok(Some(
            WindowRecord::new(handle, title)
                .with_process(process_id, process_name)
                .with_icon(icon)
                .with_visibility(true),
        ))
    }

    /// WM_GETICON (большая, малая, small2), затем иконка исполняемого файла.
    /// Любой сбой означает "без иконки", а не ошибку снимка.
    fn resolve_icon(&self, handle: WindowHandle, process_id: u32) -> Option<Arc<IconImage>> {
        let system = self.system.as_ref();

        for size in ICON_CHAIN {
            if let Some(raw) = system.window_icon(handle, size) {
                let icon = ScopedIcon::new(system, raw);
                match icon.render() {
                    Ok(image) => return Some(Arc::new(image)),
                    Err(e) => trace_if_enabled!("Иконка {:?} окна {} не сконвертирована: {}", size, handle, e),
                }
            }
        }

        let path = system.executable_path(process_id).ok().flatten()?;
        if let Some(cached) = self.exe_icon_cache.get(&path) {
            return Some(cached.value().clone());
        }

        let raw = system.executable_icon(&path)?;
        let icon = ScopedIcon::new(system, raw);
        match icon.render() {
            Ok(image) => {
                let image = Arc::new(image);
                self.exe_icon_cache.insert(path, image.clone());
                Some(image)
            }
            Err(e) => {
                trace_if_enabled!("Иконка из {:?} не сконвертирована: {}", path, e);
                None
            }
        }
    }
}

/// Имя файла процесса без `.exe`, регистр сохраняется
fn process_stem(raw: &str) -> String {
    let trimmed = raw.trim();
    let split = trimmed.len().saturating_sub(4);
    match trimmed.get(split..) {
        Some(ext) if split > 0 && ext.eq_ignore_ascii_case(".exe") => trimmed[..split].to_string(),
        _ => trimmed.to_string(),
    }
}

/// Детерминированный порядок: заголовок без учёта регистра, затем точный заголовок, затем дескриптор
pub fn sort_by_title(records: &mut [WindowRecord]) {
    records.sort_by(|a, b| {
        cmp_ignore_case(&a.title, &b.title)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.handle.cmp(&b.handle))
    });
}
