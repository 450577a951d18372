use crate::error::Result;
use crate::events::{IconImage, IconSize, Monitor, Point, WindowHandle};
use bitflags::bitflags;
use std::path::{Path, PathBuf};
use std::sync::Arc;

bitflags! {
    /// Расширенные стили окна, значимые для фильтрации
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WindowStyle: u32 {
        /// Плавающее служебное окно, не имеющее кнопки на панели задач
        const TOOL_WINDOW = 0x0000_0080;
        const APP_WINDOW = 0x0004_0000;
    }
}

/// Кто отвечает за освобождение дескриптора иконки
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconOwnership {
    /// Принадлежит окну или классу окна, освобождать нельзя
    Shared,
    /// Получен нами (например, извлечён из exe) и должен быть освобождён
    Owned,
}

/// Сырой дескриптор иконки ОС. Оборачивается в `ScopedIcon` сразу после получения.
#[derive(Debug, PartialEq, Eq)]
pub struct RawIcon {
    pub value: usize,
    pub ownership: IconOwnership,
}

impl RawIcon {
    pub fn shared(value: usize) -> Self {
        Self {
            value,
            ownership: IconOwnership::Shared,
        }
    }

    pub fn owned(value: usize) -> Self {
        Self {
            value,
            ownership: IconOwnership::Owned,
        }
    }
}

/// Синхронный интерфейс к оконной подсистеме ОС.
///
/// Все вызовы блокирующие и выполняются из управляющего потока
/// (или из `spawn_blocking`, результат которого возвращается обратно).
pub trait WindowSystem: Send + Sync {
    /// Название бэкенда для логов
    fn name(&self) -> &'static str;

    fn enumerate_top_level_windows(&self) -> Result<Vec<WindowHandle>>;

    fn window_title(&self, handle: WindowHandle) -> Result<String>;

    fn owning_process(&self, handle: WindowHandle) -> Result<u32>;

    /// Имя исполняемого файла процесса без пути (расширение допускается)
    fn process_name(&self, process_id: u32) -> Result<String>;

    fn executable_path(&self, process_id: u32) -> Result<Option<PathBuf>>;

    fn is_visible(&self, handle: WindowHandle) -> bool;

    fn window_style_flags(&self, handle: WindowHandle) -> Result<WindowStyle>;

    fn window_icon(&self, handle: WindowHandle, size: IconSize) -> Option<RawIcon>;

    fn executable_icon(&self, path: &Path) -> Option<RawIcon>;

    /// Конвертирует иконку в изображение приложения, сам дескриптор не освобождает
    fn render_icon(&self, icon: &RawIcon) -> Result<IconImage>;

    fn release_icon(&self, icon: RawIcon);

    fn bring_to_front(&self, handle: WindowHandle) -> bool;

    fn list_monitors(&self) -> Result<Vec<Monitor>>;

    fn cursor_position(&self) -> Result<Point>;
}

/// Дескриптор иконки с гарантированным освобождением при выходе из области видимости
pub struct ScopedIcon<'a> {
    system: &'a dyn WindowSystem,
    icon: Option<RawIcon>,
}

impl<'a> ScopedIcon<'a> {
    pub fn new(system: &'a dyn WindowSystem, icon: RawIcon) -> Self {
        Self {
            system,
            icon: Some(icon),
        }
    }

    pub fn render(&self) -> Result<IconImage> {
        match &self.icon {
            Some(icon) => self.system.render_icon(icon),
            None => Err(crate::grouper_error!(internal, "иконка уже освобождена")),
        }
    }
}

impl Drop for ScopedIcon<'_> {
    fn drop(&mut self) {
        if let Some(icon) = self.icon.take() {
            if icon.ownership == IconOwnership::Owned {
                self.system.release_icon(icon);
            }
        }
    }
}

/// Factory function to create an appropriate window system based on the dry_run flag
pub fn create_window_system(dry_run: bool) -> Result<Arc<dyn WindowSystem>> {
    if dry_run {
        return Ok(Arc::new(super::dry_run::DryRunWindowSystem::demo_desktop()));
    }

    #[cfg(windows)]
    {
        Ok(Arc::new(super::win32::Win32WindowSystem::new()))
    }

    #[cfg(not(windows))]
    {
        tracing::warn!("Оконная подсистема Win32 недоступна на этой платформе, используется эмуляция");
        Ok(Arc::new(super::dry_run::DryRunWindowSystem::demo_desktop()))
    }
}
