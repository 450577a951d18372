use crate::error::{GrouperError, Result};
use crate::events::{IconImage, IconSize, Monitor, Point, Rect, WindowHandle};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use super::r#trait::{IconOwnership, RawIcon, WindowStyle, WindowSystem};

const EXE_ICON_BASE: usize = 1 << 40;

/// Эмулируемое окно верхнего уровня
#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub handle: WindowHandle,
    pub title: String,
    pub process_id: u32,
    pub visible: bool,
    pub style: WindowStyle,
    /// Размеры иконок, на которые окно отвечает через WM_GETICON
    pub icon_sizes: Vec<IconSize>,
    /// Окно закрылось между перечислением и запросом деталей
    pub gone: bool,
}

impl FakeWindow {
    pub fn new(handle: u64, title: &str, process_id: u32) -> Self {
        Self {
            handle: WindowHandle::new(handle),
            title: title.to_string(),
            process_id,
            visible: true,
            style: WindowStyle::APP_WINDOW,
            icon_sizes: Vec::new(),
            gone: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn tool_window(mut self) -> Self {
        self.style = WindowStyle::TOOL_WINDOW;
        self
    }

    pub fn with_icon(mut self, size: IconSize) -> Self {
        self.icon_sizes.push(size);
        self
    }

    pub fn gone(mut self) -> Self {
        self.gone = true;
        self
    }
}

/// Эмулируемый процесс-владелец
#[derive(Debug, Clone)]
pub struct FakeProcess {
    pub process_id: u32,
    pub name: String,
    pub executable: Option<PathBuf>,
    pub exited: bool,
    /// Иконка из exe извлекается, но не конвертируется
    pub broken_icon: bool,
}

impl FakeProcess {
    pub fn new(process_id: u32, name: &str) -> Self {
        Self {
            process_id,
            name: name.to_string(),
            executable: Some(PathBuf::from(format!("C:\\Program Files\\{0}\\{0}.exe", name))),
            exited: false,
            broken_icon: false,
        }
    }

    pub fn without_executable(mut self) -> Self {
        self.executable = None;
        self
    }

    pub fn exited(mut self) -> Self {
        self.exited = true;
        self
    }

    pub fn with_broken_icon(mut self) -> Self {
        self.broken_icon = true;
        self
    }
}

#[derive(Debug, Default)]
struct DesktopState {
    windows: Vec<FakeWindow>,
    processes: HashMap<u32, FakeProcess>,
    monitors: Vec<Monitor>,
    cursor: Point,
    enumeration_fails: bool,
    monitors_fail: bool,
}

/// Оконная подсистема в памяти: для `--dry-run` и тестов.
///
/// Считает полученные и освобождённые собственные иконки, чтобы утечки были видны в тестах.
#[derive(Debug, Default)]
pub struct DryRunWindowSystem {
    state: RwLock<DesktopState>,
    owned_icons_acquired: AtomicUsize,
    owned_icons_released: AtomicUsize,
    focused: Mutex<Vec<WindowHandle>>,
}

impl DryRunWindowSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Рабочий стол для режима сухого запуска: два монитора и типичный набор окон
    pub fn demo_desktop() -> Self {
        info!("Dry-run режим - оконная подсистема работает в режиме эмуляции");

        Self::new()
            .with_monitor(Monitor::new(Rect::new(0, 0, 1920, 1080), Rect::new(0, 0, 1920, 1040)).primary())
            .with_monitor(Monitor::new(Rect::new(1920, 0, 4480, 1440), Rect::new(1920, 0, 4480, 1440)))
            .with_cursor(Point::new(960, 1060))
            .with_process(FakeProcess::new(100, "explorer"))
            .with_process(FakeProcess::new(200, "chrome"))
            .with_process(FakeProcess::new(300, "Code"))
            .with_process(FakeProcess::new(400, "Spotify"))
            .with_process(FakeProcess::new(500, "slack"))
            .with_process(FakeProcess::new(600, "CalculatorApp"))
            .with_process(FakeProcess::new(700, "conhost"))
            .with_window(FakeWindow::new(0x10010, "Program Manager", 100))
            .with_window(FakeWindow::new(0x20020, "GitHub - Google Chrome", 200).with_icon(IconSize::Large))
            .with_window(FakeWindow::new(0x20040, "docs.rs - Google Chrome", 200).with_icon(IconSize::Small))
            .with_window(FakeWindow::new(0x30030, "main.rs - taskbar-grouper - Visual Studio Code", 300))
            .with_window(FakeWindow::new(0x40040, "Spotify Premium", 400).with_icon(IconSize::Large))
            .with_window(FakeWindow::new(0x50050, "general | Slack", 500))
            .with_window(FakeWindow::new(0x50060, "Slack notifications", 500).tool_window())
            .with_window(FakeWindow::new(0x60060, "Calculator", 600))
            .with_window(FakeWindow::new(0x70070, "Windows PowerShell", 700))
            .with_window(FakeWindow::new(0x80080, "   ", 200))
            .with_window(FakeWindow::new(0x90090, "Hidden Chrome Helper", 200).hidden())
    }

    pub fn with_window(self, window: FakeWindow) -> Self {
        self.state.write().windows.push(window);
        self
    }

    pub fn with_process(self, process: FakeProcess) -> Self {
        self.state.write().processes.insert(process.process_id, process);
        self
    }

    pub fn with_monitor(self, monitor: Monitor) -> Self {
        self.state.write().monitors.push(monitor);
        self
    }

    pub fn with_cursor(self, cursor: Point) -> Self {
        self.state.write().cursor = cursor;
        self
    }

    pub fn failing_enumeration(self) -> Self {
        self.state.write().enumeration_fails = true;
        self
    }

    pub fn failing_monitors(self) -> Self {
        self.state.write().monitors_fail = true;
        self
    }

    pub fn owned_icons_acquired(&self) -> usize {
        self.owned_icons_acquired.load(Ordering::SeqCst)
    }

    pub fn owned_icons_released(&self) -> usize {
        self.owned_icons_released.load(Ordering::SeqCst)
    }

    pub fn focused_windows(&self) -> Vec<WindowHandle> {
        self.focused.lock().clone()
    }

    fn with_live_window<T>(&self, handle: WindowHandle, f: impl FnOnce(&FakeWindow) -> T) -> Result<T> {
        let state = self.state.read();
        state
            .windows
            .iter()
            .find(|w| w.handle == handle && !w.gone)
            .map(f)
            .ok_or_else(|| GrouperError::WindowGone(handle.to_string()))
    }

    fn with_live_process<T>(&self, process_id: u32, f: impl FnOnce(&FakeProcess) -> T) -> Result<T> {
        let state = self.state.read();
        state
            .processes
            .get(&process_id)
            .filter(|p| !p.exited)
            .map(f)
            .ok_or(GrouperError::ProcessGone(process_id))
    }
}

fn icon_size_index(size: IconSize) -> usize {
    match size {
        IconSize::Large => 1,
        IconSize::Small => 2,
        IconSize::Small2 => 3,
    }
}

impl WindowSystem for DryRunWindowSystem {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn enumerate_top_level_windows(&self) -> Result<Vec<WindowHandle>> {
        let state = self.state.read();
        if state.enumeration_fails {
            return Err(crate::grouper_error!(enumeration, "EnumWindows вернул FALSE (эмуляция)"));
        }
        Ok(state.windows.iter().map(|w| w.handle).collect())
    }

    fn window_title(&self, handle: WindowHandle) -> Result<String> {
        self.with_live_window(handle, |w| w.title.clone())
    }

    fn owning_process(&self, handle: WindowHandle) -> Result<u32> {
        self.with_live_window(handle, |w| w.process_id)
    }

    fn process_name(&self, process_id: u32) -> Result<String> {
        self.with_live_process(process_id, |p| p.name.clone())
    }

    fn executable_path(&self, process_id: u32) -> Result<Option<PathBuf>> {
        self.with_live_process(process_id, |p| p.executable.clone())
    }

    fn is_visible(&self, handle: WindowHandle) -> bool {
        self.with_live_window(handle, |w| w.visible).unwrap_or(false)
    }

    fn window_style_flags(&self, handle: WindowHandle) -> Result<WindowStyle> {
        self.with_live_window(handle, |w| w.style)
    }

    fn window_icon(&self, handle: WindowHandle, size: IconSize) -> Option<RawIcon> {
        self.with_live_window(handle, |w| w.icon_sizes.contains(&size))
            .ok()
            .filter(|answers| *answers)
            .map(|_| RawIcon::shared(handle.value() as usize * 4 + icon_size_index(size)))
    }

    fn executable_icon(&self, path: &Path) -> Option<RawIcon> {
        let state = self.state.read();
        let process = state
            .processes
            .values()
            .find(|p| p.executable.as_deref() == Some(path))?;
        self.owned_icons_acquired.fetch_add(1, Ordering::SeqCst);
        Some(RawIcon::owned(EXE_ICON_BASE + process.process_id as usize))
    }

    fn render_icon(&self, icon: &RawIcon) -> Result<IconImage> {
        if icon.value >= EXE_ICON_BASE {
            let process_id = (icon.value - EXE_ICON_BASE) as u32;
            let broken = self.with_live_process(process_id, |p| p.broken_icon).unwrap_or(true);
            if broken {
                return Err(GrouperError::os("GetIconInfo", "повреждённая иконка (эмуляция)"));
            }
        }
        let bytes = (icon.value as u32).to_le_bytes();
        IconImage::new(1, 1, vec![bytes[0], bytes[1], bytes[2], 0xFF])
            .ok_or_else(|| crate::grouper_error!(internal, "пустое изображение иконки"))
    }

    fn release_icon(&self, icon: RawIcon) {
        debug_assert_eq!(icon.ownership, IconOwnership::Owned);
        self.owned_icons_released.fetch_add(1, Ordering::SeqCst);
    }

    fn bring_to_front(&self, handle: WindowHandle) -> bool {
        if self.with_live_window(handle, |_| ()).is_err() {
            return false;
        }
        info!("Dry-run: активируем окно {}", handle);
        self.focused.lock().push(handle);
        true
    }

    fn list_monitors(&self) -> Result<Vec<Monitor>> {
        let state = self.state.read();
        if state.monitors_fail {
            return Err(GrouperError::os("EnumDisplayMonitors", "эмуляция сбоя"));
        }
        Ok(state.monitors.clone())
    }

    fn cursor_position(&self) -> Result<Point> {
        Ok(self.state.read().cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gone_windows_report_errors() {
        let system = DryRunWindowSystem::new()
            .with_process(FakeProcess::new(1, "app"))
            .with_window(FakeWindow::new(10, "Alive", 1))
            .with_window(FakeWindow::new(11, "Closed", 1).gone());

        assert_eq!(system.enumerate_top_level_windows().unwrap().len(), 2);
        assert_eq!(system.window_title(WindowHandle::new(10)).unwrap(), "Alive");
        assert!(matches!(
            system.window_title(WindowHandle::new(11)),
            Err(GrouperError::WindowGone(_))
        ));
        assert!(!system.is_visible(WindowHandle::new(11)));
    }

    #[test]
    fn exe_icons_are_owned_and_counted() {
        let system = DryRunWindowSystem::new().with_process(FakeProcess::new(7, "vlc"));
        let path = system.executable_path(7).unwrap().unwrap();

        let icon = system.executable_icon(&path).unwrap();
        assert_eq!(icon.ownership, IconOwnership::Owned);
        assert_eq!(system.owned_icons_acquired(), 1);

        system.release_icon(icon);
        assert_eq!(system.owned_icons_released(), 1);
    }

    #[test]
    fn bring_to_front_records_focus() {
        let system = DryRunWindowSystem::demo_desktop();
        assert!(system.bring_to_front(WindowHandle::new(0x20020)));
        assert!(!system.bring_to_front(WindowHandle::new(0xDEAD)));
        assert_eq!(system.focused_windows(), vec![WindowHandle::new(0x20020)]);
    }
}
