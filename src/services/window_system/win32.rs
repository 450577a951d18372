//! Бэкенд поверх user32/gdi32/shell32.
//!
//! Каждый дескриптор, который требует освобождения (HICON из ExtractIconW,
//! HBITMAP из GetIconInfo, HDC экрана, HANDLE процесса), живёт внутри guard-структуры
//! с `Drop`, так что ранний `return` или `?` не оставляет утечек.

use crate::debug_if_enabled;
use crate::error::{GrouperError, Result};
use crate::events::{IconImage, IconSize, Monitor, Point, Rect, WindowHandle};
use std::ffi::OsString;
use std::mem;
use std::os::windows::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::ptr;
use tracing::{info, warn};

use winapi::shared::minwindef::{BOOL, DWORD, FALSE, LPARAM, MAX_PATH, TRUE, UINT, WPARAM};
use winapi::shared::windef::{HBITMAP, HDC, HICON, HMONITOR, HWND, LPRECT, POINT, RECT};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::handleapi::CloseHandle;
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::shellapi::ExtractIconW;
use winapi::um::winbase::QueryFullProcessImageNameW;
use winapi::um::wingdi::{
    DeleteObject, GetDIBits, GetObjectW, BITMAP, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    DIB_RGB_COLORS,
};
use winapi::um::winnt::{HANDLE, PROCESS_QUERY_LIMITED_INFORMATION};
use winapi::um::winuser::{
    DestroyIcon, EnumDisplayMonitors, EnumWindows, GetCursorPos, GetDC, GetIconInfo,
    GetMonitorInfoW, GetWindowLongW, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, ReleaseDC,
    SendMessageTimeoutW, SetForegroundWindow, ShowWindow, GWL_EXSTYLE, ICONINFO, ICON_BIG,
    ICON_SMALL, ICON_SMALL2, MONITORINFO, MONITORINFOF_PRIMARY, SMTO_ABORTIFHUNG, SW_RESTORE,
    SW_SHOW, WM_GETICON,
};

use super::pixels::{has_alpha, icon_rgba};
use super::r#trait::{RawIcon, WindowStyle, WindowSystem};

/// Сколько ждём ответа на WM_GETICON от зависшего окна
const ICON_MESSAGE_TIMEOUT_MS: UINT = 100;

pub struct Win32WindowSystem;

impl Win32WindowSystem {
    pub fn new() -> Self {
        info!("Инициализация Win32WindowSystem");
        Self
    }
}

fn hwnd(handle: WindowHandle) -> HWND {
    handle.value() as usize as HWND
}

fn last_error(call: &'static str) -> GrouperError {
    let code = unsafe { GetLastError() };
    GrouperError::os(call, format!("код ошибки {}", code))
}

/// HANDLE процесса, закрывается в Drop
struct ProcessHandle(HANDLE);

impl ProcessHandle {
    fn open(process_id: u32) -> Result<Self> {
        let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, process_id) };
        if handle.is_null() {
            return Err(GrouperError::ProcessGone(process_id));
        }
        Ok(Self(handle))
    }

    fn image_path(&self) -> Result<PathBuf> {
        let mut buffer = vec![0u16; MAX_PATH * 4];
        let mut size = buffer.len() as DWORD;
        let ok = unsafe { QueryFullProcessImageNameW(self.0, 0, buffer.as_mut_ptr(), &mut size) };
        if ok == FALSE {
            return Err(last_error("QueryFullProcessImageNameW"));
        }
        Ok(PathBuf::from(OsString::from_wide(&buffer[..size as usize])))
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        unsafe {
            CloseHandle(self.0);
        }
    }
}

/// HBITMAP, полученный из GetIconInfo; удаляется в Drop
struct GdiBitmap(HBITMAP);

impl Drop for GdiBitmap {
    fn drop(&mut self) {
        if !self.0.is_null() {
            unsafe {
                DeleteObject(self.0 as _);
            }
        }
    }
}

/// Контекст устройства экрана; освобождается в Drop
struct ScreenDc(HDC);

impl ScreenDc {
    fn acquire() -> Result<Self> {
        let dc = unsafe { GetDC(ptr::null_mut()) };
        if dc.is_null() {
            return Err(last_error("GetDC"));
        }
        Ok(Self(dc))
    }
}

impl Drop for ScreenDc {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(ptr::null_mut(), self.0);
        }
    }
}

unsafe extern "system" fn enum_windows_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let handles = &mut *(lparam as *mut Vec<WindowHandle>);
    handles.push(WindowHandle::new(hwnd as usize as u64));
    TRUE // Продолжаем перечисление
}

unsafe extern "system" fn enum_monitors_proc(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _rect: LPRECT,
    lparam: LPARAM,
) -> BOOL {
    let monitors = &mut *(lparam as *mut Vec<Monitor>);

    let mut info: MONITORINFO = mem::zeroed();
    info.cbSize = mem::size_of::<MONITORINFO>() as DWORD;
    if GetMonitorInfoW(hmonitor, &mut info) == FALSE {
        // Частичные данные лучше, чем отказ целиком
        return TRUE;
    }

    let to_rect = |r: RECT| Rect::new(r.left, r.top, r.right, r.bottom);
    let mut monitor = Monitor::new(to_rect(info.rcMonitor), to_rect(info.rcWork));
    if info.dwFlags & MONITORINFOF_PRIMARY != 0 {
        monitor = monitor.primary();
    }
    monitors.push(monitor);
    TRUE
}

impl WindowSystem for Win32WindowSystem {
    fn name(&self) -> &'static str {
        "win32"
    }

    fn enumerate_top_level_windows(&self) -> Result<Vec<WindowHandle>> {
        let mut handles: Vec<WindowHandle> = Vec::with_capacity(256);
        let ok = unsafe {
            EnumWindows(
                Some(enum_windows_proc),
                &mut handles as *mut Vec<WindowHandle> as LPARAM,
            )
        };
        if ok == FALSE {
            return Err(crate::grouper_error!(
                enumeration,
                "EnumWindows завершился с ошибкой {}",
                unsafe { GetLastError() }
            ));
        }
        debug_if_enabled!("EnumWindows вернул {} окон", handles.len());
        Ok(handles)
    }

    fn window_title(&self, handle: WindowHandle) -> Result<String> {
        unsafe {
            if IsWindow(hwnd(handle)) == FALSE {
                return Err(GrouperError::WindowGone(handle.to_string()));
            }
            let length = GetWindowTextLengthW(hwnd(handle));
            if length <= 0 {
                return Ok(String::new());
            }
            let mut buffer = vec![0u16; length as usize + 1];
            let copied = GetWindowTextW(hwnd(handle), buffer.as_mut_ptr(), buffer.len() as i32);
            if copied <= 0 {
                return Ok(String::new());
            }
            Ok(String::from_utf16_lossy(&buffer[..copied as usize]))
        }
    }

    fn owning_process(&self, handle: WindowHandle) -> Result<u32> {
        let mut process_id: DWORD = 0;
        let thread_id = unsafe { GetWindowThreadProcessId(hwnd(handle), &mut process_id) };
        if thread_id == 0 || process_id == 0 {
            return Err(GrouperError::WindowGone(handle.to_string()));
        }
        Ok(process_id)
    }

    fn process_name(&self, process_id: u32) -> Result<String> {
        let path = ProcessHandle::open(process_id)?.image_path()?;
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or(GrouperError::ProcessGone(process_id))
    }

    fn executable_path(&self, process_id: u32) -> Result<Option<PathBuf>> {
        Ok(Some(ProcessHandle::open(process_id)?.image_path()?))
    }

    fn is_visible(&self, handle: WindowHandle) -> bool {
        unsafe { IsWindowVisible(hwnd(handle)) != FALSE }
    }

    fn window_style_flags(&self, handle: WindowHandle) -> Result<WindowStyle> {
        let ex_style = unsafe { GetWindowLongW(hwnd(handle), GWL_EXSTYLE) } as u32;
        Ok(WindowStyle::from_bits_truncate(ex_style))
    }

    fn window_icon(&self, handle: WindowHandle, size: IconSize) -> Option<RawIcon> {
        let kind = match size {
            IconSize::Large => ICON_BIG,
            IconSize::Small => ICON_SMALL,
            IconSize::Small2 => ICON_SMALL2,
        };
        let mut result: usize = 0;
        let sent = unsafe {
            SendMessageTimeoutW(
                hwnd(handle),
                WM_GETICON,
                kind as WPARAM,
                0,
                SMTO_ABORTIFHUNG,
                ICON_MESSAGE_TIMEOUT_MS,
                &mut result,
            )
        };
        if sent == 0 || result == 0 {
            return None;
        }
        // Иконка принадлежит окну: DestroyIcon для неё вызывать нельзя
        Some(RawIcon::shared(result))
    }

    fn executable_icon(&self, path: &Path) -> Option<RawIcon> {
        let wide: Vec<u16> = path.as_os_str().encode_wide().chain(Some(0)).collect();
        let icon = unsafe { ExtractIconW(ptr::null_mut(), wide.as_ptr(), 0) };
        // ExtractIconW возвращает 1, если файл не является exe/dll/ico
        if icon.is_null() || icon as usize == 1 {
            return None;
        }
        Some(RawIcon::owned(icon as usize))
    }

    fn render_icon(&self, icon: &RawIcon) -> Result<IconImage> {
        unsafe {
            let mut info: ICONINFO = mem::zeroed();
            if GetIconInfo(icon.value as HICON, &mut info) == FALSE {
                return Err(last_error("GetIconInfo"));
            }
            // Обе битовые карты принадлежат нам и удаляются на любом пути выхода
            let color = GdiBitmap(info.hbmColor);
            let mask = GdiBitmap(info.hbmMask);
            if color.0.is_null() {
                return Err(GrouperError::os("GetIconInfo", "монохромная иконка"));
            }

            let mut bitmap: BITMAP = mem::zeroed();
            let read = GetObjectW(
                color.0 as _,
                mem::size_of::<BITMAP>() as i32,
                &mut bitmap as *mut BITMAP as _,
            );
            if read == 0 || bitmap.bmWidth <= 0 || bitmap.bmHeight <= 0 {
                return Err(last_error("GetObjectW"));
            }

            let width = bitmap.bmWidth;
            let height = bitmap.bmHeight;
            let mut header: BITMAPINFO = mem::zeroed();
            header.bmiHeader = BITMAPINFOHEADER {
                biSize: mem::size_of::<BITMAPINFOHEADER>() as DWORD,
                biWidth: width,
                biHeight: -height, // строки сверху вниз
                biPlanes: 1,
                biBitCount: 32,
                biCompression: BI_RGB,
                ..mem::zeroed()
            };

            let dc = ScreenDc::acquire()?;
            let mut pixels = vec![0u8; width as usize * height as usize * 4];
            let lines = GetDIBits(
                dc.0,
                color.0,
                0,
                height as UINT,
                pixels.as_mut_ptr() as _,
                &mut header,
                DIB_RGB_COLORS,
            );
            if lines == 0 {
                return Err(last_error("GetDIBits"));
            }

            // Маска нужна только иконкам без альфа-канала
            let mut mask_pixels = None;
            if !has_alpha(&pixels) && !mask.0.is_null() {
                let mut bits = vec![0u8; pixels.len()];
                let lines = GetDIBits(
                    dc.0,
                    mask.0,
                    0,
                    height as UINT,
                    bits.as_mut_ptr() as _,
                    &mut header,
                    DIB_RGB_COLORS,
                );
                if lines == 0 {
                    debug_if_enabled!("Маска иконки 0x{:X} не прочитана", icon.value);
                } else {
                    mask_pixels = Some(bits);
                }
            }
            let pixels = icon_rgba(pixels, mask_pixels.as_deref());

            IconImage::new(width as u32, height as u32, pixels)
                .ok_or_else(|| GrouperError::os("GetDIBits", "неверный размер буфера"))
        }
    }

    fn release_icon(&self, icon: RawIcon) {
        if unsafe { DestroyIcon(icon.value as HICON) } == FALSE {
            warn!("DestroyIcon не удался для иконки 0x{:X}", icon.value);
        }
    }

    fn bring_to_front(&self, handle: WindowHandle) -> bool {
        unsafe {
            if IsWindow(hwnd(handle)) == FALSE {
                return false;
            }
            if IsIconic(hwnd(handle)) != FALSE {
                ShowWindow(hwnd(handle), SW_RESTORE);
            } else {
                ShowWindow(hwnd(handle), SW_SHOW);
            }
            SetForegroundWindow(hwnd(handle)) != FALSE
        }
    }

    fn list_monitors(&self) -> Result<Vec<Monitor>> {
        let mut monitors: Vec<Monitor> = Vec::new();
        let ok = unsafe {
            EnumDisplayMonitors(
                ptr::null_mut(),
                ptr::null(),
                Some(enum_monitors_proc),
                &mut monitors as *mut Vec<Monitor> as LPARAM,
            )
        };
        if ok == FALSE {
            return Err(last_error("EnumDisplayMonitors"));
        }
        Ok(monitors)
    }

    fn cursor_position(&self) -> Result<Point> {
        let mut point = POINT { x: 0, y: 0 };
        if unsafe { GetCursorPos(&mut point) } == FALSE {
            return Err(last_error("GetCursorPos"));
        }
        Ok(Point::new(point.x, point.y))
    }
}
