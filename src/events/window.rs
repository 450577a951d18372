use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Непрозрачный идентификатор окна ОС.
///
/// Действителен только в пределах одного снимка: ОС может переиспользовать
/// значение после закрытия окна, поэтому его нельзя сохранять между снимками.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowHandle(u64);

impl WindowHandle {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

impl FromStr for WindowHandle {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u64::from_str_radix(hex, 16).map(Self),
            None => s.parse::<u64>().map(Self),
        }
    }
}

/// Изображение иконки, принадлежащее приложению (RGBA, построчно сверху вниз).
///
/// Никаких дескрипторов ОС здесь нет: они освобождаются сразу после конвертации.
#[derive(Clone, PartialEq, Eq)]
pub struct IconImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl IconImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Option<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if width == 0 || height == 0 || rgba.len() != expected {
            return None;
        }
        Some(Self { width, height, rgba })
    }
}

impl fmt::Debug for IconImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IconImage({}x{})", self.width, self.height)
    }
}

/// Информация об окне верхнего уровня на момент снимка
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRecord {
    pub handle: WindowHandle,
    pub title: String,
    pub process_id: u32,
    pub process_name: String,
    pub icon: Option<Arc<IconImage>>,
    pub is_visible: bool,
}

impl WindowRecord {
    pub fn new(handle: WindowHandle, title: String) -> Self {
        Self {
            handle,
            title,
            process_id: 0,
            process_name: String::new(),
            icon: None,
            is_visible: true,
        }
    }

    pub fn with_process(mut self, process_id: u32, process_name: String) -> Self {
        self.process_id = process_id;
        self.process_name = process_name;
        self
    }

    pub fn with_icon(mut self, icon: Option<Arc<IconImage>>) -> Self {
        self.icon = icon;
        self
    }

    pub fn with_visibility(mut self, is_visible: bool) -> Self {
        self.is_visible = is_visible;
        self
    }
}

impl fmt::Display for WindowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.process_name.is_empty() {
            write!(f, "\"{}\" [{}]", self.title, self.handle)
        } else {
            write!(
                f,
                "\"{}\" ({}:{}) [{}]",
                self.title, self.process_name, self.process_id, self.handle
            )
        }
    }
}

/// Размер иконки, запрашиваемой у окна
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IconSize {
    Large,
    Small,
    Small2,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_record_creation() {
        let window = WindowRecord::new(WindowHandle::new(0x1A2B), "Test Window".to_string())
            .with_process(1234, "chrome".to_string());

        assert_eq!(window.title, "Test Window");
        assert_eq!(window.process_name, "chrome");
        assert_eq!(window.process_id, 1234);
        assert!(window.is_visible);
        assert!(window.icon.is_none());
        assert_eq!(window.to_string(), "\"Test Window\" (chrome:1234) [0x1A2B]");
    }

    #[test]
    fn test_handle_parsing() {
        assert_eq!("0x1A2B".parse::<WindowHandle>().unwrap(), WindowHandle::new(0x1A2B));
        assert_eq!("6699".parse::<WindowHandle>().unwrap(), WindowHandle::new(6699));
        assert!("окно".parse::<WindowHandle>().is_err());
    }

    #[test]
    fn test_icon_image_rejects_bad_buffer() {
        assert!(IconImage::new(2, 2, vec![0; 16]).is_some());
        assert!(IconImage::new(2, 2, vec![0; 15]).is_none());
        assert!(IconImage::new(0, 2, Vec::new()).is_none());
    }
}
