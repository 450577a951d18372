pub mod geometry;
pub mod group;
pub mod window;

pub use geometry::{Monitor, Point, Rect, Size};
pub use group::{Group, GroupColor};
pub use window::{IconImage, IconSize, WindowHandle, WindowRecord};

/// Запросы от слоя представления к управляющему циклу
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelRequest {
    /// Сигнал активации (клик по панели задач/трею); без точки берётся позиция курсора
    Activate { anchor: Option<Point> },
    Refresh,
    BringToFront(WindowHandle),
    /// Панель закрыта пользователем, без подавления повторной активации
    Dismiss,
    AddGroup(Group),
    RemoveGroup(String),
    Shutdown,
}

impl PanelRequest {
    pub fn activate_at(x: i32, y: i32) -> Self {
        PanelRequest::Activate {
            anchor: Some(Point::new(x, y)),
        }
    }
}
