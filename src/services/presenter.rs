use crate::services::grouping::GroupedView;
use crate::services::placement::PlacementResult;
use std::fmt::Write as _;
use std::io::Write;
use tracing::{info, warn};

/// Слой представления. Реальный UI внешний; управляющий цикл знает только этот трейт.
pub trait PanelPresenter: Send {
    fn show(&mut self, view: &GroupedView, placement: &PlacementResult);

    fn hide(&mut self);

    /// Неблокирующее уведомление о сбое
    fn notify(&mut self, message: &str);
}

/// Текстовое представление вида: группа, цвет, окна с дескрипторами
pub fn render_view(view: &GroupedView) -> String {
    let mut out = String::new();
    if view.is_empty() {
        out.push_str("Окна не найдены\n");
    }
    for bucket in &view.buckets {
        let _ = writeln!(out, "[{}] {} ({})", bucket.group.color, bucket.group.name, bucket.windows.len());
        for window in &bucket.windows {
            let _ = writeln!(
                out,
                "    {:>10}  {}{}",
                window.handle.to_string(),
                window.title,
                if window.icon.is_some() { "" } else { "  (без иконки)" }
            );
        }
    }
    if let Some(warning) = &view.warning {
        let _ = writeln!(out, "! {}", warning);
    }
    out
}

/// Выводит панель в stdout и в лог
#[derive(Debug, Default)]
pub struct LogPresenter;

impl LogPresenter {
    pub fn new() -> Self {
        Self
    }
}

impl PanelPresenter for LogPresenter {
    fn show(&mut self, view: &GroupedView, placement: &PlacementResult) {
        info!(
            "Панель: {} групп, {} окон в ({}, {}) {}x{}",
            view.buckets.len(),
            view.grouped_windows(),
            placement.left,
            placement.top,
            placement.size.width,
            placement.size.height
        );
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(render_view(view).as_bytes());
        let _ = stdout.flush();
    }

    fn hide(&mut self) {
        info!("Панель скрыта");
    }

    fn notify(&mut self, message: &str) {
        warn!("Уведомление: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Group, GroupColor, WindowHandle, WindowRecord};
    use crate::services::grouping::GroupBucket;

    #[test]
    fn test_render_empty_view_has_indicator() {
        let view = GroupedView {
            warning: Some("Перечисление окон не удалось".to_string()),
            ..GroupedView::default()
        };
        let text = render_view(&view);
        assert!(text.starts_with("Окна не найдены"));
        assert!(text.contains("! Перечисление окон не удалось"));
    }

    #[test]
    fn test_render_lists_groups_and_handles() {
        let window = WindowRecord::new(WindowHandle::new(0x20020), "GitHub".to_string())
            .with_process(200, "chrome".to_string());
        let view = GroupedView {
            buckets: vec![GroupBucket {
                group: Group::new("Browsers", ["chrome"], GroupColor::DODGER_BLUE),
                windows: vec![window],
            }],
            total_windows: 1,
            warning: None,
        };

        let text = render_view(&view);
        assert!(text.contains("[#1E90FF] Browsers (1)"));
        assert!(text.contains("0x20020  GitHub"));
    }
}
