use crate::config::{Anchoring, PlacementConfig};
use crate::error::{GrouperError, Result};
use crate::events::{Monitor, Point, Rect, Size};
use crate::debug_if_enabled;
use tracing::warn;

/// Запрос на размещение панели
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementRequest {
    pub anchor: Point,
    /// Нулевой размер допустим: панель ещё не измерена
    pub size: Size,
    /// Ранее запомненный левый край; если задан, горизонтальная позиция не пересчитывается
    pub pinned_left: Option<i32>,
}

impl PlacementRequest {
    pub fn new(anchor: Point, size: Size) -> Self {
        Self {
            anchor,
            size,
            pinned_left: None,
        }
    }

    pub fn pinned_at(mut self, left: i32) -> Self {
        self.pinned_left = Some(left);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementResult {
    pub left: i32,
    pub top: i32,
    /// Фактически использованный размер (с подстановкой значений по умолчанию)
    pub size: Size,
    pub work_area: Rect,
    /// Панель размещена под якорем, потому что сверху не поместилась
    pub flipped: bool,
}

impl PlacementResult {
    pub fn rect(&self) -> Rect {
        Rect::new(
            self.left,
            self.top,
            self.left + self.size.width,
            self.top + self.size.height,
        )
    }
}

/// Монитор, содержащий точку, иначе основной
pub fn monitor_for_point(monitors: &[Monitor], anchor: Point) -> Result<&Monitor> {
    if monitors.is_empty() {
        return Err(GrouperError::NoMonitors);
    }
    monitors
        .iter()
        .find(|m| m.bounds.contains(anchor))
        .or_else(|| monitors.iter().find(|m| m.is_primary))
        .ok_or(GrouperError::NoPrimaryMonitor)
}

/// Вычисляет левый верхний угол панели так, чтобы она целиком лежала
/// в рабочей области монитора (никогда не в полных границах: панель задач не перекрывается).
pub fn place(request: &PlacementRequest, monitors: &[Monitor], config: &PlacementConfig) -> Result<PlacementResult> {
    let monitor = monitor_for_point(monitors, request.anchor)?;
    Ok(place_on(monitor, request, config))
}

fn effective_size(size: Size, config: &PlacementConfig) -> Size {
    if !size.is_degenerate() {
        return size;
    }
    let defaults = config.default_size();
    Size::new(
        if size.width > 0 { size.width } else { defaults.width },
        if size.height > 0 { size.height } else { defaults.height },
    )
}

fn clamp_axis(value: i32, min: i32, max: i32) -> i32 {
    // Панель шире области: прижимаем к началу
    if max < min {
        min
    } else {
        value.clamp(min, max)
    }
}

fn place_on(monitor: &Monitor, request: &PlacementRequest, config: &PlacementConfig) -> PlacementResult {
    let size = effective_size(request.size, config);
    let area = monitor.work_area.inset(config.edge_padding);
    let anchor = request.anchor;

    // Якорь может лежать сколь угодно далеко за пределами экранов: арифметика насыщающая
    let left = request
        .pinned_left
        .unwrap_or_else(|| anchor.x.saturating_sub(size.width / 2));

    let (top, flipped) = match config.anchoring {
        Anchoring::Cursor => {
            let upward = anchor.y.saturating_sub(config.margin).saturating_sub(size.height);
            if upward < area.top {
                (anchor.y.saturating_add(config.margin), true)
            } else {
                (upward, false)
            }
        }
        Anchoring::Taskbar => (area.bottom.saturating_sub(size.height), false),
    };

    let result = PlacementResult {
        left: clamp_axis(left, area.left, area.right.saturating_sub(size.width)),
        top: clamp_axis(top, area.top, area.bottom.saturating_sub(size.height)),
        size,
        work_area: area,
        flipped,
    };

    debug_if_enabled!(
        "Размещение {}x{} у {}: ({}, {}) в {}{}",
        size.width,
        size.height,
        anchor,
        result.left,
        result.top,
        area,
        if flipped { ", вниз" } else { "" }
    );
    result
}

/// Монитор из резервной рабочей области конфигурации
pub fn fallback_monitor(config: &PlacementConfig) -> Monitor {
    let area = config.fallback_work_area;
    Monitor::new(area, area).primary()
}

/// Как `place`, но сбой конфигурации мониторов не фатален:
/// используется резервная область, а ошибка возвращается для уведомления
pub fn place_or_fallback(
    request: &PlacementRequest,
    monitors: Result<Vec<Monitor>>,
    config: &PlacementConfig,
) -> (PlacementResult, Option<GrouperError>) {
    match monitors.and_then(|monitors| place(request, &monitors, config)) {
        Ok(result) => (result, None),
        Err(e) => {
            warn!("Размещение по мониторам невозможно ({}), используется резервная область", e);
            (place_on(&fallback_monitor(config), request, config), Some(e))
        }
    }
}

/// Якорь по умолчанию: по центру внизу резервной области, чуть выше панели задач
pub fn default_anchor(config: &PlacementConfig) -> Point {
    let area = config.fallback_work_area;
    Point::new(area.left + area.width() / 2, area.bottom - 40)
}

/// Позиционирование одной панели на всё время её жизни.
///
/// Монитор выбирается при первой раскладке и дальше не меняется, пока он подключён:
/// обновление содержимого не переносит панель на экран, где сейчас курсор.
/// В режиме `Taskbar` так же запоминается левый край, чтобы панель не "ползла"
/// по экрану при изменении размера.
#[derive(Debug, Clone)]
pub struct PanelPlacer {
    config: PlacementConfig,
    captured_monitor: Option<Monitor>,
    captured_left: Option<i32>,
}

impl PanelPlacer {
    pub fn new(config: PlacementConfig) -> Self {
        Self {
            config,
            captured_monitor: None,
            captured_left: None,
        }
    }

    pub fn captured_left(&self) -> Option<i32> {
        self.captured_left
    }

    pub fn captured_monitor(&self) -> Option<&Monitor> {
        self.captured_monitor.as_ref()
    }

    pub fn reposition(&mut self, anchor: Point, size: Size, monitors: &[Monitor]) -> Result<PlacementResult> {
        let monitor = self.select_monitor(anchor, monitors)?;
        Ok(self.place_and_capture(monitor, anchor, size))
    }

    /// Как `reposition`, но сбой конфигурации мониторов не фатален:
    /// используется запомненный монитор или резервная область, а ошибка возвращается для уведомления
    pub fn reposition_or_fallback(
        &mut self,
        anchor: Point,
        size: Size,
        monitors: Result<Vec<Monitor>>,
    ) -> (PlacementResult, Option<GrouperError>) {
        let selected = match monitors {
            Ok(monitors) => self.select_monitor(anchor, &monitors),
            Err(e) => self.captured_monitor.ok_or(e),
        };
        match selected {
            Ok(monitor) => (self.place_and_capture(monitor, anchor, size), None),
            Err(e) => {
                warn!("Размещение по мониторам невозможно ({}), используется резервная область", e);
                let monitor = fallback_monitor(&self.config);
                (self.place_and_capture(monitor, anchor, size), Some(e))
            }
        }
    }

    /// Запомненный монитор, если он всё ещё в списке, иначе выбор по якорю
    fn select_monitor(&self, anchor: Point, monitors: &[Monitor]) -> Result<Monitor> {
        match self.captured_monitor.filter(|m| monitors.contains(m)) {
            Some(monitor) => Ok(monitor),
            None => monitor_for_point(monitors, anchor).copied(),
        }
    }

    fn place_and_capture(&mut self, monitor: Monitor, anchor: Point, size: Size) -> PlacementResult {
        if self.captured_monitor != Some(monitor) {
            debug_if_enabled!("Запомнен монитор панели: {}", monitor.work_area);
            self.captured_monitor = Some(monitor);
            // Левый край имеет смысл только в пределах своего монитора
            self.captured_left = None;
        }
        let result = place_on(&monitor, &self.request(anchor, size), &self.config);
        if self.config.anchoring == Anchoring::Taskbar && self.captured_left.is_none() {
            debug_if_enabled!("Запомнен левый край панели: {}", result.left);
            self.captured_left = Some(result.left);
        }
        result
    }

    fn request(&self, anchor: Point, size: Size) -> PlacementRequest {
        let request = PlacementRequest::new(anchor, size);
        match (self.config.anchoring, self.captured_left) {
            (Anchoring::Taskbar, Some(left)) => request.pinned_at(left),
            _ => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn single_monitor() -> Vec<Monitor> {
        vec![Monitor::new(Rect::new(0, 0, 1920, 1080), Rect::new(0, 0, 1920, 1040)).primary()]
    }

    fn dual_monitors() -> Vec<Monitor> {
        vec![
            Monitor::new(Rect::new(0, 0, 1920, 1080), Rect::new(0, 0, 1920, 1040)).primary(),
            Monitor::new(Rect::new(1920, -200, 4480, 1240), Rect::new(1920, -200, 4480, 1200)),
        ]
    }

    fn cursor_config() -> PlacementConfig {
        Config::default().placement
    }

    fn taskbar_config() -> PlacementConfig {
        let mut config = Config::default().placement;
        config.anchoring = Anchoring::Taskbar;
        config
    }

    #[test]
    fn test_clamped_into_work_area_near_corner() {
        let request = PlacementRequest::new(Point::new(1900, 1000), Size::new(350, 450));
        let result = place(&request, &single_monitor(), &cursor_config()).unwrap();

        assert!(result.left + 350 <= 1920);
        assert!(result.top + 450 <= 1040);
        assert_eq!(result.left, 1570);
        assert_eq!(result.top, 1000 - 20 - 450);
        assert!(!result.flipped);
    }

    #[test]
    fn test_centered_above_anchor() {
        let request = PlacementRequest::new(Point::new(960, 1030), Size::new(350, 450));
        let result = place(&request, &single_monitor(), &cursor_config()).unwrap();

        assert_eq!(result.left, 960 - 175);
        assert_eq!(result.top, 1030 - 20 - 450);
    }

    #[test]
    fn test_flips_below_near_top_edge() {
        let request = PlacementRequest::new(Point::new(400, 100), Size::new(350, 450));
        let result = place(&request, &single_monitor(), &cursor_config()).unwrap();

        assert!(result.flipped);
        assert_eq!(result.top, 120);
        assert!(result.work_area.contains_rect(&result.rect()));
    }

    #[test]
    fn test_anchor_selects_secondary_monitor() {
        let request = PlacementRequest::new(Point::new(4400, -150), Size::new(350, 450));
        let result = place(&request, &dual_monitors(), &cursor_config()).unwrap();

        assert_eq!(result.work_area, Rect::new(1920, -200, 4480, 1200));
        assert_eq!(result.left, 4480 - 350);
        assert_eq!(result.top, -150 + 20);
        assert!(result.flipped);
    }

    #[test]
    fn test_offscreen_anchor_falls_back_to_primary() {
        let request = PlacementRequest::new(Point::new(-5000, 5000), Size::new(350, 450));
        let result = place(&request, &dual_monitors(), &cursor_config()).unwrap();

        assert_eq!(result.work_area, Rect::new(0, 0, 1920, 1040));
        assert!(result.work_area.contains_rect(&result.rect()));
    }

    #[test]
    fn test_missing_monitors_is_an_error() {
        let request = PlacementRequest::new(Point::new(10, 10), Size::new(350, 450));
        assert!(matches!(
            place(&request, &[], &cursor_config()),
            Err(GrouperError::NoMonitors)
        ));

        let no_primary = vec![Monitor::new(Rect::new(0, 0, 800, 600), Rect::new(0, 0, 800, 560))];
        let offscreen = PlacementRequest::new(Point::new(2000, 10), Size::new(350, 450));
        assert!(matches!(
            place(&offscreen, &no_primary, &cursor_config()),
            Err(GrouperError::NoPrimaryMonitor)
        ));
    }

    #[test]
    fn test_zero_size_uses_defaults() {
        let request = PlacementRequest::new(Point::new(960, 1000), Size::new(0, 0));
        let result = place(&request, &single_monitor(), &cursor_config()).unwrap();

        assert_eq!(result.size, Size::new(350, 450));
        assert!(result.work_area.contains_rect(&result.rect()));
    }

    #[test]
    fn test_oversized_panel_pinned_to_work_area_origin() {
        let request = PlacementRequest::new(Point::new(960, 1000), Size::new(2500, 1500));
        let result = place(&request, &single_monitor(), &cursor_config()).unwrap();

        assert_eq!((result.left, result.top), (0, 0));
    }

    #[test]
    fn test_pinned_left_survives_anchor_changes() {
        let config = cursor_config();
        let first = place(
            &PlacementRequest::new(Point::new(500, 900), Size::new(350, 450)).pinned_at(600),
            &single_monitor(),
            &config,
        )
        .unwrap();
        let second = place(
            &PlacementRequest::new(Point::new(1200, 800), Size::new(350, 450)).pinned_at(600),
            &single_monitor(),
            &config,
        )
        .unwrap();

        assert_eq!(first.left, 600);
        assert_eq!(second.left, 600);
        assert_ne!(first.top, second.top);
    }

    #[test]
    fn test_taskbar_mode_sits_on_work_area_bottom() {
        let request = PlacementRequest::new(Point::new(960, 1060), Size::new(350, 300));
        let result = place(&request, &single_monitor(), &taskbar_config()).unwrap();

        assert_eq!(result.top + 300, 1040);
        assert_eq!(result.left, 960 - 175);
    }

    #[test]
    fn test_edge_padding_shrinks_work_area() {
        let mut config = cursor_config();
        config.edge_padding = 10;
        let request = PlacementRequest::new(Point::new(1915, 1000), Size::new(350, 450));
        let result = place(&request, &single_monitor(), &config).unwrap();

        assert_eq!(result.left, 1920 - 10 - 350);
    }

    #[test]
    fn test_placer_captures_left_once_in_taskbar_mode() {
        let mut placer = PanelPlacer::new(taskbar_config());
        let monitors = single_monitor();

        let first = placer.reposition(Point::new(700, 1060), Size::new(350, 200), &monitors).unwrap();
        assert_eq!(placer.captured_left(), Some(first.left));

        // Панель выросла и курсор сдвинулся: левый край не меняется, низ по-прежнему у панели задач
        let second = placer.reposition(Point::new(1500, 1060), Size::new(350, 420), &monitors).unwrap();
        assert_eq!(second.left, first.left);
        assert_eq!(second.top + 420, 1040);
        assert_ne!(second.top, first.top);
    }

    #[test]
    fn test_placer_does_not_pin_in_cursor_mode() {
        let mut placer = PanelPlacer::new(cursor_config());
        let monitors = single_monitor();

        let first = placer.reposition(Point::new(700, 1000), Size::new(350, 450), &monitors).unwrap();
        let second = placer.reposition(Point::new(1200, 1000), Size::new(350, 450), &monitors).unwrap();
        assert_eq!(placer.captured_left(), None);
        assert_ne!(first.left, second.left);
    }

    #[test]
    fn test_placer_falls_back_to_default_area() {
        let mut placer = PanelPlacer::new(cursor_config());
        let (result, error) =
            placer.reposition_or_fallback(Point::new(960, 1000), Size::new(350, 450), Ok(Vec::new()));

        assert!(matches!(error, Some(GrouperError::NoMonitors)));
        assert_eq!(result.work_area, Rect::new(0, 0, 1920, 1040));
        assert!(result.work_area.contains_rect(&result.rect()));

        let (_, error) = placer.reposition_or_fallback(
            default_anchor(&cursor_config()),
            Size::new(350, 450),
            Err(GrouperError::os("EnumDisplayMonitors", "сбой")),
        );
        assert!(error.is_some());
    }
    #[test]
    fn test_extreme_anchors_stay_inside_work_area() {
        let monitors = dual_monitors();
        let anchors = [
            Point::new(i32::MIN, i32::MIN),
            Point::new(i32::MAX, i32::MAX),
            Point::new(i32::MIN, i32::MAX),
            Point::new(i32::MAX, i32::MIN),
        ];

        for config in [cursor_config(), taskbar_config()] {
            for anchor in anchors {
                let result = place(&PlacementRequest::new(anchor, Size::new(350, 450)), &monitors, &config).unwrap();
                assert_eq!(result.work_area, Rect::new(0, 0, 1920, 1040), "{:?} {}", config.anchoring, anchor);
                assert!(result.work_area.contains_rect(&result.rect()), "{:?} {}", config.anchoring, anchor);
            }
        }
    }

    #[test]
    fn test_extreme_pinned_left_is_clamped() {
        let request = PlacementRequest::new(Point::new(960, 1000), Size::new(350, 450)).pinned_at(i32::MIN);
        let result = place(&request, &single_monitor(), &taskbar_config()).unwrap();
        assert_eq!(result.left, 0);
    }

    #[test]
    fn test_placer_keeps_monitor_when_anchor_moves() {
        let mut placer = PanelPlacer::new(cursor_config());
        let monitors = dual_monitors();

        let first = placer.reposition(Point::new(3000, 600), Size::new(350, 450), &monitors).unwrap();
        assert_eq!(first.work_area, Rect::new(1920, -200, 4480, 1200));
        assert_eq!(placer.captured_monitor(), Some(&monitors[1]));

        // Курсор ушёл на основной монитор, панель остаётся на своём
        let second = placer.reposition(Point::new(960, 1060), Size::new(350, 300), &monitors).unwrap();
        assert_eq!(second.work_area, first.work_area);
        assert!(second.work_area.contains_rect(&second.rect()));
    }

    #[test]
    fn test_placer_keeps_monitor_and_left_in_taskbar_mode() {
        let mut placer = PanelPlacer::new(taskbar_config());
        let monitors = dual_monitors();

        let first = placer.reposition(Point::new(3000, 1220), Size::new(350, 200), &monitors).unwrap();
        let second = placer.reposition(Point::new(100, 1060), Size::new(350, 400), &monitors).unwrap();

        assert_eq!(second.work_area, first.work_area);
        assert_eq!(second.left, first.left);
        assert_eq!(second.top + 400, 1200);
    }

    #[test]
    fn test_placer_reselects_after_monitor_disconnect() {
        let mut placer = PanelPlacer::new(taskbar_config());
        let monitors = dual_monitors();
        placer.reposition(Point::new(4000, 1220), Size::new(350, 200), &monitors).unwrap();

        let result = placer.reposition(Point::new(4000, 1220), Size::new(350, 200), &monitors[..1]).unwrap();
        assert_eq!(result.work_area, Rect::new(0, 0, 1920, 1040));
        assert_eq!(result.left, 1920 - 350);
        assert_eq!(placer.captured_monitor(), Some(&monitors[0]));
        assert_eq!(placer.captured_left(), Some(result.left));
        assert!(result.work_area.contains_rect(&result.rect()));
    }

    #[test]
    fn test_placer_uses_captured_monitor_when_listing_fails() {
        let mut placer = PanelPlacer::new(cursor_config());
        let monitors = dual_monitors();
        let first = placer.reposition(Point::new(3000, 600), Size::new(350, 450), &monitors).unwrap();

        let (second, error) = placer.reposition_or_fallback(
            Point::new(3000, 600),
            Size::new(350, 450),
            Err(GrouperError::os("EnumDisplayMonitors", "сбой")),
        );
        assert!(error.is_none());
        assert_eq!(second, first);
    }
}
