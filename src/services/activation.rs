use crate::config::{ActivationConfig, PlacementConfig};
use crate::services::grouping::GroupedView;
use crate::events::Point;
use crate::services::placement::{PanelPlacer, PlacementResult};
use crate::debug_if_enabled;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Idle,
    PanelVisible,
    /// Повторные сигналы до `until` поглощаются
    Suppressed { until: Instant },
}

/// Что должен сделать управляющий цикл в ответ на сигнал активации
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// Начата сборка новой панели
    Show,
    Hide,
    /// Сигнал пришёл во время подавления
    Swallowed,
    /// Панель ещё собирается, повторная сборка не начинается
    Dropped,
}

/// Единственный экземпляр панели. Живёт от `Show` до `Hide`/`dismiss`.
#[derive(Debug)]
pub struct Panel {
    id: u64,
    constructing: bool,
    /// Точка активации; обновления размещаются от неё, а не от текущего курсора
    anchor: Option<Point>,
    placer: PanelPlacer,
    view: Option<GroupedView>,
    placement: Option<PlacementResult>,
}

impl Panel {
    fn new(id: u64, placement: &PlacementConfig) -> Self {
        Self {
            id,
            constructing: true,
            anchor: None,
            placer: PanelPlacer::new(placement.clone()),
            view: None,
            placement: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_constructing(&self) -> bool {
        self.constructing
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    pub fn set_anchor(&mut self, anchor: Point) {
        self.anchor = Some(anchor);
    }

    pub fn placer_mut(&mut self) -> &mut PanelPlacer {
        &mut self.placer
    }

    pub fn view(&self) -> Option<&GroupedView> {
        self.view.as_ref()
    }

    pub fn placement(&self) -> Option<&PlacementResult> {
        self.placement.as_ref()
    }

    /// Новое содержимое уже показанной панели (обновление)
    pub fn update(&mut self, view: GroupedView, placement: PlacementResult) {
        self.view = Some(view);
        self.placement = Some(placement);
    }
}

/// Переключение панели по сигналу активации с подавлением эха.
///
/// Скрытие панели кликом по той же кнопке вызывает у ОС повторный сигнал
/// активации; он поглощается в течение `cooldown`. Таймер смоделирован как
/// состояние + крайний срок: время передаётся снаружи в каждый вызов.
#[derive(Debug)]
pub struct ActivationController {
    state: ActivationState,
    cooldown: Duration,
    placement: PlacementConfig,
    panel: Option<Panel>,
    next_panel_id: u64,
}

impl ActivationController {
    pub fn new(activation: &ActivationConfig, placement: &PlacementConfig) -> Self {
        Self {
            state: ActivationState::Idle,
            cooldown: Duration::from_millis(activation.cooldown_ms),
            placement: placement.clone(),
            panel: None,
            next_panel_id: 1,
        }
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn panel(&self) -> Option<&Panel> {
        self.panel.as_ref()
    }

    pub fn panel_mut(&mut self) -> Option<&mut Panel> {
        self.panel.as_mut()
    }

    pub fn on_activation(&mut self, now: Instant) -> ActivationOutcome {
        self.tick(now);

        let outcome = match self.state {
            ActivationState::Idle => {
                let id = self.next_panel_id;
                self.next_panel_id += 1;
                self.panel = Some(Panel::new(id, &self.placement));
                self.state = ActivationState::PanelVisible;
                ActivationOutcome::Show
            }
            ActivationState::PanelVisible if self.panel.as_ref().is_some_and(|p| p.constructing) => {
                ActivationOutcome::Dropped
            }
            ActivationState::PanelVisible => {
                self.panel = None;
                self.state = ActivationState::Suppressed {
                    until: now + self.cooldown,
                };
                ActivationOutcome::Hide
            }
            ActivationState::Suppressed { .. } => ActivationOutcome::Swallowed,
        };

        debug_if_enabled!("Активация: {:?} -> {:?}", outcome, self.state);
        outcome
    }

    /// Сборка завершена. `false` если панель с этим id уже закрыта:
    /// результат запоздал и должен быть отброшен
    pub fn panel_ready(&mut self, id: u64, view: GroupedView, placement: PlacementResult) -> bool {
        match self.panel.as_mut() {
            Some(panel) if panel.id == id => {
                panel.constructing = false;
                panel.update(view, placement);
                true
            }
            _ => {
                debug_if_enabled!("Результат сборки панели {} отброшен", id);
                false
            }
        }
    }

    /// Закрытие без подавления (пользователь выбрал окно или закрыл панель сам)
    pub fn dismiss(&mut self) -> bool {
        if self.panel.take().is_some() {
            self.state = ActivationState::Idle;
            info!("Панель закрыта");
            true
        } else {
            false
        }
    }

    /// Истечение подавления; возвращает `true` при переходе в `Idle`
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.state {
            ActivationState::Suppressed { until } if now >= until => {
                self.state = ActivationState::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            ActivationState::Suppressed { until } => Some(until),
            _ => None,
        }
    }
}
