use crate::config::{Config, PlacementConfig};
use crate::error::Result;
use crate::events::{Group, PanelRequest, Point, Size, WindowHandle};
use crate::services::activation::{ActivationController, ActivationOutcome};
use crate::services::group_store::GroupStore;
use crate::services::grouping::{GroupedView, GroupingEngine};
use crate::services::placement::default_anchor;
use crate::services::presenter::PanelPresenter;
use crate::debug_if_enabled;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

const HEADER_HEIGHT: i32 = 48;
const GROUP_ROW_HEIGHT: i32 = 32;
const WINDOW_ROW_HEIGHT: i32 = 28;

/// Результат фоновой сборки содержимого панели
#[derive(Debug)]
struct Built {
    panel_id: u64,
    anchor: Point,
    view: GroupedView,
}

/// Управляющий цикл: единственный владелец состояния панели.
///
/// Все запросы обрабатываются последовательно; фоном выполняется только
/// перечисление окон, результат возвращается сюда через канал.
pub struct PanelController {
    engine: GroupingEngine,
    store: Option<GroupStore>,
    activation: ActivationController,
    placement: PlacementConfig,
    presenter: Box<dyn PanelPresenter>,
    snapshot_timeout: Duration,
    requests: mpsc::Receiver<PanelRequest>,
    built_tx: mpsc::Sender<Built>,
    built_rx: mpsc::Receiver<Built>,
}

impl PanelController {
    pub fn new(
        engine: GroupingEngine,
        store: Option<GroupStore>,
        config: &Config,
        presenter: Box<dyn PanelPresenter>,
        requests: mpsc::Receiver<PanelRequest>,
    ) -> Self {
        let (built_tx, built_rx) = mpsc::channel(8);
        Self {
            engine,
            store,
            activation: ActivationController::new(&config.activation, &config.placement),
            placement: config.placement.clone(),
            presenter,
            snapshot_timeout: Duration::from_millis(config.snapshot.timeout_ms),
            requests,
            built_tx,
            built_rx,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        info!("PanelController запущен");

        loop {
            let deadline = self.activation.deadline();
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(PanelRequest::Shutdown) | None => break,
                    Some(request) => self.handle(request),
                },
                Some(built) = self.built_rx.recv() => self.finish_build(built),
                _ = sleep_until_deadline(deadline) => {
                    if self.activation.tick(Instant::now()) {
                        debug_if_enabled!("Подавление активации истекло");
                    }
                }
            }
        }

        if self.activation.dismiss() {
            self.presenter.hide();
        }
        info!("PanelController остановлен");
        Ok(())
    }

    fn handle(&mut self, request: PanelRequest) {
        debug_if_enabled!("Запрос: {:?}", request);
        match request {
            PanelRequest::Activate { anchor } => self.activate(anchor),
            PanelRequest::Refresh => self.refresh(),
            PanelRequest::BringToFront(handle) => self.bring_to_front(handle),
            PanelRequest::Dismiss => {
                if self.activation.dismiss() {
                    self.presenter.hide();
                }
            }
            PanelRequest::AddGroup(group) => self.add_group(group),
            PanelRequest::RemoveGroup(name) => self.remove_group(&name),
            PanelRequest::Shutdown => {}
        }
    }

    fn activate(&mut self, anchor: Option<Point>) {
        match self.activation.on_activation(Instant::now()) {
            ActivationOutcome::Show => {
                let anchor = anchor.unwrap_or_else(|| self.cursor_anchor());
                if let Some(panel) = self.activation.panel_mut() {
                    panel.set_anchor(anchor);
                    let panel_id = panel.id();
                    self.start_build(panel_id, anchor);
                }
            }
            ActivationOutcome::Hide => self.presenter.hide(),
            ActivationOutcome::Swallowed => debug_if_enabled!("Активация поглощена (подавление)"),
            ActivationOutcome::Dropped => debug_if_enabled!("Активация отброшена: панель ещё собирается"),
        }
    }

    /// Обновление имеет смысл только для показанной панели.
    /// Якорь прежний: панель остаётся там, где её открыли
    fn refresh(&mut self) {
        let Some(panel) = self.activation.panel().filter(|p| !p.is_constructing()) else {
            debug_if_enabled!("Обновление пропущено: панель не показана");
            return;
        };
        let panel_id = panel.id();
        let stored_anchor = panel.anchor();
        if let Some(placement) = panel.placement() {
            debug_if_enabled!(
                "Обновление панели {}: сейчас {} окон в ({}, {})",
                panel_id,
                panel.view().map_or(0, |v| v.grouped_windows()),
                placement.left,
                placement.top
            );
        }
        let anchor = stored_anchor.unwrap_or_else(|| self.cursor_anchor());
        self.start_build(panel_id, anchor);
    }

    fn bring_to_front(&mut self, handle: WindowHandle) {
        if self.engine.provider().system().bring_to_front(handle) {
            info!("Окно {} выведено на передний план", handle);
            if self.activation.dismiss() {
                self.presenter.hide();
            }
        } else {
            warn!("Не удалось активировать окно {}", handle);
            self.presenter.notify(&format!("Окно {} больше недоступно", handle));
        }
    }

    fn add_group(&mut self, group: Group) {
        let saved = {
            let mut groups = self.engine.groups().lock();
            groups.add_group(group);
            self.persist(groups.groups())
        };
        if let Err(e) = saved {
            self.presenter.notify(&format!("Группы не сохранены: {}", e));
        }
        self.refresh();
    }

    fn remove_group(&mut self, name: &str) {
        let saved = {
            let mut groups = self.engine.groups().lock();
            if groups.remove_group(name) == 0 {
                info!("Группа '{}' не найдена", name);
                return;
            }
            self.persist(groups.groups())
        };
        if let Err(e) = saved {
            self.presenter.notify(&format!("Группы не сохранены: {}", e));
        }
        self.refresh();
    }

    fn persist(&self, groups: &[Group]) -> Result<()> {
        match &self.store {
            Some(store) => store.save(groups).map_err(|e| {
                error!("Ошибка сохранения групп в {:?}: {}", store.path(), e);
                e
            }),
            None => Ok(()),
        }
    }

    fn start_build(&self, panel_id: u64, anchor: Point) {
        let engine = self.engine.clone();
        let built_tx = self.built_tx.clone();
        let timeout = self.snapshot_timeout;

        tokio::spawn(async move {
            let view = engine.refresh(timeout).await;
            if built_tx.send(Built { panel_id, anchor, view }).await.is_err() {
                debug_if_enabled!("Цикл остановлен, сборка панели {} отброшена", panel_id);
            }
        });
    }

    fn finish_build(&mut self, built: Built) {
        let size = self.estimate_size(&built.view);
        let monitors = self.engine.provider().system().list_monitors();
        let Some(panel) = self.activation.panel_mut().filter(|p| p.id() == built.panel_id) else {
            debug_if_enabled!("Панель {} уже закрыта", built.panel_id);
            return;
        };
        let (placement, placement_error) = panel
            .placer_mut()
            .reposition_or_fallback(built.anchor, size, monitors);

        let warning = built.view.warning.clone();
        let view = built.view;
        self.presenter.show(&view, &placement);
        self.activation.panel_ready(built.panel_id, view, placement);

        if let Some(warning) = warning {
            self.presenter.notify(&warning);
        }
        if let Some(e) = placement_error {
            self.presenter.notify(&format!("Конфигурация мониторов недоступна: {}", e));
        }
    }

    fn cursor_anchor(&self) -> Point {
        self.engine
            .provider()
            .system()
            .cursor_position()
            .unwrap_or_else(|e| {
                warn!("Позиция курсора недоступна: {}", e);
                default_anchor(&self.placement)
            })
    }

    /// Высота по содержимому, не больше размера по умолчанию
    fn estimate_size(&self, view: &GroupedView) -> Size {
        let content = HEADER_HEIGHT
            + GROUP_ROW_HEIGHT * view.buckets.len() as i32
            + WINDOW_ROW_HEIGHT * view.grouped_windows() as i32;
        Size::new(
            self.placement.default_width,
            content.min(self.placement.default_height),
        )
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Anchoring;
    use crate::events::{GroupColor, Rect};
    use crate::services::group_manager::GroupManager;
    use crate::services::placement::PlacementResult;
    use crate::services::snapshot::SnapshotProvider;
    use crate::services::window_system::{DryRunWindowSystem, WindowSystem};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    enum Event {
        Show(GroupedView, PlacementResult),
        Hide,
        Notify(String),
    }

    #[derive(Clone, Default)]
    struct RecordingPresenter {
        events: Arc<Mutex<Vec<Event>>>,
    }

    impl PanelPresenter for RecordingPresenter {
        fn show(&mut self, view: &GroupedView, placement: &PlacementResult) {
            self.events.lock().push(Event::Show(view.clone(), *placement));
        }

        fn hide(&mut self) {
            self.events.lock().push(Event::Hide);
        }

        fn notify(&mut self, message: &str) {
            self.events.lock().push(Event::Notify(message.to_string()));
        }
    }

    struct Harness {
        system: Arc<DryRunWindowSystem>,
        events: Arc<Mutex<Vec<Event>>>,
        tx: mpsc::Sender<PanelRequest>,
        task: tokio::task::JoinHandle<Result<()>>,
    }

    impl Harness {
        fn start(system: DryRunWindowSystem, config: Config, store: Option<GroupStore>) -> Self {
            let system = Arc::new(system);
            let provider = SnapshotProvider::new(system.clone() as Arc<dyn WindowSystem>, &config);
            let groups = match &store {
                Some(store) => store.load().unwrap(),
                None => GroupManager::default().groups().to_vec(),
            };
            let engine = GroupingEngine::new(provider, Arc::new(Mutex::new(GroupManager::new(groups))));

            let presenter = RecordingPresenter::default();
            let events = presenter.events.clone();
            let (tx, rx) = mpsc::channel(16);
            let controller = PanelController::new(engine, store, &config, Box::new(presenter), rx);
            let task = tokio::spawn(controller.run());

            Self {
                system,
                events,
                tx,
                task,
            }
        }

        async fn send(&self, request: PanelRequest) {
            self.tx.send(request).await.unwrap();
        }

        async fn wait_for(&self, count: usize) -> Vec<Event> {
            for _ in 0..400 {
                if self.events.lock().len() >= count {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.events.lock().clone()
        }

        async fn stop(self) {
            self.send(PanelRequest::Shutdown).await;
            self.task.await.unwrap().unwrap();
        }
    }

    fn shows(events: &[Event]) -> usize {
        events.iter().filter(|e| matches!(e, Event::Show(..))).count()
    }

    #[tokio::test]
    async fn test_activate_shows_grouped_panel_then_focus_dismisses() {
        let harness = Harness::start(DryRunWindowSystem::demo_desktop(), Config::default(), None);

        harness.send(PanelRequest::activate_at(1900, 1000)).await;
        let events = harness.wait_for(1).await;
        let Event::Show(view, placement) = &events[0] else {
            panic!("ожидался показ панели: {:?}", events);
        };
        assert_eq!(view.buckets.len(), 4);
        assert!(placement.left + placement.size.width <= 1920);
        assert!(placement.top + placement.size.height <= 1040);

        harness.send(PanelRequest::BringToFront(WindowHandle::new(0x30030))).await;
        let events = harness.wait_for(2).await;
        assert!(matches!(events[1], Event::Hide));
        assert_eq!(harness.system.focused_windows(), vec![WindowHandle::new(0x30030)]);

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_toggle_echo_is_swallowed_until_cooldown() {
        let mut config = Config::default();
        config.activation.cooldown_ms = 200;
        let harness = Harness::start(DryRunWindowSystem::demo_desktop(), config, None);

        harness.send(PanelRequest::Activate { anchor: None }).await;
        harness.wait_for(1).await;

        harness.send(PanelRequest::Activate { anchor: None }).await;
        harness.send(PanelRequest::Activate { anchor: None }).await;
        let events = harness.wait_for(2).await;
        assert!(matches!(events[1], Event::Hide));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(shows(&harness.events.lock()), 1);

        tokio::time::sleep(Duration::from_millis(300)).await;
        harness.send(PanelRequest::Activate { anchor: None }).await;
        let events = harness.wait_for(3).await;
        assert_eq!(shows(&events), 2);

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_enumeration_failure_shows_empty_panel_and_notifies() {
        let harness = Harness::start(
            DryRunWindowSystem::demo_desktop().failing_enumeration(),
            Config::default(),
            None,
        );

        harness.send(PanelRequest::Activate { anchor: None }).await;
        let events = harness.wait_for(2).await;
        match &events[..] {
            [Event::Show(view, _), Event::Notify(message)] => {
                assert!(view.is_empty());
                assert!(message.contains("EnumWindows"));
            }
            other => panic!("неожиданные события: {:?}", other),
        }

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_monitor_failure_uses_fallback_area() {
        let harness = Harness::start(
            DryRunWindowSystem::demo_desktop().failing_monitors(),
            Config::default(),
            None,
        );

        harness.send(PanelRequest::activate_at(5000, 5000)).await;
        let events = harness.wait_for(2).await;
        let Event::Show(_, placement) = &events[0] else {
            panic!("ожидался показ панели: {:?}", events);
        };
        assert_eq!(placement.work_area, Config::default().placement.fallback_work_area);
        assert!(placement.work_area.contains_rect(&placement.rect()));
        assert!(matches!(&events[1], Event::Notify(m) if m.contains("мониторов")));

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_add_group_persists_and_refreshes_open_panel() {
        let dir = tempfile::tempdir().unwrap();
        let store = GroupStore::new(dir.path().join("groups.json"));
        let harness = Harness::start(DryRunWindowSystem::demo_desktop(), Config::default(), Some(store.clone()));

        harness.send(PanelRequest::Activate { anchor: None }).await;
        harness.wait_for(1).await;

        harness
            .send(PanelRequest::AddGroup(Group::new("Tools", ["CalculatorApp"], GroupColor::rgb(9, 9, 9))))
            .await;
        let events = harness.wait_for(2).await;
        let Event::Show(view, _) = &events[1] else {
            panic!("ожидалось обновление панели: {:?}", events);
        };
        assert_eq!(view.buckets.last().unwrap().group.name, "Tools");
        assert_eq!(view.buckets.last().unwrap().windows[0].title, "Calculator");

        let saved = store.load().unwrap();
        assert_eq!(saved.last().unwrap().name, "Tools");

        harness.send(PanelRequest::RemoveGroup("Tools".to_string())).await;
        harness.wait_for(3).await;
        assert!(store.load().unwrap().iter().all(|g| g.name != "Tools"));

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_refresh_without_panel_is_ignored() {
        let harness = Harness::start(DryRunWindowSystem::demo_desktop(), Config::default(), None);

        harness.send(PanelRequest::Refresh).await;
        harness.send(PanelRequest::Dismiss).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(harness.events.lock().is_empty());

        harness.stop().await;
    }

    #[tokio::test]
    async fn test_focus_of_closed_window_notifies() {
        let harness = Harness::start(DryRunWindowSystem::demo_desktop(), Config::default(), None);

        harness.send(PanelRequest::BringToFront(WindowHandle::new(0xDEAD))).await;
        let events = harness.wait_for(1).await;
        assert!(matches!(&events[0], Event::Notify(m) if m.contains("0xDEAD")));

        harness.stop().await;
    }
    #[tokio::test]
    async fn test_refresh_keeps_panel_on_activation_monitor() {
        for anchoring in [Anchoring::Cursor, Anchoring::Taskbar] {
            let mut config = Config::default();
            config.placement.anchoring = anchoring;
            // Курсор демо-рабочего стола на основном мониторе, активация на втором
            let harness = Harness::start(DryRunWindowSystem::demo_desktop(), config, None);

            harness.send(PanelRequest::activate_at(3000, 100)).await;
            harness.wait_for(1).await;
            harness.send(PanelRequest::Refresh).await;
            let events = harness.wait_for(2).await;

            let (Event::Show(_, first), Event::Show(_, second)) = (&events[0], &events[1]) else {
                panic!("ожидались показ и обновление панели: {:?}", events);
            };
            assert_eq!(first.work_area, Rect::new(1920, 0, 4480, 1440));
            assert_eq!(second.work_area, first.work_area);
            assert_eq!(second.left, first.left);
            assert_eq!(second.top, first.top);

            harness.stop().await;
        }
    }
}
