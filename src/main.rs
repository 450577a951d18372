use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
mod config;
mod error;
mod events;
mod services;
mod utils;

use config::Config;
use events::{PanelRequest, Point};
use services::{
    create_request_source,
    create_window_system,
    group_manager::find_group_for_process,
    placement::{default_anchor, place_or_fallback, PlacementRequest},
    presenter::render_view,
    GroupManager,
    GroupStore,
    GroupingEngine,
    LogPresenter,
    PanelController,
    SnapshotProvider,
};

#[derive(Parser, Debug)]
#[command(name = "taskbar-grouper")]
#[command(about = "Группировка окон по приложениям и всплывающая панель у панели задач")]
struct Args {
    /// Путь к файлу конфигурации
    #[arg(short, long, default_value = "grouper.toml")]
    config: PathBuf,

    /// Режим сухого запуска (эмулированный рабочий стол вместо реальной ОС)
    #[arg(long)]
    dry_run: bool,

    /// Уровень/фильтр логирования (перекрывает logging из конфигурации)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Управляющий цикл панели, запросы из stdin (по умолчанию)
    Run,
    /// Снимок видимых пользовательских окон
    List,
    /// Группы и окна по группам
    Groups,
    /// Расчёт размещения панели для точки (по умолчанию позиция курсора)
    Place {
        #[arg(long, allow_hyphen_values = true)]
        x: Option<i32>,
        #[arg(long, allow_hyphen_values = true)]
        y: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Загрузка конфигурации
    let config = Config::load(&args.config)?;

    // Инициализация системы логирования
    let directive = args.log_level.clone().unwrap_or_else(|| config.logging.directive());
    init_tracing(&directive, &config.logging.format)?;

    info!("Запуск Taskbar Grouper v{}", env!("CARGO_PKG_VERSION"));
    info!("Конфигурация загружена из: {:?}", args.config);

    if args.dry_run {
        warn!("Режим сухого запуска - используется эмулированный рабочий стол");
    }

    let system = create_window_system(args.dry_run)?;
    let provider = SnapshotProvider::new(system.clone(), &config);

    let store = config.groups.file.as_ref().map(GroupStore::new);
    let groups = match &store {
        Some(store) => store
            .load()
            .with_context(|| format!("Не удалось загрузить группы из {:?}", store.path()))?,
        None => GroupManager::default().groups().to_vec(),
    };
    let engine = GroupingEngine::new(provider, Arc::new(Mutex::new(GroupManager::new(groups))));

    match args.command.unwrap_or(Command::Run) {
        Command::List => {
            let groups = engine.groups().lock().snapshot_groups();
            for record in engine.provider().snapshot() {
                let group = find_group_for_process(&groups, &record.process_name)
                    .map(|g| g.name.as_str())
                    .unwrap_or("-");
                println!(
                    "{:>10}  {:<24} {:<16} {}",
                    record.handle.to_string(),
                    record.process_name,
                    group,
                    record.title
                );
            }
            Ok(())
        }
        Command::Groups => {
            for group in engine.groups().lock().groups() {
                println!("{}", group);
            }
            println!();
            print!("{}", render_view(&engine.refresh_blocking()));
            Ok(())
        }
        Command::Place { x, y } => {
            let anchor = match (x, y) {
                (Some(x), Some(y)) => Point::new(x, y),
                _ => system
                    .cursor_position()
                    .unwrap_or_else(|_| default_anchor(&config.placement)),
            };
            let request = PlacementRequest::new(anchor, config.placement.default_size());
            let (result, fallback) = place_or_fallback(&request, system.list_monitors(), &config.placement);
            if let Some(e) = fallback {
                warn!("Использована резервная рабочая область: {}", e);
            }
            println!(
                "anchor={} left={} top={} size={}x{} work_area={}{}",
                anchor,
                result.left,
                result.top,
                result.size.width,
                result.size.height,
                result.work_area,
                if result.flipped { " (flipped)" } else { "" }
            );
            Ok(())
        }
        Command::Run => run(engine, store, &config, args.dry_run).await,
    }
}

async fn run(engine: GroupingEngine, store: Option<GroupStore>, config: &Config, dry_run: bool) -> Result<()> {
    let (tx, rx) = mpsc::channel::<PanelRequest>(32);

    let controller = PanelController::new(engine, store, config, Box::new(LogPresenter::new()), rx);
    let request_source = create_request_source(tx.clone(), dry_run)?;

    info!("Все компоненты инициализированы");

    let mut controller_handle = tokio::spawn(async move {
        if let Err(e) = controller.run().await {
            error!("Ошибка в PanelController: {}", e);
        }
    });
    let source_handle = tokio::spawn(async move {
        if let Err(e) = request_source.run().await {
            error!("Ошибка в RequestSource: {}", e);
        }
    });

    info!("Все сервисы запущены");

    // Ожидание сигнала завершения или остановки контроллера (команда quit)
    let mut controller_finished = false;
    tokio::select! {
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Получен сигнал завершения (Ctrl+C)"),
                Err(err) => error!("Ошибка при ожидании сигнала завершения: {}", err),
            }
            let _ = tx.send(PanelRequest::Shutdown).await;
        }
        _ = &mut controller_handle => {
            info!("PanelController завершился");
            controller_finished = true;
        }
    }

    info!("Завершение работы...");

    // stdin нельзя прервать штатно, поэтому источник просто снимается
    source_handle.abort();

    let shutdown_timeout = tokio::time::Duration::from_secs(5);
    let shutdown_result = tokio::time::timeout(shutdown_timeout, async {
        if !controller_finished {
            let _ = controller_handle.await;
        }
        let _ = source_handle.await;
    })
    .await;

    match shutdown_result {
        Ok(_) => info!("Все сервисы завершили работу корректно"),
        Err(_) => warn!("Таймаут при завершении сервисов"),
    }

    info!("Taskbar Grouper завершил работу");
    Ok(())
}

fn init_tracing(directive: &str, format: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive))?;

    let registry = tracing_subscriber::registry().with(filter);
    if format == "compact" {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    Ok(())
}
