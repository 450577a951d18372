use crate::error::Result;
use crate::events::{Group, GroupColor, PanelRequest, Point, WindowHandle};
use crate::grouper_error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::r#trait::RequestSourceTrait;

const HELP: &str = "Команды: activate [x y] | refresh | focus <handle> | dismiss | \
add-group <name> <#RRGGBB> <process>... | remove-group <name> | quit";

/// Разбор одной строки команды. Пустая строка - `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<PanelRequest>> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = parts.collect();

    let request = match (command, args.as_slice()) {
        ("activate", []) => PanelRequest::Activate { anchor: None },
        ("activate", [x, y]) => {
            let x = x.parse().map_err(|_| grouper_error!(command, "координата x: '{}'", x))?;
            let y = y.parse().map_err(|_| grouper_error!(command, "координата y: '{}'", y))?;
            PanelRequest::Activate {
                anchor: Some(Point::new(x, y)),
            }
        }
        ("refresh", []) => PanelRequest::Refresh,
        ("focus", [handle]) => {
            let handle: WindowHandle = handle
                .parse()
                .map_err(|e| grouper_error!(command, "дескриптор '{}': {}", handle, e))?;
            PanelRequest::BringToFront(handle)
        }
        ("dismiss", []) => PanelRequest::Dismiss,
        ("add-group", [name, color, processes @ ..]) if !processes.is_empty() => {
            let color: GroupColor = color.parse().map_err(|e: String| grouper_error!(command, "{}", e))?;
            PanelRequest::AddGroup(Group::new(*name, processes.iter(), color))
        }
        ("remove-group", [name]) => PanelRequest::RemoveGroup(name.to_string()),
        ("quit" | "exit", []) => PanelRequest::Shutdown,
        _ => return Err(grouper_error!(command, "'{}'. {}", line.trim(), HELP)),
    };
    Ok(Some(request))
}

/// Команды построчно из stdin
pub struct StdinRequestSource {
    requests: mpsc::Sender<PanelRequest>,
}

impl StdinRequestSource {
    pub fn new(requests: mpsc::Sender<PanelRequest>) -> Self {
        info!("Инициализация StdinRequestSource");
        Self { requests }
    }

    async fn run_impl(self) -> Result<()> {
        info!("{}", HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(line) = lines.next_line().await? {
            let request = match parse_command(&line) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            };

            let shutdown = request == PanelRequest::Shutdown;
            self.requests
                .send(request)
                .await
                .map_err(|_| grouper_error!(service_unavailable, "PanelController остановлен"))?;
            if shutdown {
                return Ok(());
            }
        }

        info!("stdin закрыт, завершение");
        // Контроллер мог уже завершиться сам
        let _ = self.requests.send(PanelRequest::Shutdown).await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RequestSourceTrait for StdinRequestSource {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
