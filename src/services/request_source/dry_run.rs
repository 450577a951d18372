use crate::error::Result;
use crate::events::{PanelRequest, WindowHandle};
use crate::grouper_error;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::r#trait::RequestSourceTrait;

/// Сценарий для эмулированного рабочего стола: пауза перед запросом и сам запрос
fn demo_script() -> Vec<(Duration, PanelRequest)> {
    let short = Duration::from_millis(50);
    let pause = Duration::from_secs(1);
    vec![
        (pause, PanelRequest::Activate { anchor: None }),
        (pause, PanelRequest::Refresh),
        // Повторный клик закрывает панель, эхо от ОС поглощается
        (pause, PanelRequest::Activate { anchor: None }),
        (short, PanelRequest::Activate { anchor: None }),
        (pause, PanelRequest::activate_at(3000, 100)),
        (pause, PanelRequest::BringToFront(WindowHandle::new(0x30030))),
    ]
}

pub struct DryRunRequestSource {
    requests: mpsc::Sender<PanelRequest>,
}

impl DryRunRequestSource {
    pub fn new(requests: mpsc::Sender<PanelRequest>) -> Self {
        info!("Инициализация DryRunRequestSource");
        Self { requests }
    }

    async fn run_impl(self) -> Result<()> {
        info!("Dry-run режим - запросы к панели генерируются по сценарию");

        for (delay, request) in demo_script() {
            tokio::time::sleep(delay).await;
            info!("Dry-run запрос: {:?}", request);
            self.requests
                .send(request)
                .await
                .map_err(|_| grouper_error!(service_unavailable, "PanelController остановлен"))?;
        }

        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            if self.requests.is_closed() {
                return Ok(());
            }
            debug!("RequestSource работает в dry-run режиме");
        }
    }
}

#[async_trait::async_trait]
impl RequestSourceTrait for DryRunRequestSource {
    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}
