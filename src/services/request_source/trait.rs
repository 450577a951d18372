use crate::error::Result;
use crate::events::PanelRequest;
use tokio::sync::mpsc;

/// Trait for request sources that can run in different modes
#[async_trait::async_trait]
pub trait RequestSourceTrait {
    /// Run the source until its input ends or the controller goes away
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Factory function to create an appropriate request source based on the dry_run flag
pub fn create_request_source(
    requests: mpsc::Sender<PanelRequest>,
    dry_run: bool,
) -> Result<Box<dyn RequestSourceTrait + Send>> {
    if dry_run {
        Ok(Box::new(super::dry_run::DryRunRequestSource::new(requests)))
    } else {
        Ok(Box::new(super::stdin::StdinRequestSource::new(requests)))
    }
}
