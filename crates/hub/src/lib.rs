mod dispatcher;
mod drivers;
mod observer;
mod traits;

pub use dispatcher::{DispatchOutcome, DispatchReport, Dispatcher};
pub use drivers::HttpTransport;
pub use observer::Observer;
pub use traits::{PushTransport, TransportError};

use domain::Notification;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Drains the notification bus until it closes or `cancel_token` fires.
/// Notifications are handled one at a time so events for the same comment
/// leave in the order they happened.
pub async fn start(
    observer: Observer,
    mut rx: mpsc::Receiver<Notification>,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    info!("Hub worker started");
    loop {
        tokio::select! {
            next = rx.recv() => {
                let Some(notification) = next else { break };
                match observer.handle(notification).await {
                    Ok(Some(report)) => info!(
                        kind = %report.kind,
                        post_id = %report.post_id,
                        delivered = report.delivered(),
                        failed = report.failed(),
                        "dispatch finished"
                    ),
                    Ok(None) => {}
                    Err(e) => error!("Failed to propagate notification: {:?}", e),
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }
    info!("Hub worker stopped");
    Ok(())
}
