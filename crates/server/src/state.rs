use crate::apply::ApplyEngine;
use axum::extract::FromRef;
use domain::Notification;
use storage::Db;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub engine: ApplyEngine,
    /// Notification bus drained by the hub worker.
    pub notifier: mpsc::Sender<Notification>,
    pub admin_token: String,
}

impl AppState {
    /// Local changes are already committed when this runs; a closed bus only
    /// means they will not be propagated.
    pub async fn publish(&self, notification: Notification) {
        if let Err(e) = self.notifier.send(notification).await {
            warn!(notification = ?e.0, "hub worker closed, notification dropped");
        }
    }
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
