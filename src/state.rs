use crate::artifacts::ArtifactStore;
use crate::config::{DEFAULT_TREND_POINTS, DEFAULT_WORKERS};
use crate::error::AppError;
use crate::forecast::ForecastRun;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug)]
pub struct AppState {
    store: Option<Arc<ArtifactStore>>,
    latest: Option<Arc<ForecastRun>>,
    latest_tx: watch::Sender<Option<Arc<ForecastRun>>>,
    workers: usize,
    trend_points: usize,
}

impl AppState {
    pub fn new() -> Self {
        let (latest_tx, _latest_rx) = watch::channel(None);
        Self {
            store: None,
            latest: None,
            latest_tx,
            workers: DEFAULT_WORKERS,
            trend_points: DEFAULT_TREND_POINTS,
        }
    }

    pub fn store(&self) -> Option<&Arc<ArtifactStore>> {
        self.store.as_ref()
    }

    /// Replacing the artifacts invalidates the latest run.
    pub fn set_store(&mut self, store: Arc<ArtifactStore>) {
        self.store = Some(store);
        self.latest = None;
        self.latest_tx.send_replace(None);
    }

    pub fn latest(&self) -> Option<&Arc<ForecastRun>> {
        self.latest.as_ref()
    }

    pub fn subscribe_latest(&self) -> watch::Receiver<Option<Arc<ForecastRun>>> {
        self.latest_tx.subscribe()
    }

    pub fn set_latest(&mut self, run: Arc<ForecastRun>) -> Result<(), AppError> {
        self.latest = Some(Arc::clone(&run));
        self.latest_tx
            .send(Some(run))
            .map_err(|_| AppError::WatchSend)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn set_workers(&mut self, workers: usize) {
        self.workers = workers.max(1);
    }

    pub fn trend_points(&self) -> usize {
        self.trend_points
    }

    pub fn set_trend_points(&mut self, trend_points: usize) {
        self.trend_points = trend_points;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
