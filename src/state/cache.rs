use crate::CycleReport;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct ReportCache {
    inner: Arc<RwLock<CacheState>>,
}

#[derive(Default)]
struct CacheState {
    latest: Option<CycleReport>,
    cycles: u64,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn latest(&self) -> Option<CycleReport> {
        let state = self.inner.read().await;
        state.latest.clone()
    }

    /// Number of cycles recorded since startup
    pub async fn cycles(&self) -> u64 {
        self.inner.read().await.cycles
    }

    pub async fn update(&self, report: CycleReport) {
        let mut state = self.inner.write().await;
        state.latest = Some(report);
        state.cycles += 1;
    }
}
