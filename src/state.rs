use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// What the health endpoints report on.
#[derive(Clone)]
pub struct AppState {
    pub service: &'static str,
    pub jobs: TaskTracker,
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(service: &'static str, jobs: TaskTracker, shutdown: CancellationToken) -> Self {
        Self {
            service,
            jobs,
            shutdown,
        }
    }
}
