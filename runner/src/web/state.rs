//! Shared application state

use std::sync::Arc;

use crate::service::RunnerService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RunnerService>,
}

impl AppState {
    pub fn new(service: RunnerService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
