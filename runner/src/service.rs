//! Runner service
//!
//! Built once at startup from [`Config`] and shared with every HTTP handler.

use std::sync::Arc;

use crate::config::Config;
use crate::containers::ContainerManager;
use crate::executor::CommandExecutor;
use crate::guard::CommandGuard;
use crate::process::{ProcessRunner, SystemRunner};

pub struct RunnerService {
    pub executor: CommandExecutor,
    pub containers: ContainerManager,
}

impl RunnerService {
    /// Create a service that spawns real processes on the host
    pub fn new(config: &Config) -> Self {
        Self::with_runner(config, Arc::new(SystemRunner::new(config)))
    }

    /// Create a service on top of an explicit process runner
    pub fn with_runner(config: &Config, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            executor: CommandExecutor::new(CommandGuard::new(config), runner.clone()),
            containers: ContainerManager::new(&config.containers, runner),
        }
    }
}
