//! Command executor
//!
//! Runs one command per request through the guard and the process runner.

use std::sync::Arc;

use crate::config::CommandPolicy;
use crate::guard::CommandGuard;
use crate::process::ProcessRunner;
use crate::types::{ExecutionResult, ServiceError};

pub struct CommandExecutor {
    guard: CommandGuard,
    runner: Arc<dyn ProcessRunner>,
}

impl CommandExecutor {
    pub fn new(guard: CommandGuard, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { guard, runner }
    }

    pub fn policy(&self) -> CommandPolicy {
        self.guard.policy()
    }

    /// Run a command to completion
    ///
    /// A non-zero exit code is a normal result; only policy rejections,
    /// spawn failures and timeouts are errors.
    pub async fn execute(&self, command: &str) -> Result<ExecutionResult, ServiceError> {
        let invocation = match self.guard.authorize(command) {
            Ok(invocation) => invocation,
            Err(e) => {
                tracing::warn!(command, "Command rejected: {}", e);
                return Err(e);
            }
        };

        let result = self.runner.run(&invocation).await?;
        tracing::info!(
            command,
            exit_code = result.exit_code,
            "Command finished"
        );
        Ok(result)
    }
}
