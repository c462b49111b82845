//! Command guard - policy layer for `/run-command`
//!
//! Decides whether a command line may run and turns it into an
//! [`Invocation`]. Under the allow-list policy only exact matches pass and
//! are tokenized without a shell; under the unrestricted policy the whole
//! line goes to the configured shell.

use std::collections::HashSet;

use crate::config::{CommandPolicy, Config};
use crate::types::{Invocation, ServiceError};

/// Command policy enforcement
#[derive(Debug, Clone)]
pub struct CommandGuard {
    policy: CommandPolicy,
    allowed: HashSet<String>,
    shell: String,
}

impl CommandGuard {
    /// Create a new CommandGuard from config
    pub fn new(config: &Config) -> Self {
        Self {
            policy: config.commands.policy,
            allowed: config.commands.allow.iter().cloned().collect(),
            shell: config.commands.shell.clone(),
        }
    }

    pub fn policy(&self) -> CommandPolicy {
        self.policy
    }

    /// Check a command and build the invocation that would run it
    ///
    /// Never spawns anything; a rejected command leaves no trace on the host.
    pub fn authorize(&self, command: &str) -> Result<Invocation, ServiceError> {
        if command.trim().is_empty() {
            return Err(ServiceError::Validation("Missing command".to_string()));
        }

        match self.policy {
            CommandPolicy::Unrestricted => Ok(Invocation::shell(&self.shell, command)),
            CommandPolicy::AllowList => {
                // Compared verbatim: "ls  -l" is not "ls -l"
                if !self.allowed.contains(command) {
                    return Err(ServiceError::Forbidden(command.to_string()));
                }

                let mut tokens = command.split_whitespace();
                let Some(program) = tokens.next() else {
                    return Err(ServiceError::Validation("Missing command".to_string()));
                };
                Ok(Invocation::new(program, tokens))
            }
        }
    }
}
