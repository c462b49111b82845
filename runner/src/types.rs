//! Type definitions for the match runner

use std::fmt;

use thiserror::Error;

// ============================================================================
// Execution Types
// ============================================================================

/// Captured outcome of one finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code, `-1` when terminated by a signal
    pub exit_code: i32,
    /// Whether stdout or stderr was clipped to the configured limit
    pub truncated: bool,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A program plus its arguments, spawned without further interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// `<shell> -c <command>`
    pub fn shell(shell: &str, command: &str) -> Self {
        Self::new(shell, ["-c", command])
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

// ============================================================================
// Container Types
// ============================================================================

/// Container ids in the order the runtime listed them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSet(Vec<String>);

impl ContainerSet {
    /// Parse newline-separated listing output
    ///
    /// Blank output means no containers, never a single empty id.
    pub fn parse(listing: &str) -> Self {
        Self(
            listing
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }
}

/// Step of the discover/stop/remove pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discover,
    Stop,
    Remove,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Discover => "discover",
            Stage::Stop => "stop",
            Stage::Remove => "remove",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Command not allowed: {0}")]
    Forbidden(String),

    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("Container {stage} step failed with exit code {exit_code}")]
    Stage {
        stage: Stage,
        exit_code: i32,
        stderr: String,
    },
}
