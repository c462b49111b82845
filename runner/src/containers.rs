//! Container lifecycle manager
//!
//! Discovers match containers through the runtime CLI by name filter, then
//! stops and removes them in batched invocations:
//!
//! ```text
//! Discover -> empty     -> Done (no-op)
//!          -> non-empty -> Stop -> failed    -> Error(stop)
//!                               -> succeeded -> Remove -> Done
//! ```
//!
//! `stop_all` also fails when removal fails; `stop_match` reports a failed
//! removal as a warning because the container is already stopped.

use std::sync::Arc;

use crate::config::ContainerConfig;
use crate::process::ProcessRunner;
use crate::types::{ContainerSet, ExecutionResult, Invocation, ServiceError, Stage};

/// Result of tearing down every container under a name prefix
#[derive(Debug, Clone, PartialEq)]
pub enum StopAllOutcome {
    NoneFound,
    Stopped {
        stopped: ContainerSet,
        stop: ExecutionResult,
        remove: ExecutionResult,
    },
}

/// Result of tearing down the container(s) of one match
#[derive(Debug, Clone, PartialEq)]
pub enum StopMatchOutcome {
    NoneFound {
        match_id: String,
        discovery: ExecutionResult,
    },
    Stopped {
        containers: ContainerSet,
        stop: ExecutionResult,
        remove: ExecutionResult,
        /// Set when removal failed after a successful stop
        warning: Option<String>,
    },
}

pub struct ContainerManager {
    runner: Arc<dyn ProcessRunner>,
    runtime_bin: String,
    name_prefix: String,
    exact_match: bool,
}

impl ContainerManager {
    pub fn new(config: &ContainerConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            runtime_bin: config.runtime_bin.clone(),
            name_prefix: config.name_prefix.clone(),
            exact_match: config.exact_match,
        }
    }

    /// Prefix shared by every match container, e.g. `mirror-server-`
    pub fn match_prefix(&self) -> String {
        format!("{}-", self.name_prefix)
    }

    /// Stop and remove every container whose name starts with `name_prefix`
    pub async fn stop_all(&self, name_prefix: &str) -> Result<StopAllOutcome, ServiceError> {
        if name_prefix.is_empty() {
            return Err(ServiceError::Validation(
                "Container name prefix cannot be empty".to_string(),
            ));
        }

        let pattern = format!("^/?{}", regex::escape(name_prefix));
        let (containers, _) = self.discover(&pattern).await?;

        if containers.is_empty() {
            tracing::info!(prefix = name_prefix, "No containers found");
            return Ok(StopAllOutcome::NoneFound);
        }

        tracing::info!(
            prefix = name_prefix,
            count = containers.len(),
            "Stopping containers"
        );

        let stop = self.batch(Stage::Stop, &containers).await?;
        settle(Stage::Stop, &stop)?;

        let remove = self.batch(Stage::Remove, &containers).await?;
        settle(Stage::Remove, &remove)?;

        tracing::info!(count = containers.len(), "Containers stopped and removed");

        Ok(StopAllOutcome::Stopped {
            stopped: containers,
            stop,
            remove,
        })
    }

    /// Stop and remove the container(s) belonging to `match_id`
    ///
    /// Every discovered container is acted on; with exact matching (the
    /// default) the runtime can report at most one.
    pub async fn stop_match(&self, match_id: &str) -> Result<StopMatchOutcome, ServiceError> {
        if match_id.trim().is_empty() {
            return Err(ServiceError::Validation("match_id is required".to_string()));
        }

        let mut pattern = format!(
            "^/?{}",
            regex::escape(&format!("{}{}", self.match_prefix(), match_id))
        );
        if self.exact_match {
            pattern.push('$');
        }

        let (containers, discovery) = self.discover(&pattern).await?;

        if containers.is_empty() {
            tracing::info!(match_id, "No containers found for match");
            return Ok(StopMatchOutcome::NoneFound {
                match_id: match_id.to_string(),
                discovery,
            });
        }

        if containers.len() > 1 {
            tracing::warn!(
                match_id,
                count = containers.len(),
                "Several containers match, stopping all of them"
            );
        }

        let stop = self.batch(Stage::Stop, &containers).await?;
        settle(Stage::Stop, &stop)?;

        let remove = self.batch(Stage::Remove, &containers).await?;
        let warning = match settle(Stage::Remove, &remove) {
            Ok(()) => None,
            Err(_) => {
                tracing::warn!(
                    match_id,
                    exit_code = remove.exit_code,
                    stderr = %remove.stderr,
                    "Container stopped but could not be removed"
                );
                Some(format!(
                    "Container stopped but removal failed (exit code {}): {}",
                    remove.exit_code, remove.stderr
                ))
            }
        };

        tracing::info!(match_id, "Match containers stopped");

        Ok(StopMatchOutcome::Stopped {
            containers,
            stop,
            remove,
            warning,
        })
    }

    async fn discover(
        &self,
        pattern: &str,
    ) -> Result<(ContainerSet, ExecutionResult), ServiceError> {
        let filter = format!("name={}", pattern);
        let invocation = Invocation::new(
            self.runtime_bin.as_str(),
            ["ps", "-a", "-q", "--filter", filter.as_str()],
        );

        let result = self.runner.run(&invocation).await?;
        if !result.success() {
            return Err(stage_error(Stage::Discover, &result));
        }
        // A clipped listing would silently leave containers running
        if result.truncated {
            return Err(ServiceError::Stage {
                stage: Stage::Discover,
                exit_code: result.exit_code,
                stderr: "container listing exceeded the output limit".to_string(),
            });
        }

        Ok((ContainerSet::parse(&result.stdout), result))
    }

    async fn batch(
        &self,
        stage: Stage,
        containers: &ContainerSet,
    ) -> Result<ExecutionResult, ServiceError> {
        let verb = match stage {
            Stage::Stop => "stop",
            Stage::Remove | Stage::Discover => "rm",
        };
        let args = std::iter::once(verb.to_string()).chain(containers.ids().iter().cloned());
        self.runner
            .run(&Invocation::new(self.runtime_bin.as_str(), args))
            .await
    }
}

/// Accept a finished step, tolerating containers that a concurrent request
/// already stopped or removed
fn settle(stage: Stage, result: &ExecutionResult) -> Result<(), ServiceError> {
    if result.success() {
        return Ok(());
    }

    if is_benign_failure(&result.stderr) {
        tracing::info!(%stage, stderr = %result.stderr, "Containers already gone, continuing");
        return Ok(());
    }

    Err(stage_error(stage, result))
}

fn stage_error(stage: Stage, result: &ExecutionResult) -> ServiceError {
    ServiceError::Stage {
        stage,
        exit_code: result.exit_code,
        stderr: result.stderr.clone(),
    }
}

/// True when every stderr line reports a container that no longer exists
/// or is already being removed
fn is_benign_failure(stderr: &str) -> bool {
    let mut lines = stderr.lines().filter(|l| !l.trim().is_empty()).peekable();
    if lines.peek().is_none() {
        return false;
    }

    lines.all(|line| {
        let line = line.to_ascii_lowercase();
        line.contains("no such container") || line.contains("is already in progress")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::testing::ScriptedRunner;

    fn manager(runner: Arc<ScriptedRunner>) -> ContainerManager {
        ContainerManager::new(&ContainerConfig::default(), runner)
    }

    fn filter_arg(invocation: &Invocation) -> &str {
        invocation.args.last().map(String::as_str).unwrap_or_default()
    }

    #[tokio::test]
    async fn test_stop_all_none_found_is_idempotent() {
        let runner = Arc::new(ScriptedRunner::new().push("", "", 0).push("\n", "", 0));
        let manager = manager(runner.clone());

        for _ in 0..2 {
            let outcome = manager.stop_all("mirror-server-").await.unwrap();
            assert_eq!(outcome, StopAllOutcome::NoneFound);
        }

        // Only discovery ran
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_stop_all_batches_stop_then_remove() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .push("A\nB\n", "", 0)
                .push("A\nB", "", 0)
                .push("A\nB", "", 0),
        );
        let manager = manager(runner.clone());

        let outcome = manager.stop_all("mirror-server-").await.unwrap();
        let StopAllOutcome::Stopped {
            stopped,
            stop,
            remove,
        } = outcome
        else {
            panic!("expected containers to be stopped");
        };
        assert_eq!(stopped.ids(), ["A", "B"]);
        assert_eq!(stop.exit_code, 0);
        assert_eq!(remove.exit_code, 0);

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].program, "docker");
        assert_eq!(&calls[0].args[..4], ["ps", "-a", "-q", "--filter"]);
        assert_eq!(
            filter_arg(&calls[0]),
            format!("name=^/?{}", regex::escape("mirror-server-"))
        );
        assert_eq!(calls[1].args, vec!["stop", "A", "B"]);
        assert_eq!(calls[2].args, vec!["rm", "A", "B"]);
    }

    #[tokio::test]
    async fn test_stop_all_stop_failure_skips_removal() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .push("A", "", 0)
                .push("", "Cannot connect to the Docker daemon", 1),
        );
        let manager = manager(runner.clone());

        let err = manager.stop_all("mirror-server-").await.unwrap_err();
        match err {
            ServiceError::Stage {
                stage,
                exit_code,
                stderr,
            } => {
                assert_eq!(stage, Stage::Stop);
                assert_eq!(exit_code, 1);
                assert!(stderr.contains("Docker daemon"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_stop_all_remove_failure_is_error() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .push("A", "", 0)
                .push("A", "", 0)
                .push("", "conflict: unable to remove", 1),
        );

        let err = manager(runner).stop_all("mirror-server-").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Stage {
                stage: Stage::Remove,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_stop_all_discovery_failure() {
        let runner = Arc::new(ScriptedRunner::new().push("", "permission denied", 1));

        let err = manager(runner).stop_all("mirror-server-").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Stage {
                stage: Stage::Discover,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_stop_all_tolerates_concurrent_teardown() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .push("A\nB", "", 0)
                .push("A", "Error response from daemon: No such container: B", 1)
                .push("A", "Error response from daemon: No such container: B", 1),
        );

        let outcome = manager(runner).stop_all("mirror-server-").await.unwrap();
        assert!(matches!(outcome, StopAllOutcome::Stopped { .. }));
    }

    #[tokio::test]
    async fn test_stop_all_rejects_empty_prefix() {
        let runner = Arc::new(ScriptedRunner::new());
        let err = manager(runner.clone()).stop_all("").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stop_match_requires_match_id() {
        let runner = Arc::new(ScriptedRunner::new());
        let manager = manager(runner.clone());

        for id in ["", "   "] {
            let err = manager.stop_match(id).await.unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)));
        }
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stop_match_uses_exact_escaped_filter() {
        let runner = Arc::new(ScriptedRunner::new().push("", "", 0));
        let manager = manager(runner.clone());

        manager.stop_match("4.2").await.unwrap();

        let calls = runner.calls();
        assert_eq!(
            filter_arg(&calls[0]),
            format!("name=^/?{}$", regex::escape("mirror-server-4.2"))
        );
    }

    #[tokio::test]
    async fn test_stop_match_prefix_filter_when_not_exact() {
        let runner = Arc::new(ScriptedRunner::new().push("", "", 0));
        let config = ContainerConfig {
            exact_match: false,
            ..ContainerConfig::default()
        };
        let manager = ContainerManager::new(&config, runner.clone());

        manager.stop_match("42").await.unwrap();
        assert!(!filter_arg(&runner.calls()[0]).ends_with('$'));
    }

    #[tokio::test]
    async fn test_stop_match_round_trip() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .push("c42\n", "", 0)
                .push("c42", "", 0)
                .push("c42", "", 0)
                .push("", "", 0),
        );
        let manager = manager(runner.clone());

        let first = manager.stop_match("42").await.unwrap();
        match first {
            StopMatchOutcome::Stopped {
                containers,
                warning,
                ..
            } => {
                assert_eq!(containers.first(), Some("c42"));
                assert!(warning.is_none());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let second = manager.stop_match("42").await.unwrap();
        assert!(matches!(
            second,
            StopMatchOutcome::NoneFound { ref match_id, .. } if match_id == "42"
        ));

        let calls = runner.calls();
        assert_eq!(calls[1].args, vec!["stop", "c42"]);
        assert_eq!(calls[2].args, vec!["rm", "c42"]);
    }

    #[tokio::test]
    async fn test_stop_match_stop_failure_skips_removal() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .push("c42", "", 0)
                .push("", "tried to kill container, but did not receive an exit event", 1),
        );

        let err = manager(runner.clone()).stop_match("42").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Stage {
                stage: Stage::Stop,
                exit_code: 1,
                ..
            }
        ));
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_stop_match_remove_failure_is_warning() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .push("c42", "", 0)
                .push("c42", "", 0)
                .push("", "device or resource busy", 1),
        );

        let outcome = manager(runner).stop_match("42").await.unwrap();
        let StopMatchOutcome::Stopped {
            warning, remove, ..
        } = outcome
        else {
            panic!("expected stopped outcome");
        };
        assert_eq!(remove.exit_code, 1);
        assert!(warning.unwrap().contains("device or resource busy"));
    }

    #[tokio::test]
    async fn test_stop_match_acts_on_every_prefix_match() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .push("c1\nc2\n", "", 0)
                .push("c1\nc2", "", 0)
                .push("c1\nc2", "", 0),
        );
        let config = ContainerConfig {
            exact_match: false,
            ..ContainerConfig::default()
        };
        let manager = ContainerManager::new(&config, runner.clone());

        let outcome = manager.stop_match("4").await.unwrap();
        let StopMatchOutcome::Stopped { containers, .. } = outcome else {
            panic!("expected stopped outcome");
        };
        assert_eq!(containers.ids(), ["c1", "c2"]);

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].args, vec!["stop", "c1", "c2"]);
        assert_eq!(calls[2].args, vec!["rm", "c1", "c2"]);
    }

    #[tokio::test]
    async fn test_stop_match_discovery_failure() {
        let runner = Arc::new(ScriptedRunner::new().push(
            "",
            "Cannot connect to the Docker daemon",
            1,
        ));

        let err = manager(runner.clone()).stop_match("42").await.unwrap_err();
        match err {
            ServiceError::Stage {
                stage,
                exit_code,
                stderr,
            } => {
                assert_eq!(stage, Stage::Discover);
                assert_eq!(exit_code, 1);
                assert!(stderr.contains("Docker daemon"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_match_tolerates_concurrent_teardown() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .push("c42", "", 0)
                .push("", "Error response from daemon: No such container: c42", 1)
                .push("", "Error response from daemon: No such container: c42", 1),
        );

        let outcome = manager(runner.clone()).stop_match("42").await.unwrap();
        let StopMatchOutcome::Stopped { warning, .. } = outcome else {
            panic!("expected stopped outcome");
        };
        assert!(warning.is_none());
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_truncated_listing_is_discovery_error() {
        let runner = Arc::new(ScriptedRunner::new().push_result(ExecutionResult {
            stdout: "A\nB".to_string(),
            stderr: String::new(),
            exit_code: 0,
            truncated: true,
        }));
        let manager = manager(runner.clone());

        let err = manager.stop_all("mirror-server-").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Stage {
                stage: Stage::Discover,
                exit_code: 0,
                ..
            }
        ));
        // Nothing was stopped on the strength of a partial listing
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn test_benign_failure_detection() {
        assert!(is_benign_failure(
            "Error response from daemon: No such container: abc"
        ));
        assert!(is_benign_failure(
            "Error response from daemon: removal of container abc is already in progress\n"
        ));
        assert!(!is_benign_failure(""));
        assert!(!is_benign_failure(
            "Error response from daemon: No such container: abc\npermission denied"
        ));
    }
}
