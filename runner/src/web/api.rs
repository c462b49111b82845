//! REST API handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use runner_common::{bad_request, forbidden, internal_error, ApiError, ApiResult, ErrorResponse};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::state::AppState;
use crate::config::CommandPolicy;
use crate::containers::{StopAllOutcome, StopMatchOutcome};
use crate::types::{ExecutionResult, ServiceError};

/// Map a service error onto its HTTP status and JSON body
fn service_error(err: ServiceError) -> ApiError {
    match err {
        ServiceError::Validation(msg) => bad_request(msg),
        ServiceError::Forbidden(_) => forbidden(err.to_string()),
        ServiceError::Spawn { .. } | ServiceError::Io { .. } | ServiceError::Timeout { .. } => {
            tracing::error!("Command execution failed: {}", err);
            internal_error(err.to_string())
        }
        ServiceError::Stage {
            stage,
            exit_code,
            ref stderr,
        } => {
            tracing::error!(%stage, exit_code, stderr = %stderr, "Container step failed");
            ErrorResponse::new(err.to_string())
                .with_stderr(stderr.clone())
                .with_stage(stage.as_str(), exit_code)
                .into_api_error(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Join the non-empty outputs of consecutive steps
fn join_outputs<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Health
// ============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub message: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        message: "Match runner is up".to_string(),
    })
}

// ============================================================================
// Command execution
// ============================================================================

/// Run command request
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub command: Option<String>,
}

/// Run command response
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
    /// stdout again, under the name allow-list clients read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl CommandResponse {
    fn new(result: ExecutionResult, policy: CommandPolicy) -> Self {
        let output = match policy {
            CommandPolicy::AllowList => Some(result.stdout.clone()),
            CommandPolicy::Unrestricted => None,
        };
        Self {
            stdout: result.stdout,
            stderr: result.stderr,
            returncode: result.exit_code,
            output,
            truncated: result.truncated,
        }
    }
}

/// Run a single command
pub async fn run_command(
    State(state): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> ApiResult<CommandResponse> {
    let command = match payload {
        Ok(Json(req)) => req.command.unwrap_or_default(),
        Err(rejection) => {
            return Err(bad_request(format!(
                "Invalid request body: {}",
                rejection.body_text()
            )))
        }
    };

    let executor = &state.service.executor;
    let result = executor.execute(&command).await.map_err(service_error)?;
    Ok(Json(CommandResponse::new(result, executor.policy())))
}

// ============================================================================
// Containers
// ============================================================================

/// Stop all containers response
#[derive(Debug, Serialize)]
pub struct StopAllResponse {
    pub message: String,
    pub stopped: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

/// Stop and remove every match container
pub async fn stop_all_containers(State(state): State<AppState>) -> ApiResult<StopAllResponse> {
    let containers = &state.service.containers;
    let outcome = containers
        .stop_all(&containers.match_prefix())
        .await
        .map_err(service_error)?;

    let response = match outcome {
        StopAllOutcome::NoneFound => StopAllResponse {
            message: "No containers found".to_string(),
            stopped: Vec::new(),
            stdout: None,
            stderr: None,
        },
        StopAllOutcome::Stopped {
            stopped,
            stop,
            remove,
        } => StopAllResponse {
            message: format!("Stopped and removed {} container(s)", stopped.len()),
            stdout: Some(join_outputs([stop.stdout.as_str(), remove.stdout.as_str()])),
            stderr: Some(join_outputs([stop.stderr.as_str(), remove.stderr.as_str()])),
            stopped: stopped.ids().to_vec(),
        },
    };

    Ok(Json(response))
}

/// Stop container request
#[derive(Debug, Deserialize)]
pub struct StopContainerRequest {
    /// Accepted as a string or a number
    #[serde(default)]
    pub match_id: Option<Value>,
}

impl StopContainerRequest {
    fn match_id(&self) -> Option<String> {
        match self.match_id.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Stop container response
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum StopContainerResponse {
    Stopped {
        message: String,
        container_id: String,
        container_ids: Vec<String>,
        stop_stdout: String,
        stop_stderr: String,
        remove_stdout: String,
        remove_stderr: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    NoneFound {
        message: String,
        match_id: String,
        stdout: String,
        stderr: String,
    },
}

/// Stop and remove the container(s) of one match
pub async fn stop_container(
    State(state): State<AppState>,
    payload: Result<Json<StopContainerRequest>, JsonRejection>,
) -> ApiResult<StopContainerResponse> {
    let Some(match_id) = payload.ok().and_then(|Json(req)| req.match_id()) else {
        return Err(bad_request("match_id is required"));
    };

    let outcome = state
        .service
        .containers
        .stop_match(&match_id)
        .await
        .map_err(service_error)?;

    let response = match outcome {
        StopMatchOutcome::NoneFound {
            match_id,
            discovery,
        } => StopContainerResponse::NoneFound {
            message: format!("No containers found for match ID: {}", match_id),
            match_id,
            stdout: discovery.stdout,
            stderr: discovery.stderr,
        },
        StopMatchOutcome::Stopped {
            containers,
            stop,
            remove,
            warning,
        } => {
            let message = match warning {
                Some(_) => format!("Container for match {} stopped (removal failed)", match_id),
                None => format!("Container for match {} stopped and removed", match_id),
            };
            StopContainerResponse::Stopped {
                message,
                container_id: containers.first().unwrap_or_default().to_string(),
                container_ids: containers.ids().to_vec(),
                stop_stdout: stop.stdout,
                stop_stderr: stop.stderr,
                remove_stdout: remove.stdout,
                remove_stderr: remove.stderr,
                warning,
            }
        }
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Stage;

    #[test]
    fn test_error_status_mapping() {
        let (status, _) = service_error(ServiceError::Validation("match_id is required".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, Json(body)) = service_error(ServiceError::Forbidden("reboot".into()));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.error.contains("reboot"));

        let (status, Json(body)) = service_error(ServiceError::Stage {
            stage: Stage::Stop,
            exit_code: 125,
            stderr: "daemon down".into(),
        });
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.stderr.as_deref(), Some("daemon down"));
        assert_eq!(body.stage.as_deref(), Some("stop"));
        assert_eq!(body.exit_code, Some(125));
    }

    #[test]
    fn test_match_id_accepts_numbers() {
        let req: StopContainerRequest = serde_json::from_str(r#"{"match_id": 42}"#).unwrap();
        assert_eq!(req.match_id().as_deref(), Some("42"));

        let req: StopContainerRequest = serde_json::from_str(r#"{"match_id": null}"#).unwrap();
        assert_eq!(req.match_id(), None);
    }

    #[test]
    fn test_join_outputs_skips_empty() {
        assert_eq!(join_outputs(["a", "", "b"]), "a\nb");
        assert_eq!(join_outputs(["", ""]), "");
    }
}
