//! Match Runner Library
//!
//! HTTP service that runs host commands under an allow-list (or, opted in,
//! unrestricted) policy and tears down the Docker containers of multiplayer
//! matches named `<prefix>-<match_id>`.
//!
//! # Usage as Library
//!
//! ```rust,ignore
//! use match_runner::{Config, RunnerService};
//! use match_runner::web::{create_router, state::AppState};
//!
//! let service = RunnerService::new(&Config::default());
//! let app = create_router(AppState::new(service));
//! ```

pub mod config;
pub mod containers;
pub mod executor;
pub mod guard;
pub mod process;
pub mod service;
pub mod types;
pub mod web;

pub use config::{CommandPolicy, Config};
pub use service::RunnerService;
pub use types::{ContainerSet, ExecutionResult, Invocation, ServiceError, Stage};
