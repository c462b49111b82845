//! Tracing initialization
//!
//! Provides standardized tracing setup shared by every runner entry point.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
///
/// Sets up logging to stderr with:
/// - Formatted output without ANSI colors (for clean logs)
/// - Environment-based filtering via RUST_LOG
/// - Default log level of `info` for the specified crate
///
/// Set `LOG_FORMAT=json` for structured JSON output (useful for production/log aggregation).
/// Default is human-readable text output.
///
/// # Arguments
///
/// * `crate_name` - The name of the crate to enable at `info` (e.g., "match_runner")
///
/// # Example
///
/// ```rust,ignore
/// runner_common::init_tracing("match_runner")?;
/// ```
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let directive = format!("{}=info", crate_name);
    let filter = EnvFilter::from_default_env()
        .add_directive(directive.parse()?)
        .add_directive("tower_http=info".parse()?);

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}
