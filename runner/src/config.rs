//! Configuration types and loading

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration Types
// ============================================================================

/// Top-level runner configuration (from match-runner.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub environment: EnvConfig,
    #[serde(default)]
    pub containers: ContainerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// How `/run-command` decides whether a command may run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommandPolicy {
    /// Only exact command lines from the allow-list, run without a shell
    #[default]
    AllowList,
    /// Any command line, interpreted by the configured shell
    Unrestricted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default)]
    pub policy: CommandPolicy,

    /// Exact command lines permitted under the allow-list policy
    #[serde(default = "default_allow")]
    pub allow: Vec<String>,

    /// Shell used under the unrestricted policy
    #[serde(default = "default_shell")]
    pub shell: String,

    /// Strip trailing whitespace from captured stdout/stderr
    #[serde(default = "default_trim_output")]
    pub trim_output: bool,
}

fn default_allow() -> Vec<String> {
    vec!["ls -l".to_string(), "uptime".to_string(), "whoami".to_string()]
}

fn default_shell() -> String {
    "/bin/sh".to_string()
}

fn default_trim_output() -> bool {
    true
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            policy: CommandPolicy::default(),
            allow: default_allow(),
            shell: default_shell(),
            trim_output: default_trim_output(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout per spawned process in seconds (0 = wait forever)
    #[serde(default = "default_timeout")]
    pub default_secs: u64,
}

fn default_timeout() -> u64 {
    300
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum output kept per stream (stdout/stderr) in bytes
    ///
    /// Anything past the limit is read and discarded, never buffered.
    #[serde(default = "default_max_output")]
    pub max_output_bytes: usize,
}

fn default_max_output() -> usize {
    1024 * 1024 // 1MB
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: default_max_output(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvConfig {
    /// Environment variables to remove
    #[serde(default)]
    pub remove: Vec<String>,
    /// Environment variables to set
    #[serde(default)]
    pub set: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Container runtime CLI
    #[serde(default = "default_runtime_bin")]
    pub runtime_bin: String,

    /// Base name shared by all match containers (`<prefix>-<match_id>`)
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Match `<prefix>-<match_id>` exactly instead of as a name prefix
    #[serde(default = "default_exact_match")]
    pub exact_match: bool,
}

fn default_runtime_bin() -> String {
    "docker".to_string()
}

fn default_name_prefix() -> String {
    "mirror-server".to_string()
}

fn default_exact_match() -> bool {
    true
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            runtime_bin: default_runtime_bin(),
            name_prefix: default_name_prefix(),
            exact_match: default_exact_match(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load config from an explicit path, or from standard locations
    ///
    /// Config is searched in order:
    /// 1. `explicit` (the `--config` flag or `RUNNER_CONFIG_PATH` env var)
    /// 2. `./match-runner.toml` (local override)
    /// 3. `$XDG_CONFIG_HOME/match-runner/config.toml`
    /// 4. `~/.match-runner.toml`
    /// 5. Default config if none found
    ///
    /// An explicit path that is missing or malformed is an error; the
    /// standard locations are skipped with a warning instead.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let config = Self::load_from_path(path)?;
            tracing::info!("Loaded config from {}", path.display());
            return Ok(config);
        }

        for path in Self::standard_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_path(&path) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    return Ok(config);
                }
                Err(e) => {
                    tracing::warn!("Failed to load config {}: {:#}", path.display(), e);
                }
            }
        }

        tracing::info!("Using default configuration");
        Ok(Self::default())
    }

    /// Load from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    fn standard_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("match-runner.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("match-runner").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".match-runner.toml"));
        }

        paths
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.commands.shell.trim().is_empty() {
            anyhow::bail!("commands.shell cannot be empty");
        }

        if self.containers.runtime_bin.trim().is_empty() {
            anyhow::bail!("containers.runtime_bin cannot be empty");
        }

        if self.containers.name_prefix.trim().is_empty() {
            anyhow::bail!("containers.name_prefix cannot be empty");
        }

        match self.commands.policy {
            CommandPolicy::Unrestricted => {
                tracing::warn!(
                    "Unrestricted command policy is enabled: any caller can run arbitrary shell commands via {}",
                    self.commands.shell
                );
            }
            CommandPolicy::AllowList if self.commands.allow.is_empty() => {
                tracing::warn!("Allow-list is empty: every /run-command request will be rejected");
            }
            CommandPolicy::AllowList => {}
        }

        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
