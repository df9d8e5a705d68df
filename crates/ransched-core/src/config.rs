//! # Configuration System
//!
//! Provides YAML-based configuration for the downlink scheduler:
//!
//! - Scheduling policy selection and its parameters
//! - Real-time settings for the scheduler task (scheduling class, CPU affinity)
//! - Logging and metrics configuration
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `RANSCHED_CONFIG` environment variable
//! 2. `./ransched.yaml` (current directory)
//! 3. `~/.config/ransched/config.yaml` (user config)
//! 4. `/etc/ransched/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! scheduler:
//!   policy: eicic
//!   eicic:
//!     macro_bs_id: 0
//!     abs_pattern: [0, 1, 0, 1, 0, 0, 0, 1, 0, 1]
//!
//! realtime:
//!   policy: deadline
//!   runtime_us: 800
//!   deadline_us: 1000
//!   period_us: 1000
//!   cpu_affinity: [2]
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::mac::eicic::DEFAULT_ABS_PATTERN;
use crate::observe::{LogConfig, SchedulerMetrics};
use crate::rib::common::HYPERFRAME_SUBFRAMES;
use crate::rt::{RtConfig, RtPolicy};

/// Error type for configuration operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(String),
    #[error("failed to read config: {0}")]
    ReadError(String),
    #[error("failed to parse config: {0}")]
    ParseError(String),
    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// Downlink scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Controller-side scheduling of every cell
    #[default]
    Central,
    /// Controller-side scheduling four subframes ahead
    Delegated,
    /// Almost-blank-subframe coordination between macro and pico cells
    Eicic,
}

/// Macro/pico coordination settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EicicConfig {
    /// Base station acting as the macro cell
    pub macro_bs_id: u64,
    /// Per-subframe permission flags, indexed by target subframe
    pub abs_pattern: [u8; 10],
}

impl Default for EicicConfig {
    fn default() -> Self {
        Self {
            macro_bs_id: 0,
            abs_pattern: DEFAULT_ABS_PATTERN,
        }
    }
}

/// Scheduler policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub policy: PolicyKind,
    /// Subframes between the reported current subframe and the scheduled one
    pub look_ahead: u32,
    /// Start with controller-side scheduling enabled (central policy)
    pub central_scheduling: bool,
    /// Start with delegation enabled (delegated policy)
    pub delegation_enabled: bool,
    pub eicic: EicicConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            policy: PolicyKind::Central,
            look_ahead: 0,
            central_scheduling: true,
            delegation_enabled: true,
            eicic: EicicConfig::default(),
        }
    }
}

/// OS scheduling class for the scheduler task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedPolicy {
    #[default]
    Default,
    Fifo,
    Rr,
    Deadline,
}

/// Real-time configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub policy: SchedPolicy,
    /// Static priority for fifo/rr (1-99 on Linux)
    pub priority: i32,
    /// SCHED_DEADLINE runtime in microseconds
    pub runtime_us: u64,
    /// SCHED_DEADLINE relative deadline in microseconds
    pub deadline_us: u64,
    /// SCHED_DEADLINE period in microseconds
    pub period_us: u64,
    /// CPUs to pin the scheduler task to
    pub cpu_affinity: Vec<usize>,
    /// Lock memory to prevent page faults
    pub lock_memory: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            policy: SchedPolicy::Default,
            priority: 80,
            runtime_us: 800,
            deadline_us: 1000,
            period_us: 1000,
            cpu_affinity: Vec::new(),
            lock_memory: false,
        }
    }
}

impl RealtimeConfig {
    pub fn rt_policy(&self) -> RtPolicy {
        match self.policy {
            SchedPolicy::Default => RtPolicy::Default,
            SchedPolicy::Fifo => RtPolicy::Fifo(self.priority),
            SchedPolicy::Rr => RtPolicy::RoundRobin(self.priority),
            SchedPolicy::Deadline => RtPolicy::Deadline {
                runtime: Duration::from_micros(self.runtime_us),
                deadline: Duration::from_micros(self.deadline_us),
                period: Duration::from_micros(self.period_us),
            },
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Collect per-round scheduler metrics
    pub enable: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enable: true }
    }
}

/// Complete scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,
    pub scheduler: SchedulerConfig,
    pub realtime: RealtimeConfig,
    pub logging: LogConfig,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            scheduler: SchedulerConfig::default(),
            realtime: RealtimeConfig::default(),
            logging: LogConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default search path.
    ///
    /// Search order:
    /// 1. `RANSCHED_CONFIG` environment variable
    /// 2. `./ransched.yaml`
    /// 3. `~/.config/ransched/config.yaml`
    /// 4. `/etc/ransched/config.yaml`
    ///
    /// Returns default config if no file is found. A path named by the
    /// environment variable must exist.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("RANSCHED_CONFIG") {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            return Self::load_from(&path);
        }

        for path in &Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Self::default())
    }

    /// Load and validate configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    /// Get configuration search paths.
    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./ransched.yaml")];

        if let Some(dirs) = directories::ProjectDirs::from("", "", "ransched") {
            paths.push(dirs.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/ransched/config.yaml"));
        paths
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.look_ahead >= HYPERFRAME_SUBFRAMES {
            return Err(ConfigError::ValidationError(format!(
                "look_ahead must be < {}",
                HYPERFRAME_SUBFRAMES
            )));
        }

        if self.scheduler.eicic.abs_pattern.iter().any(|&v| v > 1) {
            return Err(ConfigError::ValidationError(
                "abs_pattern entries must be 0 or 1".to_string(),
            ));
        }

        if matches!(self.realtime.policy, SchedPolicy::Fifo | SchedPolicy::Rr)
            && !(1..=99).contains(&self.realtime.priority)
        {
            return Err(ConfigError::ValidationError(
                "priority must be 1-99".to_string(),
            ));
        }

        self.realtime
            .rt_policy()
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Thread settings for the scheduler task.
    pub fn rt_config(&self, name: &str) -> RtConfig {
        RtConfig::builder()
            .name(name)
            .policy(self.realtime.rt_policy())
            .cpu_affinity(&self.realtime.cpu_affinity)
            .lock_memory(self.realtime.lock_memory)
            .build()
    }

    /// Metrics for the scheduler task, `None` when collection is disabled.
    pub fn scheduler_metrics(&self) -> Option<Arc<SchedulerMetrics>> {
        self.metrics
            .enable
            .then(|| Arc::new(SchedulerMetrics::new()))
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            realtime: RealtimeConfig {
                policy: SchedPolicy::Deadline,
                cpu_affinity: vec![2],
                lock_memory: true,
                ..Default::default()
            },
            ..Default::default()
        };

        serde_yaml::to_string(&config).unwrap_or_default()
    }
}
