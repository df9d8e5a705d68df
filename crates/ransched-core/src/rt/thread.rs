//! # Real-Time Thread Spawning
//!
//! Spawns the scheduler task with an OS scheduling class, CPU affinity and
//! memory locking.
//!
//! ## Platform Support
//!
//! - **Linux**: SCHED_FIFO, SCHED_RR, SCHED_DEADLINE, CPU affinity, mlockall
//! - **Others**: settings are logged and ignored
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use ransched_core::rt::{spawn_rt_thread, RtConfig, RtPolicy};
//!
//! let config = RtConfig::builder()
//!     .name("dl_scheduler")
//!     .policy(RtPolicy::Deadline {
//!         runtime: Duration::from_micros(400),
//!         deadline: Duration::from_micros(900),
//!         period: Duration::from_millis(1),
//!     })
//!     .cpu_affinity(&[2])
//!     .lock_memory(true)
//!     .build();
//!
//! let handle = spawn_rt_thread(config, || 42).unwrap();
//! assert_eq!(handle.join().unwrap(), 42);
//! ```

use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Error type for real-time thread operations.
#[derive(Debug, Error)]
pub enum RtError {
    #[error("failed to spawn thread: {0}")]
    SpawnFailed(#[from] std::io::Error),
    #[error("failed to set scheduling policy: {0}")]
    PolicyFailed(String),
    #[error("failed to set CPU affinity: {0}")]
    AffinityFailed(String),
    #[error("failed to lock memory: {0}")]
    MlockFailed(String),
    #[error("deadline parameters must satisfy runtime <= deadline <= period (got {runtime:?}, {deadline:?}, {period:?})")]
    InvalidDeadline {
        runtime: Duration,
        deadline: Duration,
        period: Duration,
    },
}

/// OS scheduling class of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtPolicy {
    /// Inherit the default time-sharing class
    #[default]
    Default,
    /// SCHED_FIFO with a static priority, clamped to 1..=99
    Fifo(i32),
    /// SCHED_RR with a static priority, clamped to 1..=99
    RoundRobin(i32),
    /// SCHED_DEADLINE: `runtime` of CPU every `period`, finished by `deadline`
    Deadline {
        runtime: Duration,
        deadline: Duration,
        period: Duration,
    },
}

impl RtPolicy {
    /// Static priority for the fixed-priority classes.
    pub fn priority(&self) -> Option<i32> {
        match self {
            RtPolicy::Fifo(p) | RtPolicy::RoundRobin(p) => Some((*p).clamp(1, 99)),
            RtPolicy::Default | RtPolicy::Deadline { .. } => None,
        }
    }

    pub fn is_realtime(&self) -> bool {
        !matches!(self, RtPolicy::Default)
    }

    pub fn validate(&self) -> Result<(), RtError> {
        if let RtPolicy::Deadline {
            runtime,
            deadline,
            period,
        } = *self
        {
            if runtime.is_zero() || runtime > deadline || deadline > period {
                return Err(RtError::InvalidDeadline {
                    runtime,
                    deadline,
                    period,
                });
            }
        }
        Ok(())
    }
}

/// Configuration for spawning a real-time thread.
#[derive(Debug, Clone)]
pub struct RtConfig {
    pub name: String,
    pub policy: RtPolicy,
    /// CPU cores to pin the thread to (empty = no affinity)
    pub cpu_affinity: Vec<usize>,
    /// Stack size in bytes (0 = default)
    pub stack_size: usize,
    /// Whether to lock memory (mlockall)
    pub lock_memory: bool,
}

impl RtConfig {
    pub fn builder() -> RtConfigBuilder {
        RtConfigBuilder::new()
    }

    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            policy: RtPolicy::Default,
            cpu_affinity: Vec::new(),
            stack_size: 0,
            lock_memory: false,
        }
    }
}

impl Default for RtConfig {
    fn default() -> Self {
        Self::new("dl_scheduler")
    }
}

/// Builder for RtConfig.
pub struct RtConfigBuilder {
    config: RtConfig,
}

impl RtConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RtConfig::default(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    pub fn policy(mut self, policy: RtPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    pub fn cpu_affinity(mut self, cpus: &[usize]) -> Self {
        self.config.cpu_affinity = cpus.to_vec();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = size;
        self
    }

    pub fn lock_memory(mut self, lock: bool) -> Self {
        self.config.lock_memory = lock;
        self
    }

    pub fn build(self) -> RtConfig {
        self.config
    }
}

impl Default for RtConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a thread with real-time configuration.
///
/// Settings are applied from inside the new thread. Missing privileges
/// (CAP_SYS_NICE, RLIMIT_MEMLOCK) are logged and the thread runs anyway.
pub fn spawn_rt_thread<F, T>(config: RtConfig, f: F) -> Result<JoinHandle<T>, RtError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut builder = thread::Builder::new().name(config.name.clone());

    if config.stack_size > 0 {
        builder = builder.stack_size(config.stack_size);
    }

    let policy = config.policy;
    let affinity = config.cpu_affinity.clone();
    let lock_mem = config.lock_memory;

    let handle = builder.spawn(move || {
        apply_rt_settings(policy, &affinity, lock_mem);
        f()
    })?;
    Ok(handle)
}

fn apply_rt_settings(policy: RtPolicy, affinity: &[usize], lock_memory: bool) {
    if policy.is_realtime() {
        if let Err(e) = policy.validate().and_then(|_| set_thread_policy(policy)) {
            warn!(?policy, error = %e, "running without real-time scheduling");
        }
    }

    if !affinity.is_empty() {
        if let Err(e) = set_cpu_affinity(affinity) {
            warn!(?affinity, error = %e, "CPU affinity not applied");
        }
    }

    if lock_memory {
        if let Err(e) = lock_all_memory() {
            warn!(error = %e, "memory not locked");
        }
    }
}

#[cfg(target_os = "linux")]
const SCHED_DEADLINE: u32 = 6;

/// `struct sched_attr` of the `sched_setattr` system call.
#[cfg(target_os = "linux")]
#[repr(C)]
#[derive(Debug, Default)]
struct SchedAttr {
    size: u32,
    sched_policy: u32,
    sched_flags: u64,
    sched_nice: i32,
    sched_priority: u32,
    sched_runtime: u64,
    sched_deadline: u64,
    sched_period: u64,
}

#[cfg(target_os = "linux")]
fn set_thread_policy(policy: RtPolicy) -> Result<(), RtError> {
    use std::mem;

    let class = match policy {
        RtPolicy::Default => return Ok(()),
        RtPolicy::Fifo(_) => libc::SCHED_FIFO,
        RtPolicy::RoundRobin(_) => libc::SCHED_RR,
        RtPolicy::Deadline {
            runtime,
            deadline,
            period,
        } => {
            let attr = SchedAttr {
                size: mem::size_of::<SchedAttr>() as u32,
                sched_policy: SCHED_DEADLINE,
                sched_runtime: runtime.as_nanos() as u64,
                sched_deadline: deadline.as_nanos() as u64,
                sched_period: period.as_nanos() as u64,
                ..Default::default()
            };
            // SAFETY: attr is a valid, fully initialised sched_attr for the calling thread
            let result = unsafe {
                libc::syscall(libc::SYS_sched_setattr, 0, &attr as *const SchedAttr, 0u32)
            };
            if result != 0 {
                return Err(RtError::PolicyFailed(format!(
                    "sched_setattr failed: {}",
                    std::io::Error::last_os_error()
                )));
            }
            return Ok(());
        }
    };

    // SAFETY: sched_param is plain data; pid 0 is the calling thread
    unsafe {
        let mut param: libc::sched_param = mem::zeroed();
        param.sched_priority = policy.priority().unwrap_or(1);

        let result = libc::sched_setscheduler(0, class, &param);
        if result != 0 {
            return Err(RtError::PolicyFailed(format!(
                "sched_setscheduler failed: {}",
                std::io::Error::last_os_error()
            )));
        }
    }

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_thread_policy(_policy: RtPolicy) -> Result<(), RtError> {
    debug!("real-time scheduling not supported on this platform");
    Ok(())
}

#[cfg(target_os = "linux")]
fn set_cpu_affinity(cpus: &[usize]) -> Result<(), RtError> {
    use std::mem;

    // SAFETY: cpu_set_t is plain data manipulated through the libc macros
    unsafe {
        let mut set: libc::cpu_set_t = mem::zeroed();
        libc::CPU_ZERO(&mut set);

        for &cpu in cpus {
            if cpu < libc::CPU_SETSIZE as usize {
                libc::CPU_SET(cpu, &mut set);
            }
        }

        let result = libc::sched_setaffinity(0, mem::size_of::<libc::cpu_set_t>(), &set);
        if result != 0 {
            return Err(RtError::AffinityFailed(format!(
                "sched_setaffinity failed: {}",
                std::io::Error::last_os_error()
            )));
        }
    }

    debug!(?cpus, "CPU affinity set");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_cpu_affinity(_cpus: &[usize]) -> Result<(), RtError> {
    debug!("CPU affinity not supported on this platform");
    Ok(())
}

#[cfg(target_os = "linux")]
fn lock_all_memory() -> Result<(), RtError> {
    // SAFETY: no pointers involved
    let result = unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) };
    if result != 0 {
        return Err(RtError::MlockFailed(format!(
            "mlockall failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn lock_all_memory() -> Result<(), RtError> {
    debug!("memory locking not supported on this platform");
    Ok(())
}

/// Number of available CPU cores.
pub fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
