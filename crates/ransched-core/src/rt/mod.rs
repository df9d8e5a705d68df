//! # Real-Time Execution
//!
//! The scheduler runs as a dedicated task that alternates with the
//! repository updater once per TTI:
//!
//! - **RT thread spawning**: scheduling class, CPU affinity and memory
//!   locking for the scheduler task ([`spawn_rt_thread`])
//! - **Cooperative cycle**: a two-party barrier that gives the scheduler
//!   exclusive read access to the repository for one round ([`CycleDriver`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::{Arc, RwLock};
//! use ransched_core::mac::CentralScheduler;
//! use ransched_core::observe::SchedulerMetrics;
//! use ransched_core::rib::Rib;
//! use ransched_core::rt::{spawn_scheduler_task, CycleDriver, RtConfig};
//!
//! let rib = Arc::new(RwLock::new(Rib::new()));
//! let driver = CycleDriver::new();
//! let (tx, _rx) = std::sync::mpsc::channel();
//! let handle = spawn_scheduler_task(
//!     RtConfig::new("dl_scheduler"),
//!     Box::new(CentralScheduler::default()),
//!     Arc::clone(&rib),
//!     tx,
//!     &driver,
//!     Some(Arc::new(SchedulerMetrics::new())),
//! )
//! .unwrap();
//!
//! driver.tick(&rib, |_rib| { /* apply agent messages */ });
//! driver.shutdown();
//! handle.join().unwrap();
//! ```

mod cycle;
mod thread;

pub use cycle::{run_cycle, spawn_scheduler_task, CycleDriver, ROUND_BUDGET};
pub use thread::{available_cpus, spawn_rt_thread, RtConfig, RtConfigBuilder, RtError, RtPolicy};
