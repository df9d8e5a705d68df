//! # Cooperative Cycle
//!
//! The repository updater and the scheduler never run at the same time.
//! A two-party barrier splits every cycle into phases:
//!
//! ```text
//!   updater (CycleDriver::tick)          scheduler task
//!   ───────────────────────────          ──────────────────────────
//!   apply agent messages to Rib          (waiting)
//!   barrier ─────────────────────────▶   barrier
//!   (waiting)                            check exit flag
//!                                        run_round(&Rib), send messages
//!   barrier ◀─────────────────────────   barrier
//! ```
//!
//! The exit flag is only read at the top of a cycle, so a started round
//! always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::thread::{spawn_rt_thread, RtConfig, RtError};
use crate::mac::{DlScheduler, MessageSink, RoundStats};
use crate::observe::SchedulerMetrics;
use crate::rib::Rib;

/// Time budget of one round, one TTI.
pub const ROUND_BUDGET: Duration = Duration::from_millis(1);

/// Updater side of the cycle.
#[derive(Debug, Clone)]
pub struct CycleDriver {
    barrier: Arc<Barrier>,
    exit: Arc<AtomicBool>,
}

impl Default for CycleDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleDriver {
    pub fn new() -> Self {
        Self {
            barrier: Arc::new(Barrier::new(2)),
            exit: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Mutate the repository, then hand the scheduler its window and wait
    /// for the round to finish.
    pub fn tick<F>(&self, rib: &RwLock<Rib>, update: F)
    where
        F: FnOnce(&mut Rib),
    {
        {
            let mut guard = rib.write().unwrap_or_else(|e| e.into_inner());
            update(&mut guard);
        }
        self.barrier.wait();
        self.barrier.wait();
    }

    /// Ask the scheduler task to stop at the top of its next cycle.
    pub fn shutdown(&self) {
        self.exit.store(true, Ordering::Release);
        self.barrier.wait();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }
}

/// One scheduling window: run the round, hand off messages, record metrics
/// when collected.
pub fn run_cycle(
    scheduler: &mut dyn DlScheduler,
    rib: &RwLock<Rib>,
    sink: &mut dyn MessageSink,
    metrics: Option<&SchedulerMetrics>,
) -> RoundStats {
    let start = Instant::now();
    let out = {
        let guard = rib.read().unwrap_or_else(|e| e.into_inner());
        scheduler.run_round(&guard)
    };

    let n_messages = out.messages.len();
    for msg in out.messages {
        sink.send(msg);
    }

    let elapsed = start.elapsed();
    if let Some(m) = metrics {
        m.record_round(&out.stats, n_messages, elapsed);
    }
    if elapsed > ROUND_BUDGET {
        if let Some(m) = metrics {
            m.overruns.inc();
        }
        warn!(
            scheduler = scheduler.name(),
            elapsed_us = elapsed.as_micros() as u64,
            "scheduling round overran the TTI"
        );
    }
    out.stats
}

/// Start the scheduler task on its own real-time thread.
///
/// The task runs one round per [`CycleDriver::tick`] and returns the
/// scheduler when the driver shuts down.
pub fn spawn_scheduler_task<S>(
    config: RtConfig,
    mut scheduler: Box<dyn DlScheduler>,
    rib: Arc<RwLock<Rib>>,
    mut sink: S,
    driver: &CycleDriver,
    metrics: Option<Arc<SchedulerMetrics>>,
) -> Result<JoinHandle<Box<dyn DlScheduler>>, RtError>
where
    S: MessageSink + 'static,
{
    let barrier = Arc::clone(&driver.barrier);
    let exit = Arc::clone(&driver.exit);

    spawn_rt_thread(config, move || {
        debug!(scheduler = scheduler.name(), "scheduler task started");
        loop {
            barrier.wait();
            if exit.load(Ordering::Acquire) {
                break;
            }
            run_cycle(scheduler.as_mut(), &rib, &mut sink, metrics.as_deref());
            barrier.wait();
        }
        debug!(scheduler = scheduler.name(), "scheduler task stopped");
        scheduler
    })
}
