//! Scheduling policies behind a single entry point.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::central::CentralScheduler;
use super::delegated::DelegatedScheduler;
use super::eicic::EicicScheduler;
use super::message::DlMacConfig;
use crate::config::{PolicyKind, SchedulerConfig};
use crate::rib::Rib;

/// Why a terminal got no grant this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No CQI report for the cell
    NoMeasurement,
    /// No PDCCH candidate left for the aggregation level
    CceExhausted,
    /// Every HARQ process awaits feedback
    NoHarqProcess,
    /// Nothing left after pre-allocation
    NoResources,
    /// Stored allocation of the retransmission does not fit
    RetransmissionBlocked,
    /// No logical channel fits in the transport block
    NoPayload,
}

impl SkipReason {
    pub const ALL: [SkipReason; 6] = [
        SkipReason::NoMeasurement,
        SkipReason::CceExhausted,
        SkipReason::NoHarqProcess,
        SkipReason::NoResources,
        SkipReason::RetransmissionBlocked,
        SkipReason::NoPayload,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::NoMeasurement => "no_measurement",
            SkipReason::CceExhausted => "cce_exhausted",
            SkipReason::NoHarqProcess => "no_harq_process",
            SkipReason::NoResources => "no_resources",
            SkipReason::RetransmissionBlocked => "retransmission_blocked",
            SkipReason::NoPayload => "no_payload",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters of one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundStats {
    pub cells_scheduled: u32,
    pub cells_not_due: u32,
    /// Cells whose target subframe carries no data
    pub reserved_subframes: u32,
    pub new_grants: u32,
    pub retx_grants: u32,
    pub skipped: [u32; SkipReason::ALL.len()],
    /// Sum of issued power control steps, +1 increase / -1 decrease
    pub tpc_accumulated: i32,
}

impl RoundStats {
    pub fn record_skip(&mut self, reason: SkipReason) {
        self.skipped[reason.index()] += 1;
    }

    pub fn skips(&self, reason: SkipReason) -> u32 {
        self.skipped[reason.index()]
    }

    pub fn grants(&self) -> u32 {
        self.new_grants + self.retx_grants
    }

    pub fn merge(&mut self, other: &RoundStats) {
        self.cells_scheduled += other.cells_scheduled;
        self.cells_not_due += other.cells_not_due;
        self.reserved_subframes += other.reserved_subframes;
        self.new_grants += other.new_grants;
        self.retx_grants += other.retx_grants;
        for (a, b) in self.skipped.iter_mut().zip(other.skipped.iter()) {
            *a += b;
        }
        self.tpc_accumulated += other.tpc_accumulated;
    }
}

/// Result of [`DlScheduler::run_round`].
#[derive(Debug, Clone, Default)]
pub struct RoundOutput {
    /// At most one message per base station
    pub messages: Vec<DlMacConfig>,
    pub stats: RoundStats,
}

impl RoundOutput {
    pub fn message_for(&self, bs_id: u64) -> Option<&DlMacConfig> {
        self.messages.iter().find(|m| m.bs_id == bs_id)
    }
}

/// A downlink scheduling policy.
///
/// `run_round` is called once per cooperative cycle, while the repository
/// is quiescent. Implementations keep their own state between calls and
/// never write to the repository.
pub trait DlScheduler: Send {
    fn name(&self) -> &'static str;

    fn run_round(&mut self, rib: &Rib) -> RoundOutput;
}

/// Instantiate the policy selected by the configuration.
pub fn build_scheduler(config: &SchedulerConfig) -> Box<dyn DlScheduler> {
    match config.policy {
        PolicyKind::Central => {
            let mut s = CentralScheduler::new(config.look_ahead);
            s.set_central_scheduling(config.central_scheduling);
            Box::new(s)
        }
        PolicyKind::Delegated => {
            let mut s = DelegatedScheduler::new();
            s.set_delegation(config.delegation_enabled);
            Box::new(s)
        }
        PolicyKind::Eicic => Box::new(EicicScheduler::new(
            config.eicic.macro_bs_id,
            config.eicic.abs_pattern,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_scheduler_by_policy() {
        let mut config = SchedulerConfig::default();
        assert_eq!(build_scheduler(&config).name(), "central");
        config.policy = PolicyKind::Delegated;
        assert_eq!(build_scheduler(&config).name(), "delegated");
        config.policy = PolicyKind::Eicic;
        assert_eq!(build_scheduler(&config).name(), "eicic");
    }

    #[test]
    fn test_round_stats_merge() {
        let mut a = RoundStats::default();
        a.new_grants = 2;
        a.record_skip(SkipReason::NoPayload);
        a.tpc_accumulated = -1;
        let mut b = RoundStats::default();
        b.retx_grants = 1;
        b.record_skip(SkipReason::NoPayload);
        b.record_skip(SkipReason::CceExhausted);
        b.tpc_accumulated = 3;

        a.merge(&b);
        assert_eq!(a.grants(), 3);
        assert_eq!(a.skips(SkipReason::NoPayload), 2);
        assert_eq!(a.skips(SkipReason::CceExhausted), 1);
        assert_eq!(a.tpc_accumulated, 2);
    }

    #[test]
    fn test_skip_reason_indices_are_dense() {
        for (i, r) in SkipReason::ALL.iter().enumerate() {
            assert_eq!(r.index(), i);
        }
        assert_eq!(SkipReason::CceExhausted.to_string(), "cce_exhausted");
    }
}
