//! Per-terminal allocation state kept by the scheduler between rounds.

use serde::{Deserialize, Serialize};

use super::primitives::RbgMap;
use crate::rib::common::{MAX_NUM_CC, MAX_NUM_HARQ};
use crate::rib::{Rnti, SfnSf, UeMacInfo};

/// Subframes between two timing advance commands.
pub const TA_TIMER_RESET: u8 = 20;
/// Minimum spacing of power control commands, in subframes.
pub const TPC_MIN_INTERVAL: u32 = 10;
/// Margin added to the nominal PUCCH power to form the receive target.
pub const PUCCH_TARGET_MARGIN_DB: i32 = 20;

/// Closed-loop power control command for PUCCH (TS 36.213 table 5.1.2.1-1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TpcCommand {
    Decrease,
    #[default]
    Hold,
    Increase,
}

impl TpcCommand {
    /// Compare a normalised receive power with its target, ±1 dB tolerance.
    pub fn from_power(rx_dbm: i32, target_dbm: i32) -> Self {
        if rx_dbm > target_dbm + 1 {
            TpcCommand::Decrease
        } else if rx_dbm < target_dbm - 1 {
            TpcCommand::Increase
        } else {
            TpcCommand::Hold
        }
    }

    /// Value carried in the DCI TPC field.
    pub fn value(self) -> u8 {
        match self {
            TpcCommand::Decrease => 0,
            TpcCommand::Hold => 1,
            TpcCommand::Increase => 2,
        }
    }

    /// Contribution to the accumulated power adjustment.
    pub fn delta(self) -> i32 {
        self.value() as i32 - 1
    }
}

/// Parameters of the last transmission on a HARQ process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HarqControl {
    pub mcs: u8,
    pub nb_rb: usize,
    pub ndi: bool,
    pub tpc: TpcCommand,
}

/// Working set of one terminal across scheduling rounds.
#[derive(Debug, Clone)]
pub struct UeSchedulingState {
    rnti: Rnti,
    rbg_provisional: [RbgMap; MAX_NUM_CC],
    rbg_committed: [[RbgMap; MAX_NUM_HARQ]; MAX_NUM_CC],
    rbs_required: [usize; MAX_NUM_CC],
    rbs_available: [usize; MAX_NUM_CC],
    harq: [[HarqControl; MAX_NUM_HARQ]; MAX_NUM_CC],
    // feedback sequence number seen when the process was granted
    harq_in_flight: [[Option<u32>; MAX_NUM_HARQ]; MAX_NUM_CC],
    ta_timer: [u8; MAX_NUM_CC],
    last_power_control: [Option<SfnSf>; MAX_NUM_CC],
}

impl UeSchedulingState {
    pub fn new(rnti: Rnti) -> Self {
        Self {
            rnti,
            rbg_provisional: [RbgMap::EMPTY; MAX_NUM_CC],
            rbg_committed: [[RbgMap::EMPTY; MAX_NUM_HARQ]; MAX_NUM_CC],
            rbs_required: [0; MAX_NUM_CC],
            rbs_available: [0; MAX_NUM_CC],
            harq: [[HarqControl::default(); MAX_NUM_HARQ]; MAX_NUM_CC],
            harq_in_flight: [[None; MAX_NUM_HARQ]; MAX_NUM_CC],
            ta_timer: [0; MAX_NUM_CC],
            last_power_control: [None; MAX_NUM_CC],
        }
    }

    pub fn rnti(&self) -> Rnti {
        self.rnti
    }

    /// Forget the previous round's allocation on `cell`.
    pub fn start_new_round(&mut self, cell: usize) {
        self.rbg_provisional[cell].clear();
        self.rbg_committed[cell] = [RbgMap::EMPTY; MAX_NUM_HARQ];
        self.rbs_required[cell] = 0;
        self.rbs_available[cell] = 0;
    }

    // ------------------------------------------------------------------------
    // Provisional and committed allocation
    // ------------------------------------------------------------------------

    pub fn rbs_required(&self, cell: usize) -> usize {
        self.rbs_required[cell]
    }

    pub fn set_rbs_required(&mut self, cell: usize, rbs: usize) {
        self.rbs_required[cell] = rbs;
    }

    pub fn rbg_provisional(&self, cell: usize) -> RbgMap {
        self.rbg_provisional[cell]
    }

    pub fn rbs_available(&self, cell: usize) -> usize {
        self.rbs_available[cell]
    }

    pub fn set_provisional(&mut self, cell: usize, map: RbgMap, rbs: usize) {
        self.rbg_provisional[cell] = map;
        self.rbs_available[cell] = rbs;
    }

    pub fn consume_available(&mut self, cell: usize, rbs: usize) {
        self.rbs_available[cell] = self.rbs_available[cell].saturating_sub(rbs);
    }

    pub fn rbg_committed(&self, cell: usize, harq_pid: usize) -> RbgMap {
        self.rbg_committed[cell][harq_pid]
    }

    pub fn commit_rbg(&mut self, cell: usize, harq_pid: usize, rbg: usize) {
        self.rbg_committed[cell][harq_pid].set(rbg);
    }

    pub fn clear_committed(&mut self, cell: usize, harq_pid: usize) {
        self.rbg_committed[cell][harq_pid].clear();
    }

    // ------------------------------------------------------------------------
    // HARQ processes
    // ------------------------------------------------------------------------

    pub fn harq_control(&self, cell: usize, harq_pid: usize) -> &HarqControl {
        &self.harq[cell][harq_pid]
    }

    pub fn set_mcs(&mut self, cell: usize, harq_pid: usize, mcs: u8) {
        self.harq[cell][harq_pid].mcs = mcs;
    }

    pub fn set_nb_scheduled_rbs(&mut self, cell: usize, harq_pid: usize, nb_rb: usize) {
        self.harq[cell][harq_pid].nb_rb = nb_rb;
    }

    pub fn toggle_ndi(&mut self, cell: usize, harq_pid: usize) {
        let h = &mut self.harq[cell][harq_pid];
        h.ndi = !h.ndi;
    }

    pub fn set_tpc(&mut self, cell: usize, harq_pid: usize, tpc: TpcCommand) {
        self.harq[cell][harq_pid].tpc = tpc;
    }

    /// A process is free unless granted and still waiting for feedback.
    pub fn harq_available(&self, cell: usize, harq_pid: usize, mac: &UeMacInfo) -> bool {
        match self.harq_in_flight[cell][harq_pid] {
            None => true,
            Some(seq) => mac
                .harq(cell, harq_pid)
                .map_or(true, |h| h.feedback_seq != seq),
        }
    }

    pub fn next_available_harq(&self, cell: usize, mac: &UeMacInfo) -> Option<usize> {
        (0..MAX_NUM_HARQ).find(|&pid| self.harq_available(cell, pid, mac))
    }

    /// Mark a process busy until the feedback tracker reports on it.
    pub fn harq_scheduled(&mut self, cell: usize, harq_pid: usize, mac: &UeMacInfo) {
        let seq = mac.harq(cell, harq_pid).map_or(0, |h| h.feedback_seq);
        self.harq_in_flight[cell][harq_pid] = Some(seq);
    }

    // ------------------------------------------------------------------------
    // Timing advance and power control
    // ------------------------------------------------------------------------

    pub fn ta_timer(&self, cell: usize) -> u8 {
        self.ta_timer[cell]
    }

    /// Whether a pending timing advance command can go out now.
    pub fn timing_advance_due(&self, cell: usize, pending: bool) -> bool {
        pending && self.ta_timer[cell] == 0
    }

    /// Advance the timer after a grant; `sent` restarts it.
    pub fn step_timing_advance(&mut self, cell: usize, sent: bool) {
        let timer = &mut self.ta_timer[cell];
        if sent {
            *timer = TA_TIMER_RESET;
        } else {
            *timer = timer.saturating_sub(1);
        }
    }

    /// At least [`TPC_MIN_INTERVAL`] subframes since the last command,
    /// measured forward around the hyperframe.
    pub fn power_control_due(&self, cell: usize, at: SfnSf) -> bool {
        match self.last_power_control[cell] {
            None => true,
            Some(last) => at.distance_from(last) >= TPC_MIN_INTERVAL,
        }
    }

    pub fn record_power_control(&mut self, cell: usize, at: SfnSf) {
        self.last_power_control[cell] = Some(at);
    }
}
