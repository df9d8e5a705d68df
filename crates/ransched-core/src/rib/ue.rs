//! Per-terminal MAC statistics and HARQ feedback as held by the repository.

use serde::{Deserialize, Serialize};

use super::common::{Rnti, MAX_NUM_CC, MAX_NUM_HARQ, SIGNALING_LCIDS};

/// Wideband CQI reported for one serving cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlCqiReport {
    pub serv_cell_index: u8,
    pub wb_cqi: u8,
}

/// RLC buffer status for one logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RlcReport {
    pub lc_id: u8,
    /// Bytes waiting in the transmission queue
    pub tx_queue_size: u32,
    /// Head-of-line delay in milliseconds
    pub tx_queue_hol_delay: u32,
}

/// Normalised PUCCH receive power for one serving cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PucchPower {
    pub serv_cell_index: u8,
    pub p0_pucch_dbm: Option<i32>,
    /// Set when the measurement changed since the previous report
    pub p0_pucch_updated: bool,
}

/// Latest statistics report of a terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UeStatsReport {
    /// Bitmask of [`mac_ce`](super::common::mac_ce) flags
    pub pending_mac_ces: u32,
    pub dl_cqi: Vec<DlCqiReport>,
    pub rlc_reports: Vec<RlcReport>,
    pub pucch_power: Vec<PucchPower>,
}

impl UeStatsReport {
    pub fn wb_cqi(&self, cell: usize) -> Option<u8> {
        self.dl_cqi
            .iter()
            .find(|r| r.serv_cell_index as usize == cell)
            .map(|r| r.wb_cqi)
    }

    pub fn pucch_power(&self, cell: usize) -> Option<&PucchPower> {
        self.pucch_power
            .iter()
            .find(|p| p.serv_cell_index as usize == cell)
    }

    /// Bytes pending across all logical channels.
    pub fn total_bytes(&self) -> u32 {
        self.rlc_reports
            .iter()
            .fold(0u32, |acc, r| acc.saturating_add(r.tx_queue_size))
    }

    /// Bytes pending on the signaling channels.
    pub fn signaling_bytes(&self) -> u32 {
        self.rlc_reports
            .iter()
            .filter(|r| SIGNALING_LCIDS.contains(&r.lc_id))
            .fold(0u32, |acc, r| acc.saturating_add(r.tx_queue_size))
    }

    /// Worst head-of-line delay over the non-empty queues.
    pub fn hol_delay(&self) -> u32 {
        self.rlc_reports
            .iter()
            .filter(|r| r.tx_queue_size > 0)
            .map(|r| r.tx_queue_hol_delay)
            .max()
            .unwrap_or(0)
    }
}

/// Acknowledgment state of the last transmission on a HARQ process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarqStatus {
    #[default]
    Ack,
    Nack,
    Dtx,
}

/// Feedback tracker view of one HARQ process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HarqProcessStatus {
    /// 0 for a first transmission, otherwise the retransmission count
    pub round: u8,
    pub status: HarqStatus,
    /// Incremented by the tracker every time feedback arrives
    pub feedback_seq: u32,
}

/// Repository entry for a terminal's MAC layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UeMacInfo {
    pub rnti: Rnti,
    pub stats: UeStatsReport,
    pub harq: [[HarqProcessStatus; MAX_NUM_HARQ]; MAX_NUM_CC],
}

impl UeMacInfo {
    pub fn new(rnti: Rnti) -> Self {
        Self {
            rnti,
            stats: UeStatsReport::default(),
            harq: [[HarqProcessStatus::default(); MAX_NUM_HARQ]; MAX_NUM_CC],
        }
    }

    pub fn harq(&self, cell: usize, harq_pid: usize) -> Option<&HarqProcessStatus> {
        self.harq.get(cell)?.get(harq_pid)
    }

    /// Retransmission round of a process, `None` when out of range.
    pub fn harq_round(&self, cell: usize, harq_pid: usize) -> Option<u8> {
        self.harq(cell, harq_pid).map(|h| h.round)
    }

    /// Apply downlink HARQ feedback. Called by the repository updater only.
    pub fn record_dl_feedback(&mut self, cell: usize, harq_pid: usize, status: HarqStatus) {
        if let Some(h) = self.harq.get_mut(cell).and_then(|c| c.get_mut(harq_pid)) {
            h.round = match status {
                HarqStatus::Ack => 0,
                HarqStatus::Nack | HarqStatus::Dtx => h.round.saturating_add(1),
            };
            h.status = status;
            h.feedback_seq = h.feedback_seq.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> UeStatsReport {
        UeStatsReport {
            rlc_reports: vec![
                RlcReport { lc_id: 1, tx_queue_size: 40, tx_queue_hol_delay: 7 },
                RlcReport { lc_id: 3, tx_queue_size: 1000, tx_queue_hol_delay: 25 },
                RlcReport { lc_id: 4, tx_queue_size: 0, tx_queue_hol_delay: 90 },
            ],
            dl_cqi: vec![DlCqiReport { serv_cell_index: 0, wb_cqi: 9 }],
            ..Default::default()
        }
    }

    #[test]
    fn test_buffer_aggregates() {
        let r = report();
        assert_eq!(r.total_bytes(), 1040);
        assert_eq!(r.signaling_bytes(), 40);
        // empty queues do not contribute their stale delay
        assert_eq!(r.hol_delay(), 25);
        assert_eq!(r.wb_cqi(0), Some(9));
        assert_eq!(r.wb_cqi(1), None);
    }

    #[test]
    fn test_feedback_updates_round_and_sequence() {
        let mut ue = UeMacInfo::new(0x1234);
        ue.record_dl_feedback(0, 3, HarqStatus::Nack);
        ue.record_dl_feedback(0, 3, HarqStatus::Nack);
        assert_eq!(ue.harq_round(0, 3), Some(2));
        assert_eq!(ue.harq(0, 3).map(|h| h.feedback_seq), Some(2));

        ue.record_dl_feedback(0, 3, HarqStatus::Ack);
        assert_eq!(ue.harq_round(0, 3), Some(0));
        assert_eq!(ue.harq_round(0, MAX_NUM_HARQ), None);
        assert_eq!(ue.harq_round(MAX_NUM_CC, 0), None);
    }
}
