//! # Central Downlink Scheduler
//!
//! Runs the full per-TTI decision for every managed cell from the
//! controller:
//!
//! ```text
//!  for each base station (by id)
//!   └─ for each cell (configuration order)
//!       ├─ due check ──── not due ────────────────▶ skip cell
//!       ├─ target = now + look-ahead
//!       ├─ reserved subframe (0, 5) ──────────────▶ skip cell
//!       ├─ pre-allocation pass (priority order, provisional RBGs)
//!       └─ for each terminal (priority order)
//!           ├─ gating: CQI, HARQ process, RBs, CCE ─▶ skipped
//!           ├─ round > 0, grant stored: replay stored MCS / RBs
//!           ├─ otherwise: fill RLC PDUs, size RBs, fit MCS
//!           └─ commit DCI, mark HARQ busy
//!  └─ one DlMacConfig per base station with grants
//! ```
//!
//! Failures are never fatal. A terminal that cannot be served is skipped
//! for the round and the reason is counted in [`RoundStats`].

use std::collections::BTreeMap;

use tracing::{debug, info, trace, warn};

use super::cell_state::{CellContext, EnbSchedulingContext};
use super::message::{DlData, DlDci, DlMacConfig, RlcPduGrant, VrbFormat};
use super::policy::{DlScheduler, RoundOutput, RoundStats, SkipReason};
use super::preprocessor;
use super::primitives::{self, AggregationLevel, DciFormat, MAX_MCS};
use super::ue_state::{TpcCommand, UeSchedulingState, PUCCH_TARGET_MARGIN_DB};
use crate::band;
use crate::rib::common::{MAX_NUM_CC, MAX_NUM_LC};
use crate::rib::{mac_ce, BaseStation, CellConfig, Rib, RlcReport, Rnti, SfnSf, UeMacInfo};

/// Size of the timing advance MAC control element, subheader included.
pub const TA_CE_BYTES: u32 = 2;

/// MAC subheader with a 7-bit length field.
const SHORT_SUBHEADER: u32 = 2;
/// MAC subheader with a 15-bit length field.
const LONG_SUBHEADER: u32 = 3;
/// The last subheader of a PDU carries no length field.
const LAST_SUBHEADER: u32 = 1;

/// Subframes carrying synchronisation and broadcast only.
pub fn is_reserved_subframe(subframe: u8) -> bool {
    subframe == 0 || subframe == 5
}

/// Everything fixed for one cell during one round.
struct CellRound<'a> {
    bs: &'a BaseStation,
    cell_idx: usize,
    cell: &'a CellConfig,
    target: SfnSf,
    bw_index: usize,
    rb_unit: usize,
}

/// Outcome of the retransmission or new-transmission branch.
struct Grant {
    mcs: u8,
    nb_rb: usize,
    tbs: u32,
    ce_bitmap: u32,
    rlc_pdus: Vec<RlcPduGrant>,
}

/// Central scheduling policy.
#[derive(Debug, Clone)]
pub struct CentralScheduler {
    look_ahead: u32,
    enabled: bool,
    contexts: BTreeMap<u64, EnbSchedulingContext>,
}

impl Default for CentralScheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CentralScheduler {
    /// `look_ahead` subframes separate the current subframe from the one
    /// the grants are computed for.
    pub fn new(look_ahead: u32) -> Self {
        Self {
            look_ahead,
            enabled: true,
            contexts: BTreeMap::new(),
        }
    }

    pub fn look_ahead(&self) -> u32 {
        self.look_ahead
    }

    /// Switch between controller-side and base-station-side scheduling.
    pub fn set_central_scheduling(&mut self, enabled: bool) {
        if self.enabled != enabled {
            info!(enabled, "central scheduling switched");
        }
        self.enabled = enabled;
    }

    pub fn central_scheduling(&self) -> bool {
        self.enabled
    }

    pub fn context(&self, bs_id: u64) -> Option<&EnbSchedulingContext> {
        self.contexts.get(&bs_id)
    }

    /// Scheduling context of a base station, created if absent.
    pub fn context_mut(&mut self, bs_id: u64) -> &mut EnbSchedulingContext {
        self.contexts
            .entry(bs_id)
            .or_insert_with(|| EnbSchedulingContext::new(bs_id))
    }

    /// Schedule every due cell of `bs`. Returns the message to send, if any.
    pub fn schedule_base_station(
        &mut self,
        bs: &BaseStation,
        stats: &mut RoundStats,
    ) -> Option<DlMacConfig> {
        let now = bs.current;
        let target = now.advance(self.look_ahead);
        let ctx = self.context_mut(bs.id);
        let mut msg = DlMacConfig::new(bs.id, target);

        for (cell_idx, cell) in bs.cells.iter().enumerate().take(MAX_NUM_CC) {
            if !ctx.cell(cell_idx).is_due(now) {
                stats.cells_not_due += 1;
                continue;
            }
            ctx.cell_mut(cell_idx).mark_scheduled(now, target);

            if is_reserved_subframe(target.subframe) {
                stats.reserved_subframes += 1;
                trace!(bs_id = bs.id, cell_idx, %target, "reserved subframe");
                continue;
            }

            if let Err(e) = band::check_eutra_bandwidth(cell.dl_bandwidth) {
                warn!(bs_id = bs.id, cell_idx, error = %e, "cell not scheduled");
                continue;
            }
            let (Some(bw_index), Some(rb_unit)) = (
                primitives::bandwidth_index(cell.dl_bandwidth),
                primitives::min_rb_unit(cell),
            ) else {
                continue;
            };

            stats.cells_scheduled += 1;
            let round = CellRound {
                bs,
                cell_idx,
                cell,
                target,
                bw_index,
                rb_unit: rb_unit as usize,
            };
            schedule_cell(&round, ctx, &mut msg, stats);
        }

        if msg.is_empty() {
            None
        } else {
            debug!(bs_id = bs.id, %target, grants = msg.dl_ue_data.len(), "downlink configuration");
            Some(msg)
        }
    }
}

impl DlScheduler for CentralScheduler {
    fn name(&self) -> &'static str {
        "central"
    }

    fn run_round(&mut self, rib: &Rib) -> RoundOutput {
        let mut out = RoundOutput::default();
        if !self.enabled {
            return out;
        }

        self.contexts.retain(|id, _| rib.get(*id).is_some());
        for bs in rib.base_stations() {
            if let Some(msg) = self.schedule_base_station(bs, &mut out.stats) {
                out.messages.push(msg);
            }
        }
        out
    }
}

fn schedule_cell(
    round: &CellRound<'_>,
    ctx: &mut EnbSchedulingContext,
    msg: &mut DlMacConfig,
    stats: &mut RoundStats,
) {
    ctx.cell_mut(round.cell_idx)
        .start_new_round(round.cell, round.target.subframe);
    preprocessor::run_dlsch_preprocessor(round.bs, round.cell_idx, round.cell, ctx);

    let order = ctx.cell(round.cell_idx).ue_order().to_vec();
    let (cell_ctx, ues) = ctx.split_mut(round.cell_idx);
    for rnti in order {
        let Some(ue) = ues.get_mut(&rnti) else {
            continue;
        };
        match schedule_ue(round, cell_ctx, ue, stats) {
            Ok(data) => msg.dl_ue_data.push(data),
            Err(SkipReason::NoMeasurement) => {
                stats.record_skip(SkipReason::NoMeasurement);
                trace!(bs_id = round.bs.id, rnti, "no measurement");
            }
            Err(reason) => {
                stats.record_skip(reason);
                debug!(bs_id = round.bs.id, rnti, %reason, "terminal skipped");
            }
        }
    }
}

fn schedule_ue(
    round: &CellRound<'_>,
    cell_ctx: &mut CellContext,
    ue: &mut UeSchedulingState,
    stats: &mut RoundStats,
) -> Result<DlData, SkipReason> {
    let c = round.cell_idx;
    let rnti = ue.rnti();
    let mac = round.bs.ue_mac_info(rnti).ok_or(SkipReason::NoMeasurement)?;
    let cqi = mac.stats.wb_cqi(c).ok_or(SkipReason::NoMeasurement)?;
    let level = primitives::aggregation_level(round.bw_index, cqi, DciFormat::Format1)
        .ok_or(SkipReason::NoMeasurement)?;

    let pid = ue.next_available_harq(c, mac).ok_or(SkipReason::NoHarqProcess)?;
    if ue.rbs_available(c) == 0 {
        return Err(SkipReason::NoResources);
    }
    let cce = cell_ctx
        .reserve_cce(level, rnti, round.target.subframe)
        .ok_or(SkipReason::CceExhausted)?;

    // a process never granted here has nothing to replay and is sent fresh
    let harq_round = mac.harq_round(c, pid).unwrap_or(0);
    let replay = harq_round > 0 && ue.harq_control(c, pid).nb_rb > 0;
    let built = if replay {
        retransmission(round, ue, pid)
    } else {
        new_transmission(round, ue, pid, mac, cqi, stats)
    };

    match built {
        Ok(grant) => {
            let rv_round = if replay {
                stats.retx_grants += 1;
                harq_round
            } else {
                stats.new_grants += 1;
                0
            };
            Ok(commit(round, ue, pid, rv_round, level, cce, mac, grant))
        }
        Err(reason) => {
            cell_ctx.release_cce(cce, level);
            ue.clear_committed(c, pid);
            Err(reason)
        }
    }
}

/// Replay the allocation of the process's previous transmission.
fn retransmission(
    round: &CellRound<'_>,
    ue: &mut UeSchedulingState,
    pid: usize,
) -> Result<Grant, SkipReason> {
    let c = round.cell_idx;
    let stored = *ue.harq_control(c, pid);
    if stored.nb_rb > ue.rbs_available(c) {
        return Err(SkipReason::RetransmissionBlocked);
    }

    commit_rbgs(round.cell, ue, c, pid, stored.nb_rb);
    ue.consume_available(c, stored.nb_rb);

    Ok(Grant {
        mcs: stored.mcs,
        nb_rb: stored.nb_rb,
        tbs: primitives::transport_block_size(stored.mcs, stored.nb_rb),
        ce_bitmap: 0,
        rlc_pdus: Vec::new(),
    })
}

fn new_transmission(
    round: &CellRound<'_>,
    ue: &mut UeSchedulingState,
    pid: usize,
    mac: &UeMacInfo,
    cqi: u8,
    stats: &mut RoundStats,
) -> Result<Grant, SkipReason> {
    let c = round.cell_idx;
    let mcs0 = primitives::cqi_to_mcs(cqi);
    let available = ue.rbs_available(c);
    let tbs_available = primitives::transport_block_size(mcs0, available);

    let ta_pending = mac.stats.pending_mac_ces & mac_ce::TIMING_ADVANCE != 0;
    let ta_sent = ue.timing_advance_due(c, ta_pending);
    let ta_len = if ta_sent { TA_CE_BYTES } else { 0 };

    let (rlc_pdus, sdu_len, header_len) = fill_rlc_pdus(&mac.stats.rlc_reports, tbs_available, ta_len);
    if rlc_pdus.is_empty() {
        return Err(SkipReason::NoPayload);
    }
    let need = sdu_len + header_len + ta_len;

    let unit = round.rb_unit;
    let mut nb_rb = if mcs0 == 0 { 4 } else { unit }.min(available);
    while primitives::transport_block_size(mcs0, nb_rb) < need && nb_rb < available {
        nb_rb = (nb_rb + unit).min(available);
    }

    let mut mcs = mcs0;
    let mut tbs = primitives::transport_block_size(mcs, nb_rb);
    while tbs > need && mcs > 0 {
        mcs -= 1;
        tbs = primitives::transport_block_size(mcs, nb_rb);
    }
    while tbs < need && mcs < MAX_MCS {
        mcs += 1;
        tbs = primitives::transport_block_size(mcs, nb_rb);
    }

    commit_rbgs(round.cell, ue, c, pid, nb_rb);
    ue.consume_available(c, nb_rb);

    // grant is final from here on
    ue.set_mcs(c, pid, mcs);
    ue.set_nb_scheduled_rbs(c, pid, nb_rb);
    ue.step_timing_advance(c, ta_sent);
    let tpc = power_control(round, ue, mac);
    stats.tpc_accumulated += tpc.delta();
    ue.set_tpc(c, pid, tpc);
    ue.toggle_ndi(c, pid);

    Ok(Grant {
        mcs,
        nb_rb,
        tbs,
        ce_bitmap: if ta_sent { mac_ce::TIMING_ADVANCE } else { 0 },
        rlc_pdus,
    })
}

/// Grant logical channels in index order while the transport block has room.
///
/// Returns the grants, the SDU bytes and the MAC header bytes.
fn fill_rlc_pdus(reports: &[RlcReport], tbs_available: u32, ta_len: u32) -> (Vec<RlcPduGrant>, u32, u32) {
    let mut queues: Vec<&RlcReport> = reports
        .iter()
        .filter(|r| r.tx_queue_size > 0)
        .take(MAX_NUM_LC)
        .collect();
    queues.sort_by_key(|r| r.lc_id);

    let mut pdus = Vec::new();
    let mut sdu_len = 0u32;
    let mut header_len = 0u32;
    let mut last_subheader = 0u32;

    for q in queues {
        let budget = tbs_available as i64
            - ta_len as i64
            - (header_len + LONG_SUBHEADER) as i64
            - sdu_len as i64;
        if budget <= 0 {
            break;
        }
        let size = q.tx_queue_size.min(budget as u32);
        last_subheader = if size < 128 { SHORT_SUBHEADER } else { LONG_SUBHEADER };
        header_len += last_subheader;
        sdu_len += size;
        pdus.push(RlcPduGrant { lcid: q.lc_id, size });
    }

    if !pdus.is_empty() {
        header_len = header_len - last_subheader + LAST_SUBHEADER;
    }
    (pdus, sdu_len, header_len)
}

/// PUCCH closed-loop command for this grant, at most one every
/// [`TPC_MIN_INTERVAL`](super::ue_state::TPC_MIN_INTERVAL) subframes.
fn power_control(round: &CellRound<'_>, ue: &mut UeSchedulingState, mac: &UeMacInfo) -> TpcCommand {
    let c = round.cell_idx;
    let Some(rx_dbm) = mac
        .stats
        .pucch_power(c)
        .filter(|p| p.p0_pucch_updated)
        .and_then(|p| p.p0_pucch_dbm)
    else {
        return TpcCommand::Hold;
    };
    if !ue.power_control_due(c, round.target) {
        return TpcCommand::Hold;
    }

    let target_dbm = round.bs.cell_stats[c].p0_nominal_pucch + PUCCH_TARGET_MARGIN_DB;
    let tpc = TpcCommand::from_power(rx_dbm, target_dbm);
    ue.record_power_control(c, round.target);
    trace!(rnti = ue.rnti(), rx_dbm, target_dbm, ?tpc, "power control");
    tpc
}

/// Move provisional groups into the process's committed map until `nb_rb`
/// blocks are covered.
fn commit_rbgs(cell: &CellConfig, ue: &mut UeSchedulingState, c: usize, pid: usize, nb_rb: usize) {
    let mut remaining = nb_rb;
    let provisional = ue.rbg_provisional(c);
    for rbg in provisional.iter() {
        if remaining == 0 {
            break;
        }
        ue.commit_rbg(c, pid, rbg);
        remaining = remaining.saturating_sub(primitives::rbg_size(cell, rbg));
    }
}

#[allow(clippy::too_many_arguments)]
fn commit(
    round: &CellRound<'_>,
    ue: &mut UeSchedulingState,
    pid: usize,
    harq_round: u8,
    level: AggregationLevel,
    cce: usize,
    mac: &UeMacInfo,
    grant: Grant,
) -> DlData {
    let c = round.cell_idx;
    let rnti: Rnti = ue.rnti();
    let control = *ue.harq_control(c, pid);
    let rb_bitmap =
        primitives::expand_to_physical_resource_blocks(grant.nb_rb, ue.rbg_committed(c, pid), round.cell);
    ue.harq_scheduled(c, pid, mac);

    debug!(
        rnti,
        harq = pid,
        round = harq_round,
        mcs = grant.mcs,
        nb_rb = grant.nb_rb,
        tbs = grant.tbs,
        "grant"
    );

    DlData {
        rnti,
        serv_cell_index: c as u8,
        nb_rb: grant.nb_rb,
        ce_bitmap: [grant.ce_bitmap, 0],
        rlc_pdus: grant.rlc_pdus,
        dci: DlDci {
            rnti,
            harq_process: pid as u8,
            aggregation: level,
            cce_index: cce as u8,
            res_alloc: 0,
            vrb_format: VrbFormat::Localized,
            format: DciFormat::Format1,
            rb_shift: 0,
            ndi: control.ndi,
            rv: harq_round % 4,
            tpc: control.tpc.value(),
            mcs: grant.mcs,
            tbs_size: grant.tbs,
            rb_bitmap,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::primitives::{rbs_in, transport_block_size, RbgMap};
    use crate::rib::fixtures::{add_ue, base_station, rib_with};
    use crate::rib::HarqStatus;

    fn run(s: &mut CentralScheduler, rib: &Rib) -> RoundOutput {
        s.run_round(rib)
    }

    fn set_now(rib: &mut Rib, bs_id: u64, now: SfnSf) {
        if let Some(bs) = rib.get_mut(bs_id) {
            bs.current = now;
        }
    }

    fn header_len(pdus: &[RlcPduGrant]) -> u32 {
        let subheaders: Vec<u32> = pdus
            .iter()
            .map(|p| if p.size < 128 { 2 } else { 3 })
            .collect();
        subheaders.iter().sum::<u32>() - subheaders.last().copied().unwrap_or(1) + 1
    }

    #[test]
    fn test_single_terminal_200_bytes() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 0x11, 7, &[(3, 200)]);
        add_ue(&mut bs, 0x12, 7, &[(3, 0)]);
        let rib = rib_with(bs);

        let mut s = CentralScheduler::default();
        let out = run(&mut s, &rib);
        assert_eq!(out.messages.len(), 1);
        let msg = &out.messages[0];
        assert_eq!(msg.sfn_sf, SfnSf::new(100, 1));
        assert_eq!(msg.dl_ue_data.len(), 1);
        assert!(msg.grant(0x12).is_none());

        let g = msg.grant(0x11).unwrap();
        assert_eq!(g.rlc_pdus, vec![RlcPduGrant { lcid: 3, size: 200 }]);
        let need = 200 + 1;
        // minimal multiple of the RBG size, then the lowest MCS that fits
        assert_eq!(g.nb_rb, 10);
        assert_eq!(g.dci.mcs, 10);
        assert!(g.dci.tbs_size >= need);
        assert_eq!(g.dci.tbs_size, transport_block_size(g.dci.mcs, g.nb_rb));
        assert!(transport_block_size(8, g.nb_rb) < need);
        assert!(transport_block_size(primitives::cqi_to_mcs(7), g.nb_rb - 2) < need);

        assert_eq!(g.dci.rv, 0);
        assert!(g.dci.ndi);
        assert_eq!(g.dci.tpc, 1);
        assert_eq!(g.dci.harq_process, 0);
        // five groups from the top of the band
        assert_eq!(g.dci.rb_bitmap, 0b11111 << 8);
        assert_eq!(out.stats.new_grants, 1);
        assert_eq!(out.stats.skips(SkipReason::NoResources), 1);
    }

    #[test]
    fn test_retransmission_blocked_without_resources() {
        let mut bs = base_station(1, 100);
        let first_buffer = transport_block_size(primitives::cqi_to_mcs(7), 92) + 1;
        add_ue(&mut bs, 1, 7, &[(1, first_buffer)]);
        add_ue(&mut bs, 2, 7, &[]);
        if let Some(ue) = bs.ue_mac.get_mut(&2) {
            ue.harq[0][0].round = 2;
        }
        let rib = rib_with(bs);

        let mut s = CentralScheduler::default();
        if let Some(ue) = s.context_mut(1).ue_or_insert(2) {
            ue.set_mcs(0, 0, 12);
            ue.set_nb_scheduled_rbs(0, 0, 6);
        }

        let out = run(&mut s, &rib);
        let ctx = s.context(1).unwrap();
        let retx = ctx.ue(2).unwrap();
        assert_eq!(retx.rbs_available(0), 4);
        assert!(retx.rbg_committed(0, 0).is_empty());
        assert_eq!(out.stats.skips(SkipReason::RetransmissionBlocked), 1);

        let msg = out.message_for(1).unwrap();
        assert!(msg.grant(1).is_some());
        assert!(msg.grant(2).is_none());
        // stored parameters survive for the next attempt
        assert_eq!(retx.harq_control(0, 0).nb_rb, 6);
        assert_eq!(retx.harq_control(0, 0).mcs, 12);
    }

    #[test]
    fn test_retransmission_reproduces_stored_grant() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 5, 12, &[(3, 900)]);
        if let Some(ue) = bs.ue_mac.get_mut(&5) {
            ue.harq[0][0].round = 1;
        }
        let rib = rib_with(bs);

        let mut s = CentralScheduler::default();
        if let Some(ue) = s.context_mut(1).ue_or_insert(5) {
            ue.set_mcs(0, 0, 9);
            ue.set_nb_scheduled_rbs(0, 0, 4);
            ue.toggle_ndi(0, 0);
            ue.set_tpc(0, 0, TpcCommand::Increase);
        }

        let out = run(&mut s, &rib);
        let g = out.message_for(1).and_then(|m| m.grant(5)).unwrap();
        assert_eq!(g.dci.harq_process, 0);
        assert_eq!(g.nb_rb, 4);
        assert_eq!(g.dci.mcs, 9);
        assert_eq!(g.dci.tbs_size, transport_block_size(9, 4));
        assert_eq!(g.dci.rv, 1);
        assert!(g.dci.ndi);
        assert_eq!(g.dci.tpc, TpcCommand::Increase.value());
        assert!(g.rlc_pdus.is_empty());
        assert_eq!(out.stats.retx_grants, 1);
    }

    #[test]
    fn test_retransmission_without_stored_grant_is_sent_fresh() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 5, 9, &[(3, 300)]);
        if let Some(ue) = bs.ue_mac.get_mut(&5) {
            ue.harq[0][0].round = 1;
            ue.harq[0][0].feedback_seq = 1;
        }
        let rib = rib_with(bs);

        let mut s = CentralScheduler::default();
        let out = run(&mut s, &rib);
        let g = out.message_for(1).and_then(|m| m.grant(5)).unwrap();
        assert_eq!(g.dci.harq_process, 0);
        assert_eq!(g.dci.rv, 0);
        assert!(g.dci.ndi);
        assert!(g.nb_rb > 0);
        assert_eq!(g.rlc_pdus, vec![RlcPduGrant { lcid: 3, size: 300 }]);
        assert!(g.dci.tbs_size >= 300 + header_len(&g.rlc_pdus));
        assert_eq!(out.stats.new_grants, 1);
        assert_eq!(out.stats.retx_grants, 0);

        let ue = s.context(1).and_then(|c| c.ue(5)).unwrap();
        assert_eq!(ue.harq_control(0, 0).nb_rb, g.nb_rb);
        assert!(ue.rbs_required(0) > 0);
    }

    #[test]
    fn test_due_check_is_idempotent() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        let mut rib = rib_with(bs);

        let mut s = CentralScheduler::default();
        assert_eq!(run(&mut s, &rib).messages.len(), 1);

        let again = run(&mut s, &rib);
        assert!(again.messages.is_empty());
        assert_eq!(again.stats.cells_not_due, 1);
        assert_eq!(again.stats.cells_scheduled, 0);
        assert_eq!(s.context(1).unwrap().cell(0).last_checked(), Some(SfnSf::new(100, 1)));

        set_now(&mut rib, 1, SfnSf::new(100, 2));
        assert_eq!(run(&mut s, &rib).messages.len(), 1);
    }

    #[test]
    fn test_reserved_subframes_are_skipped() {
        let mut bs = base_station(1, 25);
        bs.current = SfnSf::new(7, 5);
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        let rib = rib_with(bs);

        let mut s = CentralScheduler::default();
        let out = run(&mut s, &rib);
        assert!(out.messages.is_empty());
        assert_eq!(out.stats.reserved_subframes, 1);
        assert_eq!(s.context(1).unwrap().cell(0).last_target(), Some(SfnSf::new(7, 5)));
    }

    #[test]
    fn test_look_ahead_targets_future_subframe() {
        let mut bs = base_station(1, 25);
        bs.current = SfnSf::new(1023, 7);
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        let rib = rib_with(bs);

        let mut s = CentralScheduler::new(4);
        let out = run(&mut s, &rib);
        assert_eq!(out.messages[0].sfn_sf, SfnSf::new(0, 1));
    }

    #[test]
    fn test_harq_process_busy_until_feedback() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        let mut rib = rib_with(bs);
        let mut s = CentralScheduler::default();

        let pid = |out: &RoundOutput| out.message_for(1).and_then(|m| m.grant(1)).map(|g| g.dci.harq_process);
        assert_eq!(pid(&run(&mut s, &rib)), Some(0));
        set_now(&mut rib, 1, SfnSf::new(100, 2));
        assert_eq!(pid(&run(&mut s, &rib)), Some(1));

        if let Some(ue) = rib.get_mut(1).and_then(|bs| bs.ue_mac.get_mut(&1)) {
            ue.record_dl_feedback(0, 0, HarqStatus::Ack);
        }
        set_now(&mut rib, 1, SfnSf::new(100, 3));
        let out = run(&mut s, &rib);
        let g = out.message_for(1).and_then(|m| m.grant(1)).unwrap();
        assert_eq!(g.dci.harq_process, 0);
        // new data on the process toggles the indicator again
        assert!(!g.dci.ndi);
    }

    #[test]
    fn test_all_processes_busy() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        let mut rib = rib_with(bs);
        let mut s = CentralScheduler::default();

        let mut now = SfnSf::new(100, 1);
        let mut granted = 0;
        while granted < 8 {
            set_now(&mut rib, 1, now);
            granted += run(&mut s, &rib).stats.new_grants;
            now = now.advance(1);
        }
        set_now(&mut rib, 1, SfnSf::new(101, 1));
        let out = run(&mut s, &rib);
        assert!(out.messages.is_empty());
        assert_eq!(out.stats.skips(SkipReason::NoHarqProcess), 1);
    }

    #[test]
    fn test_cce_budget_bounds_grants() {
        let mut bs = base_station(1, 6);
        for rnti in 1..=6u16 {
            add_ue(&mut bs, rnti, 7, &[(3, 10)]);
        }
        let rib = rib_with(bs);

        let mut s = CentralScheduler::default();
        let out = run(&mut s, &rib);
        let cell = s.context(1).unwrap().cell(0);
        let granted = out.stats.grants() as usize;

        assert!(granted >= 1);
        assert!(granted < 6);
        assert_eq!(granted * AggregationLevel::L2.cces() + cell.cce_remaining(), cell.cce_initial());
        assert!(cell.cce_remaining() < AggregationLevel::L2.cces());
        assert_eq!(out.stats.skips(SkipReason::CceExhausted) as usize, 6 - granted);

        let mut cces: Vec<u8> = out.messages[0].dl_ue_data.iter().map(|d| d.dci.cce_index).collect();
        cces.sort_unstable();
        cces.dedup();
        assert_eq!(cces.len(), granted);
    }

    #[test]
    fn test_grants_never_overlap() {
        let mut bs = base_station(1, 50);
        for (rnti, cqi, bytes) in [(1, 4, 400), (2, 9, 2000), (3, 15, 150), (4, 11, 90), (5, 6, 700)] {
            add_ue(&mut bs, rnti, cqi, &[(3, bytes), (4, bytes / 3)]);
        }
        let rib = rib_with(bs);
        let cell = rib.get(1).unwrap().cells[0].clone();

        let mut s = CentralScheduler::default();
        let out = run(&mut s, &rib);
        let msg = &out.messages[0];
        let ctx = s.context(1).unwrap();

        let mut union = RbgMap::default();
        let mut bitmap_union = 0u32;
        for d in &msg.dl_ue_data {
            let committed = ctx.ue(d.rnti).unwrap().rbg_committed(0, d.dci.harq_process as usize);
            assert!(!union.intersects(committed));
            assert!(rbs_in(&cell, committed) >= d.nb_rb);
            assert_eq!(d.dci.rb_bitmap & bitmap_union, 0);
            union = union | committed;
            bitmap_union |= d.dci.rb_bitmap;
        }
        assert!(union.count() <= primitives::num_rbgs(&cell).unwrap());
    }

    #[test]
    fn test_transport_block_covers_payload() {
        for n_rb in [6u8, 15, 25, 50, 75, 100] {
            for cqi in [1u8, 4, 7, 10, 13, 15] {
                let mut bs = base_station(1, n_rb);
                add_ue(&mut bs, 9, cqi, &[(1, 20), (3, 1500), (5, 40_000)]);
                let rib = rib_with(bs);
                let mut s = CentralScheduler::default();
                let out = run(&mut s, &rib);
                let Some(g) = out.message_for(1).and_then(|m| m.grant(9)) else {
                    continue;
                };
                let sdu: u32 = g.rlc_pdus.iter().map(|p| p.size).sum();
                let need = sdu + header_len(&g.rlc_pdus);
                assert!(g.dci.tbs_size >= need, "n_rb {} cqi {}", n_rb, cqi);
                assert!(g.dci.mcs <= MAX_MCS);
                assert_eq!(g.rlc_pdus[0].lcid, 1);
            }
        }
    }

    #[test]
    fn test_timing_advance_reserves_two_bytes() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 7, &[(3, 200)]);
        if let Some(ue) = bs.ue_mac.get_mut(&1) {
            ue.stats.pending_mac_ces = mac_ce::TIMING_ADVANCE;
        }
        let mut rib = rib_with(bs);
        let mut s = CentralScheduler::default();

        let out = run(&mut s, &rib);
        let g = out.message_for(1).and_then(|m| m.grant(1)).unwrap();
        assert_eq!(g.ce_bitmap[0], mac_ce::TIMING_ADVANCE);
        assert!(g.dci.tbs_size >= 200 + 1 + TA_CE_BYTES);
        assert_eq!(s.context(1).unwrap().ue(1).unwrap().ta_timer(0), 20);

        set_now(&mut rib, 1, SfnSf::new(100, 2));
        let out = run(&mut s, &rib);
        let g = out.message_for(1).and_then(|m| m.grant(1)).unwrap();
        assert_eq!(g.ce_bitmap[0], 0);
        assert_eq!(s.context(1).unwrap().ue(1).unwrap().ta_timer(0), 19);
    }

    #[test]
    fn test_power_control_spacing_across_hyperframe() {
        let mut bs = base_station(1, 25);
        bs.cell_stats[0].p0_nominal_pucch = -100;
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        if let Some(ue) = bs.ue_mac.get_mut(&1) {
            ue.stats.pucch_power[0].p0_pucch_dbm = Some(-70);
            ue.stats.pucch_power[0].p0_pucch_updated = true;
        }
        let mut rib = rib_with(bs);
        let mut s = CentralScheduler::default();

        fn tpc_at(rib: &mut Rib, now: SfnSf, s: &mut CentralScheduler) -> (Option<u8>, i32) {
            set_now(rib, 1, now);
            if let Some(ue) = rib.get_mut(1).and_then(|bs| bs.ue_mac.get_mut(&1)) {
                for pid in 0..8 {
                    ue.record_dl_feedback(0, pid, HarqStatus::Ack);
                }
            }
            let out = s.run_round(rib);
            let tpc = out.message_for(1).and_then(|m| m.grant(1)).map(|g| g.dci.tpc);
            (tpc, out.stats.tpc_accumulated)
        }

        // 10236 -> 4 is 8 subframes, 10236 -> 6 is 10
        assert_eq!(tpc_at(&mut rib, SfnSf::new(1023, 6), &mut s), (Some(0), -1));
        assert_eq!(tpc_at(&mut rib, SfnSf::new(0, 4), &mut s), (Some(1), 0));
        assert_eq!(tpc_at(&mut rib, SfnSf::new(0, 6), &mut s), (Some(0), -1));
    }

    #[test]
    fn test_missing_measurement_is_skipped() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        if let Some(ue) = bs.ue_mac.get_mut(&1) {
            ue.stats.dl_cqi.clear();
        }
        let rib = rib_with(bs);
        let mut s = CentralScheduler::default();
        let out = run(&mut s, &rib);
        assert!(out.messages.is_empty());
        assert_eq!(out.stats.skips(SkipReason::NoMeasurement), 1);
    }

    #[test]
    fn test_unsupported_bandwidth_is_not_scheduled() {
        let mut bs = base_station(1, 10);
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        let rib = rib_with(bs);
        let mut s = CentralScheduler::default();
        let out = run(&mut s, &rib);
        assert!(out.messages.is_empty());
        assert_eq!(out.stats.cells_scheduled, 0);
    }

    #[test]
    fn test_disabled_central_scheduling_is_a_no_op() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 9, &[(3, 300)]);
        let rib = rib_with(bs);
        let mut s = CentralScheduler::default();
        s.set_central_scheduling(false);
        let out = run(&mut s, &rib);
        assert!(out.messages.is_empty());
        assert!(s.context(1).is_none());

        s.set_central_scheduling(true);
        assert_eq!(run(&mut s, &rib).messages.len(), 1);
    }

    #[test]
    fn test_contexts_follow_repository() {
        let mut rib = rib_with(base_station(1, 25));
        rib.insert(base_station(2, 25));
        let mut s = CentralScheduler::default();
        run(&mut s, &rib);
        assert!(s.context(2).is_some());
        rib.remove(2);
        run(&mut s, &rib);
        assert!(s.context(2).is_none());
    }
}
