//! # Pre-allocation Pass
//!
//! Before any per-terminal decision, every terminal of a cell gets a
//! resource estimate and the cell's free resource-block-groups are handed
//! out greedily in priority order.
//!
//! Priority, most urgent first, each key descending:
//!
//! 1. bytes pending on signaling channels
//! 2. bytes pending on all channels
//! 3. head-of-line delay
//! 4. wideband CQI
//! 5. HARQ round of the next free process
//!
//! Ties fall back to ascending RNTI so the order is total.

use std::cmp::Ordering;

use tracing::trace;

use super::cell_state::EnbSchedulingContext;
use super::primitives::{self, RbgMap};
use super::ue_state::UeSchedulingState;
use crate::rib::{BaseStation, CellConfig, Rnti, UeMacInfo};

/// Ordering key of a terminal on one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UeSortKey {
    pub rnti: Rnti,
    pub signaling_bytes: u32,
    pub total_bytes: u32,
    pub hol_delay: u32,
    pub cqi: u8,
    pub harq_round: u8,
}

impl UeSortKey {
    pub fn new(rnti: Rnti, mac: Option<&UeMacInfo>, cell: usize, state: Option<&UeSchedulingState>) -> Self {
        let Some(mac) = mac else {
            return Self {
                rnti,
                signaling_bytes: 0,
                total_bytes: 0,
                hol_delay: 0,
                cqi: 0,
                harq_round: 0,
            };
        };
        let harq_round = state
            .and_then(|s| s.next_available_harq(cell, mac))
            .and_then(|pid| mac.harq_round(cell, pid))
            .unwrap_or(0);
        Self {
            rnti,
            signaling_bytes: mac.stats.signaling_bytes(),
            total_bytes: mac.stats.total_bytes(),
            hol_delay: mac.stats.hol_delay(),
            cqi: mac.stats.wb_cqi(cell).unwrap_or(0),
            harq_round,
        }
    }
}

impl Ord for UeSortKey {
    /// `Less` means scheduled earlier.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .signaling_bytes
            .cmp(&self.signaling_bytes)
            .then(other.total_bytes.cmp(&self.total_bytes))
            .then(other.hol_delay.cmp(&self.hol_delay))
            .then(other.cqi.cmp(&self.cqi))
            .then(other.harq_round.cmp(&self.harq_round))
            .then(self.rnti.cmp(&other.rnti))
    }
}

impl PartialOrd for UeSortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Terminals with `cell` as primary cell, most urgent first.
pub fn sort_ues(bs: &BaseStation, cell: usize, ctx: &EnbSchedulingContext) -> Vec<Rnti> {
    let mut keys: Vec<UeSortKey> = bs
        .ues_on_cell(cell)
        .map(|ue| UeSortKey::new(ue.rnti, bs.ue_mac_info(ue.rnti), cell, ctx.ue(ue.rnti)))
        .collect();
    keys.sort_unstable();
    keys.dedup_by_key(|k| k.rnti);
    keys.into_iter().map(|k| k.rnti).collect()
}

/// Estimate the resource blocks a terminal needs on `cell`.
///
/// A pending retransmission needs what its process used last time. New data,
/// or a retransmission this scheduler holds no grant for, needs the
/// smallest multiple of the RBG size whose transport block, at the
/// MCS the terminal's CQI supports, holds the whole buffer.
pub fn assign_rbs_required(
    state: &mut UeSchedulingState,
    mac: Option<&UeMacInfo>,
    cell_idx: usize,
    cell: &CellConfig,
) {
    let required = mac.map_or(0, |mac| required_rbs(state, mac, cell_idx, cell));
    state.set_rbs_required(cell_idx, required);
}

fn required_rbs(state: &UeSchedulingState, mac: &UeMacInfo, cell_idx: usize, cell: &CellConfig) -> usize {
    let n_rb = cell.dl_bandwidth as usize;
    let Some(unit) = primitives::min_rb_unit(cell) else {
        return 0;
    };
    let unit = unit as usize;

    if let Some(pid) = state.next_available_harq(cell_idx, mac) {
        let stored = state.harq_control(cell_idx, pid).nb_rb;
        if mac.harq_round(cell_idx, pid).unwrap_or(0) > 0 && stored > 0 {
            return stored.min(n_rb);
        }
    }

    let buffer = mac.stats.total_bytes();
    if buffer == 0 {
        return 0;
    }
    let Some(cqi) = mac.stats.wb_cqi(cell_idx) else {
        return 0;
    };
    let mcs = primitives::cqi_to_mcs(cqi);

    let mut nb_rb = unit;
    while primitives::transport_block_size(mcs, nb_rb) < buffer && nb_rb < n_rb {
        nb_rb += unit;
    }
    nb_rb.min(n_rb)
}

/// Run the pass for one cell of a base station.
///
/// Expects `ctx.cell_mut(cell_idx).start_new_round` to have been called for
/// the target subframe. Leaves the priority order on the cell context.
pub fn run_dlsch_preprocessor(
    bs: &BaseStation,
    cell_idx: usize,
    cell: &CellConfig,
    ctx: &mut EnbSchedulingContext,
) {
    for ue in bs.ues_on_cell(cell_idx) {
        let Some(state) = ctx.ue_or_insert(ue.rnti) else {
            trace!(bs_id = bs.id, rnti = ue.rnti, "terminal table full");
            continue;
        };
        state.start_new_round(cell_idx);
        assign_rbs_required(state, bs.ue_mac_info(ue.rnti), cell_idx, cell);
    }

    let order = sort_ues(bs, cell_idx, ctx);
    perform_pre_processor_allocation(&order, cell_idx, cell, ctx);
    ctx.cell_mut(cell_idx).set_ue_order(order);
}

/// Hand out free RBGs in `order` until each requirement is covered.
pub fn perform_pre_processor_allocation(
    order: &[Rnti],
    cell_idx: usize,
    cell: &CellConfig,
    ctx: &mut EnbSchedulingContext,
) {
    let Some(n_rbg) = primitives::num_rbgs(cell) else {
        return;
    };

    let (cell_ctx, ues) = ctx.split_mut(cell_idx);
    for rnti in order {
        let Some(state) = ues.get_mut(rnti) else {
            continue;
        };
        let mut remaining = state.rbs_required(cell_idx);
        let mut map = RbgMap::default();
        let mut granted = 0;

        for rbg in 0..n_rbg {
            if remaining == 0 {
                break;
            }
            if cell_ctx.rbg_usage().is_set(rbg) {
                continue;
            }
            let size = primitives::rbg_size(cell, rbg);
            map.set(rbg);
            cell_ctx.mark_rbg_used(rbg);
            granted += size;
            remaining = remaining.saturating_sub(size);
        }

        state.set_provisional(cell_idx, map, granted);
        trace!(rnti, required = state.rbs_required(cell_idx), granted, "pre-allocation");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rib::fixtures::{add_ue, base_station};

    fn prepare(bs: &BaseStation) -> EnbSchedulingContext {
        let mut ctx = EnbSchedulingContext::new(bs.id);
        ctx.cell_mut(0).start_new_round(&bs.cells[0], 1);
        run_dlsch_preprocessor(bs, 0, &bs.cells[0], &mut ctx);
        ctx
    }

    #[test]
    fn test_signaling_outranks_cqi_and_volume() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 0x10, 15, &[(3, 5000)]);
        add_ue(&mut bs, 0x20, 2, &[(1, 30)]);
        let ctx = prepare(&bs);
        assert_eq!(ctx.cell(0).ue_order(), &[0x20, 0x10]);
    }

    #[test]
    fn test_tie_breakers_in_order() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 9, &[(3, 100)]);
        add_ue(&mut bs, 2, 9, &[(3, 400)]);
        add_ue(&mut bs, 3, 12, &[(3, 100)]);
        add_ue(&mut bs, 4, 9, &[(3, 100)]);
        if let Some(ue) = bs.ue_mac.get_mut(&4) {
            ue.stats.rlc_reports[0].tx_queue_hol_delay = 50;
        }
        let ctx = EnbSchedulingContext::new(1);
        let order = sort_ues(&bs, 0, &ctx);
        // volume, then delay, then CQI, then RNTI
        assert_eq!(order, vec![2, 4, 3, 1]);
        assert_eq!(sort_ues(&bs, 0, &ctx), order);
    }

    #[test]
    fn test_retransmission_outranks_new_data_on_tie() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 9, &[(3, 100)]);
        add_ue(&mut bs, 2, 9, &[(3, 100)]);
        if let Some(ue) = bs.ue_mac.get_mut(&2) {
            ue.harq[0][0].round = 1;
        }
        let mut ctx = EnbSchedulingContext::new(1);
        ctx.ue_or_insert(1);
        ctx.ue_or_insert(2);
        assert_eq!(sort_ues(&bs, 0, &ctx), vec![2, 1]);
    }

    #[test]
    fn test_required_rbs_from_buffer() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 7, &[(3, 200)]);
        add_ue(&mut bs, 2, 7, &[(3, 0)]);
        add_ue(&mut bs, 3, 1, &[(3, 1_000_000)]);
        let ctx = prepare(&bs);

        let mcs = primitives::cqi_to_mcs(7);
        let need = ctx.ue(1).map(|u| u.rbs_required(0)).unwrap_or(0);
        assert_eq!(need % 2, 0);
        assert!(primitives::transport_block_size(mcs, need) >= 200);
        assert!(primitives::transport_block_size(mcs, need - 2) < 200);

        assert_eq!(ctx.ue(2).map(|u| u.rbs_required(0)), Some(0));
        assert_eq!(ctx.ue(3).map(|u| u.rbs_required(0)), Some(25));
    }

    #[test]
    fn test_allocation_is_disjoint_and_exhausts_cell() {
        let mut bs = base_station(1, 25);
        for rnti in 1..=4u16 {
            add_ue(&mut bs, rnti, 3, &[(3, 3000)]);
        }
        let ctx = prepare(&bs);

        let mut union = RbgMap::default();
        let mut total = 0;
        for rnti in 1..=4u16 {
            let ue = ctx.ue(rnti).expect("state created");
            let map = ue.rbg_provisional(0);
            assert!(!union.intersects(map), "rnti {} overlaps", rnti);
            assert_eq!(primitives::rbs_in(&bs.cells[0], map), ue.rbs_available(0));
            union = union | map;
            total += ue.rbs_available(0);
        }
        assert_eq!(union, ctx.cell(0).rbg_usage());
        assert!(total <= 25);
    }

    #[test]
    fn test_zero_requirement_gets_empty_allocation() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 9, &[]);
        let ctx = prepare(&bs);
        let ue = ctx.ue(1).expect("state created");
        assert!(ue.rbg_provisional(0).is_empty());
        assert_eq!(ue.rbs_available(0), 0);
        assert_eq!(ctx.cell(0).ue_order(), &[1]);
    }

    #[test]
    fn test_last_short_group_is_usable() {
        let mut bs = base_station(1, 25);
        add_ue(&mut bs, 1, 1, &[(3, 1_000_000)]);
        let ctx = prepare(&bs);
        let ue = ctx.ue(1).expect("state created");
        assert_eq!(ue.rbg_provisional(0).count(), 13);
        assert_eq!(ue.rbs_available(0), 25);
    }
}
