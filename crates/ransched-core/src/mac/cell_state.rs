//! Per-cell scheduling context and the per-base-station table that owns it.

use std::collections::HashMap;

use super::primitives::{self, AggregationLevel, RbgMap};
use super::ue_state::UeSchedulingState;
use crate::rib::common::{HYPERFRAME_SUBFRAMES, MAX_NUM_CC, MAX_NUM_UE};
use crate::rib::{CellConfig, Rnti, SfnSf};

/// Scheduling bookkeeping for one managed cell.
#[derive(Debug, Clone, Default)]
pub struct CellContext {
    last_checked: Option<SfnSf>,
    last_target: Option<SfnSf>,
    rbg_usage: RbgMap,
    pdcch_symbols: u8,
    cce_initial: usize,
    cce_remaining: usize,
    cce_occupied: u128,
    ue_order: Vec<Rnti>,
}

impl CellContext {
    /// Due unless this (frame, subframe) or a later one was already handled.
    ///
    /// "Later" means less than half a hyperframe ahead, so a base station
    /// whose clock jumps back after a restart is picked up again.
    pub fn is_due(&self, now: SfnSf) -> bool {
        match self.last_checked {
            None => true,
            Some(last) => {
                let d = now.distance_from(last);
                d != 0 && d < HYPERFRAME_SUBFRAMES / 2
            }
        }
    }

    /// Close the round for `now`, which was scheduled for `target`.
    pub fn mark_scheduled(&mut self, now: SfnSf, target: SfnSf) {
        self.last_checked = Some(now);
        self.last_target = Some(target);
    }

    pub fn last_checked(&self) -> Option<SfnSf> {
        self.last_checked
    }

    pub fn last_target(&self) -> Option<SfnSf> {
        self.last_target
    }

    /// Reset the RBG map and size the PDCCH for `subframe`.
    pub fn start_new_round(&mut self, cell: &CellConfig, subframe: u8) {
        self.rbg_usage.clear();
        self.pdcch_symbols = if cell.is_mbsfn_subframe(subframe) {
            cell.pdcch_symbols.clamp(1, 2)
        } else {
            cell.pdcch_symbols.clamp(1, 3)
        };
        self.cce_initial = primitives::cce_budget(self.pdcch_symbols, cell, subframe);
        self.cce_remaining = self.cce_initial;
        self.cce_occupied = 0;
        self.ue_order.clear();
    }

    pub fn rbg_usage(&self) -> RbgMap {
        self.rbg_usage
    }

    pub fn mark_rbg_used(&mut self, rbg: usize) {
        self.rbg_usage.set(rbg);
    }

    pub fn pdcch_symbols(&self) -> u8 {
        self.pdcch_symbols
    }

    pub fn cce_initial(&self) -> usize {
        self.cce_initial
    }

    pub fn cce_remaining(&self) -> usize {
        self.cce_remaining
    }

    /// Place a DCI of `level` in the terminal's search space. Returns the
    /// first CCE index, or `None` when the region is exhausted.
    pub fn reserve_cce(&mut self, level: AggregationLevel, rnti: Rnti, subframe: u8) -> Option<usize> {
        let l = level.cces();
        if l > self.cce_remaining {
            return None;
        }
        let start = primitives::cce_offset(level, self.cce_initial, self.cce_occupied, rnti, subframe)?;
        self.cce_occupied |= ((1u128 << l) - 1) << start;
        self.cce_remaining -= l;
        Some(start)
    }

    /// Give back a reservation of an abandoned grant.
    pub fn release_cce(&mut self, start: usize, level: AggregationLevel) {
        let l = level.cces();
        let mask = ((1u128 << l) - 1) << start;
        if self.cce_occupied & mask == mask {
            self.cce_occupied &= !mask;
            self.cce_remaining = (self.cce_remaining + l).min(self.cce_initial);
        }
    }

    /// Terminals in the order fixed by the last pre-allocation pass.
    pub fn ue_order(&self) -> &[Rnti] {
        &self.ue_order
    }

    pub fn set_ue_order(&mut self, order: Vec<Rnti>) {
        self.ue_order = order;
    }
}

/// Everything the scheduler owns for one base station.
#[derive(Debug, Clone)]
pub struct EnbSchedulingContext {
    bs_id: u64,
    cells: [CellContext; MAX_NUM_CC],
    ues: HashMap<Rnti, UeSchedulingState>,
}

impl EnbSchedulingContext {
    pub fn new(bs_id: u64) -> Self {
        Self {
            bs_id,
            cells: Default::default(),
            ues: HashMap::new(),
        }
    }

    pub fn bs_id(&self) -> u64 {
        self.bs_id
    }

    pub fn cell(&self, cell: usize) -> &CellContext {
        &self.cells[cell]
    }

    pub fn cell_mut(&mut self, cell: usize) -> &mut CellContext {
        &mut self.cells[cell]
    }

    pub fn ue(&self, rnti: Rnti) -> Option<&UeSchedulingState> {
        self.ues.get(&rnti)
    }

    pub fn ue_mut(&mut self, rnti: Rnti) -> Option<&mut UeSchedulingState> {
        self.ues.get_mut(&rnti)
    }

    /// Fetch a terminal's state, creating it on first reference.
    /// `None` once the table holds [`MAX_NUM_UE`] terminals.
    pub fn ue_or_insert(&mut self, rnti: Rnti) -> Option<&mut UeSchedulingState> {
        if !self.ues.contains_key(&rnti) && self.ues.len() >= MAX_NUM_UE {
            return None;
        }
        Some(
            self.ues
                .entry(rnti)
                .or_insert_with(|| UeSchedulingState::new(rnti)),
        )
    }

    /// Drop state of a disconnected terminal.
    pub fn remove_ue(&mut self, rnti: Rnti) -> Option<UeSchedulingState> {
        self.ues.remove(&rnti)
    }

    pub fn num_ues(&self) -> usize {
        self.ues.len()
    }

    /// Borrow a cell context and the terminal table together.
    pub fn split_mut(
        &mut self,
        cell: usize,
    ) -> (&mut CellContext, &mut HashMap<Rnti, UeSchedulingState>) {
        (&mut self.cells[cell], &mut self.ues)
    }
}
